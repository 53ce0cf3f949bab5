use std::collections::{BTreeMap, HashMap, btree_map::Entry};

use clio_core::models::{FileDescriptor, Importance, PackageInfo, StructureNode};

use crate::tables::{
    BUILD_TOOL_DEPENDENCIES, BUILD_TOOL_FILES, DATA_LANGUAGES, FRAMEWORK_DEPENDENCIES,
    FRAMEWORK_FILES, KEY_FILES, LANGUAGES, LOCKFILES, SKIPPED_DIRS, TEST_FRAMEWORK_DEPENDENCIES,
    TEST_FRAMEWORK_FILES,
};

/// Directory levels kept in the structure summary.
pub const MAX_STRUCTURE_DEPTH: usize = 3;
/// Files kept in the structure summary.
pub const MAX_STRUCTURE_FILES: usize = 400;

pub fn language_for_path(path: &str) -> Option<&'static str> {
    let file_name = path.rsplit('/').next()?;
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    LANGUAGES.iter().find(|(ext, _)| *ext == extension).map(|(_, language)| *language)
}

pub fn key_file_importance(path: &str) -> Option<Importance> {
    KEY_FILES.iter().find(|(pattern, _)| pattern.matches(path)).map(|(_, importance)| *importance)
}

fn is_skipped(path: &str) -> bool { path.split('/').any(|segment| SKIPPED_DIRS.contains(&segment)) }

/// Nested summary of file paths. Deep files keep only their ancestor directories.
pub fn build_structure<'a>(
    files: impl IntoIterator<Item = (&'a str, Option<u64>)>,
) -> BTreeMap<String, StructureNode> {
    let mut root = BTreeMap::new();
    let mut file_count = 0;
    for (path, size) in files {
        if is_skipped(path) {
            continue;
        }
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(file_name) = segments.pop() else {
            continue;
        };
        let leaf = (segments.len() <= MAX_STRUCTURE_DEPTH && file_count < MAX_STRUCTURE_FILES)
            .then(|| {
                (file_name, FileDescriptor {
                    path: path.to_string(),
                    size,
                    language: language_for_path(path).map(str::to_string),
                })
            });
        segments.truncate(MAX_STRUCTURE_DEPTH);
        if insert_path(&mut root, &segments, leaf) {
            file_count += 1;
        }
    }
    root
}

/// Returns whether a new file node was inserted.
fn insert_path(
    map: &mut BTreeMap<String, StructureNode>,
    dirs: &[&str],
    leaf: Option<(&str, FileDescriptor)>,
) -> bool {
    match dirs.split_first() {
        Some((dir, rest)) => {
            match map
                .entry(dir.to_string())
                .or_insert_with(|| StructureNode::Directory(BTreeMap::new()))
            {
                StructureNode::Directory(children) => insert_path(children, rest, leaf),
                StructureNode::File(_) => false,
            }
        }
        None => match leaf {
            Some((name, file)) => match map.entry(name.to_string()) {
                Entry::Vacant(entry) => {
                    entry.insert(StructureNode::File(file));
                    true
                }
                Entry::Occupied(_) => false,
            },
            None => false,
        },
    }
}

/// Most common programming language among the given paths.
pub fn dominant_language<'a>(paths: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for path in paths {
        if is_skipped(path) {
            continue;
        }
        if let Some(language) = language_for_path(path)
            && !DATA_LANGUAGES.contains(&language)
        {
            *counts.entry(language).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(a_lang, a_count), (b_lang, b_count)| {
            a_count.cmp(b_count).then_with(|| b_lang.cmp(a_lang))
        })
        .map(|(language, _)| language.to_string())
}

pub fn has_marker<'a>(paths: impl IntoIterator<Item = &'a str>, markers: &[&str]) -> bool {
    paths.into_iter().any(|path| {
        let path = path.to_ascii_lowercase();
        markers.iter().any(|marker| path.contains(marker))
    })
}

fn from_dependencies(
    package_info: Option<&PackageInfo>,
    table: &[(&str, &'static str)],
) -> Option<&'static str> {
    let package_info = package_info?;
    table.iter().find(|(dependency, _)| package_info.has_dependency(dependency)).map(|(_, v)| *v)
}

fn from_files<'a>(
    paths: impl IntoIterator<Item = &'a str> + Clone,
    table: &[(&str, &'static str)],
) -> Option<&'static str> {
    table
        .iter()
        .find(|(file, _)| paths.clone().into_iter().any(|path| path.eq_ignore_ascii_case(file)))
        .map(|(_, v)| *v)
}

/// Tooling guesses: framework, build tool, test framework.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Tooling {
    pub framework: Option<String>,
    pub build_tool: Option<String>,
    pub test_framework: Option<String>,
}

pub fn detect_tooling<'a>(
    package_info: Option<&PackageInfo>,
    key_file_paths: impl IntoIterator<Item = &'a str> + Clone,
) -> Tooling {
    let detect = |dependencies: &[(&str, &'static str)], files: &[(&str, &'static str)]| {
        from_dependencies(package_info, dependencies)
            .or_else(|| from_files(key_file_paths.clone(), files))
            .map(str::to_string)
    };
    Tooling {
        framework: detect(FRAMEWORK_DEPENDENCIES, FRAMEWORK_FILES),
        build_tool: detect(BUILD_TOOL_DEPENDENCIES, BUILD_TOOL_FILES),
        test_framework: detect(TEST_FRAMEWORK_DEPENDENCIES, TEST_FRAMEWORK_FILES),
    }
}

/// Package manager from root lockfiles.
pub fn package_manager<'a>(
    tree_paths: impl IntoIterator<Item = &'a str> + Clone,
) -> Option<String> {
    from_files(tree_paths, LOCKFILES).map(str::to_string)
}
