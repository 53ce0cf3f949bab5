mod detect;
pub mod tables;

use std::sync::Arc;

use clio_core::{
    models::{Importance, KeyFile, PackageInfo, Repository, RepositoryAnalysis},
    util::truncate_utf8,
};
use clio_github::{RepositorySource, SourceError};
pub use detect::{
    Tooling, build_structure, detect_tooling, dominant_language, key_file_importance,
    language_for_path, package_manager,
};
use futures_util::{StreamExt, stream};
use thiserror::Error;

use crate::tables::{
    CHANGELOG_MARKERS, CI_MARKERS, CONTRIBUTING_MARKERS, DOCKER_MARKERS, DOCS_MARKERS,
    LICENSE_MARKERS, TEST_MARKERS,
};

/// Key files fetched per repository.
pub const MAX_KEY_FILES: usize = 25;
/// Bytes of each key file kept in the analysis.
pub const MAX_KEY_FILE_BYTES: usize = 16 * 1024;
const FETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Malformed repository full name {0:?}")]
    InvalidRepository(String),
    #[error("Failed to fetch file tree for {full_name}: {source}")]
    Tree {
        full_name: String,
        #[source]
        source: SourceError,
    },
}

impl AnalysisError {
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Tree { source, .. } if source.is_temporary())
    }
}

#[derive(Clone)]
pub struct Analyzer {
    source: Arc<dyn RepositorySource>,
}

struct FetchedFile<'a> {
    path: &'a str,
    importance: Importance,
    text: String,
}

impl Analyzer {
    pub fn new(source: Arc<dyn RepositorySource>) -> Self { Self { source } }

    pub async fn analyze(
        &self,
        repository: &Repository,
        installation_id: u64,
    ) -> Result<RepositoryAnalysis, AnalysisError> {
        let (owner, name) = repository
            .owner_and_name()
            .ok_or_else(|| AnalysisError::InvalidRepository(repository.full_name.clone()))?;
        let branch = repository.default_branch();
        let tree = self
            .source
            .get_tree(installation_id, owner, name, branch)
            .await
            .map_err(|source| AnalysisError::Tree {
                full_name: repository.full_name.clone(),
                source,
            })?;
        let files: Vec<_> = tree.iter().filter(|item| item.is_file()).collect();
        let structure = build_structure(files.iter().map(|item| (item.path.as_str(), item.size)));

        let mut candidates: Vec<(&str, Importance)> = files
            .iter()
            .filter_map(|item| {
                key_file_importance(&item.path).map(|importance| (item.path.as_str(), importance))
            })
            .collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        candidates.truncate(MAX_KEY_FILES);

        let fetched: Vec<FetchedFile> = stream::iter(candidates)
            .map(|(path, importance)| async move {
                self.fetch_text(installation_id, owner, name, path)
                    .await
                    .map(|text| FetchedFile { path, importance, text })
            })
            .buffered(FETCH_CONCURRENCY)
            .boxed()
            .filter_map(|file| async move { file })
            .collect()
            .await;

        let package_info = fetched
            .iter()
            .find(|file| file.path.eq_ignore_ascii_case("package.json"))
            .and_then(|file| parse_package_info(&file.text));
        let key_files: Vec<KeyFile> = fetched
            .iter()
            .map(|file| KeyFile {
                path: file.path.to_string(),
                content: truncate_utf8(&file.text, MAX_KEY_FILE_BYTES).to_string(),
                language: language_for_path(file.path).map(str::to_string),
                importance: file.importance,
            })
            .collect();

        let paths = || key_files.iter().map(|file| file.path.as_str());
        let tooling = detect_tooling(package_info.as_ref(), paths());
        let analysis = RepositoryAnalysis {
            full_name: repository.full_name.clone(),
            structure,
            readme_exists: paths()
                .any(|path| !path.contains('/') && path.to_ascii_lowercase().starts_with("readme")),
            has_tests: detect::has_marker(paths(), TEST_MARKERS),
            has_docs: detect::has_marker(paths(), DOCS_MARKERS),
            has_docker: detect::has_marker(paths(), DOCKER_MARKERS),
            has_ci: detect::has_marker(paths(), CI_MARKERS),
            has_license: detect::has_marker(paths(), LICENSE_MARKERS),
            has_contributing: detect::has_marker(paths(), CONTRIBUTING_MARKERS),
            has_changelog: detect::has_marker(paths(), CHANGELOG_MARKERS),
            primary_language: repository
                .language
                .clone()
                .or_else(|| dominant_language(files.iter().map(|item| item.path.as_str()))),
            framework: tooling.framework,
            build_tool: tooling.build_tool,
            test_framework: tooling.test_framework,
            package_manager: package_manager(files.iter().map(|item| item.path.as_str())),
            package_info,
            key_files,
        };
        tracing::info!(
            "Analyzed {}: {} files, {} key files",
            analysis.full_name,
            files.len(),
            analysis.key_files.len()
        );
        Ok(analysis)
    }

    async fn fetch_text(
        &self,
        installation_id: u64,
        owner: &str,
        name: &str,
        path: &str,
    ) -> Option<String> {
        match self.source.get_file_content(installation_id, owner, name, path).await {
            Ok(Some(file)) => match file.decode() {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::debug!("Skipping {}/{}:{}: {}", owner, name, path, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to fetch {}/{}:{}: {}", owner, name, path, e);
                None
            }
        }
    }
}

/// Parse a `package.json` manifest. Invalid manifests yield `None`.
pub fn parse_package_info(text: &str) -> Option<PackageInfo> {
    match serde_json::from_str(text) {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!("Ignoring invalid package.json: {}", e);
            None
        }
    }
}
