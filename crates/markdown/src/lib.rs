//! Cleanup applied to model-generated README text before it is stored.

mod sections;

use std::{collections::HashSet, sync::OnceLock};

use clio_core::models::RepositoryAnalysis;
use regex::{Captures, Regex};

/// Deepest heading level kept in the output.
pub const MAX_HEADING_LEVEL: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Text,
    /// Opening or closing fence line.
    Fence,
    Code,
}

fn fence_char(line: &str) -> Option<char> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some('`')
    } else if trimmed.starts_with("~~~") {
        Some('~')
    } else {
        None
    }
}

/// Classify every line. An unclosed fence runs to the end of the document.
fn regions(lines: &[String]) -> Vec<Region> {
    let mut open = None;
    lines
        .iter()
        .map(|line| match (open, fence_char(line)) {
            (None, Some(c)) => {
                open = Some(c);
                Region::Fence
            }
            (Some(c), Some(d)) if c == d && line.trim().chars().all(|x| x == c) => {
                open = None;
                Region::Fence
            }
            (Some(_), _) => Region::Code,
            (None, None) => Region::Text,
        })
        .collect()
}

fn heading_level(line: &str) -> Option<usize> {
    let level = line.bytes().take_while(|&b| b == b'#').count();
    let rest = &line[level..];
    ((1..=6).contains(&level) && (rest.is_empty() || rest.starts_with([' ', '\t'])))
        .then_some(level)
}

fn text_heading_level(line: &str, region: Region) -> Option<usize> {
    if region == Region::Text { heading_level(line) } else { None }
}

fn cap_heading_levels(lines: &mut [String]) {
    let regions = regions(lines);
    for (line, region) in lines.iter_mut().zip(regions) {
        if let Some(level) = text_heading_level(line, region)
            && level > MAX_HEADING_LEVEL
        {
            *line = format!("{}{}", "#".repeat(MAX_HEADING_LEVEL), &line[level..]);
        }
    }
}

/// Drop blank lines at both ends of every fenced block.
fn trim_code_padding(lines: Vec<String>) -> Vec<String> {
    let regions = regions(&lines);
    let mut keep = vec![true; lines.len()];
    let mut i = 0;
    while i < lines.len() {
        if regions[i] != Region::Code {
            i += 1;
            continue;
        }
        let start = i;
        while i < lines.len() && regions[i] == Region::Code {
            i += 1;
        }
        let block = &lines[start..i];
        let first = block.iter().position(|l| !l.trim().is_empty());
        let last = block.iter().rposition(|l| !l.trim().is_empty());
        for (offset, kept) in keep[start..i].iter_mut().enumerate() {
            *kept = matches!((first, last), (Some(f), Some(l)) if (f..=l).contains(&offset));
        }
    }
    lines.into_iter().zip(keep).filter_map(|(line, kept)| kept.then_some(line)).collect()
}

fn is_thematic_break(line: &str) -> bool {
    let mut marks = line.chars().filter(|c| !c.is_whitespace());
    let Some(first) = marks.next() else {
        return false;
    };
    matches!(first, '*' | '-' | '_') && {
        let rest: Vec<char> = marks.collect();
        rest.len() >= 2 && rest.iter().all(|&c| c == first)
    }
}

fn normalize_list_markers(lines: &mut [String]) {
    static LIST_ITEM: OnceLock<Regex> = OnceLock::new();
    let list_item = LIST_ITEM.get_or_init(|| Regex::new(r"^(\s*)[*+](\s+)").unwrap());
    let regions = regions(lines);
    for (line, region) in lines.iter_mut().zip(regions) {
        if region == Region::Text && !is_thematic_break(line) && list_item.is_match(line) {
            *line = list_item.replace(line, "${1}-${2}").into_owned();
        }
    }
}

/// GitHub style heading anchor.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' || c == '-' {
            slug.push(c);
        } else if c.is_whitespace() {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn is_relative_target(target: &str) -> bool {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    let scheme = SCHEME.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());
    !(target.starts_with('#') || target.starts_with('/') || scheme.is_match(target))
}

/// Last path segment of a link target without query, fragment or extension.
fn target_stem(target: &str) -> &str {
    let path = target.split(['?', '#']).next().unwrap_or(target).trim_end_matches('/');
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ if name.starts_with('.') => "",
        _ => name,
    }
}

fn rewrite_relative_links(lines: &mut [String]) {
    static LINK: OnceLock<Regex> = OnceLock::new();
    let link = LINK.get_or_init(|| {
        Regex::new(r#"(!?)\[([^\]\n]*)\]\(([^()\s]+)((?:\s+"[^"]*")?)\)"#).unwrap()
    });
    let regions = regions(lines);
    for (line, region) in lines.iter_mut().zip(regions) {
        if region != Region::Text || !line.contains("](") {
            continue;
        }
        let rewritten = link.replace_all(line, |caps: &Captures| {
            let (text, target) = (&caps[2], &caps[3]);
            if !caps[1].is_empty() || !is_relative_target(target) {
                return caps[0].to_string();
            }
            let slug = Some(slugify(target_stem(target)))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| slugify(text));
            if slug.is_empty() { caps[0].to_string() } else { format!("[{text}](#{slug})") }
        });
        *line = rewritten.into_owned();
    }
}

fn has_section(lines: &[String], regions: &[Region], name: &str) -> bool {
    lines.iter().zip(regions).any(|(line, &region)| {
        text_heading_level(line, region).is_some_and(|level| level >= 2)
            && line.trim_start_matches('#').trim().to_lowercase().contains(name)
    })
}

fn inject_sections(mut lines: Vec<String>, analysis: &RepositoryAnalysis) -> Vec<String> {
    let renderers: [(&str, fn(&RepositoryAnalysis) -> Option<String>); 3] = [
        ("installation", sections::installation),
        ("development", sections::development),
        ("docker", sections::docker),
    ];
    let regions = regions(&lines);
    let missing: Vec<String> = renderers
        .into_iter()
        .filter(|(name, _)| !has_section(&lines, &regions, name))
        .filter_map(|(_, render)| render(analysis))
        .collect();
    if missing.is_empty() {
        return lines;
    }
    let block: Vec<String> = missing.join("\n\n").lines().map(str::to_string).collect();
    let anchor = lines
        .iter()
        .zip(&regions)
        .position(|(line, &region)| text_heading_level(line, region) == Some(2));
    match anchor {
        Some(index) => {
            let tail = lines.split_off(index);
            lines.extend(block);
            lines.push(String::new());
            lines.extend(tail);
        }
        None => {
            lines.push(String::new());
            lines.extend(block);
        }
    }
    lines
}

/// Split on heading lines and keep the first section for each exact heading.
/// A repeated heading loses only its own body, up to the next heading.
fn dedupe_sections(lines: Vec<String>) -> Vec<String> {
    let regions = regions(&lines);
    let mut seen = HashSet::new();
    let mut skipping = false;
    let mut out = Vec::with_capacity(lines.len());
    for (line, region) in lines.into_iter().zip(regions) {
        if text_heading_level(&line, region).is_some() {
            skipping = !seen.insert(line.trim_end().to_string());
        }
        if !skipping {
            out.push(line);
        }
    }
    out
}

fn finalize(lines: &[String]) -> String {
    let regions = regions(lines);
    let mut out = String::new();
    let mut previous_blank = false;
    for (line, region) in lines.iter().zip(regions) {
        let line = line.trim_end();
        if line.is_empty() && region == Region::Text {
            if previous_blank || out.is_empty() {
                continue;
            }
            previous_blank = true;
        } else {
            previous_blank = false;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Clean up generated README text.
pub fn process(raw: &str, analysis: &RepositoryAnalysis) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = normalized.lines().map(str::to_string).collect();
    cap_heading_levels(&mut lines);
    let mut lines = trim_code_padding(lines);
    normalize_list_markers(&mut lines);
    rewrite_relative_links(&mut lines);
    let lines = inject_sections(lines, analysis);
    let lines = dedupe_sections(lines);
    finalize(&lines)
}
