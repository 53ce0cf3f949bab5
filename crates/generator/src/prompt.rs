use clio_core::models::{ReadmeOptions, ReadmeStyle};

use crate::RepositoryData;

/// Sections the model is asked to cover, in order.
pub const REQUIRED_SECTIONS: &[&str] = &[
    "Project title and a short description",
    "Badges (build status, version, license) when badges are requested",
    "Table of contents when requested",
    "Installation",
    "Usage with examples",
    "API documentation, if the project exposes an API",
    "Configuration",
    "Contributing",
    "License",
    "Changelog",
    "Support",
];

fn style_guidance(style: ReadmeStyle) -> &'static str {
    match style {
        ReadmeStyle::Professional => "clear and formal, suitable for a public project",
        ReadmeStyle::Casual => "friendly and conversational, while staying accurate",
        ReadmeStyle::Minimal => "concise; keep only essential sections and short paragraphs",
        ReadmeStyle::Detailed => "thorough, with examples and explanations for every section",
    }
}

fn yes_no(value: bool) -> &'static str { if value { "yes" } else { "no" } }

fn or_none(value: Option<&str>, fallback: &'static str) -> String {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(fallback).to_string()
}

/// Render the generation prompt. Output depends only on the inputs.
pub fn build_prompt(data: &RepositoryData<'_>, options: &ReadmeOptions) -> String {
    let repository = data.repository;
    let analysis = data.analysis;
    let structure =
        serde_json::to_string_pretty(&analysis.structure).unwrap_or_else(|_| "{}".to_string());
    let key_files = analysis.key_file_paths().collect::<Vec<_>>().join(", ");
    let sections = REQUIRED_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, section)| format!("{}. {}", i + 1, section))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        r#"Generate a README.md for the following GitHub repository.

Repository: {name}
Description: {description}
Primary language: {language}
Topics: {topics}

Project structure:
```json
{structure}
```

Key files: {key_files}
Framework: {framework}
Build tool: {build_tool}
Test framework: {test_framework}

Style: {style} ({guidance})
Include badges: {badges}
Include table of contents: {toc}
Include images: {images}

The README must contain these sections:
{sections}

Use level-2 headings (##) for sections. Respond with the Markdown content only, without surrounding code fences."#,
        name = repository.name(),
        description = or_none(repository.description.as_deref(), "No description provided"),
        language = or_none(analysis.primary_language.as_deref(), "Unknown"),
        topics = or_none(Some(&repository.topics.join(", ")), "None"),
        key_files = or_none(Some(&key_files), "None"),
        framework = or_none(analysis.framework.as_deref(), "None detected"),
        build_tool = or_none(analysis.build_tool.as_deref(), "None detected"),
        test_framework = or_none(analysis.test_framework.as_deref(), "None detected"),
        style = options.style,
        guidance = style_guidance(options.style),
        badges = yes_no(options.include_badges),
        toc = yes_no(options.include_toc),
        images = yes_no(options.include_images),
    );
    if let Some(custom_prompt) = options.custom_prompt.as_deref().filter(|p| !p.trim().is_empty())
    {
        prompt.push_str("\n\nAdditional instructions:\n");
        prompt.push_str(custom_prompt);
    }
    prompt
}
