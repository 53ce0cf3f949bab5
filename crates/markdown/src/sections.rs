//! Standard sections added when the generated text leaves them out.

use clio_core::models::RepositoryAnalysis;

struct Recipe {
    build_tool: &'static str,
    install: &'static [&'static str],
    run: Option<&'static str>,
}

const RECIPES: &[Recipe] = &[
    Recipe {
        build_tool: "Cargo",
        install: &["cargo build --release"],
        run: Some("cargo run --release"),
    },
    Recipe { build_tool: "Go", install: &["go build ./..."], run: Some("go run .") },
    Recipe { build_tool: "Maven", install: &["mvn install"], run: None },
    Recipe { build_tool: "Gradle", install: &["./gradlew build"], run: None },
    Recipe {
        build_tool: "CMake",
        install: &["cmake -B build", "cmake --build build"],
        run: None,
    },
    Recipe { build_tool: "Make", install: &["make"], run: None },
    Recipe { build_tool: "pip", install: &["pip install -e ."], run: None },
    Recipe { build_tool: "Bundler", install: &["bundle install"], run: None },
    Recipe { build_tool: "Composer", install: &["composer install"], run: None },
    Recipe { build_tool: "Mix", install: &["mix deps.get", "mix compile"], run: Some("mix run") },
];

/// Build tools driven through a JavaScript package manager.
const NODE_BUILD_TOOLS: &[&str] =
    &["npm", "Vite", "Webpack", "Rollup", "esbuild", "Parcel", "Turborepo"];

const NODE_PACKAGE_MANAGERS: &[&str] = &["npm", "yarn", "pnpm", "bun"];

/// Test framework to the command that runs it.
const TEST_COMMANDS: &[(&str, &str)] = &[
    ("Jest", "npx jest"),
    ("Vitest", "npx vitest run"),
    ("Mocha", "npx mocha"),
    ("Jasmine", "npx jasmine"),
    ("AVA", "npx ava"),
    ("Playwright", "npx playwright test"),
    ("Cypress", "npx cypress run"),
    ("Karma", "npx karma start"),
    ("pytest", "pytest"),
    ("cargo test", "cargo test"),
    ("go test", "go test ./..."),
];

/// Manifest scripts listed in the development section.
const DEV_SCRIPTS: &[&str] = &["dev", "start"];

fn node_package_manager(analysis: &RepositoryAnalysis) -> &str {
    analysis
        .package_manager
        .as_deref()
        .filter(|pm| NODE_PACKAGE_MANAGERS.contains(pm))
        .unwrap_or("npm")
}

fn code_block(commands: &[String]) -> String { format!("```bash\n{}\n```", commands.join("\n")) }

fn project_dir(analysis: &RepositoryAnalysis) -> &str { analysis.name() }

pub fn installation(analysis: &RepositoryAnalysis) -> Option<String> {
    let build_tool = analysis.build_tool.as_deref()?;
    let mut commands = vec![
        format!("git clone https://github.com/{}.git", analysis.full_name),
        format!("cd {}", project_dir(analysis)),
    ];
    let mut run = None;
    if let Some(recipe) = RECIPES.iter().find(|r| r.build_tool == build_tool) {
        commands.extend(recipe.install.iter().map(|c| c.to_string()));
        run = recipe.run.map(str::to_string);
    } else if NODE_BUILD_TOOLS.contains(&build_tool) {
        let pm = node_package_manager(analysis);
        commands.push(format!("{pm} install"));
        let scripts = analysis.package_info.as_ref().map(|info| &info.scripts);
        if scripts.is_some_and(|s| s.contains_key("build")) {
            commands.push(format!("{pm} run build"));
        }
        if scripts.is_some_and(|s| s.contains_key("start")) {
            run = Some(format!("{pm} start"));
        }
    }
    let mut section = format!("## Installation\n\n{}", code_block(&commands));
    if let Some(run) = run {
        section.push_str(&format!("\n\nThen run the project:\n\n{}", code_block(&[run])));
    }
    Some(section)
}

fn test_command(analysis: &RepositoryAnalysis) -> Option<String> {
    let has_test_script = analysis
        .package_info
        .as_ref()
        .is_some_and(|info| info.scripts.contains_key("test"));
    if has_test_script {
        return Some(format!("{} run test", node_package_manager(analysis)));
    }
    let framework = analysis.test_framework.as_deref()?;
    TEST_COMMANDS.iter().find(|(name, _)| *name == framework).map(|(_, cmd)| cmd.to_string())
}

pub fn development(analysis: &RepositoryAnalysis) -> Option<String> {
    if !analysis.has_tests {
        return None;
    }
    let mut section = String::from("## Development\n\n");
    match test_command(analysis) {
        Some(command) => {
            section.push_str("Run the test suite:\n\n");
            section.push_str(&code_block(&[command]));
        }
        None => section.push_str("Run the test suite before submitting changes."),
    }
    let pm = node_package_manager(analysis);
    let scripts: Vec<String> = analysis
        .package_info
        .iter()
        .flat_map(|info| DEV_SCRIPTS.iter().filter(move |s| info.scripts.contains_key(**s)))
        .map(|script| format!("{pm} run {script}"))
        .collect();
    if !scripts.is_empty() {
        section.push_str("\n\nStart a development server:\n\n");
        section.push_str(&code_block(&scripts));
    }
    Some(section)
}

pub fn docker(analysis: &RepositoryAnalysis) -> Option<String> {
    if !analysis.has_docker {
        return None;
    }
    let image = project_dir(analysis).to_ascii_lowercase();
    let mut commands =
        vec![format!("docker build -t {image} ."), format!("docker run --rm {image}")];
    if analysis.key_file_paths().any(|path| path.to_ascii_lowercase().contains("compose")) {
        commands.push("docker compose up".to_string());
    }
    Some(format!("## Docker\n\n{}", code_block(&commands)))
}
