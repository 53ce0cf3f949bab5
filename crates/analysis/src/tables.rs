//! Detection data. Extending a table never requires touching control flow.

use clio_core::models::Importance;

/// File extension (lowercase, without dot) to language name.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("rs", "Rust"),
    ("go", "Go"),
    ("py", "Python"),
    ("pyi", "Python"),
    ("js", "JavaScript"),
    ("mjs", "JavaScript"),
    ("cjs", "JavaScript"),
    ("jsx", "JavaScript"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("kts", "Kotlin"),
    ("scala", "Scala"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("cs", "C#"),
    ("fs", "F#"),
    ("c", "C"),
    ("h", "C"),
    ("cpp", "C++"),
    ("cc", "C++"),
    ("cxx", "C++"),
    ("hpp", "C++"),
    ("swift", "Swift"),
    ("m", "Objective-C"),
    ("dart", "Dart"),
    ("ex", "Elixir"),
    ("exs", "Elixir"),
    ("erl", "Erlang"),
    ("hs", "Haskell"),
    ("lua", "Lua"),
    ("r", "R"),
    ("jl", "Julia"),
    ("zig", "Zig"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("sh", "Shell"),
    ("bash", "Shell"),
    ("ps1", "PowerShell"),
    ("sql", "SQL"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("scss", "SCSS"),
    ("md", "Markdown"),
    ("json", "JSON"),
    ("yml", "YAML"),
    ("yaml", "YAML"),
    ("toml", "TOML"),
];

/// Languages never reported as the primary language of a repository.
pub const DATA_LANGUAGES: &[&str] = &["Markdown", "JSON", "YAML", "TOML", "HTML", "CSS", "SCSS"];

/// Directory names left out of the structure summary.
pub const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "target",
    "vendor",
    "__pycache__",
    ".venv",
    "venv",
    ".next",
    "coverage",
];

#[derive(Debug, Clone, Copy)]
pub enum PathPattern {
    /// Full path from the repository root, compared case-insensitively.
    Exact(&'static str),
    /// Path prefix, compared case-insensitively.
    Prefix(&'static str),
}

impl PathPattern {
    pub fn matches(&self, path: &str) -> bool {
        match *self {
            Self::Exact(exact) => path.eq_ignore_ascii_case(exact),
            Self::Prefix(prefix) => path
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix) && path.len() > prefix.len()),
        }
    }
}

use PathPattern::{Exact, Prefix};

/// Files worth reading, with their importance.
pub const KEY_FILES: &[(PathPattern, Importance)] = &[
    // Manifests
    (Exact("package.json"), Importance::High),
    (Exact("Cargo.toml"), Importance::High),
    (Exact("go.mod"), Importance::High),
    (Exact("pyproject.toml"), Importance::High),
    (Exact("requirements.txt"), Importance::High),
    (Exact("setup.py"), Importance::High),
    (Exact("Pipfile"), Importance::High),
    (Exact("Gemfile"), Importance::High),
    (Exact("composer.json"), Importance::High),
    (Exact("pom.xml"), Importance::High),
    (Exact("build.gradle"), Importance::High),
    (Exact("build.gradle.kts"), Importance::High),
    (Exact("mix.exs"), Importance::High),
    (Exact("CMakeLists.txt"), Importance::High),
    (Exact("Makefile"), Importance::High),
    (Exact("deno.json"), Importance::High),
    // Readme and license
    (Exact("README.md"), Importance::High),
    (Exact("README.rst"), Importance::High),
    (Exact("README"), Importance::High),
    (Exact("LICENSE"), Importance::High),
    (Exact("LICENSE.md"), Importance::High),
    (Exact("LICENSE.txt"), Importance::High),
    (Exact("COPYING"), Importance::High),
    // Containers
    (Exact("Dockerfile"), Importance::High),
    (Exact("docker-compose.yml"), Importance::Medium),
    (Exact("docker-compose.yaml"), Importance::Medium),
    (Exact("compose.yml"), Importance::Medium),
    (Exact("compose.yaml"), Importance::Medium),
    // Project docs
    (Exact("CONTRIBUTING.md"), Importance::Medium),
    (Exact("CHANGELOG.md"), Importance::Medium),
    (Exact("HISTORY.md"), Importance::Medium),
    (Exact("docs/README.md"), Importance::Low),
    (Exact("docs/index.md"), Importance::Low),
    (Exact("mkdocs.yml"), Importance::Low),
    // CI
    (Prefix(".github/workflows/"), Importance::Low),
    (Exact(".circleci/config.yml"), Importance::Low),
    (Exact(".gitlab-ci.yml"), Importance::Low),
    (Exact(".travis.yml"), Importance::Low),
    (Exact("Jenkinsfile"), Importance::Low),
    (Exact("azure-pipelines.yml"), Importance::Low),
    // Test and build configuration
    (Exact("jest.config.js"), Importance::Low),
    (Exact("jest.config.ts"), Importance::Low),
    (Exact("vitest.config.ts"), Importance::Low),
    (Exact("vitest.config.js"), Importance::Low),
    (Exact("pytest.ini"), Importance::Low),
    (Exact("conftest.py"), Importance::Low),
    (Exact("cypress.config.ts"), Importance::Low),
    (Exact("playwright.config.ts"), Importance::Low),
    (Exact("tsconfig.json"), Importance::Low),
    (Exact("vite.config.ts"), Importance::Low),
    (Exact("vite.config.js"), Importance::Low),
    (Exact("webpack.config.js"), Importance::Low),
    (Exact("rollup.config.js"), Importance::Low),
    (Exact("next.config.js"), Importance::Low),
    (Exact("next.config.mjs"), Importance::Low),
    (Exact("nuxt.config.ts"), Importance::Low),
    (Exact("angular.json"), Importance::Low),
    (Exact("svelte.config.js"), Importance::Low),
    // Entrypoints
    (Exact("src/main.rs"), Importance::Low),
    (Exact("src/lib.rs"), Importance::Low),
    (Exact("main.go"), Importance::Low),
    (Exact("main.py"), Importance::Low),
    (Exact("app.py"), Importance::Low),
    (Exact("manage.py"), Importance::Low),
    (Exact("index.js"), Importance::Low),
    (Exact("src/index.js"), Importance::Low),
    (Exact("src/index.ts"), Importance::Low),
    (Exact("src/main.ts"), Importance::Low),
    (Exact("src/App.tsx"), Importance::Low),
];

/// Lowercase substrings of key-file paths that indicate each signal.
pub const TEST_MARKERS: &[&str] = &["test", "spec", "__tests__", "conftest.py"];
pub const DOCS_MARKERS: &[&str] = &["docs/", "mkdocs.yml"];
pub const DOCKER_MARKERS: &[&str] =
    &["dockerfile", "docker-compose", "compose.yml", "compose.yaml"];
pub const CI_MARKERS: &[&str] = &[
    ".github/workflows/",
    ".circleci/",
    ".gitlab-ci.yml",
    ".travis.yml",
    "jenkinsfile",
    "azure-pipelines",
];
pub const LICENSE_MARKERS: &[&str] = &["license", "copying"];
pub const CONTRIBUTING_MARKERS: &[&str] = &["contributing"];
pub const CHANGELOG_MARKERS: &[&str] = &["changelog", "history.md"];

/// Manifest dependency name to framework, highest priority first.
pub const FRAMEWORK_DEPENDENCIES: &[(&str, &str)] = &[
    ("next", "Next.js"),
    ("nuxt", "Nuxt"),
    ("@remix-run/react", "Remix"),
    ("gatsby", "Gatsby"),
    ("@sveltejs/kit", "SvelteKit"),
    ("@angular/core", "Angular"),
    ("@nestjs/core", "NestJS"),
    ("electron", "Electron"),
    ("react", "React"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("express", "Express"),
    ("fastify", "Fastify"),
    ("koa", "Koa"),
];

/// Config file to framework, used when the manifest gives no answer.
pub const FRAMEWORK_FILES: &[(&str, &str)] = &[
    ("next.config.js", "Next.js"),
    ("next.config.mjs", "Next.js"),
    ("nuxt.config.ts", "Nuxt"),
    ("angular.json", "Angular"),
    ("svelte.config.js", "Svelte"),
    ("manage.py", "Django"),
];

pub const BUILD_TOOL_DEPENDENCIES: &[(&str, &str)] = &[
    ("vite", "Vite"),
    ("webpack", "Webpack"),
    ("rollup", "Rollup"),
    ("esbuild", "esbuild"),
    ("parcel", "Parcel"),
    ("turbo", "Turborepo"),
];

pub const BUILD_TOOL_FILES: &[(&str, &str)] = &[
    ("Cargo.toml", "Cargo"),
    ("go.mod", "Go"),
    ("pom.xml", "Maven"),
    ("build.gradle", "Gradle"),
    ("build.gradle.kts", "Gradle"),
    ("CMakeLists.txt", "CMake"),
    ("vite.config.ts", "Vite"),
    ("vite.config.js", "Vite"),
    ("webpack.config.js", "Webpack"),
    ("rollup.config.js", "Rollup"),
    ("pyproject.toml", "pip"),
    ("setup.py", "pip"),
    ("requirements.txt", "pip"),
    ("Gemfile", "Bundler"),
    ("composer.json", "Composer"),
    ("mix.exs", "Mix"),
    ("Makefile", "Make"),
    ("package.json", "npm"),
];

pub const TEST_FRAMEWORK_DEPENDENCIES: &[(&str, &str)] = &[
    ("vitest", "Vitest"),
    ("jest", "Jest"),
    ("mocha", "Mocha"),
    ("jasmine", "Jasmine"),
    ("ava", "AVA"),
    ("@playwright/test", "Playwright"),
    ("cypress", "Cypress"),
    ("karma", "Karma"),
];

pub const TEST_FRAMEWORK_FILES: &[(&str, &str)] = &[
    ("vitest.config.ts", "Vitest"),
    ("vitest.config.js", "Vitest"),
    ("jest.config.js", "Jest"),
    ("jest.config.ts", "Jest"),
    ("pytest.ini", "pytest"),
    ("conftest.py", "pytest"),
    ("cypress.config.ts", "Cypress"),
    ("playwright.config.ts", "Playwright"),
    ("Cargo.toml", "cargo test"),
    ("go.mod", "go test"),
];

/// Root lockfile to package manager.
pub const LOCKFILES: &[(&str, &str)] = &[
    ("pnpm-lock.yaml", "pnpm"),
    ("yarn.lock", "yarn"),
    ("bun.lockb", "bun"),
    ("bun.lock", "bun"),
    ("package-lock.json", "npm"),
    ("Cargo.lock", "cargo"),
    ("poetry.lock", "poetry"),
    ("Pipfile.lock", "pipenv"),
    ("uv.lock", "uv"),
    ("Gemfile.lock", "bundler"),
    ("composer.lock", "composer"),
    ("go.sum", "go"),
];
