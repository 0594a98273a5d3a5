//! Rivulet Style Consistency Enforcement
//!
//! Walks every workspace crate and fails on structural style violations.
//! Test modules are exempt from the size limit; they grow with coverage.

use std::fs;
use std::path::{Path, PathBuf};

/// Maximum non-test lines per module.
const MAX_MODULE_LINES: usize = 500;

/// Catch-all module names hide what the code is about.
const BANNED_MODULE_NAMES: &[&str] = &[
    "utils", "util", "helpers", "helper", "common", "shared", "misc", "tools",
];

const WORKSPACE_CRATES: &[&str] = &["rivulet-core", "rivulet-web", "rivulet-sim", "rivulet-cli"];

#[derive(Debug, Clone)]
struct StyleViolation {
    file: String,
    line: usize,
    rule: &'static str,
    message: String,
}

struct StyleChecker {
    violations: Vec<StyleViolation>,
    current_file: PathBuf,
    file_lines: Vec<String>,
}

impl StyleChecker {
    fn new() -> Self {
        Self {
            violations: Vec::new(),
            current_file: PathBuf::new(),
            file_lines: Vec::new(),
        }
    }

    fn check_file(&mut self, file_path: PathBuf) -> Result<(), std::io::Error> {
        let content = fs::read_to_string(&file_path)?;
        self.current_file = file_path;
        self.file_lines = content.lines().map(str::to_string).collect();

        self.check_module_size();
        self.check_banned_module_names();
        self.check_emoji_usage();
        self.check_error_documentation();
        Ok(())
    }

    fn add_violation(&mut self, line: usize, rule: &'static str, message: String) {
        self.violations.push(StyleViolation {
            file: self.current_file.display().to_string(),
            line,
            rule,
            message,
        });
    }

    /// Lines before the first `#[cfg(test)]`.
    fn production_lines(&self) -> usize {
        self.file_lines
            .iter()
            .position(|line| line.trim() == "#[cfg(test)]")
            .unwrap_or(self.file_lines.len())
    }

    fn check_module_size(&mut self) {
        let line_count = self.production_lines();
        if line_count > MAX_MODULE_LINES {
            self.add_violation(
                1,
                "MODULE_SIZE_LIMIT",
                format!("Module has {line_count} non-test lines, limit is {MAX_MODULE_LINES}"),
            );
        }
    }

    fn check_banned_module_names(&mut self) {
        let Some(name) = self.current_file.file_stem().and_then(|s| s.to_str()) else {
            return;
        };
        if BANNED_MODULE_NAMES.contains(&name) {
            let message = format!("Module '{name}' uses banned name - use a domain-specific name");
            self.add_violation(1, "BANNED_MODULE_NAME", message);
        }
    }

    fn check_emoji_usage(&mut self) {
        let lines: Vec<usize> = self
            .file_lines
            .iter()
            .enumerate()
            .filter(|(_, line)| {
                line.chars().any(|ch| {
                    matches!(ch as u32, 0x1F600..=0x1F64F | 0x1F910..=0x1F9FF | 0x1F1E6..=0x1F1FF)
                })
            })
            .map(|(index, _)| index + 1)
            .collect();
        for line in lines {
            self.add_violation(line, "NO_EMOJIS", "Emoji are forbidden".to_string());
        }
    }

    /// Public functions whose signature line returns `Result` need `# Errors`.
    fn check_error_documentation(&mut self) {
        let mut doc_lines: Vec<&str> = Vec::new();
        let mut missing = Vec::new();

        for (index, line) in self.file_lines.iter().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("///") {
                doc_lines.push(trimmed);
                continue;
            }
            if trimmed.starts_with("#[") {
                continue;
            }
            let is_public_fn = trimmed.starts_with("pub fn ") || trimmed.starts_with("pub async fn ");
            if is_public_fn && returns_result(trimmed) && !doc_lines.iter().any(|d| d.contains("# Errors")) {
                missing.push((index + 1, function_name(trimmed)));
            }
            doc_lines.clear();
        }

        for (line, name) in missing {
            self.add_violation(
                line,
                "MISSING_ERRORS_DOC",
                format!("Public function '{name}' returning Result missing '# Errors' documentation"),
            );
        }
    }
}

fn returns_result(signature: &str) -> bool {
    signature.split_once("->").is_some_and(|(_, output)| {
        let output = output.trim_start();
        output.starts_with("Result<")
            || output.starts_with("anyhow::Result<")
            || output.starts_with("crate::Result<")
    })
}

fn function_name(signature: &str) -> String {
    signature
        .split("fn ")
        .nth(1)
        .and_then(|rest| rest.split(['(', '<']).next())
        .unwrap_or_default()
        .to_string()
}

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

fn collect_workspace_files() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files = Vec::new();
    for crate_name in WORKSPACE_CRATES {
        for dir in ["src", "tests"] {
            collect_rust_files_in_dir(&root.join(crate_name).join(dir), &mut files);
        }
    }
    files.sort();
    files
}

fn collect_rust_files_in_dir(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files_in_dir(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
}

#[test]
fn enforce_rivulet_style_consistency() {
    let files = collect_workspace_files();
    assert!(!files.is_empty(), "no workspace sources found");

    let mut checker = StyleChecker::new();
    for file_path in files {
        if let Err(e) = checker.check_file(file_path.clone()) {
            eprintln!("Failed to check {}: {e}", file_path.display());
        }
    }

    for violation in &checker.violations {
        println!(
            "CRITICAL [{}] {}:{} - {}",
            violation.rule, violation.file, violation.line, violation.message
        );
    }
    assert!(
        checker.violations.is_empty(),
        "Found {} style violations that must be fixed",
        checker.violations.len()
    );
}

#[test]
fn test_returns_result_ignores_nested_results() {
    assert!(returns_result("pub fn open(id: &str) -> Result<Self, Error> {"));
    assert!(returns_result("pub async fn run() -> anyhow::Result<()> {"));
    assert!(!returns_result(
        "pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, E>> {"
    ));
    assert_eq!(function_name("pub async fn run_server<T>(x: T)"), "run_server");
}
