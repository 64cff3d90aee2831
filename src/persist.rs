// AICoder: File Persistence & External Build
// Writes a parsed file map to disk via a staging directory, then runs the
// project's build and feeds failures back into the repair engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::agents::toolbox;
use crate::config::AppConfig;
use crate::repair::RepairEngine;

static MODULE_NOT_FOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Can't resolve '\./components/([^']+)'").unwrap());
static FN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"function\s+(\w+)").unwrap());

/// Outcome of an external build run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildResult {
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub raw_output: String,
}

/// Write every file into a staging directory first, then move the set into the
/// project directory. A failure while staging leaves the target untouched.
/// The caller resolves `project_dir` once per run (for timestamped project
/// directories, resolving it per call would scatter files).
/// Returns filename -> final absolute path.
pub fn save_files(
    files: &BTreeMap<String, String>,
    project_dir: &Path,
) -> anyhow::Result<BTreeMap<String, PathBuf>> {
    let staging = tempfile::TempDir::new()?;
    for (filename, content) in files {
        let relative = toolbox::validate_relative_path(filename)?;
        let staged = staging.path().join(&relative);
        if let Some(parent) = staged.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&staged, content)?;
    }

    // Everything staged successfully; move into place.
    std::fs::create_dir_all(project_dir)?;
    let mut saved = BTreeMap::new();
    for filename in files.keys() {
        let relative = toolbox::validate_relative_path(filename)?;
        let staged = staging.path().join(&relative);
        let target = project_dir.join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Rename fails across filesystems; fall back to copy.
        if std::fs::rename(&staged, &target).is_err() {
            std::fs::copy(&staged, &target)?;
        }
        log::info!("Saved {}", target.display());
        saved.insert(filename.clone(), target);
    }

    log::info!(
        "Project files saved to {}",
        project_dir.display()
    );
    Ok(saved)
}

/// Runs the web project's build (`npm run build`) and classifies its output.
pub struct BuildRunner {
    timeout: Duration,
}

impl BuildRunner {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.build_timeout_secs),
        }
    }

    /// Run `npm run build` in `project_dir`. Timeouts and a missing npm are
    /// reported as build errors, never as panics or propagated failures.
    pub async fn build(&self, project_dir: &Path) -> BuildResult {
        let mut result = BuildResult::default();

        log::info!("Compiling website in {}", project_dir.display());

        let command = tokio::process::Command::new("npm")
            .arg("run")
            .arg("build")
            .current_dir(project_dir)
            .output();

        let output = match tokio::time::timeout(self.timeout, command).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                result
                    .errors
                    .push("npm not found - Node.js not installed".to_string());
                log::error!("npm not found - Node.js not installed");
                return result;
            }
            Ok(Err(e)) => {
                result.errors.push(format!("Compilation error: {}", e));
                log::error!("Website compilation error: {}", e);
                return result;
            }
            Err(_) => {
                result.errors.push(format!(
                    "Build timed out after {} seconds",
                    self.timeout.as_secs()
                ));
                log::error!("Website compilation timed out");
                return result;
            }
        };

        result.raw_output = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if output.status.success() {
            result.success = true;
            log::info!("Website compiled successfully");
        } else {
            for line in result.raw_output.clone().split('\n') {
                let lower = line.to_lowercase();
                if lower.contains("error") || lower.contains("failed") {
                    result.errors.push(line.trim().to_string());
                } else if lower.contains("warning") {
                    result.warnings.push(line.trim().to_string());
                }
            }
            log::error!(
                "Website compilation failed with {} error(s)",
                result.errors.len()
            );
            for error in result.errors.iter().take(5) {
                log::error!("   - {}", error);
            }
        }

        result
    }
}

/// Apply targeted repairs for known build-error shapes: unresolvable component
/// modules, missing default exports, and missing React imports. The caller may
/// rebuild once afterwards.
pub fn auto_fix_build_errors(
    files: &mut BTreeMap<String, String>,
    errors: &[String],
) {
    log::info!("Attempting to auto-fix compilation errors");

    for error in errors {
        if error.contains("Module not found") && error.contains("Can't resolve") {
            if let Some(caps) = MODULE_NOT_FOUND.captures(error) {
                let component = caps[1].trim_end_matches(".tsx").to_string();
                log::info!("Auto-fixing missing component: {}", component);
                if let Some(page) = files.get("page.tsx") {
                    let fixed = RepairEngine::remove_component_references(page, &component);
                    files.insert("page.tsx".to_string(), fixed);
                }
            }
        } else if error.to_lowercase().contains("export default") {
            for (filename, content) in files.clone() {
                if filename.ends_with(".tsx") && !content.contains("export default") {
                    if let Some(caps) = FN_NAME.captures(&content) {
                        let func = caps[1].to_string();
                        let fixed = content.replace(
                            &format!("function {}", func),
                            &format!("export default function {}", func),
                        );
                        files.insert(filename.clone(), fixed);
                        log::info!("Added export default to {}", filename);
                    }
                }
            }
        } else if error.contains("React") && error.to_lowercase().contains("import") {
            for (filename, content) in files.clone() {
                if filename.ends_with(".tsx") && !content.contains("import React") {
                    files.insert(
                        filename.clone(),
                        format!("import React from 'react'\n{}", content),
                    );
                    log::info!("Added React import to {}", filename);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_land_under_the_app_directory() {
        let out = tempfile::TempDir::new().unwrap();
        let app_dir = out.path().join("src").join("app");
        let mut files = BTreeMap::new();
        files.insert("page.tsx".to_string(), "export default function Home() { return <main /> }".to_string());
        files.insert(
            "components/Header.tsx".to_string(),
            "export default function Header() { return <header /> }".to_string(),
        );

        let saved = save_files(&files, &app_dir).unwrap();

        let page = &saved["page.tsx"];
        assert!(page.ends_with("src/app/page.tsx"));
        assert!(page.exists());
        assert!(saved["components/Header.tsx"].exists());
    }

    #[test]
    fn traversal_paths_leave_the_target_untouched() {
        let out = tempfile::TempDir::new().unwrap();
        let app_dir = out.path().join("src").join("app");
        let mut files = BTreeMap::new();
        files.insert("page.tsx".to_string(), "ok".to_string());
        files.insert("../escape.tsx".to_string(), "nope".to_string());

        assert!(save_files(&files, &app_dir).is_err());
        // The good file was staged but never moved.
        assert!(!app_dir.join("page.tsx").exists());
        assert!(!out.path().parent().unwrap().join("escape.tsx").exists());
    }

    #[test]
    fn missing_module_errors_prune_the_component() {
        let mut files = BTreeMap::new();
        files.insert(
            "page.tsx".to_string(),
            "import Hero from './components/Hero'\n\nexport default function Home() {\n  return <main><Hero /></main>\n}"
                .to_string(),
        );

        let errors = vec![
            "Module not found: Can't resolve './components/Hero' in '/tmp/x'".to_string(),
        ];
        auto_fix_build_errors(&mut files, &errors);

        let page = &files["page.tsx"];
        assert!(!page.contains("Hero"));
        assert!(page.contains("export default function Home"));
    }

    #[test]
    fn export_default_errors_promote_named_functions() {
        let mut files = BTreeMap::new();
        files.insert(
            "components/Card.tsx".to_string(),
            "function Card() { return <div /> }".to_string(),
        );

        auto_fix_build_errors(
            &mut files,
            &["Error: missing export default in components/Card.tsx".to_string()],
        );
        assert!(files["components/Card.tsx"].starts_with("export default function Card()"));
    }
}
