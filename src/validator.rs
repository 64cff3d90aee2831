// AICoder: Generated-Code Validator
// Static checks over the parsed file map. Errors flip validity; warnings and
// suggestions are advisory. No external tooling is invoked here.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::OutputFormat;
use crate::repair::FileRole;

static TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());
static SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'[^']*'").unwrap());
static DOUBLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""[^"]*""#).unwrap());

/// Validation outcome for one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Aggregate validation outcome for a parsed response. Built once per
/// validation run and never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub overall_valid: bool,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub missing_files: Vec<String>,
    pub file_validations: BTreeMap<String, FileValidation>,
}

/// Validate every file and aggregate. `overall_valid` is the AND of per-file
/// validity, and false whenever a required file is missing.
pub fn validate(files: &BTreeMap<String, String>, format: OutputFormat) -> ValidationReport {
    let mut report = ValidationReport {
        overall_valid: true,
        ..Default::default()
    };

    for required in format.required_files() {
        if !files.contains_key(*required) {
            report.missing_files.push(required.to_string());
            report.overall_valid = false;
            report.total_errors += 1;
        }
    }

    for (filename, content) in files {
        let validation = validate_file(filename, content);
        report.total_errors += validation.errors.len();
        report.total_warnings += validation.warnings.len();
        report.overall_valid &= validation.is_valid;
        report.file_validations.insert(filename.clone(), validation);
    }

    if report.overall_valid {
        log::info!("Validation passed for {} file(s)", files.len());
    } else {
        log::warn!(
            "Validation failed: {} error(s), {} warning(s), missing: {:?}",
            report.total_errors,
            report.total_warnings,
            report.missing_files
        );
    }

    report
}

/// Run the per-file check battery.
pub fn validate_file(filename: &str, content: &str) -> FileValidation {
    let mut v = FileValidation {
        is_valid: true,
        ..Default::default()
    };

    if content.trim().is_empty() {
        v.errors.push(format!("File {} is empty", filename));
        v.is_valid = false;
        return v;
    }

    let role = FileRole::from_filename(filename);
    if filename.ends_with(".tsx") {
        check_tsx(filename, content, role, &mut v);
    }

    v
}

fn check_tsx(filename: &str, content: &str, role: FileRole, v: &mut FileValidation) {
    let is_client = content.contains("\"use client\"");

    if !content.contains("export default") {
        v.errors
            .push(format!("Missing default export in {}", filename));
    }

    if content.contains("class ") && content.contains("extends Component") && !is_client {
        v.errors.push(format!(
            "Class component missing 'use client' directive in {}",
            filename
        ));
    }

    if content.contains("@/") {
        v.errors.push(format!(
            "Using @/ alias instead of relative paths in {}",
            filename
        ));
    }

    if role == FileRole::RootLayout {
        if is_client {
            v.errors
                .push("layout.tsx cannot use 'use client' - must be server component".to_string());
        }
        if !content.contains("export const metadata") {
            v.errors
                .push("layout.tsx must export metadata".to_string());
        }
    }

    if is_client && content.contains("export const metadata") {
        v.errors.push(format!(
            "Client component {} cannot export metadata",
            filename
        ));
    }

    // Advisory checks

    if TRAILING_WS.is_match(content) {
        v.warnings
            .push(format!("Trailing whitespace found in {}", filename));
    }

    if content.contains("<img") && !content.contains("alt=") {
        v.warnings.push(format!(
            "Missing alt attribute for images in {}",
            filename
        ));
    }

    if content.contains(".map(") && !content.contains("key=") {
        v.warnings.push(format!(
            "Missing key prop in map function in {}",
            filename
        ));
    }

    if content.contains("class=") && !content.contains("className=") {
        v.warnings
            .push(format!("Use className instead of class in {}", filename));
    }

    if content.to_lowercase().contains("onclick=") {
        v.warnings
            .push(format!("Use onClick instead of onclick in {}", filename));
    }

    if !content.contains("return (") && !content.contains("return <") {
        v.suggestions
            .push(format!("Component may not return JSX in {}", filename));
    }

    let singles = SINGLE_QUOTED.find_iter(content).count();
    let doubles = DOUBLE_QUOTED.find_iter(content).count();
    if doubles > singles {
        v.suggestions.push(format!(
            "Consider using single quotes consistently in {}",
            filename
        ));
    }

    if content.contains("React") && !content.contains("import React") {
        v.suggestions
            .push(format!("Consider explicit React import in {}", filename));
    }

    v.is_valid = v.errors.is_empty();
}
