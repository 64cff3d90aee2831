// AICoder: Tester Agent
// Static analysis of the generated code: quality metrics, security and
// performance pattern scans, and deployment readiness. Recommendations come
// from the LLM with a deterministic fallback list.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::AgentNode;
use crate::llm::LlmGateway;
use crate::state::{AgentName, WorkflowState};

static PY_FUNCTIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r"def\s+\w+").unwrap());
static JS_FUNCTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"function\s+\w+|const\s+\w+\s*=|let\s+\w+\s*=").unwrap());
static BRANCHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bif\b|\bwhile\b|\bfor\b|\band\b|\bor\b").unwrap());
static CAMEL_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z][a-z]+[A-Z]").unwrap());
static SNAKE_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+_[a-z]+").unwrap());

static SECURITY_PATTERNS: Lazy<Vec<(&'static str, &'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("sql_injection", "high", Regex::new(r#"(?i)execute\s*\(\s*["'].*\+\s*\w+"#).unwrap()),
        ("sql_injection", "high", Regex::new(r#"(?i)query\s*\(\s*["'].*\+\s*\w+"#).unwrap()),
        ("xss", "medium", Regex::new(r"(?i)innerHTML\s*=").unwrap()),
        ("xss", "medium", Regex::new(r"(?i)document\.write\s*\(").unwrap()),
        ("hardcoded_secrets", "medium", Regex::new(r#"(?i)password\s*=\s*["'][^"']+["']"#).unwrap()),
        ("hardcoded_secrets", "medium", Regex::new(r#"(?i)api_key\s*=\s*["'][^"']+["']"#).unwrap()),
        ("unsafe_eval", "high", Regex::new(r"(?i)eval\s*\(").unwrap()),
        ("unsafe_eval", "high", Regex::new(r"(?i)exec\s*\(").unwrap()),
    ]
});

static PERFORMANCE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("nested_loops", Regex::new(r"(?i)for\s*\([^)]+\)\s*\{[^}]*for\s*\([^)]+\)").unwrap()),
        ("inefficient_queries", Regex::new(r"(?i)SELECT\s*\*\s*FROM").unwrap()),
        ("memory_leaks", Regex::new(r"(?i)setInterval\s*\(").unwrap()),
        ("memory_leaks", Regex::new(r"(?i)addEventListener\s*\(").unwrap()),
    ]
});

/// Language guessed from code patterns; drives which heuristics apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Java,
}

pub fn detect_language(code: &str) -> Language {
    if code.contains("def ") || code.contains("import ") && !code.contains("from '") {
        if code.contains("function ") || code.contains("const ") {
            classify_js(code)
        } else {
            Language::Python
        }
    } else if code.contains("function ") || code.contains("const ") || code.contains("let ") {
        classify_js(code)
    } else if code.contains("public class") || code.contains("private ") {
        Language::Java
    } else {
        Language::Python
    }
}

fn classify_js(code: &str) -> Language {
    if code.contains("interface ") || code.contains("type ") || code.contains(": React.") {
        Language::Typescript
    } else {
        Language::Javascript
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total_lines: usize,
    pub non_empty_lines: usize,
    pub comment_ratio: f64,
    pub function_count: usize,
    pub complexity: usize,
    pub naming_conventions: bool,
    pub documentation: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityAnalysis {
    pub metrics: QualityMetrics,
    pub score: f64,
    pub is_acceptable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityIssue {
    pub kind: String,
    pub severity: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityAnalysis {
    pub issues: Vec<SecurityIssue>,
    pub is_secure: bool,
    pub risk_level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    pub issues: Vec<String>,
    pub is_performant: bool,
    pub optimization_needed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentCheck {
    pub has_main_entry: bool,
    pub has_error_handling: bool,
    pub has_logging: bool,
    pub has_configuration: bool,
    pub meets_requirements: bool,
    pub readiness_score: f64,
    pub is_ready: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestResults {
    pub language: Option<Language>,
    pub code_quality: QualityAnalysis,
    pub security_analysis: SecurityAnalysis,
    pub performance_check: PerformanceAnalysis,
    pub deployment_check: DeploymentCheck,
    pub overall_status: String,
    pub score: f64,
}

pub fn analyze_code_quality(code: &str, language: Language) -> QualityAnalysis {
    let lines: Vec<&str> = code.split('\n').collect();
    let non_empty = lines.iter().filter(|l| !l.trim().is_empty()).count();

    let comment_lines = lines
        .iter()
        .filter(|l| {
            let t = l.trim();
            t.starts_with('#') || t.starts_with("//") || t.starts_with("/*")
        })
        .count();
    let comment_ratio = if lines.is_empty() {
        0.0
    } else {
        comment_lines as f64 / lines.len() as f64
    };

    let function_count = match language {
        Language::Python => PY_FUNCTIONS.find_iter(code).count(),
        Language::Javascript | Language::Typescript => JS_FUNCTIONS.find_iter(code).count(),
        Language::Java => 0,
    };

    let complexity = 1 + BRANCHES.find_iter(code).count();

    let naming_conventions = match language {
        Language::Python => !CAMEL_CASE.is_match(code),
        Language::Javascript | Language::Typescript => !SNAKE_CASE.is_match(code),
        Language::Java => true,
    };

    let documentation = match language {
        Language::Python => code.contains("\"\"\"") || code.contains("'''"),
        _ => code.contains("//") || code.contains("/*"),
    };

    let metrics = QualityMetrics {
        total_lines: lines.len(),
        non_empty_lines: non_empty,
        comment_ratio,
        function_count,
        complexity,
        naming_conventions,
        documentation,
    };

    let score = quality_score(&metrics);
    QualityAnalysis {
        metrics,
        score,
        is_acceptable: score >= 0.7,
    }
}

fn quality_score(metrics: &QualityMetrics) -> f64 {
    let mut scores = Vec::new();

    scores.push(if (0.1..=0.3).contains(&metrics.comment_ratio) {
        1.0
    } else if metrics.comment_ratio > 0.0 {
        0.5
    } else {
        0.0
    });
    scores.push(if metrics.function_count > 0 { 1.0 } else { 0.0 });
    scores.push(if metrics.complexity < 10 {
        1.0
    } else if metrics.complexity < 20 {
        0.5
    } else {
        0.0
    });
    scores.push(if metrics.naming_conventions { 1.0 } else { 0.0 });
    scores.push(if metrics.documentation { 1.0 } else { 0.0 });

    scores.iter().sum::<f64>() / scores.len() as f64
}

pub fn analyze_security(code: &str) -> SecurityAnalysis {
    let mut issues = Vec::new();
    for (kind, severity, pattern) in SECURITY_PATTERNS.iter() {
        if pattern.is_match(code) {
            issues.push(SecurityIssue {
                kind: kind.to_string(),
                severity: severity.to_string(),
            });
        }
    }

    let risk_level = if issues.iter().any(|i| i.severity == "high") {
        "high"
    } else {
        "low"
    };

    SecurityAnalysis {
        is_secure: issues.is_empty(),
        risk_level: risk_level.to_string(),
        issues,
    }
}

pub fn check_performance(code: &str) -> PerformanceAnalysis {
    let issues: Vec<String> = PERFORMANCE_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(code))
        .map(|(kind, _)| kind.to_string())
        .collect();

    PerformanceAnalysis {
        is_performant: issues.is_empty(),
        optimization_needed: issues.len() > 2,
        issues,
    }
}

pub fn check_deployment_readiness(
    code: &str,
    language: Language,
    requirements: &str,
) -> DeploymentCheck {
    let lower = code.to_lowercase();

    let has_main_entry = match language {
        Language::Python => lower.contains("__main__"),
        _ => lower.contains("function main") || lower.contains("const main") || lower.contains("export default"),
    };
    let has_error_handling = match language {
        Language::Python => code.contains("try:") || code.contains("except") || code.contains("raise "),
        _ => code.contains("try {") || code.contains("catch") || code.contains("throw "),
    };
    let has_logging = match language {
        Language::Python => code.contains("logging.") || code.contains("print("),
        _ => code.contains("console.") || code.contains("logger."),
    };
    let has_configuration = lower.contains("config")
        || lower.contains("settings")
        || lower.contains("env");

    // Keyword overlap as a coarse compliance signal
    let req_words: std::collections::HashSet<String> = requirements
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();
    let code_words: std::collections::HashSet<String> = lower
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();
    let meets_requirements = req_words.intersection(&code_words).next().is_some();

    let checks = [
        has_main_entry,
        has_error_handling,
        has_logging,
        has_configuration,
        meets_requirements,
    ];
    let passed = checks.iter().filter(|c| **c).count();
    let readiness_score = passed as f64 / checks.len() as f64;

    DeploymentCheck {
        has_main_entry,
        has_error_handling,
        has_logging,
        has_configuration,
        meets_requirements,
        readiness_score,
        is_ready: passed as f64 >= checks.len() as f64 * 0.8,
    }
}

/// Weighted aggregate of the individual analyses.
pub fn run_comprehensive_tests(code: &str, requirements: &str) -> TestResults {
    let language = detect_language(code);

    let code_quality = analyze_code_quality(code, language);
    let security_analysis = analyze_security(code);
    let performance_check = check_performance(code);
    let deployment_check = check_deployment_readiness(code, language, requirements);

    let scores = [
        1.0, // the code reached this point syntactically intact
        code_quality.score,
        if security_analysis.is_secure { 1.0 } else { 0.5 },
        if performance_check.is_performant { 1.0 } else { 0.7 },
        deployment_check.readiness_score,
    ];
    let weights = [0.3, 0.2, 0.25, 0.15, 0.1];
    let score: f64 = scores.iter().zip(weights).map(|(s, w)| s * w).sum();

    let overall_status = if score >= 0.8 {
        "pass"
    } else if score >= 0.6 {
        "warn"
    } else {
        "fail"
    };

    TestResults {
        language: Some(language),
        code_quality,
        security_analysis,
        performance_check,
        deployment_check,
        overall_status: overall_status.to_string(),
        score,
    }
}

/// Parse an LLM recommendation response into list items; strips list prefixes
/// and drops fragments too short to be meaningful.
pub fn parse_recommendations(response: &str) -> Vec<String> {
    let prefixes = ["- ", "* ", "1. ", "2. ", "3. ", "4. ", "5. ", "\u{2022} "];
    response
        .lines()
        .filter_map(|line| {
            let mut line = line.trim();
            for prefix in prefixes {
                if let Some(rest) = line.strip_prefix(prefix) {
                    line = rest;
                    break;
                }
            }
            if line.len() > 10 {
                Some(line.to_string())
            } else {
                None
            }
        })
        .take(5)
        .collect()
}

/// Deterministic recommendations used when the LLM response yields none.
pub fn fallback_recommendations(results: &TestResults) -> Vec<String> {
    let mut recs = Vec::new();
    if results.code_quality.score < 0.7 {
        recs.push("Improve code quality and documentation".to_string());
    }
    if !results.security_analysis.is_secure {
        recs.push("Address security vulnerabilities".to_string());
    }
    if results.performance_check.optimization_needed {
        recs.push("Optimize code for better performance".to_string());
    }
    if results.deployment_check.readiness_score < 0.8 {
        recs.push("Add missing deployment requirements".to_string());
    }
    recs
}

pub struct Tester;

#[async_trait]
impl AgentNode for Tester {
    fn name(&self) -> AgentName {
        AgentName::Tester
    }

    async fn run(&self, state: WorkflowState, gateway: &LlmGateway) -> WorkflowState {
        let mut state = state;

        let code = state.generated_code.clone().unwrap_or_default();
        let results = run_comprehensive_tests(&code, &state.requirements);

        log::info!(
            "Tester summary: status={} score={:.2} quality={:.2} deployment_ready={}",
            results.overall_status,
            results.score,
            results.code_quality.score,
            results.overall_status == "pass"
        );

        let prompt = format!(
            "Based on the following test results, provide specific, actionable recommendations for improving the code:\n\n\
             Test Results Summary:\n\
             - Overall Status: {}\n\
             - Overall Score: {:.2}\n\
             - Code Quality Score: {:.2}\n\
             - Security Analysis: {}\n\
             - Performance Check: {}\n\
             - Deployment Readiness: {:.2}\n\n\
             Requirements: {}\n\n\
             Please provide 3-5 specific, actionable recommendations to improve the code quality, security, and deployment readiness. Focus on the most critical issues first.",
            results.overall_status,
            results.score,
            results.code_quality.score,
            if results.security_analysis.is_secure { "SECURE" } else { "INSECURE" },
            if results.performance_check.is_performant { "PASS" } else { "FAIL" },
            results.deployment_check.readiness_score,
            state.requirements
        );

        let response = gateway.generate_for_agent("tester", &prompt).await;
        let mut recommendations = if LlmGateway::is_sentinel(&response) {
            Vec::new()
        } else {
            parse_recommendations(&response)
        };
        if recommendations.is_empty() {
            recommendations = fallback_recommendations(&results);
        }

        let deployment_ready = results.overall_status == "pass";
        let result = serde_json::json!({
            "test_results": results,
            "test_recommendations": recommendations,
            "deployment_ready": deployment_ready,
        });
        state.record_agent_result(AgentName::Tester, "completed", result);

        log::info!("Testing completed successfully");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_typescript_from_react_code() {
        let code = "export default function Home({ items }: { items: string[] }) {\n  return <main />\n}\ninterface Props {}";
        assert_eq!(detect_language(code), Language::Typescript);
    }

    #[test]
    fn eval_is_flagged_as_high_risk() {
        let analysis = analyze_security("const out = eval(userInput)");
        assert!(!analysis.is_secure);
        assert_eq!(analysis.risk_level, "high");
    }

    #[test]
    fn clean_code_is_secure_and_performant() {
        let code = "// landing page\nexport default function Home() {\n  return <main>hi</main>\n}";
        assert!(analyze_security(code).is_secure);
        assert!(check_performance(code).is_performant);
    }

    #[test]
    fn recommendations_parse_and_cap_at_five() {
        let response = "- Fix the missing alt attributes on images\n* Add error boundaries around data fetching\n1. Tighten TypeScript types across components\nshort\n2. Add integration tests for the checkout flow\n3. Remove the hardcoded API key from the client\n4. Split the page into smaller components";
        let recs = parse_recommendations(response);
        assert_eq!(recs.len(), 5);
        assert_eq!(recs[0], "Fix the missing alt attributes on images");
    }

    #[tokio::test]
    async fn tester_completes_even_when_llm_is_down() {
        let mut config = crate::llm::LlmConfig::openai();
        config.api_key = None;
        let gateway = LlmGateway::new(config, vec![]);

        let mut state = WorkflowState::new("build a landing page");
        state.generated_code =
            Some("// home\nexport default function Home() {\n  return <main />\n}".to_string());

        let out = Tester.run(state, &gateway).await;
        // Heuristic analysis works offline; only recommendations fall back.
        assert_eq!(out.agent_status(AgentName::Tester), Some("completed"));
        let result = &out.agent_results["tester"];
        assert!(result.get("deployment_ready").is_some());
    }
}
