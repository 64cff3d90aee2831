// AICoder: Enhancer Agent
// Analyzes the user's prompt for clarity and completeness, asks the LLM for a
// sharper version, validates the result, and replaces `user_input` only when
// the enhancement scores high enough.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::AgentNode;
use crate::llm::LlmGateway;
use crate::state::{AgentName, WorkflowState};

static VAGUE_REQUESTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["make it better", "improve this", "fix it", "do something"]
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
});
static MISSING_CONTEXT: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"create a ", r"build a ", r"make a "]
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
});
static AMBIGUOUS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["it should work", "make it functional", "add features"]
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
});
static WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptAnalysis {
    pub clarity_score: f64,
    pub completeness_score: f64,
    pub specificity_score: f64,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub detected_intent: String,
    pub required_context: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhancementValidation {
    pub is_improved: bool,
    pub improvement_score: f64,
    pub preserves_intent: bool,
    pub adds_value: bool,
}

/// Score the prompt for clarity, completeness and specificity; detect intent
/// and the context a good prompt would carry.
pub fn analyze_prompt(prompt: &str) -> PromptAnalysis {
    let mut analysis = PromptAnalysis::default();
    let mut clarity: f64 = 0.0;
    let mut completeness: f64 = 0.0;
    let mut specificity: f64 = 0.0;

    if VAGUE_REQUESTS.iter().any(|p| p.is_match(prompt)) {
        analysis.issues.push("Vague request detected".to_string());
        analysis
            .suggestions
            .push("Provide more specific requirements".to_string());
        clarity -= 0.2;
    }
    if MISSING_CONTEXT.iter().any(|p| p.is_match(prompt)) {
        analysis.issues.push("Missing context detected".to_string());
        analysis
            .suggestions
            .push("Specify technology stack, requirements, and constraints".to_string());
        completeness -= 0.2;
    }
    if AMBIGUOUS.iter().any(|p| p.is_match(prompt)) {
        analysis
            .issues
            .push("Ambiguous requirements detected".to_string());
        analysis
            .suggestions
            .push("Define specific functionality and success criteria".to_string());
        specificity -= 0.2;
    }

    analysis.detected_intent = detect_intent(prompt).to_string();
    analysis.required_context = identify_required_context(prompt);

    analysis.clarity_score = (0.5 + clarity).clamp(0.0, 1.0);
    analysis.completeness_score = (0.5 + completeness).clamp(0.0, 1.0);
    analysis.specificity_score = (0.5 + specificity).clamp(0.0, 1.0);
    analysis
}

pub fn detect_intent(prompt: &str) -> &'static str {
    let lower = prompt.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["create", "build", "make", "develop"]) {
        "creation"
    } else if has(&["fix", "debug", "error", "issue"]) {
        "debugging"
    } else if has(&["improve", "enhance", "optimize", "better"]) {
        "improvement"
    } else if has(&["test", "validate", "check"]) {
        "testing"
    } else if has(&["deploy", "release", "publish"]) {
        "deployment"
    } else {
        "general"
    }
}

pub fn identify_required_context(prompt: &str) -> Vec<String> {
    let lower = prompt.to_lowercase();
    let mut required: HashSet<&str> = HashSet::new();

    if lower.contains("create") || lower.contains("build") {
        required.extend(["technology_stack", "requirements", "constraints"]);
    }
    if lower.contains("api") {
        required.extend(["endpoints", "data_format", "authentication"]);
    }
    if lower.contains("database") {
        required.extend(["database_type", "schema", "relationships"]);
    }
    if lower.contains("frontend") || lower.contains("ui") {
        required.extend(["design_preferences", "framework", "responsive"]);
    }
    if lower.contains("test") {
        required.extend(["test_type", "coverage", "framework"]);
    }

    let mut out: Vec<String> = required.into_iter().map(|s| s.to_string()).collect();
    out.sort();
    out
}

/// Compare enhanced against original: does it add content, keep the original
/// keywords, and name the things a good prompt names?
pub fn validate_enhancement(original: &str, enhanced: &str) -> EnhancementValidation {
    let mut validation = EnhancementValidation {
        preserves_intent: true,
        ..Default::default()
    };

    if enhanced.split_whitespace().count() > original.split_whitespace().count() {
        validation.adds_value = true;
        validation.improvement_score += 0.3;
    }

    let original_keywords: HashSet<String> = WORDS
        .find_iter(&original.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect();
    let enhanced_keywords: HashSet<String> = WORDS
        .find_iter(&enhanced.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect();
    let overlap = if original_keywords.is_empty() {
        0.0
    } else {
        original_keywords.intersection(&enhanced_keywords).count() as f64
            / original_keywords.len() as f64
    };
    if overlap > 0.7 {
        validation.improvement_score += 0.4;
    }

    let lower = enhanced.to_lowercase();
    let improvements = ["technology", "requirements", "constraints", "success criteria"]
        .iter()
        .filter(|term| lower.contains(*term))
        .count();
    validation.improvement_score += improvements as f64 * 0.1;

    validation.is_improved = validation.improvement_score > 0.5;
    validation
}

pub fn enhancement_score(analysis: &PromptAnalysis, validation: &EnhancementValidation) -> f64 {
    analysis.clarity_score * 0.3
        + analysis.completeness_score * 0.3
        + analysis.specificity_score * 0.2
        + validation.improvement_score * 0.2
}

/// Deterministic enhancement used when the LLM is unavailable or echoes the
/// original back.
pub fn fallback_enhancement(original: &str, analysis: &PromptAnalysis, context: &str) -> String {
    let mut parts = vec![original.to_string()];
    if !context.is_empty() {
        parts.push(format!("Context: {}", context));
    }
    if !analysis.issues.is_empty() {
        parts.push(format!(
            "Please address: {}",
            analysis.suggestions.join(", ")
        ));
    }
    parts.join("\n\n")
}

/// Suggestions for the next round of user interaction.
pub fn interaction_suggestions(
    score: f64,
    analysis: &PromptAnalysis,
    state: &WorkflowState,
) -> Vec<String> {
    let mut suggestions = Vec::new();

    if score < 0.5 {
        suggestions.push("Consider providing more specific requirements and constraints".to_string());
        suggestions.push("Include technology stack preferences if applicable".to_string());
    }
    for issue in &analysis.issues {
        match issue.as_str() {
            "Vague request detected" => {
                suggestions.push("Be more specific about what you want to achieve".to_string())
            }
            "Missing context detected" => {
                suggestions.push("Provide context about your project and requirements".to_string())
            }
            "Ambiguous requirements detected" => {
                suggestions.push("Define clear success criteria and constraints".to_string())
            }
            _ => {}
        }
    }
    match state.status() {
        crate::state::WorkflowStatus::Planning => {
            suggestions.push("Consider providing project scope and timeline".to_string())
        }
        crate::state::WorkflowStatus::Coding => {
            suggestions.push("Specify coding standards and preferences".to_string())
        }
        crate::state::WorkflowStatus::Testing => {
            suggestions.push("Define testing requirements and coverage expectations".to_string())
        }
        _ => {}
    }

    suggestions
}

pub struct Enhancer;

#[async_trait]
impl AgentNode for Enhancer {
    fn name(&self) -> AgentName {
        AgentName::Enhancer
    }

    async fn run(&self, state: WorkflowState, gateway: &LlmGateway) -> WorkflowState {
        let mut state = state;

        let original = state.user_input.clone();
        let analysis = analyze_prompt(&original);

        let prompt = format!(
            "Original user prompt: {}\n\n\
             Analysis:\n\
             - Clarity score: {:.2}\n\
             - Completeness score: {:.2}\n\
             - Specificity score: {:.2}\n\
             - Detected intent: {}\n\
             - Issues: {}\n\
             - Required context: {}\n\n\
             Available context: {}\n\n\
             Please enhance this prompt by:\n\
             1. Adding missing context and specifications\n\
             2. Clarifying ambiguous requirements\n\
             3. Making the request more specific and actionable\n\
             4. Including relevant technical details\n\
             5. Adding success criteria and constraints\n\n\
             Return only the enhanced prompt without explanations.",
            original,
            analysis.clarity_score,
            analysis.completeness_score,
            analysis.specificity_score,
            analysis.detected_intent,
            analysis.issues.join(", "),
            analysis.required_context.join(", "),
            state.context
        );

        let response = gateway.generate_for_agent("enhancer", &prompt).await;
        let enhanced = if LlmGateway::is_sentinel(&response)
            || response.trim().is_empty()
            || response.trim() == original
        {
            fallback_enhancement(&original, &analysis, &state.context)
        } else {
            response.trim().to_string()
        };

        let validation = validate_enhancement(&original, &enhanced);
        let score = enhancement_score(&analysis, &validation);
        let suggestions = interaction_suggestions(score, &analysis, &state);

        let prompt_enhanced = score > 0.7;
        if prompt_enhanced {
            state.user_input = enhanced.clone();
        }

        let result = serde_json::json!({
            "enhanced_prompt": enhanced,
            "prompt_analysis": analysis,
            "enhancement_validation": validation,
            "enhancement_score": score,
            "interaction_suggestions": suggestions,
            "prompt_enhanced": prompt_enhanced,
        });
        state.record_agent_result(AgentName::Enhancer, "completed", result);

        log::info!("Prompt enhancement completed successfully");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vague_prompts_are_flagged() {
        let analysis = analyze_prompt("fix it and make it better");
        assert!(analysis.issues.contains(&"Vague request detected".to_string()));
        assert!(analysis.clarity_score < 0.5);
        assert_eq!(analysis.detected_intent, "debugging");
    }

    #[test]
    fn creation_prompts_require_stack_context() {
        let analysis = analyze_prompt("build a REST api with a database");
        assert_eq!(analysis.detected_intent, "creation");
        assert!(analysis.required_context.contains(&"technology_stack".to_string()));
        assert!(analysis.required_context.contains(&"endpoints".to_string()));
        assert!(analysis.required_context.contains(&"schema".to_string()));
    }

    #[test]
    fn expansion_with_kept_keywords_scores_as_improved() {
        let original = "build a portfolio site";
        let enhanced = "Build a portfolio site using the following technology stack: Next.js with \
                        Tailwind. Requirements: responsive layout, dark mode. Constraints: no \
                        external UI libraries. Success criteria: passing build.";
        let validation = validate_enhancement(original, enhanced);
        assert!(validation.adds_value);
        assert!(validation.is_improved);
    }

    #[tokio::test]
    async fn llm_outage_falls_back_and_still_completes() {
        let mut config = crate::llm::LlmConfig::openai();
        config.api_key = None;
        let gateway = LlmGateway::new(config, vec![]);

        let state = WorkflowState::new("make a thing");
        let out = Enhancer.run(state, &gateway).await;
        assert_eq!(out.agent_status(AgentName::Enhancer), Some("completed"));
        // Fallback enhancement never replaces the user's input on its own.
        let result = &out.agent_results["enhancer"];
        assert!(result["enhanced_prompt"].as_str().is_some());
    }
}
