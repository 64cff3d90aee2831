// AICoder: Prompt System
// Structured prompts with templates and per-agent system messages

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prompt template with variable substitution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub template: String,
    pub required_vars: Vec<String>,
}

static VAR_RE: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"\{\{(\w+)\}\}").unwrap());

impl PromptTemplate {
    pub fn new(name: &str, template: &str) -> Self {
        // Extract variables like {{var_name}}
        let required_vars: Vec<String> = VAR_RE
            .captures_iter(template)
            .map(|c| c[1].to_string())
            .collect();

        Self {
            name: name.to_string(),
            template: template.to_string(),
            required_vars,
        }
    }

    /// Render the template with provided variables
    pub fn render(&self, vars: &HashMap<String, String>) -> Result<String, String> {
        let mut result = self.template.clone();

        for var in &self.required_vars {
            let placeholder = format!("{{{{{}}}}}", var);
            let value = vars
                .get(var)
                .ok_or_else(|| format!("Missing required variable: {}", var))?;
            result = result.replace(&placeholder, value);
        }

        Ok(result)
    }
}

/// Collection of system prompts for all agents
pub struct SystemPrompts;

impl SystemPrompts {
    /// Orchestrator agent system prompt
    pub fn orchestrator() -> &'static str {
        include_str!("../../prompts/orchestrator.md")
    }

    /// Planner agent system prompt
    pub fn planner() -> &'static str {
        include_str!("../../prompts/planner.md")
    }

    /// Coder agent system prompt
    pub fn coder() -> &'static str {
        include_str!("../../prompts/coder.md")
    }

    /// Tester agent system prompt
    pub fn tester() -> &'static str {
        include_str!("../../prompts/tester.md")
    }

    /// Enhancer agent system prompt
    pub fn enhancer() -> &'static str {
        include_str!("../../prompts/enhancer.md")
    }

    /// Memory agent system prompt
    pub fn memory() -> &'static str {
        include_str!("../../prompts/memory.md")
    }

    /// Toolbox agent system prompt
    pub fn toolbox() -> &'static str {
        include_str!("../../prompts/toolbox.md")
    }

    /// Get the system prompt for an agent by name
    pub fn for_agent(agent_name: &str) -> &'static str {
        match agent_name {
            "orchestrator" => Self::orchestrator(),
            "planner" => Self::planner(),
            "coder" => Self::coder(),
            "tester" => Self::tester(),
            "enhancer" => Self::enhancer(),
            "memory" => Self::memory(),
            "toolbox" => Self::toolbox(),
            _ => "You are a helpful AI assistant specialized in software development.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_extracts_and_renders_vars() {
        let template = PromptTemplate::new("greet", "Build {{thing}} for {{user}}.");
        assert_eq!(template.required_vars, vec!["thing", "user"]);

        let mut vars = HashMap::new();
        vars.insert("thing".to_string(), "a landing page".to_string());
        vars.insert("user".to_string(), "Ada".to_string());
        assert_eq!(
            template.render(&vars).unwrap(),
            "Build a landing page for Ada."
        );
    }

    #[test]
    fn render_fails_on_missing_var() {
        let template = PromptTemplate::new("t", "{{a}} {{b}}");
        let mut vars = HashMap::new();
        vars.insert("a".to_string(), "x".to_string());
        assert!(template.render(&vars).is_err());
    }

    #[test]
    fn every_agent_has_a_system_prompt() {
        for name in [
            "orchestrator",
            "planner",
            "coder",
            "tester",
            "enhancer",
            "memory",
            "toolbox",
        ] {
            assert!(!SystemPrompts::for_agent(name).is_empty());
        }
        // Unknown names fall back to a generic assistant prompt.
        assert!(SystemPrompts::for_agent("nope").contains("helpful"));
    }
}
