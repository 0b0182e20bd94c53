//! Prompt assembly: history formatting and final prompt rendering.

use crate::types::PromptBundle;
use counsel_core::types::{ChatTurn, Role};
use counsel_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Instruction block injected into the system template when retrieval
/// confidence is weak and the policy requires verbatim quotes.
const WEAK_RULES: &str = "IMPORTANT: The retrieved match is weak. Only answer if you can include \
ONE short verbatim quote from the reference information. If you cannot include a quote, respond \
with: \"Sorry — I couldn't find information about <topic> in the knowledge base.\"";

/// Answer-format footer demanding a supporting quote in weak mode.
const WEAK_ANSWER_FORMAT: &str = "\nAnswer format:\n<your answer here>\nSupport/Citation: \"<one sentence quote from context>\"";

/// Render a Handlebars template with variables.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

/// Builds the final LLM prompt from the loaded templates plus runtime inputs.
pub struct PromptBuilder {
    system: String,
    answer: String,
}

impl PromptBuilder {
    pub fn new(bundle: &PromptBundle) -> Self {
        Self {
            system: bundle.system.trim().to_string(),
            answer: bundle.answer.trim().to_string(),
        }
    }

    /// Format chat history into a single block for template injection.
    ///
    /// Keeps only the last `max_turns` entries, renders each as
    /// `User: <text>` / `Assistant: <text>`, and skips entries with empty
    /// text rather than rejecting the request.
    pub fn format_history(history: &[ChatTurn], max_turns: usize) -> String {
        if history.is_empty() {
            return String::new();
        }
        let start = history.len().saturating_sub(max_turns);

        let lines: Vec<String> = history[start..]
            .iter()
            .filter_map(|turn| {
                let text = turn.text.trim();
                if text.is_empty() {
                    return None;
                }
                let role = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                Some(format!("{}: {}", role, text))
            })
            .collect();

        lines.join("\n").trim().to_string()
    }

    /// Render the full prompt: system block (with the weak-evidence rules
    /// when applicable), a blank line, then the answer block.
    pub fn build(
        &self,
        history: &str,
        context: &str,
        question: &str,
        weak: bool,
        require_quotes_in_weak_mode: bool,
    ) -> AppResult<String> {
        let quote_required = weak && require_quotes_in_weak_mode;
        let weak_rules = if quote_required { WEAK_RULES } else { "" };
        let weak_answer_format = if quote_required { WEAK_ANSWER_FORMAT } else { "" };

        let mut system_vars = HashMap::new();
        system_vars.insert("weak_rules".to_string(), weak_rules.to_string());
        let system = render_template(&self.system, &system_vars)?;

        let mut answer_vars = HashMap::new();
        answer_vars.insert("history".to_string(), history.to_string());
        answer_vars.insert("context".to_string(), context.to_string());
        answer_vars.insert("question".to_string(), question.to_string());
        answer_vars.insert(
            "weak_answer_format".to_string(),
            weak_answer_format.to_string(),
        );
        let answer = render_template(&self.answer, &answer_vars)?;

        Ok(format!("{}\n\n{}", system.trim(), answer.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_builder() -> PromptBuilder {
        PromptBuilder::new(&PromptBundle {
            system: "System rules. {{weak_rules}}".to_string(),
            answer: "History:\n{{history}}\n\nContext:\n{{context}}\n\nQ: {{question}}{{weak_answer_format}}"
                .to_string(),
            rewrite: String::new(),
        })
    }

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "Hello, world!".to_string());

        let result = render_template("Question: {{question}}", &vars);
        assert_eq!(result.unwrap(), "Question: Hello, world!");
    }

    #[test]
    fn test_render_missing_variable_is_empty() {
        let vars = HashMap::new();
        // Handlebars renders missing variables as empty string
        let result = render_template("Question: {{missing}}", &vars).unwrap();
        assert_eq!(result, "Question: ");
    }

    #[test]
    fn test_format_history_caps_turns_and_skips_empty() {
        let history = vec![
            ChatTurn::user("first"),
            ChatTurn::assistant(""),
            ChatTurn::user("second"),
            ChatTurn::assistant("reply"),
            ChatTurn::user("third"),
        ];

        let text = PromptBuilder::format_history(&history, 3);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["User: second", "Assistant: reply", "User: third"]);

        // the window applies before empty-text filtering
        let short = PromptBuilder::format_history(&history, 2);
        assert_eq!(short.lines().count(), 2);
    }

    #[test]
    fn test_format_history_empty() {
        assert_eq!(PromptBuilder::format_history(&[], 6), "");
    }

    #[test]
    fn test_build_strong_mode_omits_weak_rules() {
        let builder = test_builder();
        let prompt = builder
            .build("User: hi", "some context", "what is x?", false, true)
            .unwrap();

        assert!(prompt.contains("System rules."));
        assert!(prompt.contains("Q: what is x?"));
        assert!(!prompt.contains("verbatim quote"));
        assert!(!prompt.contains("Support/Citation"));
    }

    #[test]
    fn test_build_weak_mode_injects_quote_requirement() {
        let builder = test_builder();
        let prompt = builder
            .build("", "some context", "what is x?", true, true)
            .unwrap();

        assert!(prompt.contains("verbatim quote"));
        assert!(prompt.contains("Support/Citation"));
    }

    #[test]
    fn test_build_weak_mode_without_quote_policy() {
        let builder = test_builder();
        let prompt = builder
            .build("", "some context", "what is x?", true, false)
            .unwrap();

        assert!(!prompt.contains("verbatim quote"));
    }

    #[test]
    fn test_build_joins_system_and_answer_with_blank_line() {
        let builder = test_builder();
        let prompt = builder.build("", "ctx", "q", false, false).unwrap();
        assert!(prompt.contains("\n\nHistory:"));
    }
}
