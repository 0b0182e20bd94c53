//! Prompt template types.

/// The three prompt templates the pipeline renders.
///
/// Loaded once from disk at startup and treated as immutable for the process
/// lifetime; an explicit forced reload is the only invalidation path.
#[derive(Debug, Clone)]
pub struct PromptBundle {
    /// System template; placeholder: `{{weak_rules}}`
    pub system: String,
    /// Answer template; placeholders: `{{history}}`, `{{context}}`,
    /// `{{question}}`, `{{weak_answer_format}}`
    pub answer: String,
    /// Query-rewrite template; placeholders: `{{history}}`, `{{question}}`
    pub rewrite: String,
}
