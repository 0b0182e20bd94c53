//! Context packing under size budgets.

/// Visible separator between packed snippets.
const SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone)]
pub struct ContextPackerConfig {
    pub max_context_chars: usize,
    pub max_chunks_in_prompt: usize,
}

/// Merges selected passages into one bounded context block.
///
/// Walks documents in input order, drops blanks and exact normalized
/// duplicates, caps the chunk count, and truncates under the character
/// budget. The budget covers the joined output including separators, so the
/// returned string never exceeds `max_context_chars`.
pub struct ContextPacker {
    cfg: ContextPackerConfig,
}

impl ContextPacker {
    pub fn new(cfg: ContextPackerConfig) -> Self {
        Self { cfg }
    }

    pub fn pack(&self, docs: &[String]) -> String {
        let mut packed: Vec<String> = Vec::new();
        let mut seen_norm: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut total = 0usize;
        let sep_len = SEPARATOR.chars().count();

        for doc in docs {
            let doc = doc.trim();
            if doc.is_empty() {
                continue;
            }

            // Exact-duplicate suppression on a case/whitespace-folded form.
            let norm = doc.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
            if !seen_norm.insert(norm) {
                continue;
            }

            if packed.len() >= self.cfg.max_chunks_in_prompt {
                break;
            }

            let overhead = if packed.is_empty() { 0 } else { sep_len };
            let remaining = self.cfg.max_context_chars.saturating_sub(total + overhead);
            if remaining == 0 {
                break;
            }

            let len = doc.chars().count();
            let snippet = if len <= remaining {
                doc.to_string()
            } else {
                if remaining < 4 {
                    break;
                }
                let truncated: String = doc.chars().take(remaining - 3).collect();
                format!("{}...", truncated)
            };

            total += overhead + snippet.chars().count();
            packed.push(snippet);
        }

        packed.join(SEPARATOR).trim().to_string()
    }
}
