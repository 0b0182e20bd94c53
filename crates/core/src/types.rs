//! Shared chat and citation types.
//!
//! These are the wire-facing types of the chat surface: turns, citations,
//! request/response envelopes, and the streaming event protocol. A transport
//! layer (CLI, HTTP, ...) consumes them as-is.

use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of conversation history, owned by the caller's session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Where a retrieved passage came from.
///
/// Derived 1:1 from a retrieved passage; immutable after creation. The
/// snippet is whitespace-collapsed and capped at 160 characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub doc_type: Option<String>,
    pub page: Option<i64>,
    pub chunk_id: Option<String>,
    pub snippet: Option<String>,
}

/// A chat request as received from a transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// A complete (non-streaming) chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Streaming response events, emitted in strict order: zero or more `Token`s,
/// at most one `Citations` (only on a non-denied, non-refused answer), then
/// exactly one `Done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ChatEvent {
    Token { t: String },
    Citations { citations: Vec<Citation> },
    Done {},
}
