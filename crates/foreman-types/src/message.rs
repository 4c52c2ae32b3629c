//! Messages from an agent's LLM stream.
//!
//! The agent runner forwards every streamed message to the cost tracker.
//! Only two shapes carry billing information: assistant steps (per-request
//! usage, deduplicated by message id) and the final result message (the
//! authoritative cost for the whole run).

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Token Usage
// ─────────────────────────────────────────────────────────────────────────────

/// Token counts for a single request or a whole session.
///
/// Field names match the provider's usage records so the runner can
/// deserialize them directly off the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Uncached input tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Generated output tokens.
    #[serde(default)]
    pub output_tokens: u64,
    /// Input tokens read from cache.
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    /// Input tokens written to cache.
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

impl TokenUsage {
    /// Create a usage record with only input and output tokens.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Default::default()
        }
    }

    /// Total tokens across all four counters.
    pub fn total(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_read_input_tokens
            + self.cache_creation_input_tokens
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Message
// ─────────────────────────────────────────────────────────────────────────────

/// A message observed on an agent's stream.
///
/// The cost tracker only bills [`AgentMessage::Assistant`] steps (once per
/// message id) and treats [`AgentMessage::Result`] as authoritative for the
/// whole session. Everything else is ignored for accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// An assistant step carrying per-request usage.
    Assistant {
        /// Provider message id, used for deduplication.
        id: Option<String>,
        /// Usage for this step, when reported.
        usage: Option<TokenUsage>,
    },
    /// The final result message with the authoritative session cost.
    Result {
        /// Authoritative cost in USD, when the provider reports one.
        total_cost_usd: Option<f64>,
        /// Final token totals for the session.
        usage: Option<TokenUsage>,
    },
    /// Any other stream event (tool results, system notices). Unbilled.
    Other,
}

impl AgentMessage {
    /// Convenience constructor for an assistant step.
    pub fn assistant(id: impl Into<String>, usage: TokenUsage) -> Self {
        Self::Assistant {
            id: Some(id.into()),
            usage: Some(usage),
        }
    }

    /// Convenience constructor for a final result message.
    pub fn result(total_cost_usd: f64, usage: TokenUsage) -> Self {
        Self::Result {
            total_cost_usd: Some(total_cost_usd),
            usage: Some(usage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
            cache_read_input_tokens: 25,
            cache_creation_input_tokens: 10,
        };
        assert_eq!(usage.total(), 185);
    }

    #[test]
    fn test_message_serde_round_trip() {
        let msg = AgentMessage::assistant("msg-1", TokenUsage::new(10, 20));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"assistant\""));
        let back: AgentMessage = serde_json::from_str(&json).unwrap();
        match back {
            AgentMessage::Assistant { id, usage } => {
                assert_eq!(id.as_deref(), Some("msg-1"));
                assert_eq!(usage.unwrap().output_tokens, 20);
            }
            _ => panic!("expected assistant message"),
        }
    }
}
