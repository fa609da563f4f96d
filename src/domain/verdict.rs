//! Validation Verdicts
//!
//! Stage one (semantic) can accept, reject, or fail to reach a decision;
//! only an indeterminate result hands the payload to stage two (schema).

/// Question put to the semantic judge, followed by the payload text.
pub const SEMANTIC_QUESTION: &str =
    "Does this data pulled from external API imply a successful response? answer yes or no only: ";

/// Outcome of the semantic stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticVerdict {
    /// The judge answered and did not say no.
    Accepted,
    /// The judge explicitly said no.
    Rejected { reply: String },
    /// The judge could not be asked or its answer could not be read.
    Indeterminate { reason: String },
}

impl SemanticVerdict {
    /// Classify a judge reply: any case-insensitive "no" substring rejects.
    pub fn from_reply(reply: &str) -> Self {
        if reply.to_lowercase().contains("no") {
            Self::Rejected {
                reply: reply.trim().to_string(),
            }
        } else {
            Self::Accepted
        }
    }
}

/// Which stage let a payload through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    Semantic,
    Schema,
}

impl ValidationStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Schema => "schema",
        }
    }
}

/// Build the judge prompt, capped at `max_chars` characters in total.
pub fn semantic_prompt(payload_text: &str, max_chars: usize) -> String {
    SEMANTIC_QUESTION
        .chars()
        .chain(payload_text.chars())
        .take(max_chars)
        .collect()
}
