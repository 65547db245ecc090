use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Connect,
    Timeout,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransientKind::Connect => "connect",
            TransientKind::Timeout => "timeout",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Connect or read timeout. The only class that is retried.
    #[error("transient {kind} failure: {detail}")]
    Transient { kind: TransientKind, detail: String },

    #[error("LLM provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM response did not match the expected schema: {detail}")]
    Schema { detail: String, raw: String },
}

impl CompletionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CompletionError::Transient { .. })
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        let detail = err.to_string();
        if err.is_timeout() {
            CompletionError::Transient {
                kind: TransientKind::Timeout,
                detail,
            }
        } else if err.is_connect() {
            CompletionError::Transient {
                kind: TransientKind::Connect,
                detail,
            }
        } else {
            CompletionError::Request(detail)
        }
    }
}
