use std::fmt;

/// Failures that are recovered inside the core. None of these reach a caller of
/// the prediction path; they are logged and, for the model path, disclosed via
/// the response's `model` field.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    ModelUnavailable {
        stage: &'static str,
        detail: String,
    },
    CacheUnavailable {
        op: &'static str,
        detail: String,
    },
    InvalidFeatureInput {
        key: String,
        detail: String,
    },
}

impl CoreError {
    pub fn model(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            stage,
            detail: detail.into(),
        }
    }

    pub fn cache(op: &'static str, detail: impl Into<String>) -> Self {
        Self::CacheUnavailable {
            op,
            detail: detail.into(),
        }
    }

    pub fn feature(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidFeatureInput {
            key: key.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelUnavailable { stage, detail } => {
                write!(f, "model unavailable (stage={stage}): {detail}")
            }
            Self::CacheUnavailable { op, detail } => {
                write!(f, "cache unavailable (op={op}): {detail}")
            }
            Self::InvalidFeatureInput { key, detail } => {
                write!(f, "invalid feature input (key={key}): {detail}")
            }
        }
    }
}

impl std::error::Error for CoreError {}
