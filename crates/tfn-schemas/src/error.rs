use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, TiffinError>;

/// One offending input field. `field` may be a path such as `records[3].price`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Core error taxonomy. Every service returns this; the presentation layer
/// maps it onto its own transport (HTTP status, CLI exit code).
#[derive(Debug, thiserror::Error)]
pub enum TiffinError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{message}")]
    Conflict {
        message: String,
        duplicates: Vec<String>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TiffinError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        TiffinError::Validation {
            message: message.clone(),
            errors: vec![FieldError {
                field: field.into(),
                message,
            }],
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        TiffinError::Conflict {
            message: message.into(),
            duplicates: Vec::new(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        TiffinError::NotFound(message.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            TiffinError::Validation { .. } => "VALIDATION",
            TiffinError::Conflict { .. } => "CONFLICT",
            TiffinError::NotFound(_) => "NOT_FOUND",
            TiffinError::Unauthorized(_) => "UNAUTHORIZED",
            TiffinError::Forbidden(_) => "FORBIDDEN",
            TiffinError::Internal(_) => "INTERNAL",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, TiffinError::Conflict { .. })
    }
}

/// Accumulates field errors so callers see every problem in one response.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.push(field, message);
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Fold a nested validation error in under `prefix` (e.g. `records[2]`).
    /// Anything that is not a validation error is handed back.
    pub fn absorb(&mut self, prefix: &str, err: TiffinError) -> Option<TiffinError> {
        match err {
            TiffinError::Validation { errors, .. } => {
                for e in errors {
                    if prefix.is_empty() {
                        self.push(e.field, e.message);
                    } else {
                        self.push(format!("{prefix}.{}", e.field), e.message);
                    }
                }
                None
            }
            other => Some(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self, message: &str) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(TiffinError::Validation {
                message: message.to_string(),
                errors: self.errors,
            })
        }
    }
}
