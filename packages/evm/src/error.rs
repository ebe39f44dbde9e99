use thiserror::Error;

/// Error taxonomy for the read path.
///
/// Callers discriminate on the variant, never on the message. Underlying
/// collaborator errors are carried inside `NotFound`/`Internal` rather
/// than replaced, so nothing is swallowed.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("invalid type: {0}")]
    InvalidType(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("not found: {0}")]
    NotFound(anyhow::Error),
    #[error("internal: {0}")]
    Internal(anyhow::Error),
}

impl RelayError {
    pub fn invalid_type(msg: impl Into<String>) -> Self {
        Self::InvalidType(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Normalizes heterogeneous log source failures into the relay taxonomy.
///
/// Sources signal absence with free-form messages ("not found", "no rows");
/// everything else is an internal failure. The original error stays
/// attached either way.
pub fn classify_source_err(err: anyhow::Error) -> RelayError {
    let msg = format!("{err:#}");
    if msg.contains("not found") || msg.contains("no rows") {
        RelayError::NotFound(err)
    } else {
        RelayError::Internal(err)
    }
}
