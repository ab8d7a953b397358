pub type InkstepResult<T> = Result<T, InkstepError>;

#[derive(thiserror::Error, Debug)]
pub enum InkstepError {
    /// Coverage below the minimum fraction. Recoverable: discard strokes and restart.
    #[error("blank canvas: coverage {coverage:.4} below minimum {minimum:.4}")]
    BlankCanvas { coverage: f64, minimum: f64 },

    /// Elapsed drawing time below the minimum (manual submit only).
    #[error("too fast: {elapsed_secs:.1}s of drawing below minimum {minimum_secs:.1}s")]
    TooFast { elapsed_secs: f64, minimum_secs: f64 },

    /// The persistence gateway failed during save or load. Retryable.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Export requested for a submission with no stroke data.
    #[error("nothing to export: submission has no stroke data")]
    EmptyExport,

    /// The frame-capture sink failed during export. No partial artifact is offered.
    #[error("capture failure: {0}")]
    CaptureFailure(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InkstepError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkFailure(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::CaptureFailure(msg.into())
    }

    /// Whether the failure returns the user to a re-enterable state where the
    /// same action can simply be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_) | Self::CaptureFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            InkstepError::BlankCanvas {
                coverage: 0.001,
                minimum: 0.002
            }
            .to_string()
            .contains("blank canvas:")
        );
        assert!(
            InkstepError::TooFast {
                elapsed_secs: 1.0,
                minimum_secs: 3.0
            }
            .to_string()
            .contains("too fast:")
        );
        assert!(
            InkstepError::network("x")
                .to_string()
                .contains("network failure:")
        );
        assert!(
            InkstepError::capture("x")
                .to_string()
                .contains("capture failure:")
        );
        assert!(
            InkstepError::validation("x")
                .to_string()
                .contains("validation error:")
        );
    }

    #[test]
    fn retryable_covers_network_and_capture_only() {
        assert!(InkstepError::network("x").is_retryable());
        assert!(InkstepError::capture("x").is_retryable());
        assert!(!InkstepError::EmptyExport.is_retryable());
        assert!(
            !InkstepError::BlankCanvas {
                coverage: 0.0,
                minimum: 0.002
            }
            .is_retryable()
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = InkstepError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
