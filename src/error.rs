use thiserror::Error;

/// Errors surfaced by the gene-finding engine.
///
/// All fallible operations return [`Result<T, Error>`]. The engine never
/// retries internally; callers decide whether a failure is worth a second
/// attempt with different parameters.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or too-short input sequence. Raised at the boundary,
    /// before any scoring work begins.
    #[error("invalid sequence: {0}")]
    InvalidSequence(String),

    /// Self-training failed to converge within the iteration budget, or
    /// produced a degenerate gene set. Surfaced explicitly so callers
    /// can distinguish a broken model from a legitimate zero-gene
    /// prediction.
    #[error("training failure: {0}")]
    TrainingFailure(String),

    /// Internal invariant violation while building a gene record. This
    /// indicates a defect in the engine, not a user-input problem.
    #[error("translation error: {0}")]
    Translation(String),

    /// Thread-pool or engine configuration problem.
    #[error("configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidSequence("too short".to_string());
        assert_eq!(err.to_string(), "invalid sequence: too short");

        let err = Error::TrainingFailure("no genes".to_string());
        assert!(err.to_string().contains("training failure"));

        let err = Error::Translation("length not divisible by 3".to_string());
        assert!(err.to_string().starts_with("translation error"));
    }
}
