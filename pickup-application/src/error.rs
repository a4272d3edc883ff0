use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Store or counter I/O failed; the cycle has no safe partial state.
    #[error("persistence failure: {0:#}")]
    Persistence(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_error_keeps_cause_chain() {
        let err = AppError::Persistence(anyhow::anyhow!("disk full").context("writing event log"));
        assert_eq!(err.to_string(), "persistence failure: writing event log: disk full");
    }
}
