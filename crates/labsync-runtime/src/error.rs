use labsync_reconcile::ReconcileError;

/// Why a notification could not be processed. The transport decides whether
/// to redeliver based on [`FeedError::is_retryable`].
#[derive(Debug)]
pub enum FeedError {
    /// Network failure, non-success status or undecodable document.
    Fetch(String),
    /// The upstream document is unusable until it changes.
    InvalidAccession(String),
    /// Records that must exist after a save are missing.
    Integrity(String),
    /// Missing reference data or settings. Redelivery cannot help.
    Configuration(String),
    /// The store failed; nothing of the pass is durable.
    Persistence(String),
}

impl FeedError {
    pub fn fetch(err: anyhow::Error) -> Self {
        FeedError::Fetch(format!("{err:#}"))
    }

    pub fn persistence(err: anyhow::Error) -> Self {
        FeedError::Persistence(format!("{err:#}"))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FeedError::Fetch(_) | FeedError::Integrity(_) | FeedError::Persistence(_)
        )
    }

    /// Stable failure class for logs and API responses.
    pub fn class(&self) -> &'static str {
        match self {
            FeedError::Fetch(_) => "FETCH",
            FeedError::InvalidAccession(_) => "INVALID_ACCESSION",
            FeedError::Integrity(_) => "INTEGRITY",
            FeedError::Configuration(_) => "CONFIGURATION",
            FeedError::Persistence(_) => "PERSISTENCE",
        }
    }

    fn detail(&self) -> &str {
        match self {
            FeedError::Fetch(m)
            | FeedError::InvalidAccession(m)
            | FeedError::Integrity(m)
            | FeedError::Configuration(m)
            | FeedError::Persistence(m) => m,
        }
    }
}

impl From<ReconcileError> for FeedError {
    fn from(err: ReconcileError) -> Self {
        if err.is_configuration() {
            FeedError::Configuration(err.to_string())
        } else if err.is_invalid_accession() {
            FeedError::InvalidAccession(err.to_string())
        } else {
            FeedError::Integrity(err.to_string())
        }
    }
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.class(), self.detail())
    }
}

impl std::error::Error for FeedError {}
