/// Failures that abort a whole reconciliation pass. Nothing of the pass is
/// applied when one of these is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    /// The fallback provider identifier does not resolve to a provider.
    MissingFallbackProvider { identifier: String },
    /// The order encounter handed to the pass is not part of the visit.
    OrderEncounterNotInVisit { encounter_uuid: String },
    /// A numeric result that does not parse as a number.
    InvalidResultValue { test_uuid: String, value: String },
    /// A resulted test without a result timestamp.
    MissingResultTimestamp { test_uuid: String },
}

impl ReconcileError {
    /// Deployment problem rather than a data problem; retrying cannot help.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ReconcileError::MissingFallbackProvider { .. })
    }

    /// The upstream document itself is unusable until it changes.
    pub fn is_invalid_accession(&self) -> bool {
        matches!(
            self,
            ReconcileError::InvalidResultValue { .. } | ReconcileError::MissingResultTimestamp { .. }
        )
    }
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::MissingFallbackProvider { identifier } => {
                write!(f, "CONFIG: fallback provider '{identifier}' not found")
            }
            ReconcileError::OrderEncounterNotInVisit { encounter_uuid } => {
                write!(f, "INTEGRITY: order encounter {encounter_uuid} is not attached to the visit")
            }
            ReconcileError::InvalidResultValue { test_uuid, value } => {
                write!(f, "INVALID_ACCESSION: test {test_uuid} has non-numeric result '{value}'")
            }
            ReconcileError::MissingResultTimestamp { test_uuid } => {
                write!(f, "INVALID_ACCESSION: test {test_uuid} is resulted without a timestamp")
            }
        }
    }
}

impl std::error::Error for ReconcileError {}
