use thiserror::Error;

fn itemize(items: &[String]) -> String {
    items.join("; ")
}

/// One failing gate as reported by a rejected Design promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateViolation {
    pub gate_id: u8,
    pub name: String,
    pub findings: Vec<String>,
}

impl std::fmt::Display for GateViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gate {} ({}): {}",
            self.gate_id,
            self.name,
            self.findings.join(", ")
        )
    }
}

fn itemize_gates(gates: &[GateViolation]) -> String {
    gates
        .iter()
        .map(|g| g.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum SpecflowError {
    #[error("not initialized: run 'specflow init'")]
    NotInitialized,

    #[error("validation failed for {subject}: {}", itemize(.violations))]
    Validation {
        subject: String,
        violations: Vec<String>,
    },

    #[error("gate failure for {subject}: {}", itemize_gates(.gates))]
    GateFailure {
        subject: String,
        gates: Vec<GateViolation>,
    },

    #[error("numbering conflict: could not lock the {kind} sequence within {waited_ms}ms")]
    NumberingConflict { kind: String, waited_ms: u64 },

    #[error("{id} is being updated by another writer (waited {waited_ms}ms)")]
    ArtifactBusy { id: String, waited_ms: u64 },

    #[error("link error for {subject}: {}", itemize(.violations))]
    Link {
        subject: String,
        violations: Vec<String>,
    },

    #[error("invalid transition from {from} to {to}: {reason}")]
    Transition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("invalid artifact id '{0}': expected {{TYPE}}-{{sequence}}, e.g. SPEC-001 or ADR-0007")]
    InvalidId(String),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("malformed artifact {path}: {reason}")]
    MalformedArtifact { path: String, reason: String },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("collaborator failed: {0}")]
    Collaborator(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SpecflowError {
    /// True for rejections detected before any id allocation or write.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SpecflowError::Validation { .. }
                | SpecflowError::GateFailure { .. }
                | SpecflowError::Link { .. }
                | SpecflowError::Transition { .. }
                | SpecflowError::Collaborator(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SpecflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_violation() {
        let err = SpecflowError::Validation {
            subject: "spec 'auth'".to_string(),
            violations: vec![
                "1 unresolved [NEEDS CLARIFICATION] marker(s)".to_string(),
                "no requirements declared".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("unresolved"));
        assert!(msg.contains("no requirements declared"));
    }

    #[test]
    fn gate_failure_names_gates() {
        let err = SpecflowError::GateFailure {
            subject: "design 'auth'".to_string(),
            gates: vec![GateViolation {
                gate_id: 3,
                name: "clean-code".to_string(),
                findings: vec!["function 'login' is 42 lines (limit 20)".to_string()],
            }],
        };
        assert!(err.to_string().contains("gate 3 (clean-code)"));
        assert!(err.is_precondition());
    }

    #[test]
    fn io_is_not_precondition() {
        let err: SpecflowError = std::io::Error::other("disk").into();
        assert!(!err.is_precondition());
    }
}
