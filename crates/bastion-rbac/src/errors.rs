use thiserror::Error;

#[derive(Debug, Error)]
pub enum RbacError {
    #[error("invalid policy rule: {0}")]
    InvalidRule(String),
    #[error("role {0} is reserved and cannot be modified")]
    ProtectedRole(String),
    #[error("policy store error: {0}")]
    Store(#[from] anyhow::Error),
    #[error("policy engine error: {0}")]
    Engine(String),
    #[error("policy has not been loaded")]
    NotLoaded,
    #[error("decision cache unavailable: {0}")]
    Cache(String),
}

impl RbacError {
    /// Domain guard violations are user-facing validation failures, not system errors.
    pub fn is_guard_violation(&self) -> bool {
        matches!(self, RbacError::ProtectedRole(_))
    }
}

pub type RbacResult<T> = Result<T, RbacError>;

impl From<casbin::Error> for RbacError {
    fn from(err: casbin::Error) -> Self {
        RbacError::Engine(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            RbacError::InvalidRule("empty path".to_string()),
            RbacError::ProtectedRole("super".to_string()),
            RbacError::Store(anyhow::anyhow!("connection refused")),
            RbacError::Engine("bad matcher".to_string()),
            RbacError::NotLoaded,
            RbacError::Cache("closed".to_string()),
        ];

        for error in errors {
            let rendered = error.to_string();
            assert!(!rendered.is_empty());
        }
    }

    #[test]
    fn only_protected_role_is_a_guard_violation() {
        assert!(RbacError::ProtectedRole("super".to_string()).is_guard_violation());
        assert!(!RbacError::NotLoaded.is_guard_violation());
        assert!(!RbacError::InvalidRule("x".to_string()).is_guard_violation());
    }
}
