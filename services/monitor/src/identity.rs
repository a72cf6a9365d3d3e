//! Owner identity attached to submitted jobs.
//!
//! Identity is always an explicit constructor argument. The ambient
//! environment lookup exists only as the opt-in [`Identity::from_env`];
//! nothing reads the environment behind the caller's back, and a missing
//! identity is recorded as unknown, never treated as fatal.

/// Environment variable consulted by the opt-in ambient lookup.
pub const ENV_USER: &str = "FAIRQ_USER";

/// Who submitted a job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    /// A known owner name.
    Named(String),
    /// No identity supplied; travels as null and displays as "unknown".
    #[default]
    Unknown,
}

impl Identity {
    /// An explicitly supplied owner name. Blank names count as unknown.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            Identity::Unknown
        } else {
            Identity::Named(trimmed.to_string())
        }
    }

    pub fn unknown() -> Self {
        Identity::Unknown
    }

    /// Opt-in ambient lookup from `FAIRQ_USER`.
    pub fn from_env() -> Self {
        match std::env::var(ENV_USER) {
            Ok(name) => Identity::named(name),
            Err(_) => Identity::Unknown,
        }
    }

    /// The wire representation: `None` travels as null.
    pub fn as_user(&self) -> Option<String> {
        match self {
            Identity::Named(name) => Some(name.clone()),
            Identity::Unknown => None,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Named(name) => f.write_str(name),
            Identity::Unknown => f.write_str("unknown"),
        }
    }
}
