use crate::domain::model::{MailroomId, OrganizationId, PackageId, PackageStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No package numbers left in mailroom {mailroom}")]
    Exhausted { mailroom: MailroomId },

    #[error("Slot {number} in mailroom {mailroom} is not in use")]
    SlotNotInUse { mailroom: MailroomId, number: u16 },

    #[error("Package not found: {0}")]
    PackageNotFound(PackageId),

    #[error("Number pool for mailroom {0} has not been initialized")]
    PoolNotInitialized(MailroomId),

    #[error("Number pool for mailroom {0} is already initialized")]
    AlreadyInitialized(MailroomId),

    #[error("Invalid package transition: {from} -> {to}")]
    InvalidTransition {
        from: PackageStatus,
        to: PackageStatus,
    },

    #[error("Package {package} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        package: PackageId,
        expected: u64,
        found: u64,
    },

    #[error("Organization {organization} does not own mailroom {mailroom}")]
    CrossTenant {
        organization: OrganizationId,
        mailroom: MailroomId,
    },

    #[error("Resident {resident} not found in mailroom {mailroom}")]
    ResidentNotFound {
        mailroom: MailroomId,
        resident: String,
    },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Capacity,
    NotFound,
    Lifecycle,
    Concurrency,
    Security,
    Storage,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EngineError {
    pub fn storage(message: impl Into<String>) -> Self {
        EngineError::Storage {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Exhausted { .. } => ErrorCategory::Capacity,
            EngineError::SlotNotInUse { .. }
            | EngineError::PackageNotFound(_)
            | EngineError::PoolNotInitialized(_)
            | EngineError::ResidentNotFound { .. } => ErrorCategory::NotFound,
            EngineError::InvalidTransition { .. } | EngineError::AlreadyInitialized(_) => {
                ErrorCategory::Lifecycle
            }
            EngineError::Conflict { .. } => ErrorCategory::Concurrency,
            EngineError::CrossTenant { .. } => ErrorCategory::Security,
            EngineError::Storage { .. } | EngineError::IoError(_) => ErrorCategory::Storage,
            EngineError::ConfigError { .. }
            | EngineError::InvalidConfigValueError { .. }
            | EngineError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EngineError::LockPoisoned(_) | EngineError::SerializationError(_) => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Capacity | ErrorCategory::Concurrency => ErrorSeverity::Medium,
            ErrorCategory::NotFound | ErrorCategory::Lifecycle => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Storage => ErrorSeverity::High,
            ErrorCategory::Security | ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    /// Transient failures worth retrying as-is. Exhaustion and conflicts are
    /// retryable only after something else changes, so they are excluded.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Storage { .. } | EngineError::IoError(_))
    }

    /// Message safe to show to an end user. Cross-tenant access reads exactly
    /// like a missing resource.
    pub fn user_friendly_message(&self) -> String {
        match self {
            EngineError::Exhausted { .. } => {
                "All package numbers in this mailroom are in use".to_string()
            }
            EngineError::InvalidTransition { from, to } => {
                format!("A {} package cannot be marked {}", from, to)
            }
            EngineError::Conflict { .. } => {
                "This package was updated by someone else".to_string()
            }
            EngineError::CrossTenant { .. } => "Resource not found".to_string(),
            EngineError::SlotNotInUse { .. }
            | EngineError::PackageNotFound(_)
            | EngineError::PoolNotInitialized(_) => "Resource not found".to_string(),
            EngineError::ResidentNotFound { resident, .. } => {
                format!("Resident {} not found", resident)
            }
            EngineError::AlreadyInitialized(_) => {
                "This mailroom is already provisioned".to_string()
            }
            EngineError::Storage { .. } | EngineError::IoError(_) => {
                "Temporary storage failure".to_string()
            }
            EngineError::ConfigError { .. }
            | EngineError::InvalidConfigValueError { .. }
            | EngineError::ConfigValidationError { .. } => {
                format!("Invalid configuration: {}", self)
            }
            EngineError::LockPoisoned(_) | EngineError::SerializationError(_) => {
                "Internal error".to_string()
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Capacity => "Resolve picked-up packages to free numbers, then retry",
            ErrorCategory::NotFound => "Reload the resource and check the identifier",
            ErrorCategory::Lifecycle => "Reload the package and choose a forward transition",
            ErrorCategory::Concurrency => "Reload the package and decide whether to retry",
            ErrorCategory::Security => "Check that the request targets your own mailroom",
            ErrorCategory::Storage => "Retry the request; check the storage backend if it persists",
            ErrorCategory::Configuration => "Fix the configuration file and restart",
            ErrorCategory::Internal => "Restart the service and report the issue",
        }
    }
}
