use crate::domain::model::{MailroomId, OrganizationId, Package, PackageId, PackageStatus};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Package persistence. The store is not trusted to enforce lifecycle rules;
/// it only has to make `update_if_version` atomic.
#[async_trait]
pub trait PackageStore: Send + Sync {
    async fn insert(&self, package: Package) -> Result<()>;
    async fn get(&self, id: &PackageId) -> Result<Option<Package>>;
    /// Replace the stored package only if its version still equals
    /// `expected_version`; otherwise fail with `EngineError::Conflict`.
    async fn update_if_version(&self, package: Package, expected_version: u64) -> Result<Package>;
    async fn list_by_mailroom(&self, mailroom: &MailroomId) -> Result<Vec<Package>>;
}

/// Authorization subsystem: does an organization own a mailroom?
#[async_trait]
pub trait OwnershipDirectory: Send + Sync {
    async fn owns_mailroom(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
    ) -> Result<bool>;
}

/// Roster subsystem: is the addressee a known resident of the mailroom?
#[async_trait]
pub trait ResidentDirectory: Send + Sync {
    async fn resident_exists(&self, mailroom: &MailroomId, resident_id: &str) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    PackageRegistered {
        package_id: PackageId,
        mailroom: MailroomId,
        number: u16,
        resident_id: String,
        provider: Option<String>,
        at: DateTime<Utc>,
    },
    PackageTransitioned {
        package_id: PackageId,
        mailroom: MailroomId,
        number: u16,
        from: PackageStatus,
        to: PackageStatus,
        actor: String,
        at: DateTime<Utc>,
    },
    AllocationFailed {
        mailroom: MailroomId,
        reason: String,
        at: DateTime<Utc>,
    },
}

/// Receives events after the corresponding state change committed.
/// Must not block; delivery failures stay inside the sink.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: EngineEvent);
}

/// Downstream consumer of engine events (email, failure log).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &EngineEvent) -> Result<()>;
}
