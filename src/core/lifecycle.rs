//! Package lifecycle rules.
//!
//! ```text
//! WAITING ──► RETRIEVED ──► RESOLVED
//!    │            │
//!    ├────────────┼──────► RESOLVED
//!    └────────────┴──────► FAILED
//! ```
//!
//! The first transition into RETRIEVED, RESOLVED or FAILED returns the
//! package number to its pool. Later releasing transitions leave the pool
//! alone; `Package::number_released` records that the release happened.

use crate::core::allocator::Allocator;
use crate::core::router::MailroomScope;
use crate::domain::model::{NewPackage, OrganizationId, Package, PackageId, PackageStatus};
use crate::domain::ports::PackageStore;
use crate::utils::error::{EngineError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Forward-only transition table. Same-state moves are rejected too.
pub fn check_transition(from: PackageStatus, to: PackageStatus) -> Result<()> {
    use PackageStatus::*;

    let allowed = match (from, to) {
        (Waiting, Retrieved) | (Waiting, Resolved) | (Waiting, Failed) => true,
        (Retrieved, Resolved) | (Retrieved, Failed) => true,
        (Waiting, Waiting) | (Retrieved, Waiting) | (Retrieved, Retrieved) => false,
        (Resolved, _) | (Failed, _) => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition { from, to })
    }
}

/// Next timestamp strictly after `after`.
fn next_stamp(after: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > after {
        now
    } else {
        after + Duration::microseconds(1)
    }
}

/// Build the package that results from moving `current` to `target`.
/// Does not touch storage or the pool.
pub fn apply_transition(current: &Package, target: PackageStatus, actor: &str) -> Result<Package> {
    check_transition(current.status, target)?;

    let mut next = current.clone();
    let stamp = next_stamp(current.last_stamp());

    match target {
        PackageStatus::Waiting => {
            return Err(EngineError::InvalidTransition {
                from: current.status,
                to: target,
            })
        }
        PackageStatus::Retrieved => {
            next.retrieved_at = Some(stamp);
            next.pickup_staff_id = Some(actor.to_string());
        }
        PackageStatus::Resolved => {
            next.resolved_at = Some(stamp);
            if next.pickup_staff_id.is_none() {
                next.pickup_staff_id = Some(actor.to_string());
            }
        }
        PackageStatus::Failed => {
            next.failed_at = Some(stamp);
            next.failed_by = Some(actor.to_string());
        }
    }

    next.status = target;
    next.version = current.version + 1;
    if target.releases_number() {
        next.number_released = true;
    }
    Ok(next)
}

/// A WAITING package bound to an already allocated number.
pub fn new_package(organization: &OrganizationId, request: &NewPackage, number: u16) -> Package {
    Package {
        id: PackageId::new(),
        organization_id: organization.clone(),
        mailroom_id: request.mailroom_id.clone(),
        number,
        status: PackageStatus::Waiting,
        resident_id: request.resident_id.clone(),
        provider: request.provider.clone(),
        staff_id: request.staff_id.clone(),
        pickup_staff_id: None,
        created_at: Utc::now(),
        retrieved_at: None,
        resolved_at: None,
        failed_at: None,
        failed_by: None,
        version: 1,
        number_released: false,
    }
}

pub struct LifecycleManager<S: PackageStore> {
    store: Arc<S>,
    allocator: Arc<Allocator>,
}

impl<S: PackageStore> LifecycleManager<S> {
    pub fn new(store: Arc<S>, allocator: Arc<Allocator>) -> Self {
        Self { store, allocator }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn create(&self, package: Package) -> Result<Package> {
        self.store.insert(package.clone()).await?;
        tracing::info!(
            package_id = %package.id,
            mailroom = %package.mailroom_id,
            number = package.number,
            "Package registered"
        );
        Ok(package)
    }

    pub async fn get(&self, scope: &MailroomScope, id: &PackageId) -> Result<Package> {
        let package = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::PackageNotFound(*id))?;

        scope.check_package(&package)?;
        Ok(package)
    }

    /// Move a package forward. Returns the committed package and the status
    /// it left.
    pub async fn transition(
        &self,
        scope: &MailroomScope,
        id: &PackageId,
        target: PackageStatus,
        actor: &str,
    ) -> Result<(Package, PackageStatus)> {
        let current = self.get(scope, id).await?;
        let next = apply_transition(&current, target, actor)?;
        let release_now = next.number_released && !current.number_released;

        let committed = self.store.update_if_version(next, current.version).await?;

        tracing::info!(
            package_id = %committed.id,
            mailroom = %committed.mailroom_id,
            number = committed.number,
            from = %current.status,
            to = %committed.status,
            actor,
            "Package transitioned"
        );

        // The slot is still in use here: only this commit flips
        // `number_released`, and resets never free a number an active
        // package holds. An error means the pool was edited behind the
        // engine's back with ReleaseNumber.
        if release_now {
            self.allocator
                .release(&committed.mailroom_id, committed.number)
                .inspect_err(|e| {
                    tracing::error!(
                        package_id = %committed.id,
                        error = %e,
                        "Package number was not in use at release; pool and packages disagree"
                    )
                })?;
        }

        Ok((committed, current.status))
    }

    /// Packages in the scoped mailroom that still hold their number, by number.
    pub async fn list_active(&self, scope: &MailroomScope) -> Result<Vec<Package>> {
        let mut active: Vec<Package> = self
            .store
            .list_by_mailroom(scope.mailroom())
            .await?
            .into_iter()
            .filter(Package::is_active)
            .collect();
        active.sort_by_key(|p| p.number);
        Ok(active)
    }
}
