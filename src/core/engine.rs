use crate::core::allocator::Allocator;
use crate::core::lifecycle::{new_package, LifecycleManager};
use crate::core::router::{MailroomScope, TenantRouter};
use crate::domain::model::{
    MailroomId, NewPackage, OrganizationId, Package, PackageId, PackageStatus, PoolStatus,
};
use crate::domain::ports::{
    EngineEvent, EventSink, OwnershipDirectory, PackageStore, ResidentDirectory,
};
use crate::utils::error::{EngineError, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Sink used when nobody listens for events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: EngineEvent) {}
}

/// Entry point for every inbound operation. Each call is routed through the
/// tenant guard before it reaches the allocator or the lifecycle manager.
pub struct MailroomEngine<S: PackageStore> {
    router: TenantRouter,
    allocator: Arc<Allocator>,
    lifecycle: LifecycleManager<S>,
    residents: Arc<dyn ResidentDirectory>,
    events: Arc<dyn EventSink>,
}

impl<S: PackageStore> MailroomEngine<S> {
    pub fn new(
        store: Arc<S>,
        ownership: Arc<dyn OwnershipDirectory>,
        residents: Arc<dyn ResidentDirectory>,
    ) -> Self {
        let allocator = Arc::new(Allocator::new());
        Self {
            router: TenantRouter::new(ownership),
            lifecycle: LifecycleManager::new(store, Arc::clone(&allocator)),
            allocator,
            residents,
            events: Arc::new(NullEventSink),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    pub fn store(&self) -> &Arc<S> {
        self.lifecycle.store()
    }

    async fn scope(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
    ) -> Result<MailroomScope> {
        self.router.scope(organization, mailroom).await
    }

    pub async fn initialize_pool(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
    ) -> Result<()> {
        let scope = self.scope(organization, mailroom).await?;
        self.allocator.initialize_pool(scope.mailroom())
    }

    pub async fn allocate_number(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
    ) -> Result<u16> {
        let scope = self.scope(organization, mailroom).await?;
        self.allocator
            .allocate(scope.mailroom())
            .inspect_err(|e| self.allocation_failed(scope.mailroom(), e))
    }

    pub async fn release_number(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
        number: u16,
    ) -> Result<()> {
        let scope = self.scope(organization, mailroom).await?;
        self.allocator.release(scope.mailroom(), number)
    }

    pub async fn pool_status(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
    ) -> Result<PoolStatus> {
        let scope = self.scope(organization, mailroom).await?;
        self.allocator.status(scope.mailroom(), false)
    }

    /// Pool status including the state of every slot.
    pub async fn pool_slots(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
    ) -> Result<PoolStatus> {
        let scope = self.scope(organization, mailroom).await?;
        self.allocator.status(scope.mailroom(), true)
    }

    /// Administrative reset. Frees leaked numbers, meaning numbers in use
    /// that no active package holds. Returns how many were freed.
    pub async fn reset_pool(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
    ) -> Result<usize> {
        let scope = self.scope(organization, mailroom).await?;
        let _maintenance = self.allocator.maintenance_gate(scope.mailroom()).await?;

        let held: BTreeSet<u16> = self
            .lifecycle
            .list_active(&scope)
            .await?
            .iter()
            .map(|package| package.number)
            .collect();
        self.allocator.reset(scope.mailroom(), &held)
    }

    /// Allocate a number and persist a WAITING package bound to it.
    ///
    /// If anything after the allocation fails, the number is back in the pool
    /// before the error is returned.
    pub async fn register_package(
        &self,
        organization: &OrganizationId,
        request: NewPackage,
    ) -> Result<Package> {
        let scope = self.scope(organization, &request.mailroom_id).await?;

        match self.register_in_scope(&scope, &request).await {
            Ok(package) => {
                self.events.publish(EngineEvent::PackageRegistered {
                    package_id: package.id,
                    mailroom: package.mailroom_id.clone(),
                    number: package.number,
                    resident_id: package.resident_id.clone(),
                    provider: package.provider.clone(),
                    at: package.created_at,
                });
                Ok(package)
            }
            Err(e) => {
                self.allocation_failed(scope.mailroom(), &e);
                Err(e)
            }
        }
    }

    async fn register_in_scope(
        &self,
        scope: &MailroomScope,
        request: &NewPackage,
    ) -> Result<Package> {
        // declared before the guard so a rollback happens while the gate is held
        let _gate = self.allocator.package_gate(scope.mailroom()).await?;
        let guard = self.allocator.allocate_guarded(scope.mailroom())?;

        if !self
            .residents
            .resident_exists(scope.mailroom(), &request.resident_id)
            .await?
        {
            return Err(EngineError::ResidentNotFound {
                mailroom: scope.mailroom().clone(),
                resident: request.resident_id.clone(),
            });
        }

        let package = new_package(scope.organization(), request, guard.number());
        let package = self.lifecycle.create(package).await?;
        guard.commit();
        Ok(package)
    }

    pub async fn transition_package(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
        package_id: &PackageId,
        target: PackageStatus,
        actor: &str,
    ) -> Result<Package> {
        let scope = self.scope(organization, mailroom).await?;
        let gate = self.allocator.package_gate(scope.mailroom()).await?;
        let (package, from) = self
            .lifecycle
            .transition(&scope, package_id, target, actor)
            .await?;
        drop(gate);

        self.events.publish(EngineEvent::PackageTransitioned {
            package_id: package.id,
            mailroom: package.mailroom_id.clone(),
            number: package.number,
            from,
            to: package.status,
            actor: actor.to_string(),
            at: package.last_stamp(),
        });
        Ok(package)
    }

    pub async fn get_package(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
        package_id: &PackageId,
    ) -> Result<Package> {
        let scope = self.scope(organization, mailroom).await?;
        self.lifecycle.get(&scope, package_id).await
    }

    pub async fn list_active_packages(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
    ) -> Result<Vec<Package>> {
        let scope = self.scope(organization, mailroom).await?;
        self.lifecycle.list_active(&scope).await
    }

    fn allocation_failed(&self, mailroom: &MailroomId, error: &EngineError) {
        self.events.publish(EngineEvent::AllocationFailed {
            mailroom: mailroom.clone(),
            reason: error.to_string(),
            at: Utc::now(),
        });
    }
}
