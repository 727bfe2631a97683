#![allow(dead_code)]

use mailroom_engine::adapters::{
    AcceptAllResidents, InMemoryPackageStore, InMemoryResidentDirectory, StaticOwnershipDirectory,
};
use mailroom_engine::domain::ports::{EngineEvent, EventSink, PackageStore, ResidentDirectory};
use mailroom_engine::{MailroomEngine, MailroomId, NewPackage, OrganizationId};
use std::sync::{Arc, Mutex};

pub const ORG_A: &str = "north";
pub const ORG_B: &str = "south";
/// Owned by ORG_A.
pub const MAILROOM_A: &str = "north-hall";
/// Also owned by ORG_A.
pub const MAILROOM_A2: &str = "west-hall";
/// Owned by ORG_B.
pub const MAILROOM_B: &str = "south-hall";

pub fn org(id: &str) -> OrganizationId {
    OrganizationId::new(id)
}

pub fn mailroom(id: &str) -> MailroomId {
    MailroomId::new(id)
}

pub fn ownership() -> Arc<StaticOwnershipDirectory> {
    let mut directory = StaticOwnershipDirectory::new();
    directory.grant(org(ORG_A), mailroom(MAILROOM_A));
    directory.grant(org(ORG_A), mailroom(MAILROOM_A2));
    directory.grant(org(ORG_B), mailroom(MAILROOM_B));
    Arc::new(directory)
}

pub fn request(mailroom_id: &str, resident: &str) -> NewPackage {
    NewPackage {
        mailroom_id: mailroom(mailroom_id),
        resident_id: resident.to_string(),
        staff_id: "staff-front-desk".to_string(),
        provider: Some("USPS".to_string()),
    }
}

/// Records every published event.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub async fn provision<S: PackageStore>(engine: &MailroomEngine<S>) {
    for (o, m) in [(ORG_A, MAILROOM_A), (ORG_A, MAILROOM_A2), (ORG_B, MAILROOM_B)] {
        engine.initialize_pool(&org(o), &mailroom(m)).await.unwrap();
    }
}

pub async fn engine_with_store<S: PackageStore>(
    store: Arc<S>,
    residents: Arc<dyn ResidentDirectory>,
) -> MailroomEngine<S> {
    let engine = MailroomEngine::new(store, ownership(), residents);
    provision(&engine).await;
    engine
}

/// Provisioned engine backed by the in-memory store that accepts any resident.
pub async fn engine() -> MailroomEngine<InMemoryPackageStore> {
    engine_with_store(Arc::new(InMemoryPackageStore::new()), Arc::new(AcceptAllResidents)).await
}

pub async fn engine_with_residents(
    residents: Arc<InMemoryResidentDirectory>,
) -> MailroomEngine<InMemoryPackageStore> {
    engine_with_store(Arc::new(InMemoryPackageStore::new()), residents).await
}
