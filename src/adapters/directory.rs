use crate::domain::model::{MailroomId, OrganizationId};
use crate::domain::ports::{OwnershipDirectory, ResidentDirectory};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Mailroom ownership fixed at startup, usually from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticOwnershipDirectory {
    owners: HashMap<MailroomId, OrganizationId>,
}

impl StaticOwnershipDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `organization` owns `mailroom`. A mailroom has a single
    /// owner; granting it again moves it.
    pub fn grant(&mut self, organization: OrganizationId, mailroom: MailroomId) {
        self.owners.insert(mailroom, organization);
    }
}

#[async_trait]
impl OwnershipDirectory for StaticOwnershipDirectory {
    async fn owns_mailroom(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
    ) -> Result<bool> {
        Ok(self.owners.get(mailroom) == Some(organization))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryResidentDirectory {
    residents: RwLock<HashMap<MailroomId, HashSet<String>>>,
}

impl InMemoryResidentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, mailroom: MailroomId, resident_id: impl Into<String>) {
        self.residents
            .write()
            .await
            .entry(mailroom)
            .or_default()
            .insert(resident_id.into());
    }
}

#[async_trait]
impl ResidentDirectory for InMemoryResidentDirectory {
    async fn resident_exists(&self, mailroom: &MailroomId, resident_id: &str) -> Result<bool> {
        Ok(self
            .residents
            .read()
            .await
            .get(mailroom)
            .map(|set| set.contains(resident_id))
            .unwrap_or(false))
    }
}

/// Treats every resident id as valid. Used by the simulation CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllResidents;

#[async_trait]
impl ResidentDirectory for AcceptAllResidents {
    async fn resident_exists(&self, _mailroom: &MailroomId, _resident_id: &str) -> Result<bool> {
        Ok(true)
    }
}
