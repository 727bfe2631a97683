use crate::domain::model::{MailroomId, Package, PackageId};
use crate::domain::ports::PackageStore;
use crate::utils::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Package records kept in process memory. Records are never removed.
#[derive(Debug, Default)]
pub struct InMemoryPackageStore {
    packages: RwLock<HashMap<PackageId, Package>>,
}

impl InMemoryPackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.packages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.packages.read().await.is_empty()
    }
}

#[async_trait]
impl PackageStore for InMemoryPackageStore {
    async fn insert(&self, package: Package) -> Result<()> {
        let mut packages = self.packages.write().await;
        if packages.contains_key(&package.id) {
            return Err(EngineError::storage(format!(
                "package {} already exists",
                package.id
            )));
        }
        packages.insert(package.id, package);
        Ok(())
    }

    async fn get(&self, id: &PackageId) -> Result<Option<Package>> {
        Ok(self.packages.read().await.get(id).cloned())
    }

    async fn update_if_version(&self, package: Package, expected_version: u64) -> Result<Package> {
        let mut packages = self.packages.write().await;
        let stored = packages
            .get_mut(&package.id)
            .ok_or(EngineError::PackageNotFound(package.id))?;

        if stored.version != expected_version {
            return Err(EngineError::Conflict {
                package: package.id,
                expected: expected_version,
                found: stored.version,
            });
        }

        *stored = package.clone();
        Ok(package)
    }

    async fn list_by_mailroom(&self, mailroom: &MailroomId) -> Result<Vec<Package>> {
        Ok(self
            .packages
            .read()
            .await
            .values()
            .filter(|p| &p.mailroom_id == mailroom)
            .cloned()
            .collect())
    }
}
