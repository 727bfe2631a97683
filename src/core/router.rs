//! Tenant guard.
//!
//! Every engine operation first obtains a [`MailroomScope`] from the router.
//! A scope can only be built after the ownership directory confirmed that the
//! organization owns the mailroom, so holding one is proof of authorization.

use crate::domain::model::{MailroomId, OrganizationId, Package};
use crate::domain::ports::OwnershipDirectory;
use crate::utils::error::{EngineError, Result};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailroomScope {
    organization: OrganizationId,
    mailroom: MailroomId,
}

impl MailroomScope {
    pub fn organization(&self) -> &OrganizationId {
        &self.organization
    }

    pub fn mailroom(&self) -> &MailroomId {
        &self.mailroom
    }

    /// Reject packages that live outside this scope.
    pub fn check_package(&self, package: &Package) -> Result<()> {
        if package.mailroom_id == self.mailroom && package.organization_id == self.organization {
            return Ok(());
        }

        tracing::warn!(
            target: "security",
            organization = %self.organization,
            mailroom = %self.mailroom,
            package_id = %package.id,
            package_mailroom = %package.mailroom_id,
            "Cross-tenant package access rejected"
        );
        Err(EngineError::CrossTenant {
            organization: self.organization.clone(),
            mailroom: package.mailroom_id.clone(),
        })
    }
}

#[derive(Clone)]
pub struct TenantRouter {
    directory: Arc<dyn OwnershipDirectory>,
}

impl TenantRouter {
    pub fn new(directory: Arc<dyn OwnershipDirectory>) -> Self {
        Self { directory }
    }

    pub async fn scope(
        &self,
        organization: &OrganizationId,
        mailroom: &MailroomId,
    ) -> Result<MailroomScope> {
        if self.directory.owns_mailroom(organization, mailroom).await? {
            return Ok(MailroomScope {
                organization: organization.clone(),
                mailroom: mailroom.clone(),
            });
        }

        tracing::warn!(
            target: "security",
            organization = %organization,
            mailroom = %mailroom,
            "Cross-tenant mailroom access rejected"
        );
        Err(EngineError::CrossTenant {
            organization: organization.clone(),
            mailroom: mailroom.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::directory::StaticOwnershipDirectory;

    fn router() -> TenantRouter {
        let mut directory = StaticOwnershipDirectory::new();
        directory.grant(OrganizationId::new("org-a"), MailroomId::new("mr-a"));
        directory.grant(OrganizationId::new("org-b"), MailroomId::new("mr-b"));
        TenantRouter::new(Arc::new(directory))
    }

    #[tokio::test]
    async fn test_owner_gets_scope() {
        let scope = router()
            .scope(&OrganizationId::new("org-a"), &MailroomId::new("mr-a"))
            .await
            .unwrap();
        assert_eq!(scope.mailroom().as_str(), "mr-a");
        assert_eq!(scope.organization().as_str(), "org-a");
    }

    #[tokio::test]
    async fn test_foreign_mailroom_rejected() {
        let result = router()
            .scope(&OrganizationId::new("org-a"), &MailroomId::new("mr-b"))
            .await;
        assert!(matches!(result, Err(EngineError::CrossTenant { .. })));
    }

    #[tokio::test]
    async fn test_unknown_mailroom_rejected_like_foreign_one() {
        let result = router()
            .scope(&OrganizationId::new("org-a"), &MailroomId::new("nope"))
            .await;
        assert!(matches!(result, Err(EngineError::CrossTenant { .. })));
    }
}
