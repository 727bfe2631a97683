pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::toml_config::EngineConfig;
pub use core::{allocator::Allocator, engine::MailroomEngine, router::TenantRouter};
pub use domain::model::{
    MailroomId, NewPackage, OrganizationId, Package, PackageId, PackageStatus, PoolStatus,
    MAX_PACKAGE_NUMBER,
};
pub use utils::error::{EngineError, Result};
