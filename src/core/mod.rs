pub mod allocator;
pub mod engine;
pub mod lifecycle;
pub mod pool;
pub mod router;

pub use crate::domain::model::{
    MailroomId, NewPackage, OrganizationId, Package, PackageId, PackageStatus, PoolStatus,
};
pub use crate::domain::ports::{
    EngineEvent, EventSink, Notifier, OwnershipDirectory, PackageStore, ResidentDirectory,
};
pub use crate::utils::error::Result;
