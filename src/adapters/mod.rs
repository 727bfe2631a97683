// Adapters layer: concrete implementations of the domain ports.

pub mod directory;
pub mod events;
pub mod memory;

pub use directory::{AcceptAllResidents, InMemoryResidentDirectory, StaticOwnershipDirectory};
pub use events::{ChannelEventSink, LoggingNotifier, NotificationWorker};
pub use memory::InMemoryPackageStore;
