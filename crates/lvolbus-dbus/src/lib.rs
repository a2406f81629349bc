//! D-Bus service publishing synthetic block devices for footprint measurements.
//!
//! The service claims `com.blah.storage` on the system bus, roots an
//! `org.freedesktop.DBus.ObjectManager` at `/`, and registers 603 objects
//! implementing `com.blah.storage.BlockDevice` at
//! `/com/blah/storage/block/<i>`. Every object carries 23 constant properties
//! and a `Hello` echo method. The `survey` module measures what a client
//! receives from any object-manager service.

pub mod interface;
pub mod service;
pub mod survey;

pub use interface::{BlockDevice, StorageManager, BLOCK_INTERFACE, MANAGER_INTERFACE};
pub use service::{
    connect, publish, register_objects, run_service, serve, validate, Bus, ServiceError,
};
pub use survey::{survey, ManagedObjects, PayloadSummary};
