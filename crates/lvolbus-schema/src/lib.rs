//! Device records, property table, and service configuration for lvolbus.
//!
//! This crate is the bus-independent layer: the synthetic `DeviceRecord`
//! built for every published block object, the static `PROPERTY_TABLE`
//! describing how record fields appear on the bus, and `ServiceConfig`
//! loaded from TOML with the published constants as defaults.

pub mod config;
pub mod record;
pub mod table;

pub use config::{
    parse_config_file, parse_config_str, BusKind, ConfigError, ServiceConfig, DEVICE_COUNT,
    MANAGER_PATH, OBJECT_ROOT, SERVICE_NAME,
};
pub use record::{DeviceRecord, DEVICE_UUID};
pub use table::{descriptor, PropertyDescriptor, PropertyValue, WireType, PROPERTY_TABLE};
