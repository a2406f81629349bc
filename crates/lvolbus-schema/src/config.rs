use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Well-known name claimed on the bus.
pub const SERVICE_NAME: &str = "com.blah.storage";
/// Object path prefix the block devices are published under.
pub const OBJECT_ROOT: &str = "/com/blah/storage";
/// Path of the `org.freedesktop.DBus.ObjectManager` node.
pub const MANAGER_PATH: &str = "/";
/// Number of block objects published at startup.
pub const DEVICE_COUNT: u32 = 603;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Which message bus the service connects to.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    System,
    Session,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Session => f.write_str("session"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default)]
    pub bus: BusKind,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_object_root")]
    pub object_root: String,
    #[serde(default = "default_manager_path")]
    pub manager_path: String,
    #[serde(default = "default_device_count")]
    pub device_count: u32,
    /// Take the name over from its current owner if that owner allows it.
    #[serde(default)]
    pub replace_existing: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bus: BusKind::default(),
            service_name: default_service_name(),
            object_root: default_object_root(),
            manager_path: default_manager_path(),
            device_count: default_device_count(),
            replace_existing: false,
        }
    }
}

impl ServiceConfig {
    /// Object path of the block device with generation index `index`.
    pub fn device_path(&self, index: u32) -> String {
        format!("{}/block/{index}", self.object_root.trim_end_matches('/'))
    }
}

fn default_service_name() -> String {
    SERVICE_NAME.to_owned()
}

fn default_object_root() -> String {
    OBJECT_ROOT.to_owned()
}

fn default_manager_path() -> String {
    MANAGER_PATH.to_owned()
}

fn default_device_count() -> u32 {
    DEVICE_COUNT
}

pub fn parse_config_str(input: &str) -> Result<ServiceConfig, ConfigError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
