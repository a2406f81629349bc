//! Payload-size survey of a D-Bus service that implements
//! `org.freedesktop.DBus.ObjectManager`.
//!
//! Fetches `GetManagedObjects` and tallies what a client receives: how many
//! strings, integers, booleans and so on, and how many bytes of data they
//! carry. Marshalling overhead (padding, signatures, headers) is not counted.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};
use zbus::names::OwnedInterfaceName;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};
use zbus::Connection;

const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";

/// Reply body of `GetManagedObjects`.
pub type ManagedObjects =
    HashMap<OwnedObjectPath, HashMap<OwnedInterfaceName, HashMap<String, OwnedValue>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PayloadSummary {
    pub objects: u64,
    pub object_paths: u64,
    pub object_path_bytes: u64,
    pub interfaces: u64,
    pub interface_bytes: u64,
    pub strings: u64,
    pub string_bytes: u64,
    pub booleans: u64,
    pub bytes: u64,
    pub u32s: u64,
    pub i32s: u64,
    pub u64s: u64,
    pub i64s: u64,
    pub doubles: u64,
    pub dict_keys: u64,
    pub dict_key_bytes: u64,
    pub unknown: u64,
}

impl PayloadSummary {
    /// Entries without interfaces are skipped. zbus lists the bare
    /// intermediate nodes between the manager and its objects that way.
    pub fn from_managed_objects(objects: &ManagedObjects) -> Self {
        let mut summary = Self::default();
        for (path, interfaces) in objects {
            if interfaces.is_empty() {
                continue;
            }
            summary.objects += 1;
            summary.object_paths += 1;
            summary.object_path_bytes += path.as_str().len() as u64;
            for (name, props) in interfaces {
                summary.interfaces += 1;
                summary.interface_bytes += name.as_str().len() as u64;
                for value in props.values() {
                    summary.tally(value);
                }
            }
        }
        summary
    }

    /// Count one value, walking containers.
    pub fn tally(&mut self, value: &Value<'_>) {
        match value {
            Value::Str(s) => {
                self.strings += 1;
                self.string_bytes += s.as_str().len() as u64;
            }
            Value::Bool(_) => self.booleans += 1,
            Value::ObjectPath(p) => {
                self.object_paths += 1;
                self.object_path_bytes += p.as_str().len() as u64;
            }
            Value::U8(_) => self.bytes += 1,
            Value::U32(_) => self.u32s += 1,
            Value::I32(_) => self.i32s += 1,
            Value::U64(_) => self.u64s += 1,
            Value::I64(_) => self.i64s += 1,
            Value::F64(_) => self.doubles += 1,
            Value::Value(inner) => self.tally(inner),
            Value::Array(array) => {
                for item in array.iter() {
                    self.tally(item);
                }
            }
            Value::Structure(structure) => {
                for field in structure.fields() {
                    self.tally(field);
                }
            }
            Value::Dict(dict) => {
                for (key, item) in dict.iter() {
                    self.dict_keys += 1;
                    self.dict_key_bytes += key_len(key);
                    self.tally(item);
                }
            }
            other => {
                debug!("not counted: {}", other.value_signature());
                self.unknown += 1;
            }
        }
    }

    /// Bytes occupied by fixed-width values.
    pub fn fixed_len_bytes(&self) -> u64 {
        self.booleans
            + self.bytes
            + (self.u32s + self.i32s) * 4
            + (self.u64s + self.i64s + self.doubles) * 8
    }

    /// Bytes occupied by strings, interface names, dictionary keys and paths.
    pub fn variable_len_bytes(&self) -> u64 {
        self.string_bytes + self.interface_bytes + self.dict_key_bytes + self.object_path_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.fixed_len_bytes() + self.variable_len_bytes()
    }

    pub fn average_per_object(&self) -> u64 {
        self.total_bytes().checked_div(self.objects).unwrap_or(0)
    }
}

fn key_len(key: &Value<'_>) -> u64 {
    match key {
        Value::Str(s) => s.as_str().len() as u64,
        Value::ObjectPath(p) => p.as_str().len() as u64,
        _ => 0,
    }
}

impl fmt::Display for PayloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "We retrieved {} objects", self.objects)?;
        writeln!(f, "Size fixed len data = {}", self.fixed_len_bytes())?;
        writeln!(
            f,
            "Size variable len data (strings) = {}",
            self.variable_len_bytes()
        )?;
        writeln!(f, "Total bytes {}", self.total_bytes())?;
        write!(f, "Average bytes per object {}", self.average_per_object())
    }
}

/// Fetch the managed objects below `path` and summarize them. `destination`
/// is `None` on peer-to-peer connections.
pub async fn survey(
    conn: &Connection,
    destination: Option<&str>,
    path: &str,
) -> zbus::Result<PayloadSummary> {
    info!("surveying {} at {path}", destination.unwrap_or("<peer>"));
    let reply = conn
        .call_method(
            destination,
            path,
            Some(OBJECT_MANAGER_INTERFACE),
            "GetManagedObjects",
            &(),
        )
        .await?;
    let objects: ManagedObjects = reply.body().deserialize()?;
    Ok(PayloadSummary::from_managed_objects(&objects))
}
