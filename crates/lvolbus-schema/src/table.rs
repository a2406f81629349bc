//! Static property table binding record fields to bus-visible names.
//!
//! The table is the single source of truth for property names, wire types and
//! order. The zbus interface exposes exactly these properties.

use crate::record::DeviceRecord;
use serde::Serialize;
use std::fmt;

/// D-Bus wire type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireType {
    Str,
    U32,
    U64,
    Bool,
}

impl WireType {
    /// Single-character D-Bus type signature.
    pub fn signature(self) -> &'static str {
        match self {
            Self::Str => "s",
            Self::U32 => "u",
            Self::U64 => "t",
            Self::Bool => "b",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signature())
    }
}

/// A property value borrowed from a [`DeviceRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue<'a> {
    Str(&'a str),
    U32(u32),
    U64(u64),
    Bool(bool),
}

impl PropertyValue<'_> {
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Str(_) => WireType::Str,
            Self::U32(_) => WireType::U32,
            Self::U64(_) => WireType::U64,
            Self::Bool(_) => WireType::Bool,
        }
    }
}

/// One read-only, constant property.
#[derive(Clone, Copy)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub wire_type: WireType,
    pub get: fn(&DeviceRecord) -> PropertyValue<'_>,
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("wire_type", &self.wire_type)
            .finish_non_exhaustive()
    }
}

pub const PROPERTY_COUNT: usize = 23;

macro_rules! counter {
    ($name:literal, $k:literal) => {
        PropertyDescriptor {
            name: $name,
            wire_type: WireType::U64,
            get: |r| PropertyValue::U64(r.counters[$k]),
        }
    };
}

macro_rules! flag {
    ($name:literal, $k:literal) => {
        PropertyDescriptor {
            name: $name,
            wire_type: WireType::Bool,
            get: |r| PropertyValue::Bool(r.flags[$k]),
        }
    };
}

macro_rules! description {
    ($name:literal, $k:literal) => {
        PropertyDescriptor {
            name: $name,
            wire_type: WireType::Str,
            get: |r| PropertyValue::Str(&r.descriptions[$k]),
        }
    };
}

pub static PROPERTY_TABLE: [PropertyDescriptor; PROPERTY_COUNT] = [
    PropertyDescriptor {
        name: "Name",
        wire_type: WireType::Str,
        get: |r| PropertyValue::Str(&r.name),
    },
    PropertyDescriptor {
        name: "Uuid",
        wire_type: WireType::Str,
        get: |r| PropertyValue::Str(r.uuid),
    },
    PropertyDescriptor {
        name: "SomeCount",
        wire_type: WireType::U32,
        get: |r| PropertyValue::U32(r.some_count),
    },
    counter!("U64_0", 0),
    counter!("U64_1", 1),
    counter!("U64_2", 2),
    counter!("U64_3", 3),
    counter!("U64_4", 4),
    counter!("U64_5", 5),
    flag!("b_0", 0),
    flag!("b_1", 1),
    flag!("b_2", 2),
    flag!("b_3", 3),
    flag!("b_4", 4),
    flag!("b_5", 5),
    description!("string_d_0", 0),
    description!("string_d_1", 1),
    description!("string_d_2", 2),
    description!("string_d_3", 3),
    description!("string_d_4", 4),
    description!("string_d_5", 5),
    description!("string_d_6", 6),
    description!("string_d_7", 7),
];

/// Find a descriptor by its bus-visible name.
pub fn descriptor(name: &str) -> Option<&'static PropertyDescriptor> {
    PROPERTY_TABLE.iter().find(|desc| desc.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = PROPERTY_TABLE.iter().map(|d| d.name).collect();
        assert_eq!(names.len(), PROPERTY_COUNT);
    }

    #[test]
    fn type_mix_matches_layout() {
        let count = |t: WireType| PROPERTY_TABLE.iter().filter(|d| d.wire_type == t).count();
        assert_eq!(count(WireType::Str), 2 + 8);
        assert_eq!(count(WireType::U32), 1);
        assert_eq!(count(WireType::U64), 6);
        assert_eq!(count(WireType::Bool), 6);
    }

    #[test]
    fn accessors_agree_with_declared_types() {
        let record = DeviceRecord::new(5);
        for desc in &PROPERTY_TABLE {
            assert_eq!((desc.get)(&record).wire_type(), desc.wire_type, "{}", desc.name);
        }
    }

    #[test]
    fn signatures() {
        assert_eq!(WireType::Str.signature(), "s");
        assert_eq!(WireType::U32.signature(), "u");
        assert_eq!(WireType::U64.signature(), "t");
        assert_eq!(WireType::Bool.signature(), "b");
    }

    #[test]
    fn descriptor_lookup() {
        assert_eq!(descriptor("SomeCount").unwrap().wire_type, WireType::U32);
        assert!(descriptor("some_count").is_none());
    }

    #[test]
    fn values_serialize_untagged() {
        let record = DeviceRecord::new(1);
        let json = serde_json::to_value(record.property("SomeCount").unwrap()).unwrap();
        assert_eq!(json, serde_json::json!(11));
        let json = serde_json::to_value(record.property("b_0").unwrap()).unwrap();
        assert_eq!(json, serde_json::json!(true));
    }
}
