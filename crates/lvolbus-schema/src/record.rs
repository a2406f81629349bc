//! The synthetic device record published for every block object.

use crate::table::{PropertyValue, PROPERTY_TABLE};

/// UUID shared by every published device.
pub const DEVICE_UUID: &str = "kQ1BLF-iBTn-FiHR-x8yI-DEqt-Kyd4-JfbadZ";

/// Number of `u64` counters carried by a record.
pub const COUNTER_COUNT: usize = 6;
/// Number of boolean flags carried by a record.
pub const FLAG_COUNT: usize = 6;
/// Number of descriptive strings carried by a record.
pub const DESCRIPTION_COUNT: usize = 8;

const SOME_COUNT_BASE: u32 = 10;

/// One block device as seen on the bus. Built once at startup and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub index: u32,
    pub name: String,
    pub uuid: &'static str,
    pub some_count: u32,
    pub counters: [u64; COUNTER_COUNT],
    pub flags: [bool; FLAG_COUNT],
    pub descriptions: [String; DESCRIPTION_COUNT],
}

impl DeviceRecord {
    /// Build the record for generation index `index`.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            name: format!("lvol{index}"),
            uuid: DEVICE_UUID,
            some_count: SOME_COUNT_BASE.wrapping_add(index),
            counters: std::array::from_fn(|k| k as u64),
            flags: [true; FLAG_COUNT],
            descriptions: std::array::from_fn(|k| format!("some bogus data here {k}")),
        }
    }

    /// Walk the property table in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&'static str, PropertyValue<'_>)> + '_ {
        PROPERTY_TABLE
            .iter()
            .map(move |desc| (desc.name, (desc.get)(self)))
    }

    /// Look up a single property by its bus-visible name.
    pub fn property(&self, name: &str) -> Option<PropertyValue<'_>> {
        PROPERTY_TABLE
            .iter()
            .find(|desc| desc.name == name)
            .map(|desc| (desc.get)(self))
    }
}
