use lvolbus_schema::DeviceRecord;
use tracing::debug;
use zbus::interface;

pub const BLOCK_INTERFACE: &str = "com.blah.storage.BlockDevice";
pub const MANAGER_INTERFACE: &str = "com.blah.storage.Manager";

/// A single published block object. Owns its record for the lifetime of the
/// registration.
pub struct BlockDevice {
    record: DeviceRecord,
}

impl BlockDevice {
    pub fn new(record: DeviceRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &DeviceRecord {
        &self.record
    }
}

// Property names and types follow `lvolbus_schema::PROPERTY_TABLE`; the
// introspection test keeps the two in step.
#[allow(clippy::unused_async)]
#[interface(name = "com.blah.storage.BlockDevice")]
impl BlockDevice {
    async fn hello(&self, value: String) -> String {
        debug!("D-Bus: Hello on {}", self.record.name);
        value
    }

    #[zbus(property(emits_changed_signal = "const"), name = "Name")]
    async fn device_name(&self) -> &str {
        &self.record.name
    }

    #[zbus(property(emits_changed_signal = "const"), name = "Uuid")]
    async fn uuid(&self) -> &str {
        self.record.uuid
    }

    #[zbus(property(emits_changed_signal = "const"), name = "SomeCount")]
    async fn some_count(&self) -> u32 {
        self.record.some_count
    }

    #[zbus(property(emits_changed_signal = "const"), name = "U64_0")]
    async fn u64_0(&self) -> u64 {
        self.record.counters[0]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "U64_1")]
    async fn u64_1(&self) -> u64 {
        self.record.counters[1]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "U64_2")]
    async fn u64_2(&self) -> u64 {
        self.record.counters[2]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "U64_3")]
    async fn u64_3(&self) -> u64 {
        self.record.counters[3]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "U64_4")]
    async fn u64_4(&self) -> u64 {
        self.record.counters[4]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "U64_5")]
    async fn u64_5(&self) -> u64 {
        self.record.counters[5]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "b_0")]
    async fn b_0(&self) -> bool {
        self.record.flags[0]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "b_1")]
    async fn b_1(&self) -> bool {
        self.record.flags[1]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "b_2")]
    async fn b_2(&self) -> bool {
        self.record.flags[2]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "b_3")]
    async fn b_3(&self) -> bool {
        self.record.flags[3]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "b_4")]
    async fn b_4(&self) -> bool {
        self.record.flags[4]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "b_5")]
    async fn b_5(&self) -> bool {
        self.record.flags[5]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "string_d_0")]
    async fn string_d_0(&self) -> &str {
        &self.record.descriptions[0]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "string_d_1")]
    async fn string_d_1(&self) -> &str {
        &self.record.descriptions[1]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "string_d_2")]
    async fn string_d_2(&self) -> &str {
        &self.record.descriptions[2]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "string_d_3")]
    async fn string_d_3(&self) -> &str {
        &self.record.descriptions[3]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "string_d_4")]
    async fn string_d_4(&self) -> &str {
        &self.record.descriptions[4]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "string_d_5")]
    async fn string_d_5(&self) -> &str {
        &self.record.descriptions[5]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "string_d_6")]
    async fn string_d_6(&self) -> &str {
        &self.record.descriptions[6]
    }

    #[zbus(property(emits_changed_signal = "const"), name = "string_d_7")]
    async fn string_d_7(&self) -> &str {
        &self.record.descriptions[7]
    }
}

/// Service-level object living next to the object manager.
pub struct StorageManager {
    version: String,
    device_count: u32,
    object_root: String,
}

impl StorageManager {
    pub fn new(device_count: u32, object_root: String) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            device_count,
            object_root,
        }
    }
}

#[allow(clippy::unused_async)]
#[interface(name = "com.blah.storage.Manager")]
impl StorageManager {
    async fn version(&self) -> String {
        debug!("D-Bus: Version");
        self.version.clone()
    }

    #[zbus(property(emits_changed_signal = "const"))]
    async fn device_count(&self) -> u32 {
        self.device_count
    }

    #[zbus(property(emits_changed_signal = "const"))]
    async fn object_root(&self) -> &str {
        &self.object_root
    }
}
