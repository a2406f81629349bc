use crate::interface::{BlockDevice, StorageManager};
use enumflags2::BitFlags;
use futures_util::StreamExt;
use lvolbus_schema::{BusKind, ConfigError, DeviceRecord, ServiceConfig};
use std::io::ErrorKind;
use thiserror::Error;
use tracing::{debug, info, trace};
use zbus::connection::Builder;
use zbus::fdo::{ObjectManager, RequestNameFlags, RequestNameReply};
use zbus::names::WellKnownName;
use zbus::zvariant::ObjectPath;
use zbus::{Connection, MessageStream};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to connect to {bus} bus: {source}")]
    Connect {
        bus: BusKind,
        #[source]
        source: zbus::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to acquire service name '{name}': {source}")]
    NameRequest {
        name: String,
        #[source]
        source: zbus::Error,
    },
    #[error("service name '{0}' is already owned by another connection")]
    NameTaken(String),
    #[error("failed to add object manager at {path}: {source}")]
    ObjectManager {
        path: String,
        #[source]
        source: zbus::Error,
    },
    #[error("failed to register object at {path}: {source}")]
    Register {
        path: String,
        #[source]
        source: zbus::Error,
    },
    #[error("an object is already registered at {0}")]
    DuplicatePath(String),
    #[error("bus serve loop failed: {0}")]
    Serve(#[source] zbus::Error),
    #[error("bus connection closed")]
    Disconnected,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The registration surface the startup sequence needs from a bus connection.
#[allow(async_fn_in_trait)]
pub trait Bus {
    async fn request_name(&self, name: &str, replace_existing: bool) -> Result<(), ServiceError>;

    async fn add_object_manager(&self, path: &str) -> Result<(), ServiceError>;

    async fn add_manager(&self, path: &str, manager: StorageManager) -> Result<(), ServiceError>;

    async fn add_device(&self, path: &str, device: BlockDevice) -> Result<(), ServiceError>;
}

impl Bus for Connection {
    async fn request_name(&self, name: &str, replace_existing: bool) -> Result<(), ServiceError> {
        let mut flags = BitFlags::from(RequestNameFlags::DoNotQueue);
        if replace_existing {
            flags |= RequestNameFlags::ReplaceExisting;
        }
        match self.request_name_with_flags(name, flags).await {
            Ok(RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner) => Ok(()),
            Ok(RequestNameReply::InQueue | RequestNameReply::Exists)
            | Err(zbus::Error::NameTaken) => Err(ServiceError::NameTaken(name.to_owned())),
            Err(source) => Err(ServiceError::NameRequest {
                name: name.to_owned(),
                source,
            }),
        }
    }

    async fn add_object_manager(&self, path: &str) -> Result<(), ServiceError> {
        let added = self
            .object_server()
            .at(path, ObjectManager)
            .await
            .map_err(|source| ServiceError::ObjectManager {
                path: path.to_owned(),
                source,
            })?;
        if !added {
            return Err(ServiceError::DuplicatePath(path.to_owned()));
        }
        Ok(())
    }

    async fn add_manager(&self, path: &str, manager: StorageManager) -> Result<(), ServiceError> {
        register(self, path, manager).await
    }

    async fn add_device(&self, path: &str, device: BlockDevice) -> Result<(), ServiceError> {
        register(self, path, device).await
    }
}

async fn register<I>(conn: &Connection, path: &str, iface: I) -> Result<(), ServiceError>
where
    I: zbus::object_server::Interface,
{
    let added = conn
        .object_server()
        .at(path, iface)
        .await
        .map_err(|source| ServiceError::Register {
            path: path.to_owned(),
            source,
        })?;
    if !added {
        return Err(ServiceError::DuplicatePath(path.to_owned()));
    }
    Ok(())
}

/// Check names and paths before touching the bus.
pub fn validate(config: &ServiceConfig) -> Result<(), ServiceError> {
    WellKnownName::try_from(config.service_name.as_str()).map_err(|e| {
        ServiceError::InvalidConfig(format!("service_name '{}': {e}", config.service_name))
    })?;
    for (field, path) in [
        ("object_root", config.object_root.as_str()),
        ("manager_path", config.manager_path.as_str()),
    ] {
        ObjectPath::try_from(path)
            .map_err(|e| ServiceError::InvalidConfig(format!("{field} '{path}': {e}")))?;
    }
    if config.device_count > 0 {
        let last = config.device_path(config.device_count - 1);
        ObjectPath::try_from(last.as_str())
            .map_err(|e| ServiceError::InvalidConfig(format!("device path '{last}': {e}")))?;
    }
    Ok(())
}

pub async fn connect(bus: BusKind) -> Result<Connection, ServiceError> {
    let builder = match bus {
        BusKind::System => Builder::system(),
        BusKind::Session => Builder::session(),
    }
    .map_err(|source| ServiceError::Connect { bus, source })?;
    builder
        .build()
        .await
        .map_err(|source| ServiceError::Connect { bus, source })
}

/// Register the object manager, the manager interface, and every block
/// object. Stops at the first failure.
pub async fn register_objects<B: Bus>(
    bus: &B,
    config: &ServiceConfig,
) -> Result<u32, ServiceError> {
    bus.add_object_manager(&config.manager_path).await?;
    bus.add_manager(
        &config.manager_path,
        StorageManager::new(config.device_count, config.object_root.clone()),
    )
    .await?;
    debug!("object manager at {}", config.manager_path);

    for index in 0..config.device_count {
        let path = config.device_path(index);
        bus.add_device(&path, BlockDevice::new(DeviceRecord::new(index)))
            .await?;
        trace!("registered {path}");
    }
    Ok(config.device_count)
}

/// Claim the service name, then register all objects. Nothing is registered
/// when the name cannot be acquired.
pub async fn publish<B: Bus>(bus: &B, config: &ServiceConfig) -> Result<u32, ServiceError> {
    bus.request_name(&config.service_name, config.replace_existing)
        .await?;
    info!("acquired service name {}", config.service_name);
    let count = register_objects(bus, config).await?;
    info!(
        "published {count} block objects under {}/block",
        config.object_root.trim_end_matches('/')
    );
    Ok(count)
}

/// Socket errors zbus reports when the other end has gone away.
fn is_hangup(err: &zbus::Error) -> bool {
    match err {
        zbus::Error::InputOutput(io) => matches!(
            io.kind(),
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

/// Drain incoming messages until the connection fails or closes. Dispatch
/// itself happens in the object server.
pub async fn serve(conn: &Connection) -> Result<(), ServiceError> {
    let mut stream = MessageStream::from(conn);
    info!("service ready, waiting for requests");
    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) if is_hangup(&err) => {
                debug!("peer hung up: {err}");
                return Err(ServiceError::Disconnected);
            }
            Err(err) => return Err(ServiceError::Serve(err)),
        };
        let header = msg.header();
        trace!(
            "message {:?} {:?} on {:?}",
            msg.message_type(),
            header.member(),
            header.path()
        );
    }
    Err(ServiceError::Disconnected)
}

/// Validate the config, connect, publish, and serve forever.
pub async fn run_service(config: &ServiceConfig) -> Result<(), ServiceError> {
    validate(config)?;
    let conn = connect(config.bus).await?;
    info!("connected to {} bus", config.bus);
    publish(&conn, config).await?;
    serve(&conn).await
}
