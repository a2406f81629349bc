//! Block objects served over a peer-to-peer zbus connection.
//!
//! The server end registers the object manager and every block object the
//! same way the service does on the system bus. The client end of the socket
//! pair calls into them. No bus daemon is involved.

use lvolbus_dbus::{
    register_objects, serve, survey, ManagedObjects, ServiceError, BLOCK_INTERFACE,
    MANAGER_INTERFACE,
};
use lvolbus_schema::{DeviceRecord, PropertyValue, ServiceConfig};
use std::collections::HashMap;
use std::os::unix::net::UnixStream;
use std::time::Duration;
use zbus::connection::Builder;
use zbus::zvariant::{OwnedValue, Value};
use zbus::{Connection, Guid};

const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";

async fn peer_pair() -> (Connection, Connection) {
    let guid = Guid::generate();
    let (server_sock, client_sock) = UnixStream::pair().unwrap();
    let server = Builder::async_io_unix_stream(server_sock)
        .server(guid)
        .unwrap()
        .p2p()
        .build();
    let client = Builder::async_io_unix_stream(client_sock).p2p().build();
    futures_util::try_join!(server, client).unwrap()
}

/// Server with the default configuration registered, plus a client.
async fn start_service() -> (Connection, Connection, ServiceConfig) {
    let (server, client) = peer_pair().await;
    let config = ServiceConfig::default();
    let count = register_objects(&server, &config).await.unwrap();
    assert_eq!(count, 603);
    (server, client, config)
}

async fn hello(client: &Connection, path: &str, body: &str) -> zbus::Result<String> {
    let reply = client
        .call_method(None::<&str>, path, Some(BLOCK_INTERFACE), "Hello", &(body,))
        .await?;
    let echoed: String = reply.body().deserialize()?;
    Ok(echoed)
}

fn assert_value(name: &str, actual: &Value<'_>, expected: PropertyValue<'_>) {
    match (actual, expected) {
        (Value::Str(s), PropertyValue::Str(e)) => assert_eq!(s.as_str(), e, "{name}"),
        (Value::U32(v), PropertyValue::U32(e)) => assert_eq!(*v, e, "{name}"),
        (Value::U64(v), PropertyValue::U64(e)) => assert_eq!(*v, e, "{name}"),
        (Value::Bool(v), PropertyValue::Bool(e)) => assert_eq!(*v, e, "{name}"),
        (other, e) => panic!("{name}: got {other:?}, expected {e:?}"),
    }
}

#[tokio::test]
async fn hello_echoes_argument() {
    let (_server, client, config) = start_service().await;
    let path = config.device_path(17);
    assert_eq!(hello(&client, &path, "ping").await.unwrap(), "ping");
    assert_eq!(hello(&client, &path, "").await.unwrap(), "");
}

#[tokio::test]
async fn hello_with_wrong_argument_type_is_an_error_reply() {
    let (_server, client, config) = start_service().await;
    let path = config.device_path(0);

    let result = client
        .call_method(
            None::<&str>,
            path.as_str(),
            Some(BLOCK_INTERFACE),
            "Hello",
            &(42u32,),
        )
        .await;
    match result {
        Err(zbus::Error::MethodError(name, detail, _)) => {
            assert_eq!(name.as_str(), "org.freedesktop.zbus.Error");
            assert!(detail.is_some_and(|d| d.contains("Signature")));
        }
        other => panic!("expected an error reply, got {other:?}"),
    }

    // The object keeps answering after a bad call.
    assert_eq!(hello(&client, &path, "still here").await.unwrap(), "still here");
}

#[tokio::test]
async fn object_manager_lists_every_block() {
    let (_server, client, config) = start_service().await;
    let reply = client
        .call_method(
            None::<&str>,
            config.manager_path.as_str(),
            Some(OBJECT_MANAGER_INTERFACE),
            "GetManagedObjects",
            &(),
        )
        .await
        .unwrap();
    let objects: ManagedObjects = reply.body().deserialize().unwrap();

    // zbus also lists the bare nodes between `/` and the blocks, with no
    // interfaces.
    let block_parent = format!("{}/block", config.object_root);
    let (blocks, bare): (Vec<_>, Vec<_>) =
        objects.iter().partition(|(_, ifaces)| !ifaces.is_empty());
    for (path, _) in &bare {
        assert!(block_parent.starts_with(path.as_str()), "{path}");
    }

    assert_eq!(blocks.len(), config.device_count as usize);
    for (path, ifaces) in &blocks {
        assert_eq!(ifaces.len(), 1, "{path}");
        assert!(ifaces.keys().all(|name| name.as_str() == BLOCK_INTERFACE));
    }
    for i in 0..config.device_count {
        let path = config.device_path(i);
        assert!(blocks.iter().any(|(p, _)| p.as_str() == path), "{path}");
    }
    assert!(!objects.keys().any(|p| p.as_str() == "/"));
}

#[tokio::test]
async fn get_all_matches_record() {
    let (_server, client, config) = start_service().await;
    let index = 300;
    let reply = client
        .call_method(
            None::<&str>,
            config.device_path(index).as_str(),
            Some(PROPERTIES_INTERFACE),
            "GetAll",
            &(BLOCK_INTERFACE,),
        )
        .await
        .unwrap();
    let props: HashMap<String, OwnedValue> = reply.body().deserialize().unwrap();
    assert_eq!(props.len(), 23);

    let record = DeviceRecord::new(index);
    for (name, expected) in record.properties() {
        let actual = props.get(name).unwrap_or_else(|| panic!("missing {name}"));
        assert_value(name, actual, expected);
    }
}

#[tokio::test]
async fn single_property_get() {
    let (_server, client, config) = start_service().await;
    let reply = client
        .call_method(
            None::<&str>,
            config.device_path(602).as_str(),
            Some(PROPERTIES_INTERFACE),
            "Get",
            &(BLOCK_INTERFACE, "SomeCount"),
        )
        .await
        .unwrap();
    let value: OwnedValue = reply.body().deserialize().unwrap();
    assert_value("SomeCount", &value, PropertyValue::U32(612));
}

#[tokio::test]
async fn manager_reports_version() {
    let (_server, client, config) = start_service().await;
    let reply = client
        .call_method(
            None::<&str>,
            config.manager_path.as_str(),
            Some(MANAGER_INTERFACE),
            "Version",
            &(),
        )
        .await
        .unwrap();
    let version: String = reply.body().deserialize().unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn duplicate_device_path_fails() {
    let (server, _client, config) = start_service().await;
    let again = ServiceConfig {
        manager_path: "/other".to_owned(),
        device_count: 1,
        ..config
    };
    let err = register_objects(&server, &again).await.unwrap_err();
    assert!(
        matches!(err, ServiceError::DuplicatePath(ref p) if p == "/com/blah/storage/block/0"),
        "{err:?}"
    );
}

#[tokio::test]
async fn duplicate_object_manager_fails() {
    let (server, _client, config) = start_service().await;
    let err = register_objects(&server, &config).await.unwrap_err();
    assert!(matches!(err, ServiceError::DuplicatePath(ref p) if p == "/"), "{err:?}");
}

#[tokio::test]
async fn serve_ends_when_peer_hangs_up() {
    let (server, client) = peer_pair().await;
    let hang_up = async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(client);
    };
    let (result, ()) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(serve(&server), hang_up)
    })
    .await
    .expect("serve did not return after the peer hung up");
    assert!(matches!(result, Err(ServiceError::Disconnected)), "{result:?}");
}

#[tokio::test]
async fn survey_counts_published_values() {
    let (_server, client, config) = start_service().await;
    let summary = survey(&client, None, &config.manager_path).await.unwrap();

    assert_eq!(summary.objects, u64::from(config.device_count));
    assert_eq!(summary.interfaces, 603);
    assert_eq!(summary.strings, 603 * 10);
    assert_eq!(summary.u32s, 603);
    assert_eq!(summary.u64s, 603 * 6);
    assert_eq!(summary.booleans, 603 * 6);
    assert_eq!(summary.unknown, 0);
    assert!(summary.total_bytes() > summary.fixed_len_bytes());
}
