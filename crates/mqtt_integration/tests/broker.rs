//! Tests against a live broker
//!
//! Run with: TEST_MQTT_SERVER=tcp://127.0.0.1:1883 cargo test -p mqtt_integration -- --ignored

use bytes::Bytes;
use codec::Marshaler;
use contracts::{
    CallContext, ConnectionState, DevEui, DownlinkRecvError, Event, EventKind, IntegrationError,
    Integrator, JoinEvent, MarshalerKind, MemoryStore, MqttIntegrationConfig, UplinkEvent,
};
use mqtt_integration::{parse_server, MqttIntegration};
use rumqttc::{AsyncClient, Event as MqttEvent, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const DEV_EUI: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

fn broker() -> String {
    std::env::var("TEST_MQTT_SERVER").unwrap_or_else(|_| "tcp://127.0.0.1:1883".to_string())
}

fn config(marshaler: MarshalerKind) -> MqttIntegrationConfig {
    MqttIntegrationConfig {
        server: broker(),
        username: std::env::var("TEST_MQTT_USERNAME").ok(),
        password: std::env::var("TEST_MQTT_PASSWORD").ok(),
        marshaler,
        downlink_lock_ttl_ms: 0,
        ..Default::default()
    }
}

/// Independent client playing the external application
struct Peer {
    client: AsyncClient,
    messages: mpsc::UnboundedReceiver<(String, Bytes)>,
}

impl Peer {
    async fn connect(subscribe_to: Option<&str>) -> Self {
        let address = parse_server(&broker()).unwrap();
        let id = format!("peer-{}", mqtt_integration::generate_client_id());
        let mut options = MqttOptions::new(id, address.host, address.port);
        if let Ok(username) = std::env::var("TEST_MQTT_USERNAME") {
            options.set_credentials(username, std::env::var("TEST_MQTT_PASSWORD").unwrap_or_default());
        }

        let (client, mut event_loop) = AsyncClient::new(options, 10);
        if let Some(topic) = subscribe_to {
            client.subscribe(topic, QoS::AtLeastOnce).await.unwrap();
        }

        let (tx, messages) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let mut ready_tx = Some(ready_tx);
        let wait_for_suback = subscribe_to.is_some();

        tokio::spawn(async move {
            while let Ok(event) = event_loop.poll().await {
                match event {
                    MqttEvent::Incoming(Packet::ConnAck(_)) if !wait_for_suback => {
                        if let Some(ready) = ready_tx.take() {
                            let _ = ready.send(());
                        }
                    }
                    MqttEvent::Incoming(Packet::SubAck(_)) => {
                        if let Some(ready) = ready_tx.take() {
                            let _ = ready.send(());
                        }
                    }
                    MqttEvent::Incoming(Packet::Publish(p)) => {
                        let _ = tx.send((p.topic, p.payload));
                    }
                    _ => {}
                }
            }
        });

        tokio::time::timeout(Duration::from_secs(5), ready_rx)
            .await
            .expect("peer did not connect")
            .unwrap();

        Self { client, messages }
    }

    async fn next(&mut self) -> (String, Bytes) {
        tokio::time::timeout(Duration::from_secs(5), self.messages.recv())
            .await
            .expect("no message received")
            .unwrap()
    }
}

#[tokio::test]
#[ignore = "requires an MQTT broker (TEST_MQTT_SERVER)"]
async fn test_uplink_published_to_rendered_topic() {
    let integration = MqttIntegration::connect("mqtt", &config(MarshalerKind::Protobuf), None)
        .await
        .unwrap();
    let mut peer = Peer::connect(Some("application/123/device/0102030405060708/rx")).await;

    let event = UplinkEvent {
        application_id: 123,
        dev_eui: DEV_EUI.to_vec(),
        ..Default::default()
    };
    integration
        .send_uplink(&CallContext::with_timeout(Duration::from_secs(5)), None, &event)
        .await
        .unwrap();

    let (topic, payload) = peer.next().await;
    assert_eq!(topic, "application/123/device/0102030405060708/rx");
    assert_eq!(
        Marshaler::Protobuf
            .decode_event(EventKind::Uplink, &payload)
            .unwrap(),
        Event::Uplink(event)
    );

    integration.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires an MQTT broker (TEST_MQTT_SERVER)"]
async fn test_join_published_as_json() {
    let integration = MqttIntegration::connect("mqtt", &config(MarshalerKind::Json), None)
        .await
        .unwrap();
    let mut peer = Peer::connect(Some("application/123/device/0102030405060708/join")).await;

    let event = JoinEvent {
        application_id: 123,
        dev_eui: DEV_EUI.to_vec(),
        dev_addr: vec![1, 2, 3, 4],
        ..Default::default()
    };
    integration
        .send(&CallContext::new(), None, &Event::Join(event.clone()))
        .await
        .unwrap();

    let (_, payload) = peer.next().await;
    let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(value["applicationID"], 123);
    assert_eq!(value["devAddr"], "AQIDBA==");

    integration.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires an MQTT broker (TEST_MQTT_SERVER)"]
async fn test_downlink_ports() {
    let integration = MqttIntegration::connect("mqtt", &config(MarshalerKind::Json), None)
        .await
        .unwrap();
    let peer = Peer::connect(None).await;
    let downlink = integration.downlink_channel();
    let topic = "application/1/device/0102030405060708/tx";

    for f_port in [0u32, 1, 224, 225, 255] {
        let body = format!(
            r#"{{"confirmed": false, "fPort": {}, "data": "aGVsbG8="}}"#,
            f_port
        );
        peer.client
            .publish(topic, QoS::AtLeastOnce, false, body.into_bytes())
            .await
            .unwrap();

        let received = downlink.recv_timeout(Duration::from_millis(500)).await;
        if (1..=224).contains(&f_port) {
            let command = received.unwrap();
            assert_eq!(command.dev_eui, DevEui::new(DEV_EUI));
            assert_eq!(command.f_port, f_port);
            assert_eq!(command.data, Bytes::from_static(b"hello"));
            assert!(!command.confirmed);
        } else {
            assert_eq!(received, Err(DownlinkRecvError::Timeout));
        }
    }

    integration.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires an MQTT broker (TEST_MQTT_SERVER)"]
async fn test_malformed_downlink_does_not_block_next() {
    let integration = MqttIntegration::connect("mqtt", &config(MarshalerKind::Json), None)
        .await
        .unwrap();
    let peer = Peer::connect(None).await;
    let downlink = integration.downlink_channel();
    let topic = "application/1/device/0102030405060708/tx";

    peer.client
        .publish(topic, QoS::AtLeastOnce, false, b"not json".to_vec())
        .await
        .unwrap();
    peer.client
        .publish(
            topic,
            QoS::AtLeastOnce,
            false,
            br#"{"fPort": 2, "data": "AQ=="}"#.to_vec(),
        )
        .await
        .unwrap();

    let command = downlink.recv_timeout(Duration::from_secs(2)).await.unwrap();
    assert_eq!(command.f_port, 2);
    assert_eq!(integration.downlink_metrics().dropped_decode, 1);

    integration.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires an MQTT broker (TEST_MQTT_SERVER)"]
async fn test_duplicate_downlink_locked_across_instances() {
    let store = Arc::new(MemoryStore::new());
    let mut config = config(MarshalerKind::Json);
    config.downlink_lock_ttl_ms = 1_000;

    let a = MqttIntegration::connect("a", &config, Some(store.clone()))
        .await
        .unwrap();
    let b = MqttIntegration::connect("b", &config, Some(store.clone()))
        .await
        .unwrap();
    let peer = Peer::connect(None).await;

    peer.client
        .publish(
            "application/1/device/0102030405060708/tx",
            QoS::AtLeastOnce,
            false,
            br#"{"fPort": 9, "data": "AQ=="}"#.to_vec(),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(a.downlink_channel().len() + b.downlink_channel().len(), 1);

    a.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires an MQTT broker (TEST_MQTT_SERVER)"]
async fn test_close_semantics() {
    let integration = MqttIntegration::connect("mqtt", &config(MarshalerKind::Json), None)
        .await
        .unwrap();
    assert_eq!(integration.connection_state(), ConnectionState::Connected);

    let downlink = integration.downlink_channel();
    let waiter = tokio::spawn(async move { downlink.recv().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    integration.close().await.unwrap();
    assert_eq!(waiter.await.unwrap(), None);
    assert_eq!(integration.connection_state(), ConnectionState::Closed);

    assert!(matches!(
        integration.close().await,
        Err(IntegrationError::AlreadyClosed { .. })
    ));

    let event = UplinkEvent {
        application_id: 1,
        dev_eui: DEV_EUI.to_vec(),
        ..Default::default()
    };
    assert!(matches!(
        integration.send_uplink(&CallContext::new(), None, &event).await,
        Err(IntegrationError::Closed { .. })
    ));
}
