//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（无需 MQTT broker）
//! - 分发隔离与下行接入校验

#[cfg(test)]
mod mock;

#[cfg(test)]
mod contract_tests {
    use codec::Marshaler;
    use contracts::{ConfigVersion, Event, EventKind, JoinEvent, UplinkEvent};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = ConfigVersion::V1;
    }

    #[test]
    fn test_event_kind_names_are_stable() {
        let names: Vec<_> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["up", "join", "ack", "error", "status", "location", "txack"]
        );
    }

    #[test]
    fn test_uplink_json_field_names() {
        let event = UplinkEvent {
            application_id: 123,
            dev_eui: vec![1, 2, 3, 4, 5, 6, 7, 8],
            f_port: 10,
            data: vec![1, 2, 3],
            ..Default::default()
        };

        let body = Marshaler::Json.encode_event(&Event::Uplink(event)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["applicationID"], 123);
        assert_eq!(value["devEUI"], "AQIDBAUGBwg=");
        assert_eq!(value["fPort"], 10);
        assert_eq!(value["data"], "AQID");
    }

    #[test]
    fn test_both_marshalers_preserve_join() {
        let event = Event::Join(JoinEvent {
            application_id: 123,
            dev_eui: vec![1, 2, 3, 4, 5, 6, 7, 8],
            dev_addr: vec![1, 2, 3, 4],
            ..Default::default()
        });

        for marshaler in [Marshaler::Json, Marshaler::Protobuf] {
            let body = marshaler.encode_event(&event).unwrap();
            assert_eq!(marshaler.decode_event(EventKind::Join, &body).unwrap(), event);
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        CallContext, Event, EventKind, IntegrationError, Integrator, StatusEvent, UplinkEvent,
    };
    use dispatcher::{all_ok, build_dispatch_set, failures, DispatchSet, Dispatcher};

    use crate::mock::MockIntegrator;

    fn uplink(application_id: u64) -> Event {
        Event::Uplink(UplinkEvent {
            application_id,
            dev_eui: vec![1, 2, 3, 4, 5, 6, 7, 8],
            f_port: 1,
            data: b"hello".to_vec(),
            ..Default::default()
        })
    }

    fn set_of(mocks: &[Arc<MockIntegrator>]) -> DispatchSet {
        DispatchSet::new(
            mocks
                .iter()
                .map(|m| (m.name().to_string(), m.clone() as Arc<dyn Integrator>))
                .collect(),
        )
    }

    /// End-to-end test: config -> factory -> Dispatcher -> log sinks
    #[tokio::test]
    async fn test_e2e_config_to_log_sinks() {
        let content = r#"
[[integrations]]
name = "first"
type = "log"

[[integrations]]
name = "second"
type = "log"
"#;
        let config = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let set = build_dispatch_set(&config.integrations, None).await.unwrap();
        let dispatcher = Dispatcher::new(set);

        for kind_event in [
            uplink(1),
            Event::Status(StatusEvent {
                application_id: 1,
                dev_eui: vec![1, 2, 3, 4, 5, 6, 7, 8],
                battery_level: 55.0,
                ..Default::default()
            }),
        ] {
            let outcomes = dispatcher
                .dispatch(&CallContext::new(), None, &kind_event)
                .await;
            assert!(all_ok(&outcomes));
        }

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.len(), 2);
        for (_, snapshot) in metrics {
            assert_eq!(snapshot.sent_count, 2);
            assert_eq!(snapshot.kind_count(EventKind::Status), 1);
        }

        assert!(all_ok(&dispatcher.close_all().await));
    }

    #[tokio::test]
    async fn test_every_member_receives_event() {
        let a = Arc::new(MockIntegrator::new("a"));
        let b = Arc::new(MockIntegrator::new("b"));
        let dispatcher = Dispatcher::new(set_of(&[a.clone(), b.clone()]));

        let event = uplink(123);
        dispatcher.dispatch(&CallContext::new(), None, &event).await;

        assert_eq!(a.received(), vec![event.clone()]);
        assert_eq!(b.received(), vec![event]);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_stop_others() {
        let failing = Arc::new(MockIntegrator::failing("failing"));
        let healthy = Arc::new(MockIntegrator::new("healthy"));
        let dispatcher = Dispatcher::new(set_of(&[failing.clone(), healthy.clone()]));

        let outcomes = dispatcher.dispatch(&CallContext::new(), None, &uplink(1)).await;

        assert!(!all_ok(&outcomes));
        let failed = failures(&outcomes);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "failing");
        assert!(failed[0].1.is_delivery());

        assert_eq!(healthy.received().len(), 1);
        assert!(outcomes[1].is_ok());
    }

    #[tokio::test]
    async fn test_slow_sink_hits_deadline_without_blocking_others() {
        let slow = Arc::new(MockIntegrator::new("slow").with_delay(Duration::from_secs(5)));
        let fast = Arc::new(MockIntegrator::new("fast"));
        let dispatcher = Dispatcher::new(set_of(&[slow.clone(), fast.clone()]));

        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let outcomes = dispatcher.dispatch(&ctx, None, &uplink(1)).await;

        assert_eq!(outcomes[0].result, Err(IntegrationError::DeadlineExceeded));
        assert!(outcomes[1].is_ok());
        assert_eq!(fast.received().len(), 1);
        assert!(slow.received().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_dispatch() {
        let sink = Arc::new(MockIntegrator::new("slow").with_delay(Duration::from_secs(5)));
        let dispatcher = Arc::new(Dispatcher::new(set_of(&[sink])));

        let ctx = CallContext::new();
        let token = ctx.cancel_token().clone();
        let handle = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.dispatch(&ctx, None, &uplink(1)).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let outcomes = handle.await.unwrap();
        assert_eq!(outcomes[0].result, Err(IntegrationError::Cancelled));
    }

    #[tokio::test]
    async fn test_swap_while_dispatching() {
        let old = Arc::new(MockIntegrator::new("old").with_delay(Duration::from_millis(50)));
        let new = Arc::new(MockIntegrator::new("new"));
        let dispatcher = Arc::new(Dispatcher::new(set_of(&[old.clone()])));

        let in_flight = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move {
                dispatcher
                    .dispatch(&CallContext::new(), None, &uplink(1))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let previous = dispatcher.swap(set_of(&[new.clone()]));
        assert_eq!(previous.names(), vec!["old"]);

        // the in-flight dispatch finishes against the old set
        let outcomes = in_flight.await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].sink, "old");
        assert_eq!(old.received().len(), 1);

        dispatcher
            .dispatch(&CallContext::new(), None, &uplink(2))
            .await;
        assert_eq!(new.received().len(), 1);
        assert_eq!(old.received().len(), 1);
    }

    #[tokio::test]
    async fn test_close_all_reports_second_close() {
        let sink = Arc::new(MockIntegrator::new("a"));
        let dispatcher = Dispatcher::new(set_of(&[sink.clone()]));

        assert!(all_ok(&dispatcher.close_all().await));
        let second = dispatcher.close_all().await;
        assert!(matches!(
            second[0].result,
            Err(IntegrationError::AlreadyClosed { .. })
        ));
    }
}

#[cfg(test)]
mod downlink_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use codec::Marshaler;
    use contracts::{
        downlink_queue, DevEui, DownlinkCommand, DownlinkRecvError, KeyValueStore, MemoryStore,
    };
    use mqtt_integration::{DownlinkIngest, DownlinkLock, DropReason};
    use topic_template::CompiledTemplate;

    const TOPIC: &str = "application/123/device/0102030405060708/tx";

    fn ingest(marshaler: Marshaler, capacity: usize) -> (DownlinkIngest, contracts::DownlinkReceiver) {
        let template =
            CompiledTemplate::compile("application/{{ .ApplicationID }}/device/{{ .DevEUI }}/tx")
                .unwrap();
        let (tx, rx) = downlink_queue(capacity);
        (DownlinkIngest::new("mqtt", template, marshaler, tx), rx)
    }

    fn json(f_port: u32) -> Vec<u8> {
        format!(r#"{{"confirmed": false, "fPort": {f_port}, "data": "aGVsbG8="}}"#).into_bytes()
    }

    #[tokio::test]
    async fn test_hello_downlink() {
        let (ingest, rx) = ingest(Marshaler::Json, 10);
        ingest.handle(TOPIC, &json(1)).await.unwrap();

        let command = rx.recv_timeout(Duration::from_millis(100)).await.unwrap();
        assert_eq!(
            command,
            DownlinkCommand {
                application_id: 123,
                dev_eui: DevEui::new([1, 2, 3, 4, 5, 6, 7, 8]),
                confirmed: false,
                f_port: 1,
                data: bytes::Bytes::from_static(b"hello"),
                object: None,
            }
        );
    }

    #[tokio::test]
    async fn test_reserved_ports_never_queued() {
        let (ingest, rx) = ingest(Marshaler::Json, 300);

        for f_port in [0u32, 225, 240, 255] {
            assert_eq!(ingest.handle(TOPIC, &json(f_port)).await, Err(DropReason::FPort));
        }
        assert!(rx.is_empty());
        assert_eq!(ingest.metrics().snapshot().dropped_f_port, 4);
    }

    #[tokio::test]
    async fn test_protobuf_downlink() {
        let (ingest, rx) = ingest(Marshaler::Protobuf, 10);
        let command = DownlinkCommand {
            application_id: 0,
            dev_eui: DevEui::default(),
            confirmed: true,
            f_port: 20,
            data: bytes::Bytes::from_static(&[1, 2, 3]),
            object: None,
        };
        let payload = Marshaler::Protobuf.encode_command(&command).unwrap();

        ingest.handle(TOPIC, &payload).await.unwrap();
        let queued = rx.try_recv().unwrap();
        assert!(queued.confirmed);
        assert_eq!(queued.f_port, 20);
        assert_eq!(queued.dev_eui, DevEui::new([1, 2, 3, 4, 5, 6, 7, 8]));
    }

    #[tokio::test]
    async fn test_shared_lock_admits_one_copy() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let lock = || DownlinkLock::new(store.clone(), Duration::from_secs(1));

        let (first, rx1) = ingest(Marshaler::Json, 10);
        let (second, rx2) = ingest(Marshaler::Json, 10);
        let first = first.with_lock(lock());
        let second = second.with_lock(lock());

        assert!(first.handle(TOPIC, &json(5)).await.is_ok());
        assert_eq!(second.handle(TOPIC, &json(5)).await, Err(DropReason::Duplicate));
        assert_eq!(rx1.len() + rx2.len(), 1);
    }

    #[tokio::test]
    async fn test_consumer_sees_closed_queue() {
        let template = CompiledTemplate::compile("application/{appID}/device/{devEUI}/tx").unwrap();
        let (tx, rx) = downlink_queue(4);
        let ingest = DownlinkIngest::new("mqtt", template, Marshaler::Json, tx.clone());

        ingest.handle(TOPIC, &json(3)).await.unwrap();
        tx.close();

        assert_eq!(rx.recv().await.map(|c| c.f_port), Some(3));
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)).await,
            Err(DownlinkRecvError::Closed)
        );
        assert_eq!(ingest.handle(TOPIC, &json(3)).await, Err(DropReason::Closed));
    }
}
