#![allow(clippy::unwrap_used)]
// End-to-end: an in-process Engine.IO websocket server pushes events
// through `PushConnection` into mounted views, some of them seeded from a
// mocked REST backend.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleetdash_api::{PushOptions, ReconnectConfig, TransportPolicy};
use fleetdash_core::{
    Alert, AlertFilter, ConnectionState, CoreError, DashboardStats, Device, DeviceKind,
    DeviceKindFilter, DeviceStatus, DevicesView, EventName, EventRegistry, FleetApi, Gateway,
    PushConnection, PushEvent, SensorQuery, SensorReading, SyncConfig, SyncService,
};

const OPEN: &str = r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

struct StaticFleet {
    devices: Vec<Device>,
}

impl FleetApi for StaticFleet {
    async fn dashboard_stats(&self) -> Result<DashboardStats, CoreError> {
        Ok(DashboardStats::default())
    }

    async fn devices(&self, _filter: DeviceKindFilter) -> Result<Vec<Device>, CoreError> {
        Ok(self.devices.clone())
    }

    async fn gateways(&self) -> Result<Vec<Gateway>, CoreError> {
        Ok(Vec::new())
    }

    async fn alerts(&self, _filter: AlertFilter) -> Result<Vec<Alert>, CoreError> {
        Ok(Vec::new())
    }

    async fn acknowledge_alert(&self, id: i64) -> Result<Alert, CoreError> {
        Err(CoreError::NotFound {
            entity_type: "alert".into(),
            identifier: id.to_string(),
        })
    }

    async fn resolve_alert(&self, id: i64) -> Result<Alert, CoreError> {
        self.acknowledge_alert(id).await
    }

    async fn sensor_history(&self, _query: &SensorQuery) -> Result<Vec<SensorReading>, CoreError> {
        Ok(Vec::new())
    }
}

fn node(id: i64, device_id: &str, name: &str) -> Device {
    Device {
        id,
        device_id: device_id.into(),
        name: name.into(),
        kind: DeviceKind::Node,
        mac_address: None,
        gateway_id: Some(1),
        status: DeviceStatus::Online,
        firmware_version: None,
        last_seen: None,
        created_at: None,
        updated_at: None,
    }
}

fn options() -> PushOptions {
    PushOptions {
        transports: TransportPolicy::WebSocketOnly,
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            max_retries: None,
        },
        connect_timeout: Duration::from_secs(5),
        ..PushOptions::default()
    }
}

async fn wait_for_state(conn: &PushConnection, want: ConnectionState) {
    let mut changes = conn.state_changes();
    tokio::time::timeout(Duration::from_secs(5), changes.wait_for(|s| *s == want))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_pushed_status_change_patches_view_and_join_is_sent_on_open() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(OPEN.into())).await.unwrap();

        let Some(Ok(Message::Text(connect))) = ws.next().await else {
            panic!("expected CONNECT");
        };
        assert_eq!(connect.as_str(), "40");
        ws.send(Message::Text(r#"40{"sid":"sock-1"}"#.into())).await.unwrap();

        // The room joined while connecting is sent once the session opens.
        let Some(Ok(Message::Text(join))) = ws.next().await else {
            panic!("expected join");
        };
        seen_tx.send(join.as_str().to_owned()).unwrap();

        for frame in [
            r#"42["connection_response",{"status":"connected","message":"hello"}]"#,
            r#"42["mystery",{"x":1}]"#,
            r#"42["device:status_change",{"status":"error"}]"#,
            r#"42["device:status_change",{"device_id":"N7","status":"offline"}]"#,
            r#"42["device:status_change",{"device_id":"N1","status":"offline","timestamp":"2024-05-02T08:00:00"}]"#,
        ] {
            ws.send(Message::Text(frame.into())).await.unwrap();
        }

        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                seen_tx.send(text.as_str().to_owned()).unwrap();
            }
        }
    });

    let registry = EventRegistry::new();
    let greetings = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let _greeting_sub = {
        let greetings = Arc::clone(&greetings);
        registry.subscribe(EventName::ConnectionResponse, move |event| {
            assert!(matches!(event, PushEvent::ConnectionResponse(_)));
            greetings.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
    };

    let api = Arc::new(StaticFleet {
        devices: vec![node(1, "N1", "X"), node(2, "N2", "Y")],
    });
    let devices = DevicesView::mount(&registry, api);
    devices.load().await.unwrap();
    let mut stream = devices.stream();

    let base = Url::parse(&format!("http://{addr}")).unwrap();
    let conn = PushConnection::new(base, options(), registry.clone());
    conn.connect().await;
    conn.join_room("site-a").await;
    wait_for_state(&conn, ConnectionState::Connected).await;

    let join = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(join, r#"42["join",{"room":"site-a"}]"#);

    let snap = tokio::time::timeout(Duration::from_secs(5), stream.changed())
        .await
        .unwrap()
        .unwrap();
    let n1 = snap.get("N1").unwrap();
    assert_eq!(n1.status, DeviceStatus::Offline);
    assert_eq!(n1.name, "X");
    assert!(n1.last_seen.is_some());
    assert_eq!(snap.len(), 2);
    assert!(snap.get("N7").is_none());
    assert_eq!(greetings.load(std::sync::atomic::Ordering::SeqCst), 1);

    conn.request_update().await;
    let sent = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent, r#"42["request_update",{}]"#);

    conn.disconnect().await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(conn.rooms().await, vec!["site-a"]);
}

#[tokio::test]
async fn test_connect_to_dead_port_keeps_retrying_until_disconnect() {
    // Bind then drop to get a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let conn = PushConnection::new(
        Url::parse(&format!("http://{addr}")).unwrap(),
        options(),
        EventRegistry::new(),
    );

    conn.connect().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(conn.state(), ConnectionState::Connecting);

    conn.disconnect().await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_heartbeat_timeout_reconnects_and_rejoins_rooms() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<(u32, String)>();

    tokio::spawn(async move {
        let mut session = 0;
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            session += 1;
            let seen_tx = seen_tx.clone();
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                // Short heartbeat window; the server never pings.
                let open = format!(
                    r#"0{{"sid":"eio-{session}","upgrades":[],"pingInterval":300,"pingTimeout":200}}"#
                );
                ws.send(Message::Text(open.into())).await.unwrap();

                let Some(Ok(Message::Text(connect))) = ws.next().await else {
                    return;
                };
                assert_eq!(connect.as_str(), "40");
                let ack = format!(r#"40{{"sid":"sock-{session}"}}"#);
                ws.send(Message::Text(ack.into())).await.unwrap();

                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Text(text) = msg {
                        let _ = seen_tx.send((session, text.as_str().to_owned()));
                    }
                }
            });
        }
    });

    let conn = PushConnection::new(
        Url::parse(&format!("http://{addr}")).unwrap(),
        options(),
        EventRegistry::new(),
    );
    conn.connect().await;
    conn.join_room("site-a").await;

    let join = r#"42["join",{"room":"site-a"}]"#.to_owned();
    let first = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, (1, join.clone()));

    // The silent server trips the heartbeat; the next session rejoins.
    let rejoined = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (session, text) = seen_rx.recv().await.unwrap();
            if session > 1 {
                return (session, text);
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(rejoined, (2, join));
    assert_eq!(conn.rooms().await, vec!["site-a"]);

    conn.disconnect().await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_rest_seeded_views_follow_pushed_samples_and_status() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [
                { "id": 1, "device_id": "N1", "name": "Boiler", "type": "node", "status": "online" },
                { "id": 2, "device_id": "N2", "name": "Pump", "type": "node", "status": "online" }
            ]
        })))
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sensor-data/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "node_id": "N1", "channel": 0, "raw_value": 11.0, "timestamp": "2026-01-10T08:00:05" },
                { "node_id": "N1", "channel": 0, "raw_value": 10.0, "timestamp": "2026-01-10T08:00:00" }
            ],
            "count": 2
        })))
        .mount(&backend)
        .await;

    let service = SyncService::new(SyncConfig::new(Url::parse(&backend.uri()).unwrap())).unwrap();
    let devices = service.devices();
    assert_eq!(devices.load().await.unwrap(), 2);
    let sensors = service.sensor_data();
    let query = SensorQuery {
        limit: Some(3),
        ..SensorQuery::default()
    };
    assert_eq!(sensors.load(query).await.unwrap(), 2);
    assert_eq!(sensors.table_limit(), 3);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(OPEN.into())).await.unwrap();
        let Some(Ok(Message::Text(_connect))) = ws.next().await else {
            panic!("expected CONNECT");
        };
        ws.send(Message::Text(r#"40{"sid":"sock-1"}"#.into())).await.unwrap();

        for frame in [
            r#"42["sensor_data",{"node_id":"N1","channel":0,"raw_value":12.0,"converted_value":1.2,"timestamp":"2026-01-10T08:00:10"}]"#,
            r#"42["sensor_data",{"node_id":"N1","channel":0,"raw_value":13.0,"timestamp":"2026-01-10T08:00:15"}]"#,
            r#"42["device:status_change",{"device_id":"N2","status":"offline"}]"#,
        ] {
            ws.send(Message::Text(frame.into())).await.unwrap();
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    // The REST mock cannot speak websocket, so the push side runs against
    // its own server while feeding the service's registry.
    let conn = PushConnection::new(
        Url::parse(&format!("http://{addr}")).unwrap(),
        options(),
        service.registry().clone(),
    );
    conn.connect().await;
    wait_for_state(&conn, ConnectionState::Connected).await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while devices.get("N2").is_none_or(|d| d.status != DeviceStatus::Offline) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // Frames dispatch in order, so both samples landed before the status.
    let table: Vec<f64> = sensors.table_rows().iter().map(SensorReading::value).collect();
    assert_eq!(table, vec![13.0, 1.2, 11.0]);
    let chart: Vec<f64> = sensors.chart_points().iter().map(|p| p.value).collect();
    assert_eq!(chart, vec![10.0, 11.0, 1.2, 13.0]);

    assert_eq!(devices.get("N1").unwrap().status, DeviceStatus::Online);
    assert_eq!(devices.get("N2").unwrap().name, "Pump");

    conn.disconnect().await;
    service.shutdown().await;
}
