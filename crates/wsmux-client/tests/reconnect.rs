use std::time::Duration;

use serde_json::{json, Value};
use wsmux_client::{
    ClientConfig, ClientError, ParameterSubscriptionRequest, SubscriptionClient, Topic, TopicEvent,
};
use wsmux_frame::{
    decode_frame, encode_frame, DataBody, ExceptionBody, Frame, FrameConfig, MessageKind,
    ReplyBody,
};
use wsmux_transport::{Endpoint, MemoryConnector, MemoryServer};

const TIMEOUT: Duration = Duration::from_secs(5);

struct Script {
    server: MemoryServer,
}

impl Script {
    async fn request(&mut self) -> (u64, Value) {
        let text = tokio::time::timeout(TIMEOUT, self.server.recv_text())
            .await
            .expect("request in time")
            .expect("link open");
        let frame = decode_frame(&text, &FrameConfig::default()).unwrap();
        assert_eq!(frame.kind, MessageKind::Request);
        (frame.sequence, frame.body)
    }

    fn reply(&self, sequence: u64, data: Option<Value>) {
        let frame = Frame::reply(sequence, &ReplyBody { dt: None, data }).unwrap();
        self.send(&frame);
    }

    fn exception(&self, sequence: u64, et: &str) {
        let frame = Frame::exception(
            sequence,
            &ExceptionBody {
                et: et.to_string(),
                msg: format!("{et} on replay"),
            },
        )
        .unwrap();
        self.send(&frame);
    }

    fn push(&self, dt: &str, data: Value) {
        let frame = Frame::data(&DataBody {
            dt: dt.to_string(),
            data,
        })
        .unwrap();
        self.send(&frame);
    }

    fn hello(&self, client_id: i64) {
        self.push(
            "CONNECTION_INFO",
            json!({ "clientId": client_id, "instance": { "name": "simulator" } }),
        );
    }

    fn send(&self, frame: &Frame) {
        let text = encode_frame(frame, &FrameConfig::default()).unwrap();
        self.server.send_text(text).unwrap();
    }
}

async fn next_event(subscription: &mut wsmux_client::Subscription) -> TopicEvent {
    tokio::time::timeout(TIMEOUT, subscription.recv())
        .await
        .expect("event in time")
        .expect("subscription open")
        .expect("event ok")
}

#[tokio::test]
async fn subscriptions_resume_after_reconnect() {
    let (connector, mut servers) = MemoryConnector::channel();
    let endpoint = Endpoint::from_base_url("http://localhost:8090/", Some("simulator")).unwrap();
    let client = std::sync::Arc::new(SubscriptionClient::new(ClientConfig::default()));

    let first = client.connect(&connector, &endpoint).await.unwrap();
    let mut script = Script {
        server: servers.recv().await.unwrap(),
    };
    script.hello(1);
    tokio::time::timeout(TIMEOUT, client.wait_connected())
        .await
        .unwrap()
        .unwrap();

    let events_call = tokio::spawn({
        let client = client.clone();
        async move { client.subscribe(Topic::Events).await }
    });
    let (seq, _) = script.request().await;
    script.reply(seq, None);
    let (_, mut events) = events_call.await.unwrap().unwrap();

    let params_call = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .subscribe_parameters(ParameterSubscriptionRequest::numeric(["/a/b"]))
                .await
        }
    });
    let (seq, _) = script.request().await;
    script.reply(
        seq,
        Some(json!({ "subscriptionId": 4, "subscribed": [{ "id": { "name": "/a/b" }, "numericId": 1 }] })),
    );
    let (reply, mut params) = params_call.await.unwrap().unwrap();
    assert_eq!(reply.subscription_id, Some(4));

    let links_call = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .subscribe(Topic::Links {
                    instance: Some("simulator".into()),
                })
                .await
        }
    });
    let (seq, _) = script.request().await;
    script.reply(seq, None);
    let (_, mut links) = links_call.await.unwrap().unwrap();

    let ids = (events.id(), params.id());
    script.server.close("server restart");
    first.closed().await;
    assert!(events.is_interrupted());
    assert!(params.is_interrupted());
    assert!(!client.is_connected());

    // Dropped while down: must not be replayed.
    links.unsubscribe();

    let second = client.connect(&connector, &endpoint).await.unwrap();
    assert_eq!(second.generation(), 2);
    let mut script = Script {
        server: servers.recv().await.unwrap(),
    };
    tokio::task::yield_now().await;
    assert!(script.server.try_recv_text().is_none());

    script.hello(2);
    let (seq_events, body_events) = script.request().await;
    let (seq_params, body_params) = script.request().await;
    assert_eq!((seq_events, seq_params), (4, 5));
    assert_eq!(body_events, json!({ "events": "subscribe" }));
    assert_eq!(
        body_params,
        json!({ "parameter": "subscribe", "data": { "id": [{ "name": "/a/b" }], "useNumericIds": true } })
    );

    script.reply(seq_events, None);
    script.reply(
        seq_params,
        Some(json!({ "subscriptionId": 9, "subscribed": [{ "id": { "name": "/a/b" }, "numericId": 5 }] })),
    );

    // The old server-side id is gone; only the replayed one routes.
    script.push("PARAMETER", json!({ "subscriptionId": 4, "parameter": [{ "numericId": 1 }] }));
    script.push("PARAMETER", json!({ "subscriptionId": 9, "parameter": [{ "numericId": 5 }] }));
    script.push("EVENT", json!({ "message": "back" }));

    let TopicEvent::Parameters(data) = next_event(&mut params).await else {
        panic!("expected parameters");
    };
    assert_eq!(data.subscription_id, Some(9));
    assert_eq!(data.parameter[0].id.as_ref().map(|id| id.name.as_str()), Some("/a/b"));

    let TopicEvent::Event(event) = next_event(&mut events).await else {
        panic!("expected event");
    };
    assert_eq!(event.message.as_deref(), Some("back"));

    assert_eq!((events.id(), params.id()), ids);
    assert!(!events.is_interrupted());
    assert!(client.is_connected());
    assert_eq!(client.connection_info().map(|info| info.client_id), Some(2));
    assert_eq!(client.subscription_count(), 2);
    assert!(script.server.try_recv_text().is_none());
}

#[tokio::test]
async fn failed_replay_ends_only_that_subscription() {
    let (connector, mut servers) = MemoryConnector::channel();
    let endpoint = Endpoint::parse("ws://localhost:8090/_websocket").unwrap();
    let client = std::sync::Arc::new(SubscriptionClient::new(ClientConfig::default()));

    let first = client.connect(&connector, &endpoint).await.unwrap();
    let mut script = Script {
        server: servers.recv().await.unwrap(),
    };
    script.hello(1);

    let mut handles = Vec::new();
    for topic in [
        Topic::Stream {
            stream: "tm_realtime".into(),
        },
        Topic::Instances,
    ] {
        let call = tokio::spawn({
            let client = client.clone();
            async move { client.subscribe(topic).await }
        });
        let (seq, _) = script.request().await;
        script.reply(seq, None);
        handles.push(call.await.unwrap().unwrap().1);
    }
    let mut instances = handles.pop().unwrap();
    let mut stream = handles.pop().unwrap();

    script.server.close("lost");
    first.closed().await;

    let _second = client.connect(&connector, &endpoint).await.unwrap();
    let mut script = Script {
        server: servers.recv().await.unwrap(),
    };
    script.hello(2);
    let (seq_stream, _) = script.request().await;
    let (seq_instances, _) = script.request().await;
    script.exception(seq_stream, "NotFound");
    script.reply(seq_instances, None);

    let failure = tokio::time::timeout(TIMEOUT, stream.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        failure,
        Err(ClientError::ServerException { ref kind, .. }) if kind == "NotFound"
    ));
    assert!(tokio::time::timeout(TIMEOUT, stream.recv())
        .await
        .unwrap()
        .is_none());

    script.push("INSTANCE", json!({ "name": "simulator", "state": "RUNNING" }));
    assert!(matches!(next_event(&mut instances).await, TopicEvent::Instance(_)));
    assert_eq!(client.subscription_count(), 1);
}

#[tokio::test]
async fn subscribe_while_down_is_rejected() {
    let (connector, mut servers) = MemoryConnector::channel();
    let endpoint = Endpoint::parse("ws://localhost:8090/_websocket").unwrap();
    let client = SubscriptionClient::new(ClientConfig::default());

    let connection = client.connect(&connector, &endpoint).await.unwrap();
    let mut server = servers.recv().await.unwrap();
    server.close("gone");
    connection.closed().await;

    assert!(matches!(
        client.subscribe(Topic::Time).await,
        Err(ClientError::NotConnected)
    ));
}

#[tokio::test]
async fn stale_parameter_route_ignores_reused_server_id() {
    let (connector, mut servers) = MemoryConnector::channel();
    let endpoint = Endpoint::parse("ws://localhost:8090/_websocket").unwrap();
    let client = std::sync::Arc::new(SubscriptionClient::new(ClientConfig::default()));

    let first = client.connect(&connector, &endpoint).await.unwrap();
    let mut script = Script {
        server: servers.recv().await.unwrap(),
    };
    script.hello(1);

    let old_call = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .subscribe_parameters(ParameterSubscriptionRequest::numeric(["/a/old"]))
                .await
        }
    });
    let (seq, _) = script.request().await;
    script.reply(
        seq,
        Some(json!({ "subscriptionId": 1, "subscribed": [{ "id": { "name": "/a/old" }, "numericId": 1 }] })),
    );
    let (_, mut old) = old_call.await.unwrap().unwrap();

    script.server.close("server restart");
    first.closed().await;

    // The new link hands out subscriptionId 1 again, to a fresh subscription
    // made before CONNECTION_INFO.
    let _second = client.connect(&connector, &endpoint).await.unwrap();
    let mut script = Script {
        server: servers.recv().await.unwrap(),
    };
    let new_call = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .subscribe_parameters(ParameterSubscriptionRequest::numeric(["/b/new"]))
                .await
        }
    });
    let (seq, _) = script.request().await;
    script.reply(
        seq,
        Some(json!({ "subscriptionId": 1, "subscribed": [{ "id": { "name": "/b/new" }, "numericId": 1 }] })),
    );
    let (_, mut new) = new_call.await.unwrap().unwrap();

    // The old subscription's replay stays unanswered for now.
    script.hello(2);
    let (replay_seq, _) = script.request().await;

    script.push("PARAMETER", json!({ "subscriptionId": 1, "parameter": [{ "numericId": 1 }] }));
    let TopicEvent::Parameters(data) = next_event(&mut new).await else {
        panic!("expected parameters");
    };
    assert_eq!(data.parameter[0].id.as_ref().map(|id| id.name.as_str()), Some("/b/new"));
    assert!(old.is_interrupted());
    assert!(
        tokio::time::timeout(Duration::from_millis(100), old.recv())
            .await
            .is_err(),
        "push for another subscription leaked into the interrupted one"
    );

    script.reply(
        replay_seq,
        Some(json!({ "subscriptionId": 2, "subscribed": [{ "id": { "name": "/a/old" }, "numericId": 1 }] })),
    );
    script.push("PARAMETER", json!({ "subscriptionId": 2, "parameter": [{ "numericId": 1 }] }));
    let TopicEvent::Parameters(data) = next_event(&mut old).await else {
        panic!("expected parameters");
    };
    assert_eq!(data.subscription_id, Some(2));
    assert_eq!(data.parameter[0].id.as_ref().map(|id| id.name.as_str()), Some("/a/old"));
    assert!(!old.is_interrupted());
    assert!(
        tokio::time::timeout(Duration::from_millis(100), new.recv())
            .await
            .is_err()
    );
}
