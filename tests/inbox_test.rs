use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use httpmock::prelude::*;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message as WsMsg};
use url::Url;
use xbytechat::api::ApiClient;
use xbytechat::config::ClientSettings;
use xbytechat::inbox::{CountingPlayer, InboxEvent, InboxState, InboxView, ReadReceipts};
use xbytechat::inbox_channel::protocol::{HubFrame, RECORD_SEPARATOR, decode_frames};
use xbytechat::inbox_channel::{
    HubConfig, HubError, InboxMessage, ReconnectPolicy, UnreadCount, UnreadCountChanged,
};
use xbytechat::notifier::Notifier;
use xbytechat::session::Session;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingReceipts {
    read: Mutex<Vec<String>>,
}

impl ReadReceipts for RecordingReceipts {
    fn mark_as_read(&self, contact_id: &str) -> Result<(), HubError> {
        self.read.lock().unwrap().push(contact_id.to_string());
        Ok(())
    }
}

fn message(contact: &str, incoming: bool, sender: Option<&str>, at: &str) -> InboxMessage {
    serde_json::from_value(json!({
        "contactId": contact,
        "isIncoming": incoming,
        "senderId": sender,
        "message": format!("hi from {contact}"),
        "sentAt": at,
    }))
    .unwrap()
}

fn state_with_player(user: Option<&str>) -> (InboxState, Arc<CountingPlayer>) {
    let player = CountingPlayer::new();
    (InboxState::new(user.map(str::to_string), player.clone()), player)
}

#[test]
fn test_incoming_message_counts_for_closed_thread() {
    let (mut state, player) = state_with_player(Some("agent-1"));
    let outcome = state.apply_message(message("c1", true, None, "2024-05-01T10:00:00Z"));

    assert!(outcome.stored);
    assert!(outcome.counted);
    // No gesture yet, so no sound.
    assert!(!outcome.sound_played);
    assert_eq!(state.unread().get("c1"), 1);
    assert_eq!(player.plays(), 0);

    state.record_gesture();
    let outcome = state.apply_message(message("c1", true, None, "2024-05-01T10:01:00Z"));
    assert!(outcome.sound_played);
    assert_eq!(state.unread().get("c1"), 2);
    assert_eq!(player.plays(), 1);
}

#[test]
fn test_open_thread_outgoing_and_self_sent_do_not_count() {
    let (mut state, player) = state_with_player(Some("agent-1"));
    let receipts = RecordingReceipts::default();
    state.apply_message(message("c1", true, None, "2024-05-01T09:00:00Z"));
    assert_eq!(state.unread().get("c1"), 1);

    assert!(state.open_thread("c1", &receipts));
    assert_eq!(state.unread().get("c1"), 0);
    assert_eq!(*receipts.read.lock().unwrap(), vec!["c1".to_string()]);
    assert_eq!(state.open_contact(), Some("c1"));

    let open = state.apply_message(message("c1", true, None, "2024-05-01T10:00:00Z"));
    let outgoing = state.apply_message(message("c2", false, None, "2024-05-01T10:01:00Z"));
    let mine = state.apply_message(message("c3", true, Some("agent-1"), "2024-05-01T10:02:00Z"));
    for outcome in [open, outgoing, mine] {
        assert!(outcome.stored);
        assert!(!outcome.counted);
        assert!(!outcome.sound_played);
    }
    assert_eq!(state.unread().total(), 0);
    assert_eq!(player.plays(), 0);
    assert_eq!(state.threads().len(), 4);

    state.close_thread();
    assert!(state.apply_message(message("c1", true, None, "2024-05-01T11:00:00Z")).counted);
}

#[test]
fn test_message_without_timestamp_is_dropped() {
    let (mut state, _) = state_with_player(None);
    let undated: InboxMessage = serde_json::from_value(json!({
        "contactId": "c1",
        "isIncoming": true,
        "message": "no time"
    }))
    .unwrap();

    let outcome = state.apply_message(undated);
    assert!(!outcome.stored);
    assert!(!outcome.counted);
    assert_eq!(state.unread().get("c1"), 0);
    assert!(state.threads().is_empty());
}

#[test]
fn test_unread_changes_from_hub() {
    let (mut state, _) = state_with_player(None);
    state.apply_unread_change(UnreadCountChanged::Contact(UnreadCount {
        contact_id: "c4".into(),
        unread_count: 7,
    }));
    assert_eq!(state.unread().get("c4"), 7);
    assert!(!state.unread().refresh_needed());

    state.apply_unread_change(UnreadCountChanged::RefreshAll);
    assert!(state.unread().refresh_needed());
}

type ServerWs = WebSocketStream<TcpStream>;

async fn listen() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, Url::parse(&format!("ws://{addr}/chatHub")).unwrap())
}

async fn accept_hub(listener: &TcpListener) -> ServerWs {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();
    ws.next().await.unwrap().unwrap();
    ws.send(WsMsg::Text(format!("{{}}{RECORD_SEPARATOR}").into()))
        .await
        .unwrap();
    ws
}

async fn next_invocation(ws: &mut ServerWs) -> (String, Vec<Value>) {
    loop {
        if let WsMsg::Text(text) = ws.next().await.unwrap().unwrap() {
            for frame in decode_frames(text.as_str()) {
                if let Ok(HubFrame::Invocation {
                    target, arguments, ..
                }) = frame
                {
                    return (target, arguments);
                }
            }
        }
    }
}

async fn push(ws: &mut ServerWs, target: &str, arguments: Vec<Value>) {
    let frame = HubFrame::invocation(target, arguments);
    ws.send(WsMsg::Text(frame.encode().into())).await.unwrap();
}

async fn drain(mut ws: ServerWs) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn hub_config(url: Url) -> HubConfig {
    HubConfig::new(url)
        .with_token(Some("tok".into()))
        .with_reconnect(ReconnectPolicy::disabled())
}

#[tokio::test]
async fn test_view_routes_hub_events_into_state() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_hub(&listener).await;
        let (target, _) = next_invocation(&mut ws).await;
        assert_eq!(target, "Ready");
        push(
            &mut ws,
            "ReceiveInboxMessage",
            vec![json!({
                "contactId": "c1",
                "isIncoming": true,
                "message": "hello",
                "sentAt": "2024-05-01T10:00:00Z"
            })],
        )
        .await;
        push(&mut ws, "UnreadCountChanged", vec![]).await;

        let (target, arguments) = next_invocation(&mut ws).await;
        assert_eq!(target, "MarkAsRead");
        assert_eq!(arguments, vec![json!("c1")]);
        drain(ws).await;
    });

    let http = MockServer::start_async().await;
    let unread = http
        .mock_async(|when, then| {
            when.method(GET).path("/api/inbox/unread-counts");
            then.status(200).json_body(json!([
                { "contactId": "c1", "unreadCount": 3 },
                { "contactId": "c2", "unreadCount": 1 }
            ]));
        })
        .await;
    let settings = ClientSettings {
        api_url: Url::parse(&format!("{}/api/", http.base_url())).unwrap(),
        ..ClientSettings::default()
    };
    let api = ApiClient::new(&settings, Session::in_memory(), Notifier::default()).unwrap();

    let (state, _) = state_with_player(None);
    let view = InboxView::mount(hub_config(url), state.shared()).await.unwrap();
    assert_eq!(view.handler_count(), 2);
    let mut events = view.events();
    view.client().send("Ready", vec![]).unwrap();

    match timeout(WAIT, events.recv()).await.unwrap().unwrap() {
        InboxEvent::Message { message, outcome } => {
            assert_eq!(message.contact_id, "c1");
            assert!(outcome.counted);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap().unwrap(),
        InboxEvent::UnreadChanged(UnreadCountChanged::RefreshAll)
    );

    assert!(view.refresh_unread_if_needed(&api).await.unwrap());
    assert!(!view.refresh_unread_if_needed(&api).await.unwrap());
    unread.assert_hits_async(1).await;
    {
        let shared = view.state();
        let state = shared.lock().unwrap();
        assert_eq!(state.unread().get("c1"), 3);
        assert_eq!(state.unread().total(), 4);
    }

    assert!(view.open_thread("c1"));
    assert_eq!(view.state().lock().unwrap().unread().get("c1"), 0);

    let registry = view.client().registry();
    view.unmount().await;
    assert_eq!(registry.total(), 0);
    server.await.unwrap();
}

#[tokio::test]
async fn test_remount_does_not_leak_handlers() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        for _ in 0..2 {
            let ws = accept_hub(&listener).await;
            drain(ws).await;
        }
    });

    let state = state_with_player(None).0.shared();
    for _ in 0..2 {
        let view = InboxView::mount(hub_config(url.clone()), state.clone())
            .await
            .unwrap();
        assert_eq!(view.handler_count(), 2);
        let registry = view.client().registry();
        view.unmount().await;
        assert_eq!(registry.total(), 0);
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_listening_view_rings_after_gesture() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_hub(&listener).await;
        let (target, _) = next_invocation(&mut ws).await;
        assert_eq!(target, "Ready");
        push(
            &mut ws,
            "ReceiveInboxMessage",
            vec![json!({
                "contactId": "c9",
                "isIncoming": true,
                "message": "ping",
                "sentAt": "2024-05-02T08:00:00Z"
            })],
        )
        .await;
        drain(ws).await;
    });

    let (state, player) = state_with_player(None);
    let view = InboxView::mount(hub_config(url), state.shared()).await.unwrap();
    let mut events = view.events();
    view.record_gesture();
    assert!(view.state().lock().unwrap().sound().is_unlocked());
    view.client().send("Ready", vec![]).unwrap();

    match timeout(WAIT, events.recv()).await.unwrap().unwrap() {
        InboxEvent::Message { outcome, .. } => {
            assert!(outcome.counted);
            assert!(outcome.sound_played);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(player.plays(), 1);

    view.unmount().await;
    server.await.unwrap();
}
