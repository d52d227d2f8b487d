use std::sync::Mutex;

use frames::{MessageEnvelope, Pong, ServerError};

use super::*;

#[derive(Default)]
struct Calls {
    log: Mutex<Vec<String>>,
}

impl Calls {
    fn push(&self, entry: impl Into<String>) {
        self.log.lock().expect("lock").push(entry.into());
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock().expect("lock"))
    }
}

fn recording_handlers(calls: &Arc<Calls>) -> EventHandlers {
    let c = |calls: &Arc<Calls>| Arc::clone(calls);
    let (a, b, d, e, f, g, h, i, j) =
        (c(calls), c(calls), c(calls), c(calls), c(calls), c(calls), c(calls), c(calls), c(calls));
    EventHandlers::new()
        .on_connected(move |info| a.push(format!("connected:{}", info.user_id)))
        .on_message(move |msg| b.push(format!("message:{}", msg.id)))
        .on_message_sent(move |ack| d.push(format!("message_sent:{}", ack.message_id)))
        .on_typing(move |ev| e.push(format!("typing:{}", ev.user_id)))
        .on_read(move |rr| f.push(format!("read:{}", rr.message_id)))
        .on_presence(move |p| g.push(format!("presence:{}:{}", p.user_id, p.status.as_str())))
        .on_sync_data(move |batch| h.push(format!("sync_data:{}", batch.count)))
        .on_pong(move |_| i.push("pong"))
        .on_error(move |err| j.push(format!("error:{err}")))
}

#[test]
fn presence_frame_invokes_only_presence_handler_with_fields_unmodified() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(Calls::default());
    let seen_in = Arc::clone(&seen);
    let other = Arc::clone(&calls);
    let other2 = Arc::clone(&calls);
    let handlers = EventHandlers::new()
        .on_presence(move |p: &PresenceEvent| seen_in.lock().expect("lock").push(p.clone()))
        .on_message(move |_| other.push("message"))
        .on_typing(move |_| other2.push("typing"));

    let event = PresenceEvent { user_id: "agent-42".to_owned(), status: "away".to_owned() };
    assert!(handlers.dispatch(&Inbound::Presence(event.clone())));

    assert_eq!(*seen.lock().expect("lock"), vec![event]);
    assert!(calls.take().is_empty());
}

#[test]
fn each_kind_routes_to_its_own_handler() {
    let calls = Arc::new(Calls::default());
    let handlers = recording_handlers(&calls);

    let text_frames = [
        r#"{"type":"connected","user_id":"u-1","timestamp":"2026-01-01T00:00:00Z"}"#,
        r#"{"type":"message","message":{"id":"m-1","conversation_id":"c","user_id":"u","content":"x","role":"user","created_at":1}}"#,
        r#"{"type":"message_sent","message_id":"m-2","timestamp":2}"#,
        r#"{"type":"typing","conversation_id":"c","user_id":"u-3","is_typing":true}"#,
        r#"{"type":"read","conversation_id":"c","user_id":"u","message_id":"m-4"}"#,
        r#"{"type":"presence","user_id":"u-5","status":"online"}"#,
        r#"{"type":"sync_data","messages":[],"count":6}"#,
        r#"{"type":"pong","timestamp":7}"#,
        r#"{"type":"error","error":"boom","code":"E8"}"#,
    ];
    for text in text_frames {
        let frame = frames::decode_inbound(text).expect("decode");
        assert!(handlers.dispatch(&frame), "{text} should be handled");
    }

    assert_eq!(
        calls.take(),
        vec![
            "connected:u-1",
            "message:m-1",
            "message_sent:m-2",
            "typing:u-3",
            "read:m-4",
            "presence:u-5:online",
            "sync_data:6",
            "pong",
            "error:server error [E8]: boom",
        ]
    );
}

#[test]
fn missing_handler_drops_frame() {
    let handlers = EventHandlers::new();
    let frame = Inbound::Pong(Pong { timestamp: Timestamp::Millis(1) });
    assert!(!handlers.dispatch(&frame));
    assert!(!handlers.handles(InboundKind::Pong));
}

#[test]
fn server_error_frame_reaches_error_handler_as_client_error() {
    let seen = Arc::new(Mutex::new(None));
    let seen_in = Arc::clone(&seen);
    let handlers = EventHandlers::new().on_error(move |err| *seen_in.lock().expect("lock") = Some(err.clone()));

    let frame = Inbound::Error(ServerError { error: "forbidden".to_owned(), code: "403".to_owned() });
    assert!(handlers.dispatch(&frame));
    assert_eq!(
        *seen.lock().expect("lock"),
        Some(ClientError::Server { message: "forbidden".to_owned(), code: "403".to_owned() })
    );
}

#[test]
fn observe_errors_runs_before_user_handler() {
    let calls = Arc::new(Calls::default());
    let user = Arc::clone(&calls);
    let observer = Arc::clone(&calls);
    let handlers = EventHandlers::new()
        .on_error(move |_| user.push("user"))
        .observe_errors(move |_| observer.push("observer"));

    handlers.error(&ClientError::Transport("reset".to_owned()));
    assert_eq!(calls.take(), vec!["observer", "user"]);
}

#[test]
fn observe_errors_without_user_handler_still_observes() {
    let calls = Arc::new(Calls::default());
    let observer = Arc::clone(&calls);
    let handlers = EventHandlers::new().observe_errors(move |_| observer.push("observer"));
    assert!(handlers.handles(InboundKind::Error));

    handlers.error(&ClientError::ReconnectExhausted { attempts: 3 });
    assert_eq!(calls.take(), vec!["observer"]);
}

#[test]
fn observe_status_runs_before_user_handler() {
    let calls = Arc::new(Calls::default());
    let user = Arc::clone(&calls);
    let observer = Arc::clone(&calls);
    let handlers = EventHandlers::new()
        .on_status(move |s| user.push(s.as_str()))
        .observe_status(move |_| observer.push("observer"));

    handlers.status(ConnectionStatus::Reconnecting);
    assert_eq!(calls.take(), vec!["observer", "reconnecting"]);
}

#[test]
fn status_handler_receives_transitions() {
    let calls = Arc::new(Calls::default());
    let rec = Arc::clone(&calls);
    let handlers = EventHandlers::new().on_status(move |s| rec.push(s.as_str()));
    handlers.status(ConnectionStatus::Connecting);
    handlers.status(ConnectionStatus::Connected);
    assert_eq!(calls.take(), vec!["connecting", "connected"]);
}

#[test]
fn message_handler_receives_unwrapped_message() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let handlers = EventHandlers::new().on_message(move |m| seen_in.lock().expect("lock").push(m.content.clone()));

    let message = ChatMessage {
        id: "m".to_owned(),
        conversation_id: "c".to_owned(),
        user_id: "u".to_owned(),
        content: "hello there".to_owned(),
        role: "agent".to_owned(),
        created_at: Timestamp::Text("now".to_owned()),
    };
    handlers.dispatch(&Inbound::Message(MessageEnvelope { message }));
    assert_eq!(*seen.lock().expect("lock"), vec!["hello there".to_owned()]);
}
