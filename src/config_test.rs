use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect::<HashMap<_, _>>();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn new_applies_documented_defaults() {
    let cfg = ClientConfig::new("ws://localhost:8080/ws", "tok");
    assert!(cfg.auto_connect);
    assert_eq!(cfg.reconnect_interval, Duration::from_millis(1000));
    assert_eq!(cfg.max_reconnect_attempts, 10);
    assert_eq!(cfg.max_backoff, Duration::from_millis(32_000));
    assert_eq!(cfg.ping_interval, Duration::from_millis(30_000));
    assert_eq!(cfg.queue_capacity, 100);
    assert_eq!(cfg.max_send_retries, 3);
    assert_eq!(cfg.max_missed_pongs, 2);
    assert_eq!(cfg.status_poll_interval, Duration::from_secs(1));
    assert!(cfg.validate().is_ok());
}

#[test]
fn connection_url_appends_token_query() {
    let cfg = ClientConfig::new("ws://localhost:8080/ws", "abc123");
    assert_eq!(cfg.connection_url(), "ws://localhost:8080/ws?token=abc123");
}

#[test]
fn connection_url_joins_existing_query_with_ampersand() {
    let cfg = ClientConfig::new("wss://chat.example.test/ws?tenant=7", "abc123");
    assert_eq!(cfg.connection_url(), "wss://chat.example.test/ws?tenant=7&token=abc123");
}

#[test]
fn connection_url_percent_encodes_token() {
    let cfg = ClientConfig::new("ws://localhost:8080/ws", "a&b=c#d+e f/g");
    assert_eq!(cfg.connection_url(), "ws://localhost:8080/ws?token=a%26b%3Dc%23d%2Be%20f%2Fg");
}

#[test]
fn connection_url_without_token_is_unchanged() {
    let cfg = ClientConfig::new("ws://localhost:8080/ws", "");
    assert_eq!(cfg.connection_url(), "ws://localhost:8080/ws");
}

#[test]
fn reconnect_delay_uses_interval_and_ceiling() {
    let cfg = ClientConfig { max_backoff: Duration::from_millis(4000), ..ClientConfig::new("ws://h", "t") };
    assert_eq!(cfg.reconnect_delay(0), Duration::from_millis(1000));
    assert_eq!(cfg.reconnect_delay(2), Duration::from_millis(4000));
    assert_eq!(cfg.reconnect_delay(3), Duration::from_millis(4000));
}

#[test]
fn from_lookup_requires_url() {
    let err = ClientConfig::from_lookup(lookup_from(&[("CHAT_WS_TOKEN", "t")])).expect_err("url required");
    assert_eq!(err, ConfigError::MissingVar { var: "CHAT_WS_URL" });

    let err = ClientConfig::from_lookup(lookup_from(&[("CHAT_WS_URL", "  ")])).expect_err("blank url");
    assert_eq!(err, ConfigError::MissingVar { var: "CHAT_WS_URL" });
}

#[test]
fn from_lookup_parses_overrides() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[
        ("CHAT_WS_URL", "wss://chat.example.test/ws"),
        ("CHAT_WS_TOKEN", "secret"),
        ("CHAT_WS_AUTO_CONNECT", "false"),
        ("CHAT_WS_RECONNECT_INTERVAL_MS", "250"),
        ("CHAT_WS_MAX_RECONNECT_ATTEMPTS", "4"),
        ("CHAT_WS_MAX_BACKOFF_MS", "2000"),
        ("CHAT_WS_PING_INTERVAL_MS", "5000"),
        ("CHAT_WS_QUEUE_CAPACITY", "16"),
        ("CHAT_WS_MAX_SEND_RETRIES", "1"),
        ("CHAT_WS_MAX_MISSED_PONGS", "0"),
        ("CHAT_WS_STATUS_POLL_MS", "200"),
    ]))
    .expect("config");

    assert_eq!(cfg.url, "wss://chat.example.test/ws");
    assert_eq!(cfg.token, "secret");
    assert!(!cfg.auto_connect);
    assert_eq!(cfg.reconnect_interval, Duration::from_millis(250));
    assert_eq!(cfg.max_reconnect_attempts, 4);
    assert_eq!(cfg.max_backoff, Duration::from_millis(2000));
    assert_eq!(cfg.ping_interval, Duration::from_millis(5000));
    assert_eq!(cfg.queue_capacity, 16);
    assert_eq!(cfg.max_send_retries, 1);
    assert_eq!(cfg.max_missed_pongs, 0);
    assert_eq!(cfg.status_poll_interval, Duration::from_millis(200));
}

#[test]
fn from_lookup_falls_back_on_unparsable_numbers() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[
        ("CHAT_WS_URL", "ws://localhost/ws"),
        ("CHAT_WS_MAX_RECONNECT_ATTEMPTS", "many"),
        ("CHAT_WS_AUTO_CONNECT", "yes"),
    ]))
    .expect("config");
    assert_eq!(cfg.max_reconnect_attempts, DEFAULT_MAX_RECONNECT_ATTEMPTS);
    assert!(cfg.auto_connect);
}

#[test]
fn validate_rejects_http_url() {
    let err = ClientConfig::new("http://localhost/ws", "t").validate().expect_err("scheme");
    assert_eq!(err, ConfigError::InvalidUrl("http://localhost/ws".to_owned()));
}

#[test]
fn validate_rejects_zero_queue_capacity() {
    let cfg = ClientConfig { queue_capacity: 0, ..ClientConfig::new("ws://h", "t") };
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue { field: "queue_capacity", .. })));
}

#[test]
fn validate_rejects_ceiling_below_interval() {
    let cfg = ClientConfig { max_backoff: Duration::from_millis(10), ..ClientConfig::new("ws://h", "t") };
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue { field: "max_backoff", .. })));
}
