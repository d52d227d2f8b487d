use super::*;

fn chat(content: &str) -> QueuedMessage {
    QueuedMessage::new(Outbound::Message { conversation_id: "conv-1".to_owned(), content: content.to_owned() })
}

fn contents(queue: &OutboundQueue) -> Vec<String> {
    queue
        .iter()
        .map(|entry| match &entry.message {
            Outbound::Message { content, .. } => content.clone(),
            other => other.kind().to_owned(),
        })
        .collect()
}

#[test]
fn new_entry_has_fresh_id_and_no_attempts() {
    let a = chat("a");
    let b = chat("b");
    assert_ne!(a.id, b.id);
    assert_eq!(a.attempts, 0);
    assert!(a.enqueued_at > 0);
}

#[test]
fn push_below_capacity_evicts_nothing() {
    let mut queue = OutboundQueue::new(3);
    assert!(queue.push(chat("a")).is_none());
    assert!(queue.push(chat("b")).is_none());
    assert_eq!(queue.len(), 2);
    assert_eq!(contents(&queue), vec!["a", "b"]);
}

#[test]
fn push_at_capacity_evicts_oldest() {
    let mut queue = OutboundQueue::new(100);
    for i in 0..100 {
        assert!(queue.push(chat(&format!("m{i}"))).is_none());
    }

    let evicted = queue.push(chat("m100")).expect("oldest evicted");
    assert!(matches!(evicted.message, Outbound::Message { ref content, .. } if content == "m0"));
    assert_eq!(queue.len(), 100);

    let remaining = contents(&queue);
    assert_eq!(remaining.first().map(String::as_str), Some("m1"));
    assert_eq!(remaining.last().map(String::as_str), Some("m100"));
}

#[test]
fn drain_returns_fifo_order_and_empties_queue() {
    let mut queue = OutboundQueue::new(10);
    queue.push(chat("first"));
    queue.push(chat("second"));
    queue.push(chat("third"));

    let drained = queue.drain();
    let order = drained
        .iter()
        .map(|entry| match &entry.message {
            Outbound::Message { content, .. } => content.as_str(),
            _ => "",
        })
        .collect::<Vec<_>>();
    assert_eq!(order, vec!["first", "second", "third"]);
    assert!(queue.is_empty());
}

#[test]
fn zero_capacity_is_clamped_to_one() {
    let mut queue = OutboundQueue::new(0);
    assert_eq!(queue.capacity(), 1);
    queue.push(chat("a"));
    let evicted = queue.push(chat("b"));
    assert!(evicted.is_some());
    assert_eq!(contents(&queue), vec!["b"]);
}
