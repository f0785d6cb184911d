use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use super::topic::{Topic, matching_keys, wildcard_key};
use super::{Broker, BrokerConfig, Message, OverflowPolicy};
use crate::subscriber::{Mailbox, Subscriber};
use crate::utils::error::BrokerError;

async fn next(mailbox: &mut Mailbox<String>) -> Message<String> {
    timeout(Duration::from_secs(1), mailbox.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("mailbox closed")
}

async fn assert_silent(mailbox: &mut Mailbox<String>) {
    if let Ok(Some(message)) = timeout(Duration::from_millis(100), mailbox.recv()).await {
        panic!("unexpected message on {}: {}", message.topic(), message.payload());
    }
}

#[test]
fn test_message_accessors() {
    let message = Message::new("orders", 42u32);
    assert_eq!(message.topic(), "orders");
    assert_eq!(*message.payload(), 42);
    assert!(message.timestamp() > 0);
    assert_eq!(message.into_payload(), 42);
}

#[test]
fn test_message_serializes_to_json() {
    let message = Message::new("orders", "hello".to_string());
    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["topic"], "orders");
    assert_eq!(json["payload"], "hello");

    let back: Message<String> = serde_json::from_value(json).unwrap();
    assert_eq!(back, message);
}

#[test]
fn test_topic_new() {
    let topic: Topic<String> = Topic::new("test_topic");
    assert_eq!(topic.name, "test_topic");
    assert!(topic.is_empty());
}

#[test]
fn test_topic_subscribe_and_unsubscribe() {
    let mut topic = Topic::new("test_topic");
    let subscriber: Arc<Subscriber<String>> = Arc::new(Subscriber::new(0, OverflowPolicy::Block));

    topic.subscribe(subscriber.clone());
    topic.subscribe(subscriber.clone());
    assert_eq!(topic.len(), 1);
    assert!(topic.subscribers.contains_key(subscriber.id()));

    topic.unsubscribe(subscriber.id());
    assert!(topic.is_empty());
}

#[test]
fn test_wildcard_key() {
    assert_eq!(wildcard_key("orders.created", "."), Some("orders.*".to_string()));
    assert_eq!(
        wildcard_key("orders.created.refund", "."),
        Some("orders.created.*".to_string())
    );
    assert_eq!(wildcard_key("orders", "."), None);
    assert_eq!(wildcard_key("orders.created", ""), None);
    assert_eq!(wildcard_key("a::b", "::"), Some("a::*".to_string()));
}

#[test]
fn test_matching_keys() {
    assert_eq!(matching_keys("orders.created", false, "."), vec!["orders.created"]);
    assert_eq!(
        matching_keys("orders.created", true, "."),
        vec!["orders.created", "orders.*"]
    );
    assert_eq!(matching_keys("orders.*", true, "."), vec!["orders.*"]);
    assert_eq!(matching_keys("orders", true, "."), vec!["orders"]);
}

#[test]
fn test_broker_new() {
    let broker: Broker<String> = Broker::default();
    assert_eq!(broker.subscriber_count(), 0);
    assert!(broker.topics().is_empty());
    assert_eq!(broker.config(), &BrokerConfig::default());
}

#[test]
fn test_broker_subscribe_and_unsubscribe() {
    let broker: Broker<String> = Broker::default();
    let subscriber = broker.add_subscriber().unwrap();

    broker.subscribe(&subscriber, "test_topic").unwrap();
    assert_eq!(broker.get_subscribers("test_topic"), 1);
    assert_eq!(subscriber.get_topics(), vec!["test_topic"]);

    broker.unsubscribe(&subscriber, "test_topic");
    assert_eq!(broker.get_subscribers("test_topic"), 0);
    assert!(subscriber.get_topics().is_empty());
    assert!(broker.topics().is_empty());
}

#[test]
fn test_subscribe_is_idempotent() {
    let broker: Broker<String> = Broker::default();
    let subscriber = broker.add_subscriber().unwrap();

    broker.subscribe(&subscriber, "t").unwrap();
    broker.subscribe(&subscriber, "t").unwrap();
    assert_eq!(broker.get_subscribers("t"), 1);
    assert_eq!(subscriber.get_topics().len(), 1);
}

#[test]
fn test_unsubscribe_when_not_subscribed_is_noop() {
    let broker: Broker<String> = Broker::default();
    let a = broker.add_subscriber().unwrap();
    let b = broker.add_subscriber().unwrap();
    broker.subscribe(&a, "t").unwrap();

    broker.unsubscribe(&b, "t");
    broker.unsubscribe(&b, "missing");
    assert_eq!(broker.get_subscribers("t"), 1);
    assert!(a.has_topic("t"));
}

#[test]
fn test_capacity_limit() {
    let broker: Broker<String> = Broker::new(BrokerConfig::default().with_max_subscribers(2));
    let first = broker.add_subscriber().unwrap();
    broker.add_subscriber().unwrap();

    assert_eq!(
        broker.add_subscriber().unwrap_err(),
        BrokerError::CapacityExceeded { max: 2 }
    );
    assert_eq!(broker.subscriber_count(), 2);

    // removal frees a slot
    broker.remove_subscriber(&first);
    assert!(broker.add_subscriber().is_ok());
}

#[test]
fn test_remove_subscriber_clears_every_topic() {
    let broker: Broker<String> = Broker::default();
    let subscriber = broker.add_subscriber().unwrap();
    broker.subscribe(&subscriber, "a").unwrap();
    broker.subscribe(&subscriber, "b").unwrap();

    broker.remove_subscriber(&subscriber);
    assert_eq!(broker.get_subscribers("a"), 0);
    assert_eq!(broker.get_subscribers("b"), 0);
    assert_eq!(broker.subscriber_count(), 0);
    assert!(subscriber.get_topics().is_empty());
    assert!(!subscriber.is_active());

    // second removal is harmless
    broker.remove_subscriber(&subscriber);
}

#[test]
fn test_subscribe_after_removal_is_rejected() {
    let broker: Broker<String> = Broker::default();
    let subscriber = broker.add_subscriber().unwrap();
    broker.remove_subscriber(&subscriber);

    let err = broker.subscribe(&subscriber, "t").unwrap_err();
    assert_eq!(err, BrokerError::UnknownSubscriber(subscriber.id().clone()));
    assert_eq!(broker.get_subscribers("t"), 0);
}

#[test]
fn test_subscriber_from_other_broker_is_rejected() {
    let ours: Broker<String> = Broker::default();
    let theirs: Broker<String> = Broker::default();
    let foreign = theirs.add_subscriber().unwrap();

    assert!(ours.subscribe(&foreign, "t").is_err());
    assert!(foreign.get_topics().is_empty());
}

#[test]
fn test_other_broker_cannot_unsubscribe_or_remove() {
    let ours: Broker<String> = Broker::default();
    let theirs: Broker<String> = Broker::default();
    let foreign = theirs.add_subscriber().unwrap();
    theirs.subscribe(&foreign, "t").unwrap();

    ours.unsubscribe(&foreign, "t");
    assert_eq!(foreign.get_topics(), vec!["t"]);
    assert_eq!(theirs.get_subscribers("t"), 1);

    ours.remove_subscriber(&foreign);
    assert!(foreign.is_active());
    assert_eq!(theirs.subscriber_count(), 1);

    // the owner still cleans up completely
    theirs.remove_subscriber(&foreign);
    assert_eq!(theirs.get_subscribers("t"), 0);
    assert!(theirs.topics().is_empty());
    assert_eq!(theirs.subscriber_count(), 0);
    assert!(!foreign.is_active());
}

#[test]
fn test_subscribe_updates_topic_set_and_index_together() {
    let broker: Broker<String> = Broker::default();
    let subscriber = broker.add_subscriber().unwrap();

    broker.subscribe(&subscriber, "a").unwrap();
    assert!(subscriber.has_topic("a"));
    assert_eq!(broker.get_subscribers("a"), 1);

    broker.unsubscribe(&subscriber, "a");
    assert!(!subscriber.has_topic("a"));
    assert_eq!(broker.get_subscribers("a"), 0);
}

#[tokio::test]
async fn test_broker_publish() {
    let broker: Broker<String> = Broker::default();
    let subscriber = broker.add_subscriber().unwrap();
    let mut mailbox = subscriber.take_mailbox().unwrap();
    broker.subscribe(&subscriber, "test_topic").unwrap();

    assert_eq!(broker.publish("test_topic", "hello".to_string()), 1);

    let received = next(&mut mailbox).await;
    assert_eq!(received.topic(), "test_topic");
    assert_eq!(received.payload(), "hello");
}

#[tokio::test]
async fn test_publish_to_nonexistent_topic() {
    let broker: Broker<String> = Broker::default();
    assert_eq!(broker.publish("nonexistent_topic", "hello".to_string()), 0);
}

#[tokio::test]
async fn test_publish_skips_inactive_and_continues() {
    let broker: Broker<String> = Broker::default();
    let mut mailboxes = Vec::new();
    let mut subscribers = Vec::new();
    for _ in 0..4 {
        let subscriber = broker.add_subscriber().unwrap();
        mailboxes.push(subscriber.take_mailbox().unwrap());
        broker.subscribe(&subscriber, "t").unwrap();
        subscribers.push(subscriber);
    }

    // deactivated behind the broker's back, still indexed
    subscribers[1].destruct();
    assert_eq!(broker.get_subscribers("t"), 4);

    assert_eq!(broker.publish("t", "hello".to_string()), 3);
    for (i, mailbox) in mailboxes.iter_mut().enumerate() {
        if i == 1 {
            assert!(mailbox.recv().await.is_none());
        } else {
            assert_eq!(next(mailbox).await.payload(), "hello");
        }
    }
}

#[tokio::test]
async fn test_publish_after_remove_does_not_deliver() {
    let broker: Broker<String> = Broker::default();
    let subscriber = broker.add_subscriber().unwrap();
    let mut mailbox = subscriber.take_mailbox().unwrap();
    broker.subscribe(&subscriber, "t").unwrap();

    broker.remove_subscriber(&subscriber);
    assert_eq!(broker.publish("t", "late".to_string()), 0);
    assert!(mailbox.recv().await.is_none());
}

#[tokio::test]
async fn test_wildcard_matching() {
    let broker: Broker<String> = Broker::new(BrokerConfig::default().with_wildcard("."));
    let subscriber = broker.add_subscriber().unwrap();
    let mut mailbox = subscriber.take_mailbox().unwrap();
    broker.subscribe(&subscriber, "orders.*").unwrap();

    assert_eq!(broker.publish("orders.created", "c".to_string()), 1);
    let received = next(&mut mailbox).await;
    assert_eq!(received.topic(), "orders.created");
    assert_eq!(received.payload(), "c");

    assert_eq!(broker.publish("orders.cancelled", "x".to_string()), 1);
    assert_eq!(next(&mut mailbox).await.topic(), "orders.cancelled");

    assert_eq!(broker.publish("orders.created.refund", "r".to_string()), 0);
    assert_eq!(broker.publish("billing.created", "b".to_string()), 0);
    assert_silent(&mut mailbox).await;

    // exact-key count does not expand wildcards
    assert_eq!(broker.get_subscribers("orders.created"), 0);
}

#[tokio::test]
async fn test_wildcard_and_exact_subscriber_receives_once() {
    let broker: Broker<String> = Broker::new(BrokerConfig::default().with_wildcard("."));
    let subscriber = broker.add_subscriber().unwrap();
    let mut mailbox = subscriber.take_mailbox().unwrap();
    broker.subscribe(&subscriber, "orders.*").unwrap();
    broker.subscribe(&subscriber, "orders.created").unwrap();

    assert_eq!(broker.publish("orders.created", "once".to_string()), 1);
    assert_eq!(next(&mut mailbox).await.payload(), "once");
    assert_silent(&mut mailbox).await;
}

#[tokio::test]
async fn test_bare_wildcard_matches_nothing() {
    let broker: Broker<String> = Broker::new(BrokerConfig::default().with_wildcard("."));
    let subscriber = broker.add_subscriber().unwrap();
    broker.subscribe(&subscriber, "*").unwrap();

    assert_eq!(broker.publish("orders", "x".to_string()), 0);
    assert_eq!(broker.publish("orders.created", "x".to_string()), 0);
}

#[tokio::test]
async fn test_exact_match_without_wildcard() {
    let broker: Broker<String> = Broker::default();
    let subscriber = broker.add_subscriber().unwrap();
    let mut mailbox = subscriber.take_mailbox().unwrap();
    broker.subscribe(&subscriber, "orders.*").unwrap();

    assert_eq!(broker.publish("orders.created", "x".to_string()), 0);
    assert_silent(&mut mailbox).await;

    assert_eq!(broker.publish("orders.*", "literal".to_string()), 1);
    assert_eq!(next(&mut mailbox).await.payload(), "literal");
}

#[tokio::test]
async fn test_broadcast_reaches_every_subscriber_once() {
    let broker: Broker<String> = Broker::new(BrokerConfig::default().with_wildcard("."));
    let a = broker.add_subscriber().unwrap();
    let b = broker.add_subscriber().unwrap();
    let idle = broker.add_subscriber().unwrap();
    let mut mailbox_a = a.take_mailbox().unwrap();
    let mut mailbox_b = b.take_mailbox().unwrap();
    let mut mailbox_idle = idle.take_mailbox().unwrap();

    broker.subscribe(&a, "alpha").unwrap();
    broker.subscribe(&a, "beta").unwrap();
    broker.subscribe(&b, "gamma").unwrap();

    assert_eq!(broker.broadcast("all".to_string()), 2);

    let received = next(&mut mailbox_a).await;
    assert_eq!(received.topic(), "alpha");
    assert_eq!(received.payload(), "all");
    assert_eq!(next(&mut mailbox_b).await.topic(), "gamma");

    assert_silent(&mut mailbox_a).await;
    assert_silent(&mut mailbox_idle).await;
}

#[tokio::test]
async fn test_broadcast_to_topic_list() {
    let broker: Broker<String> = Broker::default();
    let a = broker.add_subscriber().unwrap();
    let b = broker.add_subscriber().unwrap();
    let mut mailbox_a = a.take_mailbox().unwrap();
    let mut mailbox_b = b.take_mailbox().unwrap();
    broker.subscribe(&a, "alpha").unwrap();
    broker.subscribe(&b, "beta").unwrap();

    assert_eq!(broker.broadcast_to(["alpha", "missing"], "hi".to_string()), 1);
    assert_eq!(next(&mut mailbox_a).await.topic(), "alpha");
    assert_silent(&mut mailbox_b).await;
}

#[tokio::test]
async fn test_subscriber_for_binds_topics() {
    let broker: Broker<String> = Broker::default();
    let subscriber = broker.subscriber_for(["a", "b"]).unwrap();

    let mut topics = subscriber.get_topics();
    topics.sort();
    assert_eq!(topics, vec!["a", "b"]);
    assert_eq!(broker.get_subscribers("a"), 1);
    assert_eq!(broker.get_subscribers("b"), 1);
}

#[tokio::test]
async fn test_listen_runs_handler_until_removed() {
    let broker: Broker<String> = Broker::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (subscriber, handle) = broker
        .listen(["prices"], move |message: Message<String>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(message.into_payload());
            }
        })
        .unwrap();

    broker.publish("prices", "BTC".to_string());
    let seen = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert_eq!(seen.as_deref(), Some("BTC"));

    broker.remove_subscriber(&subscriber);
    timeout(Duration::from_secs(1), handle)
        .await
        .expect("listener did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_listen_respects_capacity() {
    let broker: Broker<String> = Broker::new(BrokerConfig::default().with_max_subscribers(1));
    broker.add_subscriber().unwrap();

    let err = broker.listen(["t"], |_message| async {}).unwrap_err();
    assert_eq!(err, BrokerError::CapacityExceeded { max: 1 });
}

#[tokio::test]
async fn test_remove_releases_blocked_deliveries() {
    let broker: Broker<String> =
        Broker::new(BrokerConfig::default().with_mailbox(1, OverflowPolicy::Block));
    let subscriber = broker.add_subscriber().unwrap();
    let mut mailbox = subscriber.take_mailbox().unwrap();
    broker.subscribe(&subscriber, "t").unwrap();

    for i in 0..5 {
        broker.publish("t", i.to_string());
    }
    // one message fits, the other deliveries are parked
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mailbox.len(), 1);

    broker.remove_subscriber(&subscriber);
    next(&mut mailbox).await;
    let end = timeout(Duration::from_secs(1), mailbox.recv())
        .await
        .expect("mailbox never closed");
    assert!(end.is_none());
}
