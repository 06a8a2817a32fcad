//! Unit tests for event decoding, field access, the bus, and isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use crate::{
    DomainEvents, ErrorLogger, Event, EventBus, EventKind, ExceptionReporter, FieldPath,
    FieldPathError, HandlerFailure, Isolation, MilestoneType, SkipReason,
};

fn data(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other:?}"),
    }
}

fn milestone_event(kind: &str, value: u64) -> Event {
    serde_json::from_value(json!({
        "type": "milestone_created",
        "milestone": {"type": kind, "value": value, "currency": "usd"},
        "meta": {"reason": "import", "currentARR": 120}
    }))
    .expect("milestone event should decode")
}

#[derive(Default)]
struct Counting {
    logged: AtomicUsize,
    reported: AtomicUsize,
    messages: Mutex<Vec<String>>,
}

impl ErrorLogger for Counting {
    fn error(&self, failure: &HandlerFailure) {
        self.logged.fetch_add(1, Ordering::SeqCst);
        self.messages.lock().unwrap().push(failure.to_string());
    }
}

impl ExceptionReporter for Counting {
    fn capture_exception(&self, _failure: &HandlerFailure) {
        self.reported.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting_isolation() -> (Arc<Counting>, Isolation) {
    let counting = Arc::new(Counting::default());
    let isolation = Isolation::new(counting.clone(), counting.clone());
    (counting, isolation)
}

// ── Decoding ─────────────────────────────────────────────────────────

#[test]
fn decodes_each_event_family() {
    let milestone = milestone_event("arr", 100);
    assert_eq!(milestone.kind(), EventKind::MilestoneCreated);
    match &milestone {
        Event::MilestoneCreated(payload) => {
            assert_eq!(payload.milestone.kind, MilestoneType::Arr);
            assert_eq!(payload.milestone.value, 100);
            let meta = payload.meta.as_ref().expect("meta should decode");
            assert_eq!(meta.reason, Some(SkipReason::Import));
            assert_eq!(meta.current_arr, Some(120));
        }
        other => panic!("unexpected variant: {other:?}"),
    }

    let enabled: Event = serde_json::from_value(json!({"type": "stripe_live_enabled"})).unwrap();
    assert_eq!(enabled.kind(), EventKind::StripeLiveEnabled);

    let disabled: Event =
        serde_json::from_value(json!({"type": "stripe_live_disabled", "message": "off"})).unwrap();
    assert_eq!(disabled.kind(), EventKind::StripeLiveDisabled);

    let model: Event = serde_json::from_value(json!({
        "type": "model",
        "event": "theme.uploaded",
        "data": {"name": "Casper"}
    }))
    .unwrap();
    assert_eq!(model.kind(), EventKind::model("theme.uploaded"));
}

#[test]
fn unknown_milestone_type_is_preserved() {
    let event = milestone_event("subscriptions", 100);
    match event {
        Event::MilestoneCreated(payload) => {
            assert_eq!(
                payload.milestone.kind,
                MilestoneType::Other("subscriptions".to_string())
            );
            let encoded = serde_json::to_value(&payload.milestone).unwrap();
            assert_eq!(encoded["type"], "subscriptions");
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn milestone_value_accepts_whole_floats() {
    let decode = |value: Value| -> Result<Event, serde_json::Error> {
        serde_json::from_value(json!({
            "type": "milestone_created",
            "milestone": {"type": "arr", "value": value}
        }))
    };

    match decode(json!(100.0)).unwrap() {
        Event::MilestoneCreated(payload) => assert_eq!(payload.milestone.value, 100),
        other => panic!("unexpected variant: {other:?}"),
    }
    assert!(decode(json!(100.5)).is_err());
    assert!(decode(json!(-100)).is_err());
    assert!(decode(json!("100")).is_err());
}

#[test]
fn rejects_milestone_without_payload() {
    let result: Result<Event, _> = serde_json::from_value(json!({"type": "milestone_created"}));
    assert!(result.is_err());
}

#[test]
fn owned_and_static_model_kinds_are_equal() {
    assert_eq!(
        EventKind::model("post.published"),
        EventKind::model(String::from("post.published"))
    );
    assert_eq!(EventKind::MilestoneCreated.to_string(), "MilestoneCreatedEvent");
}

// ── Field access ─────────────────────────────────────────────────────

#[test]
fn field_path_validation() {
    assert_eq!(FieldPath::parse(""), Err(FieldPathError::Empty));
    assert!(matches!(
        FieldPath::parse("a..b"),
        Err(FieldPathError::EmptySegment(_))
    ));
    assert!(matches!(
        FieldPath::parse(".a"),
        Err(FieldPathError::EmptySegment(_))
    ));
    let path: FieldPath = "milestone.value".parse().unwrap();
    assert_eq!(path.segments(), ["milestone", "value"]);
    assert_eq!(path.to_string(), "milestone.value");
}

#[test]
fn model_fields_resolve_nested_and_missing() {
    let event = Event::model(
        "post.published",
        data(json!({
            "name": "Casper",
            "author": {"slug": "jo"},
            "tags": ["news", "release"],
            "visibility": null
        })),
    );

    let get = |path: &str| event.field(&FieldPath::parse(path).unwrap());

    assert_eq!(get("name"), Some(json!("Casper")));
    assert_eq!(get("author.slug"), Some(json!("jo")));
    assert_eq!(get("tags.1"), Some(json!("release")));
    assert_eq!(get("visibility"), Some(Value::Null));
    assert_eq!(get("missing"), None);
    assert_eq!(get("author.missing"), None);
    assert_eq!(get("name.inner"), None);
    assert_eq!(get("tags.9"), None);
}

#[test]
fn milestone_fields_are_typed() {
    let event = milestone_event("arr", 100);
    let get = |path: &str| event.field(&FieldPath::parse(path).unwrap());

    assert_eq!(get("milestone.value"), Some(json!(100)));
    assert_eq!(get("milestone.type"), Some(json!("arr")));
    assert_eq!(get("milestone.currency"), Some(json!("usd")));
    assert_eq!(get("milestone.emailSentAt"), None);
    assert_eq!(get("meta.reason"), Some(json!("import")));
    assert_eq!(get("meta.currentARR"), Some(json!(120)));
    assert_eq!(get("meta.currentMembers"), None);
    assert_eq!(get("milestone.value.deeper"), None);
    assert_eq!(
        get("milestone"),
        Some(json!({"type": "arr", "value": 100, "currency": "usd"}))
    );
}

#[test]
fn field_access_does_not_modify_event() {
    let event = Event::model("theme.uploaded", data(json!({"name": "Casper"})));
    let before = event.clone();
    let _ = event.field(&FieldPath::parse("name").unwrap());
    let _ = event.field(&FieldPath::parse("absent").unwrap());
    assert_eq!(event, before);
}

// ── Bus ──────────────────────────────────────────────────────────────

fn counting_handler(isolation: &Isolation, hits: Arc<AtomicUsize>) -> crate::Handler {
    isolation.isolate("count", move |_event| {
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(())
        }
    })
}

#[tokio::test]
async fn publish_delivers_to_every_subscriber() {
    let bus = DomainEvents::new();
    let isolation = Isolation::default();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    bus.subscribe(
        EventKind::StripeLiveEnabled,
        counting_handler(&isolation, first.clone()),
    );
    bus.subscribe(
        EventKind::StripeLiveEnabled,
        counting_handler(&isolation, second.clone()),
    );

    let scheduled = bus.publish(Event::StripeLiveEnabled(Default::default()));
    bus.settled().await;

    assert_eq!(scheduled, 2);
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn publish_without_subscribers_is_dropped() {
    let bus = DomainEvents::new();
    assert_eq!(bus.publish(Event::StripeLiveDisabled(Default::default())), 0);
    bus.settled().await;
}

#[tokio::test]
async fn double_subscription_delivers_twice() {
    let bus = DomainEvents::new();
    let isolation = Isolation::default();
    let hits = Arc::new(AtomicUsize::new(0));
    let handler = counting_handler(&isolation, hits.clone());

    bus.subscribe(EventKind::model("post.published"), handler.clone());
    bus.subscribe(EventKind::model("post.published"), handler);
    assert_eq!(bus.subscriber_count(&EventKind::model("post.published")), 2);

    bus.publish(Event::model("post.published", Map::new()));
    bus.settled().await;

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn events_only_reach_matching_kind() {
    let bus = DomainEvents::new();
    let isolation = Isolation::default();
    let hits = Arc::new(AtomicUsize::new(0));
    bus.subscribe(
        EventKind::model("page.published"),
        counting_handler(&isolation, hits.clone()),
    );

    bus.publish(Event::model("post.published", Map::new()));
    bus.settled().await;

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn raw_panicking_handler_does_not_block_others() {
    let bus = DomainEvents::new();
    let isolation = Isolation::default();
    let hits = Arc::new(AtomicUsize::new(0));

    let unisolated: crate::Handler =
        Arc::new(|_event: Arc<Event>| -> crate::HandlerFuture {
            Box::pin(async { panic!("unisolated handler") })
        });
    bus.subscribe(EventKind::StripeLiveEnabled, unisolated);
    bus.subscribe(
        EventKind::StripeLiveEnabled,
        counting_handler(&isolation, hits.clone()),
    );

    bus.publish(Event::StripeLiveEnabled(Default::default()));
    bus.settled().await;

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// ── Isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_handler_reports_nothing() {
    let (counting, isolation) = counting_isolation();
    let handler = isolation.isolate("ok", |_event| async { Ok::<_, std::io::Error>(()) });

    handler(Arc::new(Event::StripeLiveEnabled(Default::default()))).await;

    assert_eq!(counting.logged.load(Ordering::SeqCst), 0);
    assert_eq!(counting.reported.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_handler_is_logged_and_reported_once() {
    let (counting, isolation) = counting_isolation();
    let handler = isolation.isolate("sink", |_event| async {
        Err(std::io::Error::other("sink rejected"))
    });

    handler(Arc::new(Event::StripeLiveEnabled(Default::default()))).await;

    assert_eq!(counting.logged.load(Ordering::SeqCst), 1);
    assert_eq!(counting.reported.load(Ordering::SeqCst), 1);
    let messages = counting.messages.lock().unwrap();
    assert_eq!(
        messages[0],
        "handler `sink` failed on StripeLiveEnabledEvent: sink rejected"
    );
}

#[tokio::test]
async fn panicking_handler_is_contained() {
    let (counting, isolation) = counting_isolation();
    let handler = isolation.isolate("mapping", |_event| async {
        if true {
            panic!("malformed payload");
        }
        Ok::<_, std::io::Error>(())
    });

    handler(Arc::new(Event::model("post.published", Map::new()))).await;

    assert_eq!(counting.logged.load(Ordering::SeqCst), 1);
    assert_eq!(counting.reported.load(Ordering::SeqCst), 1);
    assert!(counting.messages.lock().unwrap()[0].contains("malformed payload"));
}

#[tokio::test]
async fn isolated_failures_do_not_affect_other_subscribers() {
    let (counting, isolation) = counting_isolation();
    let bus = DomainEvents::new();
    let hits = Arc::new(AtomicUsize::new(0));

    bus.subscribe(
        EventKind::MilestoneCreated,
        isolation.isolate("broken", |_event| async {
            Err(std::io::Error::other("boom"))
        }),
    );
    bus.subscribe(
        EventKind::MilestoneCreated,
        counting_handler(&isolation, hits.clone()),
    );

    bus.publish(milestone_event("members", 100));
    bus.settled().await;

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(counting.logged.load(Ordering::SeqCst), 1);
    assert_eq!(counting.reported.load(Ordering::SeqCst), 1);
}
