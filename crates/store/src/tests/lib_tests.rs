use super::*;

use std::sync::Arc;

fn counter() -> (Arc<Mutex<u32>>, impl Fn() -> u32) {
    let count = Arc::new(Mutex::new(0));
    let read = {
        let count = Arc::clone(&count);
        move || *lock(&count)
    };
    (count, read)
}

#[test]
fn set_get_delete_round_trip() {
    let store = Store::new();
    let path = Path::new("page/report/title");

    assert!(store.get(&path).is_null());
    store.set(&path, "Annual".into());
    assert_eq!(store.get(&path).as_str(), Some("Annual"));

    // Intermediate objects were materialized on the way down.
    assert!(store.get(&Path::new("page/report")).as_object().is_some());

    store.delete(&path);
    assert!(store.get(&path).is_null());
    assert!(store
        .get(&Path::new("page/report"))
        .get("title")
        .is_none());
}

#[test]
fn notifies_ancestors_and_descendants() {
    let store = Store::new();
    let scope = Scope::new(&store);
    let (count, reads) = counter();

    scope.add_trigger(
        "watch",
        vec![Path::new("page/report")],
        move |_, _| *lock(&count) += 1,
        false,
    );

    store.set(&Path::new("page/report/title"), "a".into());
    assert_eq!(reads(), 1, "descendant change notifies");

    store.set(&Path::new("page"), Value::empty_object());
    assert_eq!(reads(), 2, "ancestor change notifies");

    store.set(&Path::new("clipboard/report"), "b".into());
    assert_eq!(reads(), 2, "unrelated change does not notify");
}

#[test]
fn same_value_writes_are_suppressed() {
    let store = Store::new();
    let scope = Scope::new(&store);
    let (count, reads) = counter();

    let path = Path::new("page/report/sections");
    scope.add_trigger(
        "watch",
        vec![path.clone()],
        move |_, _| *lock(&count) += 1,
        false,
    );

    let sections = Value::array([Value::object([("id", Value::from("a"))])]);
    store.set(&path, sections.clone());
    assert_eq!(reads(), 1);

    // Same Arc: no notification.
    store.set(&path, sections.clone());
    assert_eq!(reads(), 1);

    // Same scalar elsewhere in the tree: no notification either way.
    let title = Path::new("page/report/sections/0/title");
    store.set(&title, "x".into());
    assert_eq!(reads(), 2);
    store.set(&title, "x".into());
    assert_eq!(reads(), 2);

    // Structurally equal but freshly allocated: notifies.
    let current = store.get(&path);
    let rebuilt = Value::array(current.as_array().expect("array").iter().cloned());
    assert_eq!(rebuilt, current);
    store.set(&path, rebuilt);
    assert_eq!(reads(), 3);
}

#[test]
fn computable_runs_at_registration_and_on_dependency_change() {
    let store = Store::new();
    let scope = Scope::new(&store);

    store.set(&Path::new("a"), Value::Int(2));
    store.set(&Path::new("b"), Value::Int(3));
    scope.add_computable(
        Path::new("sum"),
        vec![Path::new("a"), Path::new("b")],
        |deps| Value::Int(deps[0].as_i64().unwrap_or(0) + deps[1].as_i64().unwrap_or(0)),
    );
    assert_eq!(store.get(&Path::new("sum")).as_i64(), Some(5));

    store.set(&Path::new("a"), Value::Int(10));
    assert_eq!(store.get(&Path::new("sum")).as_i64(), Some(13));
}

#[test]
fn chained_computables_settle_before_the_mutator_resumes() {
    let store = Store::new();
    let scope = Scope::new(&store);

    scope.add_computable(Path::new("double"), vec![Path::new("n")], |deps| {
        Value::Int(deps[0].as_i64().unwrap_or(0) * 2)
    });
    scope.add_computable(Path::new("quad"), vec![Path::new("double")], |deps| {
        Value::Int(deps[0].as_i64().unwrap_or(0) * 2)
    });

    store.set(&Path::new("n"), Value::Int(7));
    assert_eq!(store.get(&Path::new("quad")).as_i64(), Some(28));
}

#[test]
fn named_trigger_registration_replaces_previous_handler() {
    let store = Store::new();
    let scope = Scope::new(&store);
    let (count, reads) = counter();

    let dead = Arc::new(Mutex::new(0));
    let dead_writer = Arc::clone(&dead);
    scope.add_trigger(
        "autoSave",
        vec![Path::new("page/report")],
        move |_, _| *lock(&dead_writer) += 1,
        false,
    );
    scope.add_trigger(
        "autoSave",
        vec![Path::new("page/report")],
        move |_, _| *lock(&count) += 1,
        false,
    );

    store.set(&Path::new("page/report"), Value::empty_object());
    assert_eq!(*lock(&dead), 0, "replaced handler never fires");
    assert_eq!(reads(), 1);
}

#[test]
fn run_immediately_fires_once_at_registration() {
    let store = Store::new();
    let scope = Scope::new(&store);
    let (count, reads) = counter();

    scope.add_trigger(
        "star",
        vec![Path::new("user")],
        move |_, _| *lock(&count) += 1,
        true,
    );
    assert_eq!(reads(), 1);

    store.set(&Path::new("user"), Value::object([("uid", "u1".into())]));
    assert_eq!(reads(), 2);
}

#[test]
fn scope_teardown_silences_triggers() {
    let store = Store::new();
    let scope = Scope::new(&store);
    let token = scope.token();
    let (count, reads) = counter();

    scope.add_trigger(
        "watch",
        vec![Path::new("page/report")],
        move |_, _| *lock(&count) += 1,
        false,
    );
    store.set(&Path::new("page/report"), Value::empty_object());
    assert_eq!(reads(), 1);

    scope.deactivate();
    assert!(!token.is_active());
    store.set(&Path::new("page/report"), Value::object([("a", Value::Int(1))]));
    assert_eq!(reads(), 1, "no trigger fires after teardown");
}

#[test]
fn dropping_the_scope_tears_down_its_subscriptions() {
    let store = Store::new();
    let (count, reads) = counter();
    {
        let scope = Scope::new(&store);
        scope.add_trigger(
            "watch",
            vec![Path::new("x")],
            move |_, _| *lock(&count) += 1,
            false,
        );
        store.set(&Path::new("x"), Value::Int(1));
        assert_eq!(reads(), 1);
    }
    store.set(&Path::new("x"), Value::Int(2));
    assert_eq!(reads(), 1);
}

#[test]
fn self_rewriting_trigger_reaches_a_fixed_point() {
    let store = Store::new();
    let scope = Scope::new(&store);
    let (count, reads) = counter();

    // Normalizes its own dependency; converges because rewriting to the
    // value already present suppresses the notification.
    scope.add_trigger(
        "normalize",
        vec![Path::new("doc")],
        move |store, args| {
            *lock(&count) += 1;
            if args[0].get("normalized").is_none() {
                store.update(&Path::new("doc"), |doc| {
                    doc.with_field("normalized", Value::Bool(true))
                });
            }
        },
        false,
    );

    store.set(&Path::new("doc"), Value::empty_object());
    assert_eq!(
        store.get(&Path::new("doc/normalized")).as_bool(),
        Some(true)
    );
    assert!(reads() >= 1);

    let before = reads();
    store.set(&Path::new("doc"), store.get(&Path::new("doc")));
    assert_eq!(reads(), before, "fixed point: same-identity write is silent");
}

#[test]
fn other_subscribers_observe_trigger_writes_in_order() {
    let store = Store::new();
    let scope = Scope::new(&store);
    let seen = Arc::new(Mutex::new(Vec::new()));

    scope.add_trigger(
        "stamp",
        vec![Path::new("doc")],
        |store, args| {
            if args[0].get("stamped").is_none() && args[0].as_object().is_some() {
                store.update(&Path::new("doc"), |doc| {
                    doc.with_field("stamped", Value::Bool(true))
                });
            }
        },
        false,
    );
    let seen_writer = Arc::clone(&seen);
    scope.add_trigger(
        "record",
        vec![Path::new("doc")],
        move |_, args| {
            lock(&seen_writer).push(args[0].get("stamped").is_some());
        },
        false,
    );

    store.set(&Path::new("doc"), Value::empty_object());
    // The later-registered trigger runs after the stamping write landed.
    assert!(lock(&seen).iter().all(|stamped| *stamped));
}

#[test]
fn toggle_flips_with_loose_coercion() {
    let store = Store::new();
    let path = Path::new("page/report/public");

    store.toggle(&path);
    assert_eq!(store.get(&path).as_bool(), Some(true), "absent toggles to true");
    store.toggle(&path);
    assert_eq!(store.get(&path).as_bool(), Some(false));
}

#[test]
fn update_array_preserves_identity_when_nothing_changes() {
    let list = Value::array([
        Value::object([("id", Value::from("a"))]),
        Value::object([("id", Value::from("b"))]),
    ]);

    let untouched = update_array(&list, |section| section.clone());
    assert!(untouched.same(&list));

    let rewritten = update_array(&list, |section| {
        if section.get_or_null("id") == Value::from("a") {
            section.with_field("region", Value::from("EU"))
        } else {
            section.clone()
        }
    });
    assert!(!rewritten.same(&list));
    let items = rewritten.as_array().expect("array");
    let old_items = list.as_array().expect("array");
    assert!(
        items[1].same(&old_items[1]),
        "untouched element keeps its identity"
    );
    assert!(!items[0].same(&old_items[0]));
}

#[test]
fn typed_bridge_round_trips_serde_values() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Header {
        title: String,
        edit: bool,
    }

    let store = Store::new();
    let path = Path::new("page/header");
    store
        .set_typed(
            &path,
            &Header {
                title: "Annual".into(),
                edit: true,
            },
        )
        .expect("set");
    let header: Option<Header> = store.get_typed(&path).expect("get");
    assert_eq!(
        header,
        Some(Header {
            title: "Annual".into(),
            edit: true,
        })
    );
    assert!(store
        .get_typed::<Header>(&Path::new("page/missing"))
        .expect("absent")
        .is_none());
}

#[test]
fn array_index_paths_read_and_write_elements() {
    let store = Store::new();
    store.set(
        &Path::new("page/report/sections"),
        Value::array([
            Value::object([("id", Value::from("a"))]),
            Value::object([("id", Value::from("b"))]),
        ]),
    );

    assert_eq!(
        store
            .get(&Path::new("page/report/sections/1/id"))
            .as_str(),
        Some("b")
    );

    store.set(
        &Path::new("page/report/sections/0/region"),
        Value::from("EU"),
    );
    assert_eq!(
        store
            .get(&Path::new("page/report/sections/0/region"))
            .as_str(),
        Some("EU")
    );
    assert_eq!(
        store
            .get(&Path::new("page/report/sections/1/id"))
            .as_str(),
        Some("b")
    );
}
