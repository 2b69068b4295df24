//! Pin synchronization between section fields and report defaults.
//!
//! A section pin marks a field as tracking the report-wide defaults.
//! Whenever the report changes, every pinned field is rewritten to the
//! current default (explicit `Null` when the default is unset; the
//! persistence layer rejects absent values). Sections whose pinned fields
//! already match keep their identity, so a synchronized report is a fixed
//! point and the rewrite never loops.

use shared::domain::{PERIOD_PIN, PINNABLE_FIELDS};
use store::{update_array, Scope, Value};

use crate::paths;

/// Registers the synchronizer on the report path. Named "trackPins" so a
/// repeated registration within a controller scope replaces the handler.
pub fn register(scope: &Scope) {
    scope.add_trigger(
        "trackPins",
        vec![paths::report()],
        |store, args| {
            let report = &args[0];
            if report.get("sections").is_none() {
                return;
            }
            let defaults = report.get_or_null("defaults");
            store.update(&paths::report_sections(), |sections| {
                update_array(&sections, |section| synchronize(section, &defaults))
            });
        },
        false,
    );
}

/// One pass over a single section. Returns the original value (same
/// identity) when no pinned field needed rewriting.
pub fn synchronize(section: &Value, defaults: &Value) -> Value {
    let mut synced = section.clone();
    for field in PINNABLE_FIELDS {
        if !pin_set(section, field) {
            continue;
        }
        let target = defaults.get_or_null(field);
        if synced.get_or_null(field) != target {
            synced = synced.with_field(field, target);
        }
    }
    synced
}

/// Effective pin flag for a field. The two year-range fields do not carry
/// their own flags; both follow the single `period` pin.
fn pin_set(section: &Value, field: &str) -> bool {
    let flag = match field {
        "fromYear" | "toYear" => PERIOD_PIN,
        other => other,
    };
    section
        .get_or_null("pins")
        .get(flag)
        .map(Value::truthy)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(pairs: Vec<(&str, Value)>) -> Value {
        Value::object(pairs)
    }

    #[test]
    fn pinned_field_tracks_default() {
        let defaults = Value::object([("region", Value::from("EU"))]);
        let sec = section(vec![
            ("id", "a".into()),
            ("region", "US".into()),
            ("pins", Value::object([("region", Value::Bool(true))])),
        ]);
        let synced = synchronize(&sec, &defaults);
        assert_eq!(synced.get_or_null("region"), Value::from("EU"));
    }

    #[test]
    fn unpinned_field_is_left_alone() {
        let defaults = Value::object([("region", Value::from("EU"))]);
        let sec = section(vec![("id", "a".into()), ("region", "US".into())]);
        let synced = synchronize(&sec, &defaults);
        assert!(synced.same(&sec), "no pins, no rewrite");
    }

    #[test]
    fn period_pin_drives_both_year_fields() {
        let defaults = Value::object([
            ("fromYear", Value::Int(2000)),
            ("toYear", Value::Int(2020)),
        ]);
        let sec = section(vec![
            ("id", "a".into()),
            ("fromYear", Value::Int(1990)),
            ("toYear", Value::Int(1995)),
            ("pins", Value::object([(PERIOD_PIN, Value::Bool(true))])),
        ]);
        let synced = synchronize(&sec, &defaults);
        assert_eq!(synced.get_or_null("fromYear"), Value::Int(2000));
        assert_eq!(synced.get_or_null("toYear"), Value::Int(2020));
    }

    #[test]
    fn unset_default_normalizes_to_explicit_null() {
        let defaults = Value::empty_object();
        let sec = section(vec![
            ("id", "a".into()),
            ("region", "US".into()),
            ("pins", Value::object([("region", Value::Bool(true))])),
        ]);
        let synced = synchronize(&sec, &defaults);
        assert!(
            synced.get("region").is_some(),
            "field stays present on the wire"
        );
        assert!(synced.get_or_null("region").is_null());
    }

    #[test]
    fn matching_section_keeps_identity() {
        let defaults = Value::object([("region", Value::from("EU"))]);
        let sec = section(vec![
            ("id", "a".into()),
            ("region", "EU".into()),
            ("pins", Value::object([("region", Value::Bool(true))])),
        ]);
        let synced = synchronize(&sec, &defaults);
        assert!(synced.same(&sec));
    }

    #[test]
    fn synchronize_is_idempotent() {
        let defaults = Value::object([("topic", Value::from("health"))]);
        let sec = section(vec![
            ("id", "a".into()),
            ("topic", "energy".into()),
            ("pins", Value::object([("topic", Value::Bool(true))])),
        ]);
        let once = synchronize(&sec, &defaults);
        let twice = synchronize(&once, &defaults);
        assert!(twice.same(&once), "second pass is a fixed point");
    }
}
