use helix_model::{diff_fields, fields, fields_from_json, FieldMap, FieldValue};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn accessors_match_variant() {
    assert_eq!(FieldValue::from("x").as_str(), Some("x"));
    assert_eq!(FieldValue::from(2.5).as_f64(), Some(2.5));
    assert_eq!(FieldValue::from(true).as_bool(), Some(true));
    assert!(FieldValue::Null.is_null());
    assert_eq!(FieldValue::from(1).as_str(), None);
    let list = FieldValue::from(vec!["a", "b"]);
    assert_eq!(list.as_list().map(<[FieldValue]>::len), Some(2));
}

#[test]
fn untagged_json_shape() {
    let data = fields! {
        "title" => "Standup",
        "count" => 3,
        "done" => false,
        "tags" => vec!["work", "daily"],
        "note" => FieldValue::Null,
    };
    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(
        json,
        json!({
            "count": 3.0,
            "done": false,
            "note": null,
            "tags": ["work", "daily"],
            "title": "Standup"
        })
    );
    let parsed: FieldMap = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, data);
}

#[test]
fn integers_deserialize_as_numbers() {
    let parsed: FieldValue = serde_json::from_str("7").unwrap();
    assert_eq!(parsed, FieldValue::Number(7.0));
}

#[test]
fn fields_from_json_accepts_flat_objects() {
    let map = fields_from_json(json!({"a": 1, "b": ["x", null]})).unwrap();
    assert_eq!(map.get("a"), Some(&FieldValue::Number(1.0)));
    assert_eq!(
        map.get("b"),
        Some(&FieldValue::List(vec![FieldValue::from("x"), FieldValue::Null]))
    );
}

#[test]
fn fields_from_json_rejects_nested_objects_and_non_objects() {
    assert!(fields_from_json(json!({"a": {"b": 1}})).is_err());
    assert!(fields_from_json(json!([1, 2])).is_err());
}

// ── diff_fields ──────────────────────────────────────────────────

#[test]
fn diff_without_previous_is_whole_payload() {
    let current = fields! { "a" => 1, "b" => "x" };
    assert_eq!(diff_fields(None, &current), current);
}

#[test]
fn diff_reports_changed_and_added_fields() {
    let previous = fields! { "a" => 1, "b" => "x" };
    let current = fields! { "a" => 1, "b" => "y", "c" => true };
    assert_eq!(
        diff_fields(Some(&previous), &current),
        fields! { "b" => "y", "c" => true }
    );
}

#[test]
fn diff_reports_removed_fields_as_null() {
    let previous = fields! { "a" => 1, "gone" => "x" };
    let current = fields! { "a" => 1 };
    assert_eq!(
        diff_fields(Some(&previous), &current),
        fields! { "gone" => FieldValue::Null }
    );
}

#[test]
fn diff_of_identical_payloads_is_empty() {
    let data = fields! { "a" => vec!["x"] };
    assert!(diff_fields(Some(&data), &data).is_empty());
}
