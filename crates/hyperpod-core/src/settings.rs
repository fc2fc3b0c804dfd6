// Instance group settings aggregation
//
// Turns the ordered settings fragments into one flat list of instance group
// entries. A bad fragment never aborts the aggregation: it is logged and
// skipped. Entries inside a good fragment are never dropped here; enrichment
// decides whether they are usable groups.

use crate::group::json_kind;
use hyperpod_config::SettingsFragment;
use serde_json::Value;
use tracing::{debug, warn};

/// Combine settings fragments into a single ordered list of group entries.
///
/// Fragments are visited in the order given (the source index order) and
/// each JSON array is flattened one level, so both `[{..}, {..}]` and
/// `[[{..}, {..}]]` produce the same entries. Anything else is appended
/// as-is. No uniqueness or schema checks happen here.
pub fn combine_settings(fragments: &[SettingsFragment]) -> Vec<Value> {
    let mut combined = Vec::new();

    for fragment in fragments {
        if fragment.is_blank() {
            continue;
        }

        let parsed = match serde_json::from_str::<Value>(&fragment.value) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    source = %fragment.source,
                    error = %e,
                    "Could not parse instance group settings as JSON; skipping"
                );
                continue;
            }
        };

        let items = match parsed {
            Value::Array(items) => items,
            other => {
                warn!(
                    source = %fragment.source,
                    received = json_kind(&other),
                    "Expected a JSON array of instance groups; skipping"
                );
                continue;
            }
        };

        let before = combined.len();
        for item in items {
            match item {
                Value::Array(nested) => combined.extend(nested),
                other => combined.push(other),
            }
        }

        debug!(
            source = %fragment.source,
            added = combined.len() - before,
            total = combined.len(),
            "Added instance group settings"
        );
    }

    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(index: usize, value: &str) -> SettingsFragment {
        SettingsFragment::new(format!("INSTANCE_GROUP_SETTINGS{}", index), value)
    }

    fn names(entries: &[Value]) -> Vec<&str> {
        entries
            .iter()
            .map(|entry| entry["InstanceGroupName"].as_str().unwrap_or("<none>"))
            .collect()
    }

    #[test]
    fn test_combines_in_index_then_position_order() {
        let fragments = vec![
            fragment(1, r#"[{"InstanceGroupName":"a"},{"InstanceGroupName":"b"}]"#),
            fragment(2, r#"[[{"InstanceGroupName":"c"},{"InstanceGroupName":"d"}]]"#),
            fragment(3, r#"[{"InstanceGroupName":"e"},[{"InstanceGroupName":"f"}]]"#),
        ];

        let entries = combine_settings(&fragments);
        assert_eq!(entries.len(), 6);
        assert_eq!(names(&entries), vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_blank_fragments_contribute_nothing() {
        let fragments = vec![fragment(1, "[]"), fragment(2, ""), fragment(3, "  ")];
        assert!(combine_settings(&fragments).is_empty());
        assert!(combine_settings(&[]).is_empty());
    }

    #[test]
    fn test_malformed_fragment_does_not_stop_later_ones() {
        let fragments = vec![
            fragment(1, "{not json"),
            fragment(2, r#"[{"InstanceGroupName":"b"}]"#),
        ];
        assert_eq!(names(&combine_settings(&fragments)), vec!["b"]);
    }

    #[test]
    fn test_non_array_fragment_is_skipped() {
        let fragments = vec![
            fragment(1, r#"{"InstanceGroupName":"a"}"#),
            fragment(2, r#""workers""#),
            fragment(3, r#"[{"InstanceGroupName":"c"}]"#),
        ];
        assert_eq!(names(&combine_settings(&fragments)), vec!["c"]);
    }

    #[test]
    fn test_flattens_only_one_level() {
        let fragments = vec![fragment(
            1,
            r#"[{"InstanceGroupName":"a"}, "b", 7, [[{"InstanceGroupName":"deep"}]]]"#,
        )];
        let entries = combine_settings(&fragments);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1], Value::from("b"));
        assert_eq!(entries[2], Value::from(7));
        assert_eq!(entries[3], serde_json::json!([{"InstanceGroupName": "deep"}]));
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let fragments = vec![fragment(
            1,
            r#"[{"InstanceGroupName":"a","InstanceCount":2,"ThreadsPerCore":1}]"#,
        )];
        let entries = combine_settings(&fragments);
        assert_eq!(entries[0]["InstanceCount"], Value::from(2));
        assert_eq!(entries[0]["ThreadsPerCore"], Value::from(1));
    }
}
