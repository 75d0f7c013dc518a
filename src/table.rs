use serde_json::Value;

use crate::error::TableError;
use crate::model::{RenderedTable, ResourceRecord, TableRow};

pub const KEY_HEADER: &str = "key";
pub const VALUE_HEADER: &str = "value";

/// Canonical text for one cell.
///
/// Strings render without quotes, null renders empty, and nested lists or maps
/// render as compact JSON in their original key order.
pub fn compact_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Builds a grid whose columns are the keys of the first record, in its key order.
///
/// Later records are read by header key; a missing key yields an empty cell and
/// keys absent from the first record are not shown.
pub fn build_record_table(records: &[ResourceRecord]) -> Result<RenderedTable, TableError> {
    let first = records.first().ok_or(TableError::EmptyCollection)?;
    let headers = first.keys().cloned().collect::<Vec<_>>();

    let rows = records
        .iter()
        .map(|record| {
            TableRow::new(
                headers
                    .iter()
                    .map(|header| record.get(header).map(compact_text).unwrap_or_default())
                    .collect(),
            )
        })
        .collect();

    Ok(RenderedTable { headers, rows })
}

/// Two-column table with one row per top-level entry of `record`.
pub fn build_key_value_table(record: &ResourceRecord) -> RenderedTable {
    let rows = record
        .iter()
        .map(|(key, value)| TableRow::new(vec![key.clone(), compact_text(value)]))
        .collect();

    RenderedTable {
        headers: vec![KEY_HEADER.to_string(), VALUE_HEADER.to_string()],
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_key_value_table, build_record_table, compact_text};
    use crate::error::TableError;
    use crate::model::ResourceRecord;
    use serde_json::{Value, json};

    fn records(value: Value) -> Vec<ResourceRecord> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn cells(table: &crate::model::RenderedTable) -> Vec<Vec<String>> {
        table.rows.iter().map(|row| row.cells.clone()).collect()
    }

    #[test]
    fn headers_come_from_first_record_and_missing_keys_are_empty() {
        let table = build_record_table(&records(json!([{"a": 1, "b": 2}, {"a": 3}])))
            .expect("table should build");

        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(cells(&table), vec![vec!["1", "2"], vec!["3", ""]]);
    }

    #[test]
    fn extra_keys_on_later_records_are_ignored() {
        let table = build_record_table(&records(json!([
            {"name": "p1", "status": "Running"},
            {"status": "Pending", "name": "p2", "ip": "10.0.0.2"}
        ])))
        .expect("table should build");

        assert_eq!(table.headers, vec!["name", "status"]);
        assert_eq!(
            cells(&table),
            vec![vec!["p1", "Running"], vec!["p2", "Pending"]]
        );
    }

    #[test]
    fn empty_collection_is_rejected() {
        assert_eq!(build_record_table(&[]), Err(TableError::EmptyCollection));
    }

    #[test]
    fn nested_values_render_as_compact_ordered_json() {
        let table = build_record_table(&records(json!([
            {"name": "n1", "capacity": {"memory": "2Gi", "cpu": "4"}, "taints": [{"key": "a"}]}
        ])))
        .expect("table should build");

        assert_eq!(
            cells(&table),
            vec![vec![
                "n1",
                r#"{"memory":"2Gi","cpu":"4"}"#,
                r#"[{"key":"a"}]"#
            ]]
        );
    }

    #[test]
    fn compact_text_handles_scalars() {
        assert_eq!(compact_text(&json!("Running")), "Running");
        assert_eq!(compact_text(&json!(true)), "true");
        assert_eq!(compact_text(&json!(2.5)), "2.5");
        assert_eq!(compact_text(&json!(null)), "");
    }

    #[test]
    fn key_value_table_follows_record_order() {
        let record = records(json!([{"name": "web-0", "labels": {"app": "web"}, "uid": "u-1"}]))
            .remove(0);
        let table = build_key_value_table(&record);

        assert_eq!(table.headers, vec!["key", "value"]);
        assert_eq!(
            cells(&table),
            vec![
                vec!["name", "web-0"],
                vec!["labels", r#"{"app":"web"}"#],
                vec!["uid", "u-1"]
            ]
        );
    }
}
