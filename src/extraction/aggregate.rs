// Merge per-chunk extraction results into one per-document result.

use serde_json::{Map, Value};

use super::traits::ExtractionResult;

/// Merge chunk results in input order.
///
/// Segments are concatenated. Each structured-data key ends up list-shaped:
/// incoming lists extend the accumulated list and any other value is
/// appended as one element.
pub fn merge(results: Vec<ExtractionResult>) -> ExtractionResult {
    let mut merged = ExtractionResult::empty();

    for result in results {
        merged.text_segments.extend(result.text_segments);
        for (key, value) in result.structured_data {
            merge_value(&mut merged.structured_data, key, value);
        }
    }

    merged
}

fn merge_value(acc: &mut Map<String, Value>, key: String, value: Value) {
    let slot = acc.entry(key).or_insert_with(|| Value::Array(Vec::new()));

    if !slot.is_array() {
        let previous = slot.take();
        *slot = Value::Array(vec![previous]);
    }

    if let Value::Array(items) = slot {
        match value {
            Value::Array(incoming) => items.extend(incoming),
            other => items.push(other),
        }
    }
}
