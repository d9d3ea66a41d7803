// Structured-data normalization at the storage boundary.
//
// The extraction service returns each dimension as a list, an object, or
// nothing at all, and individual fields can be scalars, lists or nested
// objects. Every column is tagged with a Coercion and every dimension with
// a Shape, and all values pass through `coerce` before they reach SQL.

use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

/// How a JSON field becomes a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Single value. Lists contribute their first element (or NULL),
    /// objects are stored as JSON text.
    Scalar,
    /// Ordered multi-value field, stored as JSON array text. Missing is `[]`.
    List,
}

/// How many rows a dimension contributes per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One row per object. Accepts a list of objects or a single object.
    Records,
    /// At most one row. Accepts an object or the first object of a list.
    SingleRow,
}

/// One structured dimension and the table it lands in.
#[derive(Debug)]
pub struct DimensionTable {
    /// Key in `structured_data`; also the table name.
    pub name: &'static str,
    pub shape: Shape,
    pub columns: &'static [(&'static str, Coercion)],
}

pub const DIMENSIONS: &[DimensionTable] = &[
    DimensionTable {
        name: "foreign_investments",
        shape: Shape::Records,
        columns: &[
            ("investment_type", Coercion::Scalar),
            ("target_country", Coercion::Scalar),
            ("target_region", Coercion::Scalar),
            ("investment_amount", Coercion::Scalar),
            ("investment_purpose", Coercion::Scalar),
            ("description", Coercion::Scalar),
            ("investment_amount_original", Coercion::Scalar),
        ],
    },
    DimensionTable {
        name: "global_trade",
        shape: Shape::SingleRow,
        columns: &[
            ("total_revenue", Coercion::Scalar),
            ("international_revenue", Coercion::Scalar),
            ("international_revenue_pct", Coercion::Scalar),
            ("major_markets", Coercion::List),
            ("total_revenue_original", Coercion::Scalar),
            ("international_revenue_original", Coercion::Scalar),
        ],
    },
    DimensionTable {
        name: "geographic_segments",
        shape: Shape::Records,
        columns: &[
            ("region", Coercion::Scalar),
            ("country", Coercion::Scalar),
            ("revenue", Coercion::Scalar),
            ("revenue_pct", Coercion::Scalar),
            ("revenue_original", Coercion::Scalar),
        ],
    },
    DimensionTable {
        name: "supply_chain",
        shape: Shape::SingleRow,
        columns: &[
            ("supplier_countries", Coercion::List),
            ("manufacturing_locations", Coercion::List),
            ("distribution_centers", Coercion::List),
            ("sourcing_strategy", Coercion::Scalar),
            ("risk_factors", Coercion::Scalar),
        ],
    },
    DimensionTable {
        name: "policy_impacts",
        shape: Shape::Records,
        columns: &[
            ("policy_type", Coercion::Scalar),
            ("policy_description", Coercion::Scalar),
            ("impact_description", Coercion::Scalar),
            ("mentioned_countries", Coercion::List),
            ("decoupling_indicators", Coercion::Scalar),
        ],
    },
];

/// Coerce one JSON field (possibly missing) to a column value.
pub fn coerce(value: Option<&Value>, coercion: Coercion) -> SqlValue {
    match coercion {
        Coercion::Scalar => coerce_scalar(value),
        Coercion::List => coerce_list(value),
    }
}

fn coerce_scalar(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(Value::Array(items)) => coerce_scalar(items.first()),
        Some(obj @ Value::Object(_)) => SqlValue::Text(obj.to_string()),
    }
}

fn coerce_list(value: Option<&Value>) -> SqlValue {
    let items = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    };
    SqlValue::Text(Value::Array(items).to_string())
}

/// The objects a dimension contributes, according to its shape.
pub fn records<'a>(shape: Shape, value: Option<&'a Value>) -> Vec<&'a Map<String, Value>> {
    match (shape, value) {
        (Shape::Records, Some(Value::Array(items))) => {
            items.iter().filter_map(Value::as_object).collect()
        }
        (Shape::SingleRow, Some(Value::Array(items))) => items
            .iter()
            .find_map(Value::as_object)
            .into_iter()
            .collect(),
        (_, Some(Value::Object(obj))) => vec![obj],
        _ => Vec::new(),
    }
}

/// Column values for every row a dimension contributes.
pub fn rows(table: &DimensionTable, structured: &Map<String, Value>) -> Vec<Vec<SqlValue>> {
    records(table.shape, structured.get(table.name))
        .into_iter()
        .map(|record| {
            table
                .columns
                .iter()
                .map(|(column, coercion)| coerce(record.get(*column), *coercion))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dimension(name: &str) -> &'static DimensionTable {
        DIMENSIONS.iter().find(|d| d.name == name).unwrap()
    }

    #[test]
    fn test_scalar_takes_first_list_element() {
        let v = json!(["Vietnam", "India"]);
        assert_eq!(coerce(Some(&v), Coercion::Scalar), SqlValue::Text("Vietnam".into()));
        assert_eq!(coerce(Some(&json!([])), Coercion::Scalar), SqlValue::Null);
    }

    #[test]
    fn test_scalar_numbers_and_missing() {
        assert_eq!(coerce(Some(&json!(120)), Coercion::Scalar), SqlValue::Integer(120));
        assert_eq!(coerce(Some(&json!(0.5)), Coercion::Scalar), SqlValue::Real(0.5));
        assert_eq!(coerce(None, Coercion::Scalar), SqlValue::Null);
        assert_eq!(coerce(Some(&Value::Null), Coercion::Scalar), SqlValue::Null);
    }

    #[test]
    fn test_scalar_object_becomes_json_text() {
        let v = json!({"a": 1});
        assert_eq!(
            coerce(Some(&v), Coercion::Scalar),
            SqlValue::Text(r#"{"a":1}"#.into())
        );
    }

    #[test]
    fn test_list_serializes_in_order() {
        let v = json!(["US", "EU", "China"]);
        assert_eq!(
            coerce(Some(&v), Coercion::List),
            SqlValue::Text(r#"["US","EU","China"]"#.into())
        );
        assert_eq!(coerce(None, Coercion::List), SqlValue::Text("[]".into()));
        assert_eq!(
            coerce(Some(&json!("Mexico")), Coercion::List),
            SqlValue::Text(r#"["Mexico"]"#.into())
        );
    }

    #[test]
    fn test_records_accept_single_object() {
        let data = json!({"foreign_investments": {"target_country": "India"}});
        let rows = rows(dimension("foreign_investments"), data.as_object().unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], SqlValue::Text("India".into()));
    }

    #[test]
    fn test_records_skip_non_objects() {
        let data = json!({"policy_impacts": [{"policy_type": "tariff"}, "junk", {"policy_type": "sanction"}]});
        let rows = rows(dimension("policy_impacts"), data.as_object().unwrap());
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_single_row_takes_first_object_of_list() {
        // Merged chunk results arrive as lists
        let data = json!({"global_trade": [
            {"total_revenue": 100, "major_markets": ["US"]},
            {"total_revenue": 200}
        ]});
        let rows = rows(dimension("global_trade"), data.as_object().unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], SqlValue::Integer(100));
        assert_eq!(rows[0][3], SqlValue::Text(r#"["US"]"#.into()));
    }

    #[test]
    fn test_missing_dimension_contributes_nothing() {
        let data = json!({});
        for table in DIMENSIONS {
            assert!(rows(table, data.as_object().unwrap()).is_empty());
        }
    }
}
