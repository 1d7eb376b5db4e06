//! The tabular value and JSON-map types that cross the sandbox boundary.
//!
//! A [`Table`] is built from a list of row mappings on the way in and
//! produced by user code on the way out; column order always follows the
//! first row's key order, never an alphabetical or declared schema unless
//! the embedded language surfaces one (it doesn't here).

use std::fmt;

use rhai::{Dynamic, ImmutableString};
use serde_json::{Map as JsonObject, Value as JsonValue};

use crate::error::ExecutionError;

/// A single table cell. Untyped at the JSON boundary, typed here so the
/// sandbox conversion code has one place to reason about shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Null,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(x) => write!(f, "{x}"),
            Cell::Str(s) => write!(f, "{s}"),
            Cell::Null => write!(f, "null"),
        }
    }
}

impl Cell {
    fn from_json(value: &JsonValue) -> Cell {
        match value {
            JsonValue::Null => Cell::Null,
            JsonValue::Bool(b) => Cell::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Cell::Int(i)
                } else {
                    Cell::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => Cell::Str(s.clone()),
            // Nested arrays/objects in a cell are flattened to their JSON text;
            // the card/transform contract deals in scalar cells only.
            other => Cell::Str(other.to_string()),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            Cell::Bool(b) => JsonValue::Bool(*b),
            Cell::Int(i) => JsonValue::from(*i),
            Cell::Float(x) => {
                serde_json::Number::from_f64(*x).map(JsonValue::Number).unwrap_or(JsonValue::Null)
            }
            Cell::Str(s) => JsonValue::String(s.clone()),
            Cell::Null => JsonValue::Null,
        }
    }

    fn to_dynamic(&self) -> Dynamic {
        match self {
            Cell::Bool(b) => Dynamic::from(*b),
            Cell::Int(i) => Dynamic::from(*i),
            Cell::Float(x) => Dynamic::from(*x),
            Cell::Str(s) => Dynamic::from(s.clone()),
            Cell::Null => Dynamic::UNIT,
        }
    }

    fn from_dynamic(value: Dynamic) -> Result<Cell, ExecutionError> {
        if value.is_unit() {
            return Ok(Cell::Null);
        }
        if value.is::<bool>() {
            return Ok(Cell::Bool(value.cast::<bool>()));
        }
        if value.is::<i64>() {
            return Ok(Cell::Int(value.cast::<i64>()));
        }
        if value.is::<f64>() {
            return Ok(Cell::Float(value.cast::<f64>()));
        }
        if value.is::<ImmutableString>() {
            return Ok(Cell::Str(value.cast::<ImmutableString>().to_string()));
        }
        if value.is::<String>() {
            return Ok(Cell::Str(value.cast::<String>()));
        }
        Err(ExecutionError::ContractViolation(format!(
            "table cell of unsupported type '{}'",
            value.type_name()
        )))
    }
}

/// A typed in-memory table: named, ordered columns and ordered, nullable rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn empty() -> Table {
        Table::default()
    }

    /// Build a table from row mappings, preserving the first row's key order.
    pub fn from_json_rows(rows: &[JsonObject<String, JsonValue>]) -> Table {
        let Some(first) = rows.first() else {
            return Table::empty();
        };
        let columns: Vec<String> = first.keys().cloned().collect();
        let mut table_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = Vec::with_capacity(columns.len());
            for col in &columns {
                cells.push(row.get(col).map(Cell::from_json).unwrap_or(Cell::Null));
            }
            table_rows.push(cells);
        }
        Table { columns, rows: table_rows }
    }

    /// Serialize back to a list of row mappings, insertion order preserved.
    pub fn to_json_rows(&self) -> Vec<JsonObject<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = JsonObject::new();
                for (col, cell) in self.columns.iter().zip(row.iter()) {
                    obj.insert(col.clone(), cell.to_json());
                }
                obj
            })
            .collect()
    }

    /// Convert to the Rhai-native representation: an array of object maps.
    pub fn to_dynamic(&self) -> Dynamic {
        let array: rhai::Array = self
            .rows
            .iter()
            .map(|row| {
                let mut map = rhai::Map::new();
                for (col, cell) in self.columns.iter().zip(row.iter()) {
                    map.insert(col.as_str().into(), cell.to_dynamic());
                }
                Dynamic::from_map(map)
            })
            .collect();
        Dynamic::from_array(array)
    }

    /// Parse a table back out of whatever user code returned: an array of
    /// object maps, column order following the first row's insertion order.
    pub fn from_dynamic(value: Dynamic) -> Result<Table, ExecutionError> {
        if !value.is_array() {
            return Err(ExecutionError::ContractViolation(
                "expected an array of row maps".to_string(),
            ));
        }
        let array = value.cast::<rhai::Array>();
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(array.len());
        for (idx, item) in array.into_iter().enumerate() {
            if !item.is_map() {
                return Err(ExecutionError::ContractViolation(format!(
                    "row {idx} is not an object map"
                )));
            }
            let map = item.cast::<rhai::Map>();
            if idx == 0 {
                columns = map.keys().map(|k| k.to_string()).collect();
            }
            let mut cells = Vec::with_capacity(columns.len());
            for col in &columns {
                let cell = match map.get(col.as_str()) {
                    Some(v) => Cell::from_dynamic(v.clone())?,
                    None => Cell::Null,
                };
                cells.push(cell);
            }
            rows.push(cells);
        }
        Ok(Table { columns, rows })
    }
}

/// A string-keyed JSON mapping (filter map / parameter map).
#[derive(Debug, Clone, Default)]
pub struct JsonMap(pub JsonObject<String, JsonValue>);

impl JsonMap {
    pub fn empty() -> JsonMap {
        JsonMap::default()
    }

    pub fn to_dynamic(&self) -> Dynamic {
        json_to_dynamic(&JsonValue::Object(self.0.clone()))
    }
}

fn json_to_dynamic(value: &JsonValue) -> Dynamic {
    match value {
        JsonValue::Null => Dynamic::UNIT,
        JsonValue::Bool(b) => Dynamic::from(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else {
                Dynamic::from(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => Dynamic::from(s.clone()),
        JsonValue::Array(items) => {
            let array: rhai::Array = items.iter().map(json_to_dynamic).collect();
            Dynamic::from_array(array)
        }
        JsonValue::Object(obj) => {
            let mut map = rhai::Map::new();
            for (k, v) in obj {
                map.insert(k.as_str().into(), json_to_dynamic(v));
            }
            Dynamic::from_map(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, JsonValue)]) -> JsonObject<String, JsonValue> {
        let mut m = JsonObject::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        m
    }

    #[test]
    fn from_json_rows_preserves_first_row_column_order() {
        let rows = vec![
            obj(&[("b", JsonValue::from(1)), ("a", JsonValue::from(2))]),
            obj(&[("a", JsonValue::from(3)), ("b", JsonValue::from(4))]),
        ];
        let table = Table::from_json_rows(&rows);
        assert_eq!(table.columns, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn empty_rows_produce_empty_table() {
        let table = Table::from_json_rows(&[]);
        assert!(table.columns.is_empty());
        assert!(table.rows.is_empty());
    }

    #[test]
    fn round_trip_through_json_rows() {
        let rows = vec![obj(&[("x", JsonValue::from(1)), ("y", JsonValue::String("hi".into()))])];
        let table = Table::from_json_rows(&rows);
        let back = table.to_json_rows();
        assert_eq!(back[0]["x"], JsonValue::from(1));
        assert_eq!(back[0]["y"], JsonValue::String("hi".into()));
    }

    #[test]
    fn round_trip_through_dynamic_array_of_maps() {
        let rows = vec![obj(&[("x", JsonValue::from(1)), ("y", JsonValue::Bool(true))])];
        let table = Table::from_json_rows(&rows);
        let dynamic = table.to_dynamic();
        let back = Table::from_dynamic(dynamic).unwrap();
        assert_eq!(back.columns, table.columns);
        assert_eq!(back.rows, table.rows);
    }

    #[test]
    fn from_dynamic_rejects_non_array() {
        let err = Table::from_dynamic(Dynamic::from(42_i64)).unwrap_err();
        assert_eq!(err.kind(), "contract_violation");
    }
}
