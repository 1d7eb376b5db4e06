//! Drives a single tabular transformation.

use std::collections::HashMap;
use std::time::Instant;

use crate::error::ExecutionError;
use crate::limiter::ResourceLimiter;
use crate::sandbox;
use crate::table::{JsonMap, Table};

/// A transform result: the produced table plus the wall-clock duration the
/// runner measured, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformResult {
    pub table: Table,
    pub duration_ms: u64,
}

const TRANSFORM_DEFAULT_TIMEOUT_SECONDS: u64 = 300;
const TRANSFORM_DEFAULT_MEMORY_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Runs transform source against a mapping of dataset-id to table.
pub struct TransformRunner {
    limiter: ResourceLimiter,
}

impl Default for TransformRunner {
    fn default() -> Self {
        TransformRunner::new(TRANSFORM_DEFAULT_TIMEOUT_SECONDS, TRANSFORM_DEFAULT_MEMORY_BYTES)
    }
}

impl TransformRunner {
    pub fn new(timeout_seconds: u64, memory_bytes: u64) -> TransformRunner {
        TransformRunner { limiter: ResourceLimiter::new(timeout_seconds, memory_bytes) }
    }

    /// `run(source, inputs, params) -> (table, duration_ms)`.
    pub fn run(
        &self,
        source: &str,
        inputs: &HashMap<String, Table>,
        params: Option<&JsonMap>,
    ) -> Result<TransformResult, ExecutionError> {
        let empty = JsonMap::empty();
        let params = params.unwrap_or(&empty);
        let start = Instant::now();

        let table = self.limiter.scope(|| {
            let mut exe = sandbox::execute(source, &self.limiter, |_| {})?;

            if !exe.has_fn("transform") {
                return Err(ExecutionError::ContractViolation(
                    "source does not define a 'transform' function".to_string(),
                ));
            }

            let mut inputs_map = rhai::Map::new();
            for (dataset_id, table) in inputs {
                inputs_map.insert(dataset_id.as_str().into(), table.to_dynamic());
            }
            let inputs_dynamic = rhai::Dynamic::from_map(inputs_map);

            let result = exe.call_fn("transform", (inputs_dynamic, params.to_dynamic()))?;

            Table::from_dynamic(result)
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        Ok(TransformResult { table, duration_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input_table() -> Table {
        let rows = vec![
            serde_json::Map::from_iter([("x".to_string(), json!(1))]),
            serde_json::Map::from_iter([("x".to_string(), json!(2))]),
        ];
        Table::from_json_rows(&rows)
    }

    #[test]
    fn transform_returns_table_and_duration() {
        let runner = TransformRunner::new(5, 512 * 1024 * 1024);
        let source = "fn transform(i, p) { [#{\"x\": 1}, #{\"x\": 2}] }";
        let result = runner.run(source, &HashMap::new(), None).unwrap();
        assert_eq!(result.table.columns, vec!["x".to_string()]);
        assert_eq!(result.table.rows.len(), 2);
    }

    #[test]
    fn missing_transform_symbol_is_contract_violation() {
        let runner = TransformRunner::new(5, 512 * 1024 * 1024);
        let err = runner.run("fn other() { 1 }", &HashMap::new(), None).unwrap_err();
        assert_eq!(err.kind(), "contract_violation");
    }

    #[test]
    fn non_table_return_is_contract_violation() {
        let runner = TransformRunner::new(5, 512 * 1024 * 1024);
        let err = runner.run("fn transform(i, p) { 7 }", &HashMap::new(), None).unwrap_err();
        assert_eq!(err.kind(), "contract_violation");
    }

    #[test]
    fn inputs_are_visible_to_transform() {
        let runner = TransformRunner::new(5, 512 * 1024 * 1024);
        let mut inputs = HashMap::new();
        inputs.insert("sales".to_string(), input_table());
        let source = "fn transform(i, p) { i[\"sales\"] }";
        let result = runner.run(source, &inputs, None).unwrap();
        assert_eq!(result.table.rows.len(), 2);
    }

    #[test]
    fn timeout_on_infinite_loop() {
        let runner = TransformRunner::new(1, 512 * 1024 * 1024);
        let err = runner.run("fn transform(i,p) { loop { } }", &HashMap::new(), None).unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }
}
