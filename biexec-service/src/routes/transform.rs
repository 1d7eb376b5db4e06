use std::collections::HashMap;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use biexec_core::{ExecutionError, JsonMap, Table};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonObject, Value as JsonValue};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TransformRequest {
    /// Carried through for logging/correlation only.
    #[allow(dead_code)]
    transform_id: String,
    code: String,
    #[serde(default)]
    input_datasets: HashMap<String, Vec<JsonObject<String, JsonValue>>>,
    #[serde(default)]
    params: JsonObject<String, JsonValue>,
}

#[derive(Serialize)]
pub struct TransformResponse {
    output_rows: Vec<JsonObject<String, JsonValue>>,
    row_count: usize,
    column_names: Vec<String>,
    execution_time_ms: u64,
}

pub async fn execute_transform(
    State(state): State<AppState>,
    Json(request): Json<TransformRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = tokio::task::spawn_blocking(move || {
        let inputs: HashMap<String, Table> = request
            .input_datasets
            .into_iter()
            .map(|(dataset_id, rows)| (dataset_id, Table::from_json_rows(&rows)))
            .collect();
        let params = JsonMap(request.params);
        state.transform_runner().run(&request.code, &inputs, Some(&params))
    })
    .await
    .unwrap_or_else(|e| Err(ExecutionError::RuntimeError(format!("transform task panicked: {e}"))))?;

    let output_rows = result.table.to_json_rows();
    Ok(Json(TransformResponse {
        row_count: output_rows.len(),
        column_names: result.table.columns.clone(),
        output_rows,
        execution_time_ms: result.duration_ms,
    }))
}
