use std::time::Instant;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use biexec_core::{ExecutionError, JsonMap, Table};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonObject, Value as JsonValue};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CardRequest {
    /// Carried through for logging/correlation only; the runner doesn't
    /// need it to execute `code`.
    #[allow(dead_code)]
    card_id: String,
    code: String,
    /// Same as `card_id`: identifies which dataset `dataset_rows` came
    /// from, but the runner only ever sees the materialized rows.
    #[allow(dead_code)]
    dataset_id: String,
    #[serde(default)]
    dataset_rows: Vec<JsonObject<String, JsonValue>>,
    #[serde(default)]
    filters: JsonObject<String, JsonValue>,
    #[serde(default)]
    params: JsonObject<String, JsonValue>,
}

#[derive(Serialize)]
pub struct CardResponse {
    html: String,
    used_columns: Vec<String>,
    filter_applicable: Vec<String>,
    execution_time_ms: u64,
}

pub async fn execute_card(
    State(state): State<AppState>,
    Json(request): Json<CardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || {
        let table = Table::from_json_rows(&request.dataset_rows);
        let filters = JsonMap(request.filters);
        let params = JsonMap(request.params);
        state.card_runner().run(&request.code, &table, Some(&filters), Some(&params))
    })
    .await
    .unwrap_or_else(|e| Err(ExecutionError::RuntimeError(format!("render task panicked: {e}"))))?;

    let execution_time_ms = started.elapsed().as_millis() as u64;
    Ok(Json(CardResponse {
        html: result.html,
        used_columns: result.used_columns,
        filter_applicable: result.filter_applicable,
        execution_time_ms,
    }))
}
