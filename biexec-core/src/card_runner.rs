//! Drives a single card render.

use rhai::{Dynamic, Engine};

use crate::error::ExecutionError;
use crate::limiter::ResourceLimiter;
use crate::sandbox;
use crate::table::{JsonMap, Table};

/// The normalized output of a card render: HTML plus two opaque
/// string-list metadata fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderResult {
    pub html: String,
    pub used_columns: Vec<String>,
    pub filter_applicable: Vec<String>,
}

const CARD_DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const CARD_DEFAULT_MEMORY_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Runs card source against a dataset, filters, and params, returning a
/// normalized [`RenderResult`].
pub struct CardRunner {
    limiter: ResourceLimiter,
}

impl Default for CardRunner {
    fn default() -> Self {
        CardRunner::new(CARD_DEFAULT_TIMEOUT_SECONDS, CARD_DEFAULT_MEMORY_BYTES)
    }
}

impl CardRunner {
    pub fn new(timeout_seconds: u64, memory_bytes: u64) -> CardRunner {
        CardRunner { limiter: ResourceLimiter::new(timeout_seconds, memory_bytes) }
    }

    /// `run(source, table, filters, params) -> RenderResult`.
    pub fn run(
        &self,
        source: &str,
        table: &Table,
        filters: Option<&JsonMap>,
        params: Option<&JsonMap>,
    ) -> Result<RenderResult, ExecutionError> {
        let empty = JsonMap::empty();
        let filters = filters.unwrap_or(&empty);
        let params = params.unwrap_or(&empty);

        self.limiter.scope(|| {
            let mut exe = sandbox::execute(source, &self.limiter, register_html_result_ctor)?;

            if !exe.has_fn("render") {
                return Err(ExecutionError::ContractViolation(
                    "source does not define a 'render' function".to_string(),
                ));
            }

            let result = exe.call_fn(
                "render",
                (table.to_dynamic(), filters.to_dynamic(), params.to_dynamic()),
            )?;

            normalize_render_result(result)
        })
    }
}

/// Injects an `HTMLResult(html, used_columns, filter_applicable)`
/// constructor into the sandbox globals, used as an engine-seeding extra so
/// card source can build the record form directly instead of returning a
/// bare string.
fn register_html_result_ctor(engine: &mut Engine) {
    engine.register_fn(
        "HTMLResult",
        |html: &str, used_columns: rhai::Array, filter_applicable: rhai::Array| -> rhai::Map {
            let mut map = rhai::Map::new();
            map.insert("html".into(), Dynamic::from(html.to_string()));
            map.insert("used_columns".into(), Dynamic::from_array(used_columns));
            map.insert("filter_applicable".into(), Dynamic::from_array(filter_applicable));
            map
        },
    );
    engine.register_fn("HTMLResult", |html: &str| -> rhai::Map {
        let mut map = rhai::Map::new();
        map.insert("html".into(), Dynamic::from(html.to_string()));
        map.insert("used_columns".into(), Dynamic::from_array(rhai::Array::new()));
        map.insert("filter_applicable".into(), Dynamic::from_array(rhai::Array::new()));
        map
    });
}

/// Normalizes a render return value: a bare string, or a record with an
/// `html` field and optional `used_columns`/`filter_applicable` lists.
fn normalize_render_result(value: Dynamic) -> Result<RenderResult, ExecutionError> {
    if value.is::<rhai::ImmutableString>() || value.is::<String>() {
        let html = if value.is::<rhai::ImmutableString>() {
            value.cast::<rhai::ImmutableString>().to_string()
        } else {
            value.cast::<String>()
        };
        return Ok(RenderResult { html, used_columns: Vec::new(), filter_applicable: Vec::new() });
    }

    if value.is_map() {
        let map = value.cast::<rhai::Map>();
        let html = match map.get("html") {
            Some(v) if v.is::<rhai::ImmutableString>() => v.clone().cast::<rhai::ImmutableString>().to_string(),
            Some(v) if v.is::<String>() => v.clone().cast::<String>(),
            _ => {
                return Err(ExecutionError::ContractViolation(
                    "render result record is missing a string 'html' field".to_string(),
                ))
            }
        };
        let used_columns = string_list(&map, "used_columns");
        let filter_applicable = string_list(&map, "filter_applicable");
        return Ok(RenderResult { html, used_columns, filter_applicable });
    }

    Err(ExecutionError::ContractViolation(
        "render must return a string or a record with an 'html' field".to_string(),
    ))
}

fn string_list(map: &rhai::Map, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(v) if v.is_array() => v
            .clone()
            .cast::<rhai::Array>()
            .into_iter()
            .filter_map(|item| {
                if item.is::<rhai::ImmutableString>() {
                    Some(item.cast::<rhai::ImmutableString>().to_string())
                } else if item.is::<String>() {
                    Some(item.cast::<String>())
                } else {
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}
