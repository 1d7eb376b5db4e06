//! Restricts the intrinsic-name table available to user code.

use rhai::{Dynamic, Engine, EvalAltResult, Position};

/// Resource ceilings applied regardless of the `ResourceLimiter` scope, as
/// defense-in-depth against pathological scripts (deeply nested
/// expressions, unbounded string/array growth) that a wall-clock timer
/// alone would only catch late.
const MAX_OPERATIONS: u64 = 50_000_000;
const MAX_EXPR_DEPTH: usize = 128;
const MAX_STRING_SIZE: usize = 64 * 1024 * 1024;
const MAX_ARRAY_SIZE: usize = 1_000_000;
const MAX_MAP_SIZE: usize = 1_000_000;

/// Produces a restricted intrinsics table for a freshly built [`Engine`].
///
/// Rhai ships no `open`/`exec`/`compile`/`__import__`/`input`/`breakpoint`
/// builtins in the first place, so most of this guard's job is disabling
/// the one re-entrant intrinsic Rhai does have (`eval`) and installing a
/// stub `open` that always denies, so filesystem access is unreachable
/// even though Rhai never exposed a working one to begin with.
pub struct NameGuard;

impl NameGuard {
    /// Apply the restricted table to `engine`. Call once per fresh engine,
    /// before user source is compiled.
    pub fn configure(engine: &mut Engine) {
        engine.disable_symbol("eval");

        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_EXPR_DEPTH);
        engine.set_max_string_size(MAX_STRING_SIZE);
        engine.set_max_array_size(MAX_ARRAY_SIZE);
        engine.set_max_map_size(MAX_MAP_SIZE);

        engine.register_fn("open", blocked_open_1);
        engine.register_fn("open", blocked_open_2);
    }
}

fn permission_denied() -> Result<Dynamic, Box<EvalAltResult>> {
    Err(Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from("permission_denied:file access is not permitted".to_string()),
        Position::NONE,
    )))
}

fn blocked_open_1(_path: &str) -> Result<Dynamic, Box<EvalAltResult>> {
    permission_denied()
}

fn blocked_open_2(_path: &str, _mode: &str) -> Result<Dynamic, Box<EvalAltResult>> {
    permission_denied()
}
