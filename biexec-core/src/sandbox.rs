//! Compiles and executes a source string under the guards, returning the
//! resulting symbol table.

use rhai::module_resolvers::StaticModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, FuncArgs, Module, Scope, AST};

use crate::error::ExecutionError;
use crate::guards::{ImportGuard, NameGuard};
use crate::limiter::{ResourceLimiter, TIMEOUT_TOKEN};

/// A compiled, executed source unit: the engine it was built against, its
/// AST, and the scope populated by running its module-level statements.
/// It exposes only `call_fn`, never a borrow into the engine or scope, so
/// nothing live escapes once the sandbox is dropped.
pub struct Executable {
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
    timeout_seconds: u64,
}

impl Executable {
    /// Whether `name` is defined as a function at the top level of the
    /// compiled source. Checked explicitly so a missing entry symbol is
    /// raised as a `ContractViolation` before any call is attempted.
    pub fn has_fn(&self, name: &str) -> bool {
        self.ast.iter_functions().any(|f| f.name == name)
    }

    /// Call a defined function with the given arguments, mapping every
    /// sandbox-internal failure mode to its `ExecutionError` kind.
    pub fn call_fn(&mut self, name: &str, args: impl FuncArgs) -> Result<Dynamic, ExecutionError> {
        self.engine
            .call_fn::<Dynamic>(&mut self.scope, &self.ast, name, args)
            .map_err(|err| map_eval_error(*err, self.timeout_seconds))
    }
}

fn map_eval_error(err: EvalAltResult, timeout_seconds: u64) -> ExecutionError {
    match err {
        EvalAltResult::ErrorFunctionNotFound(name, _) => {
            ExecutionError::ContractViolation(format!("function '{name}' is not defined"))
        }
        EvalAltResult::ErrorTerminated(token, _) => {
            if is_timeout_token(&token) {
                ExecutionError::Timeout { timeout_seconds }
            } else {
                ExecutionError::RuntimeError("execution was terminated".to_string())
            }
        }
        EvalAltResult::ErrorRuntime(value, _) => classify_runtime_signal(&value),
        EvalAltResult::ErrorParsing(parse_err, _) => ExecutionError::CompileError(parse_err.to_string()),
        other => ExecutionError::RuntimeError(other.to_string()),
    }
}

fn is_timeout_token(token: &Dynamic) -> bool {
    token
        .clone()
        .try_cast::<String>()
        .map(|s| s == TIMEOUT_TOKEN)
        .or_else(|| token.clone().try_cast::<rhai::ImmutableString>().map(|s| s.as_str() == TIMEOUT_TOKEN))
        .unwrap_or(false)
}

/// `ErrorRuntime` is Rhai's generic "user-raised" error channel. Guards in
/// this crate tag their signal with a `"<kind>:<detail>"` prefix so this
/// one place can route it back to the right `ExecutionError` variant.
fn classify_runtime_signal(value: &Dynamic) -> ExecutionError {
    let text = if let Some(s) = value.clone().try_cast::<rhai::ImmutableString>() {
        s.to_string()
    } else if let Some(s) = value.clone().try_cast::<String>() {
        s
    } else {
        value.to_string()
    };
    if let Some(module) = text.strip_prefix("import_blocked:") {
        ExecutionError::ImportBlocked { module: module.to_string() }
    } else if let Some(msg) = text.strip_prefix("permission_denied:") {
        ExecutionError::PermissionDenied(msg.to_string())
    } else {
        ExecutionError::RuntimeError(text)
    }
}

/// Bundled numeric/table helper functions, reachable only via explicit
/// `import`. Tables already cross the boundary as plain arrays of object
/// maps, so the helpers here are the small set of aggregate operations a
/// card or transform commonly needs instead of a full dataframe library.
fn bundled_module_resolver() -> StaticModuleResolver {
    let mut resolver = StaticModuleResolver::new();
    let mut stats = Module::new();
    stats.set_native_fn("sum", |values: rhai::Array| -> Result<f64, Box<EvalAltResult>> {
        Ok(values.into_iter().filter_map(|v| v.as_float().ok().or_else(|| v.as_int().ok().map(|i| i as f64))).sum())
    });
    stats.set_native_fn("mean", |values: rhai::Array| -> Result<f64, Box<EvalAltResult>> {
        let nums: Vec<f64> =
            values.into_iter().filter_map(|v| v.as_float().ok().or_else(|| v.as_int().ok().map(|i| i as f64))).collect();
        if nums.is_empty() {
            Ok(0.0)
        } else {
            Ok(nums.iter().sum::<f64>() / nums.len() as f64)
        }
    });
    resolver.insert("stats", stats);
    resolver
}

/// Compiles `source` and runs its module-level statements under the
/// NameGuard and ImportGuard, returning the resulting symbol table.
///
/// `configure_extra` is the caller-supplied extras stage of the engine
/// seeding order (e.g. `CardRunner` injects an `HTMLResult` constructor).
/// It runs last, so extras can override bundled names.
pub fn execute(
    source: &str,
    limiter: &ResourceLimiter,
    configure_extra: impl FnOnce(&mut Engine),
) -> Result<Executable, ExecutionError> {
    let mut engine = Engine::new();

    NameGuard::configure(&mut engine);
    ImportGuard::new().install(&mut engine, bundled_module_resolver());
    limiter.configure_engine(&mut engine);
    configure_extra(&mut engine);

    let ast = engine.compile(source).map_err(|e| ExecutionError::CompileError(e.to_string()))?;

    let mut scope = Scope::new();
    engine
        .run_ast_with_scope(&mut scope, &ast)
        .map_err(|err| map_eval_error(*err, limiter.timeout_seconds()))?;

    Ok(Executable { engine, ast, scope, timeout_seconds: limiter.timeout_seconds() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> ResourceLimiter {
        ResourceLimiter::new(5, 512 * 1024 * 1024)
    }

    #[test]
    fn executes_and_finds_defined_function() {
        let exe = execute("fn render(d, f, p) { \"<b>hi</b>\" }", &limiter(), |_| {}).unwrap();
        assert!(exe.has_fn("render"));
        assert!(!exe.has_fn("transform"));
    }

    #[test]
    fn missing_entry_symbol_is_contract_violation() {
        let exe = execute("fn other() { 1 }", &limiter(), |_| {}).unwrap();
        assert!(!exe.has_fn("render"));
    }

    #[test]
    fn call_fn_invokes_with_arguments() {
        let mut exe = execute(
            "fn render(d, f, p) { p }",
            &limiter(),
            |_| {},
        )
        .unwrap();
        let result = exe.call_fn("render", (Dynamic::UNIT, Dynamic::UNIT, Dynamic::from(7_i64))).unwrap();
        assert_eq!(result.cast::<i64>(), 7);
    }

    #[test]
    fn blocked_import_surfaces_as_import_blocked() {
        let err = execute("import \"os\" as os;\nfn render(d,f,p) { \"x\" }", &limiter(), |_| {})
            .unwrap_err();
        assert_eq!(err.kind(), "import_blocked");
    }

    #[test]
    fn compile_error_on_invalid_syntax() {
        let err = execute("fn render(d,f,p) {", &limiter(), |_| {}).unwrap_err();
        assert_eq!(err.kind(), "compile_error");
    }

    #[test]
    fn bundled_stats_module_is_importable() {
        let exe = execute(
            "import \"stats\" as stats;\nfn render(d,f,p) { stats::sum([1,2,3]) }",
            &limiter(),
            |_| {},
        )
        .unwrap();
        assert!(exe.has_fn("render"));
    }
}
