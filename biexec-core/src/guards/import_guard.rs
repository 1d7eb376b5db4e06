//! Filters module loads performed by user code.

use std::collections::HashSet;
use std::sync::Arc;

use rhai::module_resolvers::StaticModuleResolver;
use rhai::{Dynamic, EvalAltResult, Engine, Module, ModuleResolver, Position, Shared};

/// The mandatory deny-list: facilities that must be unreachable from user
/// code even via indirect import.
const BLOCKED_MODULES: &[&str] = &[
    // OS / process / threads
    "os", "sys", "subprocess", "process", "threading", "multiprocessing", "signal", "resource",
    // Networking
    "socket", "net", "http", "urllib", "requests", "httpx", "ftplib", "smtplib", "telnetlib",
    // Binary (de)serialization
    "pickle", "shelve", "marshal",
    // FFI / dynamic loading
    "ctypes", "ffi", "importlib", "runpy", "code", "codeop",
    // Filesystem
    "shutil", "tempfile", "glob", "pathlib", "fs",
];

/// Filters every module load against the deny-list. The allow decision is
/// made on the top-level package name only (`foo.bar` resolves to `foo`).
#[derive(Debug, Clone)]
pub struct ImportGuard {
    blocked: Arc<HashSet<&'static str>>,
}

impl Default for ImportGuard {
    fn default() -> Self {
        ImportGuard { blocked: Arc::new(BLOCKED_MODULES.iter().copied().collect()) }
    }
}

impl ImportGuard {
    pub fn new() -> ImportGuard {
        ImportGuard::default()
    }

    /// `allow(module_name) -> ok | blocked(module_name)`.
    pub fn allow(&self, module_name: &str) -> Result<(), String> {
        let top_level = module_name.split(['.', ':']).next().unwrap_or(module_name);
        if self.blocked.contains(top_level) {
            Err(top_level.to_string())
        } else {
            Ok(())
        }
    }

    /// Wrap a resolver holding the bundled helper modules with this guard's
    /// policy, and install it on the engine. Names that are neither blocked
    /// nor registered simply fail to resolve — nothing is reachable by
    /// accident.
    pub fn install(&self, engine: &mut Engine, bundled: StaticModuleResolver) {
        engine.set_module_resolver(GuardedResolver { guard: self.clone(), inner: bundled });
    }
}

struct GuardedResolver {
    guard: ImportGuard,
    inner: StaticModuleResolver,
}

impl ModuleResolver for GuardedResolver {
    fn resolve(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        if let Err(module) = self.guard.allow(path) {
            return Err(Box::new(EvalAltResult::ErrorRuntime(
                Dynamic::from(format!("import_blocked:{module}")),
                pos,
            )));
        }
        self.inner.resolve(engine, source, path, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_every_mandated_module_by_top_level_name() {
        let guard = ImportGuard::new();
        for name in BLOCKED_MODULES {
            assert!(guard.allow(name).is_err(), "{name} should be blocked");
        }
    }

    #[test]
    fn resolves_on_top_level_segment_only() {
        let guard = ImportGuard::new();
        assert_eq!(guard.allow("os.path").unwrap_err(), "os");
        assert_eq!(guard.allow("subprocess.run").unwrap_err(), "subprocess");
    }

    #[test]
    fn allows_names_outside_the_deny_list() {
        let guard = ImportGuard::new();
        assert!(guard.allow("math").is_ok());
        assert!(guard.allow("strings").is_ok());
    }
}
