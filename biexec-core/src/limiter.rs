//! Scoped wall-clock and address-space caps around a synchronous
//! execution.

use std::time::{Duration, Instant};

use rhai::{Dynamic, Engine};
use tracing::warn;

use crate::error::ExecutionError;

/// The `on_progress` abort token used to signal a wall-clock timeout. Rhai
/// surfaces whatever this callback returns as `EvalAltResult::ErrorTerminated`.
pub(crate) const TIMEOUT_TOKEN: &str = "biexec_timeout";

/// Imposes wall-clock and address-space caps around a scope.
///
/// The wall-clock cap is implemented with Rhai's `on_progress` callback — a
/// cooperative check-in the interpreter calls periodically during
/// evaluation — rather than a POSIX alarm signal. A signal-based timer
/// only fires on the process's main thread; this check instead runs on
/// whichever thread is executing the script, and terminates it the first
/// time elapsed time exceeds `timeout`, regardless of thread identity.
pub struct ResourceLimiter {
    timeout: Duration,
    memory_bytes: u64,
}

impl ResourceLimiter {
    pub fn new(timeout_seconds: u64, memory_bytes: u64) -> ResourceLimiter {
        ResourceLimiter { timeout: Duration::from_secs(timeout_seconds), memory_bytes }
    }

    /// Install the wall-clock check-in on a freshly built engine. Must be
    /// called before the engine compiles or evaluates user source.
    pub fn configure_engine(&self, engine: &mut Engine) {
        let deadline = Instant::now() + self.timeout;
        engine.on_progress(move |_ops| {
            if Instant::now() >= deadline {
                Some(Dynamic::from(TIMEOUT_TOKEN.to_string()))
            } else {
                None
            }
        });
    }

    /// Run `body` under the memory cap, restoring the prior limit on every
    /// exit path. On hosts without per-process address-space limits, the
    /// cap is skipped (logged once, not silently dropped).
    pub fn scope<T>(
        &self,
        body: impl FnOnce() -> Result<T, ExecutionError>,
    ) -> Result<T, ExecutionError> {
        let _guard = MemoryCapGuard::install(self.memory_bytes);
        body()
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout.as_secs()
    }
}

#[cfg(target_os = "linux")]
struct MemoryCapGuard {
    previous: Option<(u64, u64)>,
}

#[cfg(target_os = "linux")]
impl MemoryCapGuard {
    fn install(memory_bytes: u64) -> MemoryCapGuard {
        use rlimit::Resource;

        match Resource::AS.get() {
            Ok(previous) => {
                if let Err(e) = Resource::AS.set(memory_bytes, memory_bytes) {
                    warn!(error = %e, "failed to set RLIMIT_AS; memory cap not applied");
                    return MemoryCapGuard { previous: None };
                }
                MemoryCapGuard { previous: Some(previous) }
            }
            Err(e) => {
                warn!(error = %e, "failed to read RLIMIT_AS; memory cap not applied");
                MemoryCapGuard { previous: None }
            }
        }
    }
}

#[cfg(target_os = "linux")]
impl Drop for MemoryCapGuard {
    fn drop(&mut self) {
        if let Some((soft, hard)) = self.previous {
            use rlimit::Resource;
            let _ = Resource::AS.set(soft, hard);
        }
    }
}

#[cfg(not(target_os = "linux"))]
struct MemoryCapGuard;

#[cfg(not(target_os = "linux"))]
impl MemoryCapGuard {
    fn install(_memory_bytes: u64) -> MemoryCapGuard {
        static WARN_ONCE: std::sync::Once = std::sync::Once::new();
        WARN_ONCE.call_once(|| {
            warn!("address-space memory cap is only enforced on Linux; running unconfined");
        });
        MemoryCapGuard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_runs_body_and_returns_its_value() {
        let limiter = ResourceLimiter::new(5, 1024 * 1024 * 1024);
        let result = limiter.scope(|| Ok::<_, ExecutionError>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn scope_propagates_body_errors() {
        let limiter = ResourceLimiter::new(5, 1024 * 1024 * 1024);
        let result: Result<(), ExecutionError> =
            limiter.scope(|| Err(ExecutionError::RuntimeError("boom".into())));
        assert!(result.is_err());
    }

    #[test]
    fn nested_scopes_are_legal() {
        let outer = ResourceLimiter::new(5, 1024 * 1024 * 1024);
        let inner = ResourceLimiter::new(3, 512 * 1024 * 1024);
        let result = outer.scope(|| inner.scope(|| Ok::<_, ExecutionError>(7)));
        assert_eq!(result.unwrap(), 7);
    }
}
