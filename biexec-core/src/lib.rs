//! Sandboxed interpreter harness for BI card rendering and tabular
//! transforms.
//!
//! This crate is the "hard core" of the execution service: it compiles and
//! runs user-authored source under an import/name guard and a wall-clock
//! and memory limiter, and exposes the two user contracts — card render
//! and tabular transform — as plain Rust functions. It knows nothing about
//! HTTP, persistence, or auth; see `biexec-service` for the transport.

pub mod card_runner;
pub mod error;
mod guards;
mod limiter;
mod sandbox;
pub mod table;
pub mod transform_runner;

pub use card_runner::{CardRunner, RenderResult};
pub use error::ExecutionError;
pub use limiter::ResourceLimiter;
pub use table::{Cell, JsonMap, Table};
pub use transform_runner::{TransformResult, TransformRunner};
