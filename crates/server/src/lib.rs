#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! ACME web ön yüzü: imzalı istekleri doğrular, çözümler ve kayıt
//! otoritesine iletir.

mod authority;
mod config;
mod error;
mod memory;
mod problem;
mod routes;
mod state;
mod stats;
mod telemetry;

pub use authority::{RaError, RegistrationAuthority, SaError, StorageAuthority};
pub use config::{ResourcePaths, ServerConfig};
pub use error::ServerError;
pub use memory::MemoryAuthority;
pub use problem::{Problem, ProblemKind};
pub use routes::{build_router, serve, serve_with_state};
pub use state::WfeState;
pub use stats::{MemoryStats, NoopStats, StatsSink, TimingSummary};
pub use telemetry::{init_tracing, TelemetryError, TelemetryGuard};

#[cfg(test)]
mod tests;
