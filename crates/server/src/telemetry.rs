#![allow(clippy::module_name_repetitions)]

use std::env;

use thiserror::Error;
use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing_subscriber::filter::{EnvFilter, ParseError};
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::layer::SubscriberExt;

/// Telemetri kurulumu sırasında oluşabilecek hatalar.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Log filtresi geçersizdir.
    #[error("log filtresi geçersiz: {0}")]
    InvalidFilter(#[from] ParseError),
    /// Global abonelik kurulamadı.
    #[error("tracing aboneliği kurulamadı: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Telemetri yaşam döngüsünü temsil eder.
#[must_use]
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
    filter: String,
}

impl TelemetryGuard {
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Etkin log filtresi.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

fn resolve_filter(primary: Option<String>, fallback: Option<String>) -> String {
    let usable = |value: String| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
    };
    primary
        .and_then(usable)
        .or_else(|| fallback.and_then(usable))
        .unwrap_or_else(|| "info".to_string())
}

/// Ortam değişkenlerinden tracing aboneliğini başlatır.
///
/// `KAPI_LOG` veya `RUST_LOG` log filtresini belirler; ikisi de yoksa `info`.
///
/// # Errors
///
/// Geçersiz log filtresi ya da abonelik kurulumu başarısız olursa hata döner.
pub fn init_tracing(service_name: &str) -> Result<TelemetryGuard, TelemetryError> {
    let filter = resolve_filter(env::var("KAPI_LOG").ok(), env::var("RUST_LOG").ok());
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_new(filter.as_str())?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(SystemTime)
                .with_target(true),
        );
    set_global_default(subscriber)?;

    Ok(TelemetryGuard {
        service_name: service_name.to_owned(),
        filter,
    })
}
