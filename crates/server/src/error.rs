use thiserror::Error;

/// Sunucu başlatma ve yapılandırma hataları.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Yapılandırma hatası.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// I/O hatası.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
