use std::fmt;
use std::sync::Arc;

use crate::authority::{RegistrationAuthority, StorageAuthority};
use crate::config::{ResourcePaths, ServerConfig};
use crate::memory::MemoryAuthority;
use crate::stats::{NoopStats, StatsSink};

/// İstekler arasında paylaşılan, değişmez ön yüz durumu.
pub struct WfeState {
    config: ServerConfig,
    ra: Arc<dyn RegistrationAuthority>,
    sa: Arc<dyn StorageAuthority>,
    stats: Arc<dyn StatsSink>,
}

impl fmt::Debug for WfeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WfeState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WfeState {
    #[must_use]
    pub fn new(
        config: ServerConfig,
        ra: Arc<dyn RegistrationAuthority>,
        sa: Arc<dyn StorageAuthority>,
        stats: Arc<dyn StatsSink>,
    ) -> Self {
        Self {
            config,
            ra,
            sa,
            stats,
        }
    }

    /// RA ve SA rollerini tek bir [`MemoryAuthority`] ile dolduran geliştirme durumu.
    #[must_use]
    pub fn in_memory(config: ServerConfig) -> Self {
        let authority = Arc::new(MemoryAuthority::new(config.paths().clone()));
        Self::new(
            config,
            Arc::clone(&authority) as Arc<dyn RegistrationAuthority>,
            authority,
            Arc::new(NoopStats),
        )
    }

    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub const fn paths(&self) -> &ResourcePaths {
        self.config.paths()
    }

    #[must_use]
    pub fn ra(&self) -> &dyn RegistrationAuthority {
        self.ra.as_ref()
    }

    #[must_use]
    pub fn sa(&self) -> &dyn StorageAuthority {
        self.sa.as_ref()
    }

    #[must_use]
    pub fn stats(&self) -> &dyn StatsSink {
        self.stats.as_ref()
    }
}
