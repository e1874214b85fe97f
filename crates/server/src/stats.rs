use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Sayaç ve süre ölçümlerinin gönderildiği hedef.
pub trait StatsSink: Send + Sync {
    fn inc(&self, name: &str, value: i64);

    fn timing(&self, name: &str, elapsed: Duration);
}

/// Ölçümleri yok sayar.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl StatsSink for NoopStats {
    fn inc(&self, _name: &str, _value: i64) {}

    fn timing(&self, _name: &str, _elapsed: Duration) {}
}

/// Bir süre ölçümünün özeti; tek tek örnekler saklanmaz.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimingSummary {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl TimingSummary {
    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total = self.total.saturating_add(elapsed);
        self.max = self.max.max(elapsed);
    }
}

/// Ölçümleri bellekte biriktirir; testlerde ve geliştirmede kullanılır.
///
/// Bellek kullanımı ölçüm adı sayısıyla sınırlıdır.
#[derive(Debug, Default)]
pub struct MemoryStats {
    counters: Mutex<HashMap<String, i64>>,
    timings: Mutex<HashMap<String, TimingSummary>>,
}

impl MemoryStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sayacın güncel değeri; hiç artırılmamışsa `0`.
    #[must_use]
    pub fn counter(&self, name: &str) -> i64 {
        self.counters
            .lock()
            .map(|counters| counters.get(name).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Kaydedilmiş süre ölçümü sayısı.
    #[must_use]
    pub fn timing_count(&self, name: &str) -> u64 {
        self.timing_summary(name).count
    }

    #[must_use]
    pub fn timing_summary(&self, name: &str) -> TimingSummary {
        self.timings
            .lock()
            .map(|timings| timings.get(name).copied().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl StatsSink for MemoryStats {
    fn inc(&self, name: &str, value: i64) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(name.to_owned()).or_default() += value;
        }
    }

    fn timing(&self, name: &str, elapsed: Duration) {
        if let Ok(mut timings) = self.timings.lock() {
            timings.entry(name.to_owned()).or_default().record(elapsed);
        }
    }
}
