//! Per-host request spacing.
//!
//! Each host gets a "next free slot". A caller reserves the slot before it
//! fetches, so two tasks aimed at the same host are serialized with a random
//! gap between them while other hosts proceed independently.

use crate::config::normalize_host;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spacing bounds between two requests to one host
#[derive(Debug, Clone)]
pub struct PolitenessConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(9),
        }
    }
}

impl PolitenessConfig {
    pub fn none() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn random_spacing(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = (self.max_delay.as_millis() as u64).max(min);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

pub struct HostPacer {
    config: PolitenessConfig,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostPacer {
    pub fn new(config: PolitenessConfig) -> Self {
        Self {
            config,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve the next slot for `host` and return how long to wait for it.
    /// The first request to a host is never delayed.
    pub async fn reserve(&self, host: &str) -> Duration {
        let host = normalize_host(host);
        let now = Instant::now();
        let mut slots = self.next_slot.lock().await;

        let start = match slots.get(&host) {
            Some(slot) if *slot > now => *slot,
            _ => now,
        };
        slots.insert(host, start + self.config.random_spacing());
        start - now
    }

    /// Sleep until this caller may contact `host`
    pub async fn wait(&self, host: &str) {
        let delay = self.reserve(host).await;
        if !delay.is_zero() {
            log::debug!("Waiting {}ms before contacting {}", delay.as_millis(), host);
            tokio::time::sleep(delay).await;
        }
    }
}
