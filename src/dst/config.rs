//! Simulation Configuration
//!
//! `TigerStyle`: One seed, explicitly chosen or explicitly random.

/// Configuration for a simulation run.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    seed: u64,
}

impl SimConfig {
    /// Create a configuration with an explicit seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Read the seed from `TUNESTORE_SIM_SEED`, or derive one from the
    /// system clock. The chosen seed is logged so failures can be replayed.
    #[must_use]
    pub fn from_env_or_random() -> Self {
        let seed = std::env::var("TUNESTORE_SIM_SEED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos() as u64)
                    .unwrap_or(0)
            });

        tracing::info!(seed, "simulation seed");
        Self { seed }
    }

    /// The seed for this run.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_seed() {
        let config = SimConfig::with_seed(42);
        assert_eq!(config.seed(), 42);
    }
}
