use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{RuntimeConfig, RuntimeConfigManager};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationStats {
    pub total_runs: u64,
    pub rejected_requests: u64,
    pub stopped_out_runs: u64,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Combined application state for the web server
#[derive(Clone)]
pub struct AppState {
    pub config_manager: Arc<RuntimeConfigManager>,
    pub stats: Arc<RwLock<SimulationStats>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config_manager: Arc<RuntimeConfigManager>) -> Self {
        Self {
            config_manager,
            stats: Arc::new(RwLock::new(SimulationStats::default())),
            started_at: Utc::now(),
        }
    }

    pub fn from_config(config: RuntimeConfig) -> Self {
        Self::new(Arc::new(RuntimeConfigManager::new(config)))
    }

    pub async fn record_run(&self, stopped_out: bool) {
        let mut stats = self.stats.write().await;
        stats.total_runs += 1;
        if stopped_out {
            stats.stopped_out_runs += 1;
        }
        stats.last_run_at = Some(Utc::now());
    }

    pub async fn record_rejection(&self) {
        self.stats.write().await.rejected_requests += 1;
    }

    pub async fn get_stats(&self) -> SimulationStats {
        self.stats.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stats_counters() {
        let state = AppState::from_config(RuntimeConfig::default());
        state.record_run(false).await;
        state.record_run(true).await;
        state.record_rejection().await;

        let stats = state.get_stats().await;
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.stopped_out_runs, 1);
        assert_eq!(stats.rejected_requests, 1);
        assert!(stats.last_run_at.is_some());
    }
}
