//! Application state management

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tsva_core::AppConfig;
use tsva_rag::SceneAnalyzer;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// The analyzer; one action runs at a time
    pub analyzer: Mutex<SceneAnalyzer>,
}

impl AppState {
    /// Create state around an existing analyzer
    pub fn new(config: AppConfig, analyzer: SceneAnalyzer) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            analyzer: Mutex::new(analyzer),
        }
    }

    /// Wire the configured clients and restore a saved index if present
    pub fn from_config(config: AppConfig) -> tsva_core::Result<Self> {
        let mut analyzer = SceneAnalyzer::from_config(&config)?;
        if analyzer.restore()? {
            tracing::info!(
                captions = analyzer.indexer().len(),
                "Restored caption index"
            );
        }
        Ok(Self::new(config, analyzer))
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
