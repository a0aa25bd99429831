use serde::{Deserialize, Serialize};

use crate::simulation::{ReconcileConfig, DEFAULT_LAG_WINDOW_SECS};
use crate::snapshot::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_CACHED_SNAPSHOTS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub tick_rate: u32,
    /// Hard cap on the ack cache history, independent of ack state.
    pub max_cached_snapshots: usize,
    pub lag_window_secs: f64,
    pub max_clients: usize,
    pub max_chat_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_cached_snapshots: DEFAULT_MAX_CACHED_SNAPSHOTS,
            lag_window_secs: DEFAULT_LAG_WINDOW_SECS,
            max_clients: 32,
            max_chat_len: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub snapshot_buffer_size: usize,
    pub ping_interval_secs: f64,
    pub reconcile: ReconcileConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            snapshot_buffer_size: DEFAULT_BUFFER_SIZE,
            ping_interval_secs: 1.0,
            reconcile: ReconcileConfig::default(),
        }
    }
}
