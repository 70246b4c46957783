use std::sync::Arc;

use powerbench_core::measurement::ToolConfig;
use powerbench_store::JobStore;

use crate::config::ServerConfig;
use crate::engine::ExecutionQueue;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Measurement tool settings, handed to every dispatched task.
    pub tool: Arc<ToolConfig>,
    /// Job records, keyed by job id.
    pub store: Arc<dyn JobStore>,
    /// Single-slot FIFO queue in front of the measurement tool.
    pub queue: Arc<ExecutionQueue>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn JobStore>, queue: Arc<ExecutionQueue>) -> Self {
        let tool = Arc::new(config.tool.clone());
        Self {
            config: Arc::new(config),
            tool,
            store,
            queue,
        }
    }
}
