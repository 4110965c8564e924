use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Executes one job type. Must be idempotent: jobs run at least once.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, args: serde_json::Value) -> Result<()>;
}

/// Maps `job_type` to its handler.
#[derive(Default, Clone)]
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(job_type.into(), handler);
    }

    pub fn with(mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        self.register(job_type, handler);
        self
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn job_types(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}
