//! Fans a single [`MetricEvent`] stream out to every registered collector.
//!
//! A slow or panicking collector must never hold up the pool: `publish`
//! spawns each collector's `record` call rather than awaiting them in line.

use std::sync::Arc;

use lesca_types::{MetricEvent, MetricsCollector};

#[derive(Clone, Default)]
pub struct MetricsBus {
    collectors: Vec<Arc<dyn MetricsCollector>>,
}

impl MetricsBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, collector: Arc<dyn MetricsCollector>) {
        self.collectors.push(collector);
    }
}

#[async_trait::async_trait]
impl MetricsCollector for MetricsBus {
    async fn record(&self, event: MetricEvent) {
        if self.collectors.is_empty() {
            return;
        }
        for collector in &self.collectors {
            let collector = collector.clone();
            let event = event.clone();
            tokio::spawn(async move {
                collector.record(event).await;
            });
        }
    }
}

impl std::fmt::Debug for MetricsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsBus")
            .field("collectors", &self.collectors.len())
            .finish()
    }
}
