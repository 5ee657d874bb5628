//! A collector that retains every event it sees, for tests and diagnostics.

use std::sync::Mutex;

use lesca_types::{MetricEvent, MetricsCollector};

#[derive(Debug, Default)]
pub struct InMemoryCollector {
    events: Mutex<Vec<MetricEvent>>,
}

impl InMemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().expect("collector mutex poisoned").clone()
    }
}

#[async_trait::async_trait]
impl MetricsCollector for InMemoryCollector {
    async fn record(&self, event: MetricEvent) {
        self.events.lock().expect("collector mutex poisoned").push(event);
    }
}
