//! Fan-out of lobby change messages to subscribed targets
//!
//! The host owns the target set and the per-target notify flag; the
//! dispatcher only reads them at dispatch time. Each delivery runs on its
//! own, so one failing target never holds up the rest.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wzlobby_rust_core::models::NotificationTarget;

/// Read-only view of the host's targets and their notify flags
pub trait TargetDirectory: Send + Sync {
    fn targets(&self) -> Vec<NotificationTarget>;

    fn is_subscribed(&self, target: &NotificationTarget) -> bool;
}

/// Delivers a message to one target
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, target: &NotificationTarget, message: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    /// Known targets that are not subscribed
    pub skipped: usize,
}

pub struct NotificationDispatcher {
    directory: Arc<dyn TargetDirectory>,
    sink: Arc<dyn MessageSink>,
}

impl NotificationDispatcher {
    pub fn new(directory: Arc<dyn TargetDirectory>, sink: Arc<dyn MessageSink>) -> Self {
        Self { directory, sink }
    }

    /// Send `message` to every subscribed target.
    pub async fn dispatch(&self, message: &str) -> DispatchReport {
        let targets = self.directory.targets();
        let total = targets.len();
        let subscribed: Vec<NotificationTarget> = targets
            .into_iter()
            .filter(|t| self.directory.is_subscribed(t))
            .collect();

        let mut report = DispatchReport {
            skipped: total - subscribed.len(),
            ..Default::default()
        };

        if subscribed.is_empty() {
            debug!("No subscribed targets for lobby update ({} known)", total);
            return report;
        }

        let deliveries = subscribed.iter().map(|target| async move {
            let outcome = self.sink.deliver(target, message).await;
            (target, outcome)
        });

        for (target, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Failed to notify {}: {:#}", target, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Dispatched lobby update: delivered={} failed={} skipped={}",
            report.delivered, report.failed, report.skipped
        );
        report
    }
}
