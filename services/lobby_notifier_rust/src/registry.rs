//! In-memory notify flags per target
//!
//! Stands in for the chat host's per-channel settings. Targets without an
//! explicit flag use the configured default.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;
use wzlobby_rust_core::models::NotificationTarget;

use crate::dispatcher::TargetDirectory;

pub struct ChannelRegistry {
    flags: RwLock<HashMap<NotificationTarget, Option<bool>>>,
    notify_default: bool,
}

impl ChannelRegistry {
    pub fn new(notify_default: bool) -> Self {
        Self {
            flags: RwLock::new(HashMap::new()),
            notify_default,
        }
    }

    /// Build from configured known and subscribed targets
    pub fn with_targets(
        notify_default: bool,
        known: &[NotificationTarget],
        subscribed: &[NotificationTarget],
    ) -> Self {
        let registry = Self::new(notify_default);
        for target in known {
            registry.register(target.clone());
        }
        {
            let mut flags = registry.flags.write();
            for target in subscribed {
                flags.insert(target.clone(), Some(true));
            }
        }
        registry
    }

    /// Make a target known without touching its flag
    pub fn register(&self, target: NotificationTarget) {
        self.flags.write().entry(target).or_insert(None);
    }

    pub fn set_notify(&self, target: &NotificationTarget, enabled: bool) {
        info!("Notifications for {} set to {}", target, enabled);
        self.flags.write().insert(target.clone(), Some(enabled));
    }

    /// Effective flag, falling back to the default
    pub fn notify_flag(&self, target: &NotificationTarget) -> bool {
        self.flags
            .read()
            .get(target)
            .copied()
            .flatten()
            .unwrap_or(self.notify_default)
    }

    pub fn len(&self) -> usize {
        self.flags.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.read().is_empty()
    }
}

impl TargetDirectory for ChannelRegistry {
    fn targets(&self) -> Vec<NotificationTarget> {
        let mut targets: Vec<NotificationTarget> = self.flags.read().keys().cloned().collect();
        targets.sort();
        targets
    }

    fn is_subscribed(&self, target: &NotificationTarget) -> bool {
        self.notify_flag(target)
    }
}
