//! Fixed-interval lobby polling
//!
//! Each tick issues at most one `list` call. A tick that finds the previous
//! poll still running is skipped, which bounds outstanding calls to one.
//! Failures never stop the timer: the next tick retries, reconnecting first
//! if the session was lost. A rejected login is kept apart from network
//! trouble and retried on its own, slower cadence.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use wzlobby_rust_core::clients::{LobbyApi, LobbyConnector};
use wzlobby_rust_core::LobbyError;

use crate::dispatcher::NotificationDispatcher;
use crate::health::{HealthMonitor, LobbyHealth};
use crate::state::LobbyState;

#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    pub interval: Duration,
    /// Minimum spacing between login attempts after a rejected login
    pub relogin_interval: Duration,
}

/// Clears the busy flag when the poll ends, including by abort
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct LobbyPoller {
    connector: Arc<dyn LobbyConnector>,
    state: Arc<LobbyState>,
    dispatcher: Arc<NotificationDispatcher>,
    health: Arc<HealthMonitor>,
    settings: PollerSettings,
    session: Mutex<Option<Arc<dyn LobbyApi>>>,
    last_login_attempt: Mutex<Option<Instant>>,
    busy: AtomicBool,
    in_flight: Mutex<Option<AbortHandle>>,
    stopped: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl LobbyPoller {
    pub fn new(
        connector: Arc<dyn LobbyConnector>,
        state: Arc<LobbyState>,
        dispatcher: Arc<NotificationDispatcher>,
        health: Arc<HealthMonitor>,
        settings: PollerSettings,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            connector,
            state,
            dispatcher,
            health,
            settings,
            session: Mutex::new(None),
            last_login_attempt: Mutex::new(None),
            busy: AtomicBool::new(false),
            in_flight: Mutex::new(None),
            stopped: AtomicBool::new(false),
            shutdown_tx,
        })
    }

    /// Start the timer loop in the background
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        if *shutdown.borrow() {
            return;
        }

        info!(
            "Polling lobby server {} every {:?}",
            self.connector.endpoint(),
            self.settings.interval
        );

        // The first tick fires immediately
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Lobby poll loop exited");
    }

    /// Run one scheduling step.
    ///
    /// Returns the spawned poll, or `None` when the poller is stopped or the
    /// previous poll has not finished yet.
    pub fn tick(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.is_stopped() {
            return None;
        }

        let stats = self.health.stats();
        stats.record_tick();

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            stats.record_skipped();
            debug!("Previous lobby poll still running, skipping tick");
            return None;
        }
        stats.record_issued();

        let this = self.clone();
        let handle = tokio::spawn(async move {
            let _busy = BusyGuard(&this.busy);
            this.poll().await;
        });

        *self.in_flight.lock() = Some(handle.abort_handle());
        if self.is_stopped() {
            handle.abort();
        }
        Some(handle)
    }

    async fn poll(&self) {
        let (session, fresh) = match self.open_session().await {
            Ok(opened) => opened,
            Err(e) => {
                self.record_failure(&e);
                return;
            }
        };

        // A fresh session has just attempted its login
        if !fresh && !session.is_authenticated() {
            if let Err(e) = self.relogin(&session).await {
                self.record_failure(&e);
                return;
            }
        }

        match session.list_games().await {
            Ok(games) => {
                self.health.poll_succeeded();
                if let Some(change) = self.state.apply(games) {
                    info!(
                        "Lobby changed at {}: {} -> {} games",
                        change.current.taken_at().format("%H:%M:%S"),
                        change.previous.len(),
                        change.current.len()
                    );
                    self.health.stats().record_notification();
                    self.dispatcher.dispatch(&change.message).await;
                }
            }
            Err(e) => {
                if e.drops_session() {
                    self.drop_session().await;
                }
                self.record_failure(&e);
            }
        }
    }

    /// Current session, connecting and logging in first if there is none.
    /// The flag is true when the session was opened by this call.
    async fn open_session(&self) -> Result<(Arc<dyn LobbyApi>, bool), LobbyError> {
        let cached = self.session.lock().clone();
        if let Some(session) = cached {
            if !session.is_closed() {
                return Ok((session, false));
            }
            debug!("Lobby connection closed while idle; reconnecting");
            self.drop_session().await;
        }

        let session = self.connector.connect().await?;
        self.health.stats().record_connect();

        // stop() raises the flag before it takes the slot, so checking under
        // the lock never leaves a session behind after shutdown
        let stored = {
            let mut slot = self.session.lock();
            if self.is_stopped() {
                false
            } else {
                *slot = Some(session.clone());
                true
            }
        };
        if !stored {
            session.close().await;
            return Err(LobbyError::Disconnected);
        }

        self.login(&session).await?;
        Ok((session, true))
    }

    /// Log in on `session`. A rejected login is recorded in health and the
    /// session is kept; an error that breaks the session is returned.
    async fn login(&self, session: &Arc<dyn LobbyApi>) -> Result<(), LobbyError> {
        *self.last_login_attempt.lock() = Some(Instant::now());

        match session.login().await {
            Ok(()) => {
                if matches!(self.health.health(), LobbyHealth::AuthFailed { .. }) {
                    info!("Lobby re-login succeeded");
                    self.health.set(LobbyHealth::Healthy);
                }
            }
            Err(LobbyError::AuthenticationFailed(reason)) => self.health.auth_failed(reason),
            Err(e) if e.drops_session() => {
                self.drop_session().await;
                return Err(e);
            }
            Err(e) => warn!("Lobby login failed ({}): {}", e.kind(), e),
        }
        Ok(())
    }

    /// Retry login on an unauthenticated session, at most once per relogin interval
    async fn relogin(&self, session: &Arc<dyn LobbyApi>) -> Result<(), LobbyError> {
        let due = match *self.last_login_attempt.lock() {
            Some(last) => last.elapsed() >= self.settings.relogin_interval,
            None => true,
        };
        if due {
            return self.login(session).await;
        }
        debug!("Lobby re-login not due yet");
        Ok(())
    }

    async fn drop_session(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            session.close().await;
            debug!("Dropped lobby session; reconnecting on next tick");
        }
    }

    fn record_failure(&self, e: &LobbyError) {
        match e {
            LobbyError::NotAuthenticated => debug!("Lobby poll skipped: not authenticated"),
            e if e.is_transient() => {
                warn!("Lobby poll failed ({}), retrying next tick: {}", e.kind(), e)
            }
            _ => error!("Lobby poll failed ({}): {}", e.kind(), e),
        }
        self.health.poll_failed(e.to_string());
    }

    /// Halt the timer, discard any in-flight poll and close the session.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shutdown_tx.send_replace(true);

        let in_flight = self.in_flight.lock().take();
        if let Some(poll) = in_flight {
            poll.abort();
        }

        self.drop_session().await;
        self.health.stopped();
        info!("Lobby poller stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }
}
