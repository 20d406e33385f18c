// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change notifier: the wake-up path between a committed write and a
//! connected driver (and the worker supervisor).
//!
//! Two cooperating loops run the same check: a filesystem watch on the
//! signal file (coalesced and debounced) and an unconditional poll every
//! `poll_interval`. A write that loses its fsnotify event still converges
//! via the poll. `check_and_push` is serialized by its own mutex so the
//! debounce timer and the poll never race.

use crate::registry::SessionRegistry;
use crate::service::{StateService, Triggerable};
use async_trait::async_trait;
use notify::{RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::sync::Arc;
use sw_core::{Clock, NotifierConfig};
use sw_storage::SignalFile;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Method name of the driver-facing push notification.
pub const PAIR_UPDATE_METHOD: &str = "notifications/pair_update";

/// Transport hook used to push a notification to the connected driver.
pub type PushFn = Arc<dyn Fn(&str, serde_json::Value) -> Result<(), String> + Send + Sync>;

/// The worker supervisor, seen from the notifier.
#[async_trait]
pub trait SpawnChecker: Send + Sync {
    async fn check(&self);
}

pub struct Notifier<C: Clock> {
    service: Arc<StateService<C>>,
    registry: Arc<SessionRegistry<C>>,
    signal: SignalFile,
    config: NotifierConfig,
    push: RwLock<Option<PushFn>>,
    spawn_checker: RwLock<Option<Arc<dyn SpawnChecker>>>,
    last_pushed: Mutex<Option<u128>>,
    check_mutex: tokio::sync::Mutex<()>,
    wake_tx: mpsc::UnboundedSender<()>,
    wake_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
}

impl<C: Clock> Notifier<C> {
    pub fn new(
        service: Arc<StateService<C>>,
        registry: Arc<SessionRegistry<C>>,
        signal: SignalFile,
        config: NotifierConfig,
    ) -> Self {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        Self {
            service,
            registry,
            signal,
            config,
            push: RwLock::new(None),
            spawn_checker: RwLock::new(None),
            last_pushed: Mutex::new(None),
            check_mutex: tokio::sync::Mutex::new(()),
            wake_tx,
            wake_rx: Mutex::new(Some(wake_rx)),
        }
    }

    /// Attach the transport push hook once the driver transport exists.
    pub fn set_push(&self, push: PushFn) {
        *self.push.write() = Some(push);
    }

    /// Attach the worker supervisor.
    pub fn set_spawn_checker(&self, checker: Arc<dyn SpawnChecker>) {
        *self.spawn_checker.write() = Some(checker);
    }

    /// Start the watch loop and the poll loop. When the filesystem watch
    /// cannot initialize the notifier degrades to polling only.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) {
        let Some(mut wake_rx) = self.wake_rx.lock().take() else {
            tracing::warn!("notifier already started");
            return;
        };

        // Filesystem watch, coalesced onto the wake channel.
        let watch_path = self.signal.path().to_path_buf();
        let signal_name = watch_path.file_name().map(|n| n.to_os_string());
        let watch_tx = self.wake_tx.clone();
        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let relevant = matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) && event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| Some(n.to_os_string()) == signal_name).unwrap_or(false));
                if relevant {
                    let _ = watch_tx.send(());
                }
            }
        });
        match watcher {
            Ok(mut watcher) => {
                let dir = watch_path.parent().map(|p| p.to_path_buf()).unwrap_or_default();
                if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
                    tracing::warn!(error = %e, "signal watch failed, falling back to polling");
                } else {
                    // Keep the watcher alive until shutdown.
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        cancel.cancelled().await;
                        drop(watcher);
                    });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "signal watcher unavailable, polling only");
            }
        }

        // Debounce loop: a burst of wakes becomes one check.
        let debounce = self.config.debounce();
        let this = Arc::clone(self);
        let debounce_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = debounce_cancel.cancelled() => break,
                    received = wake_rx.recv() => {
                        if received.is_none() {
                            break;
                        }
                        tokio::time::sleep(debounce).await;
                        while wake_rx.try_recv().is_ok() {}
                        this.check_and_push().await;
                    }
                }
            }
        });

        // Poll loop: unconditional check on the poll interval.
        let this = Arc::clone(self);
        let poll = self.config.poll_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => this.check_and_push().await,
                }
            }
        });
    }

    /// One full check: revision compare, supervisor check, unread/pending
    /// count for the connected agent, push. Public so tests and the poll
    /// loop share the exact same path.
    pub async fn check_and_push(&self) {
        let _serialize = self.check_mutex.lock().await;

        let Some(rev) = self.signal.read() else {
            return;
        };
        if *self.last_pushed.lock() == Some(rev) {
            return;
        }

        let checker = self.spawn_checker.read().clone();
        if let Some(checker) = checker {
            checker.check().await;
        }

        let Some(agent) = self.registry.connected_agent() else {
            // The supervisor may still have acted; nobody to push to.
            *self.last_pushed.lock() = Some(rev);
            return;
        };

        let (unread, pending) = self
            .service
            .query(|state| (state.unread_count_for(&agent), state.pending_count_for(&agent)));
        if unread == 0 && pending == 0 {
            *self.last_pushed.lock() = Some(rev);
            return;
        }

        let push = self.push.read().clone();
        let Some(push) = push else {
            // No transport yet; leave the revision unpushed so the next
            // poll retries once a push hook is attached.
            return;
        };
        let summary = format!("{unread} unread message(s), {pending} pending task(s)");
        let payload = json!({
            "unread_messages": unread,
            "pending_tasks": pending,
            "summary": summary,
        });
        match push(PAIR_UPDATE_METHOD, payload) {
            Ok(()) => {
                *self.last_pushed.lock() = Some(rev);
                tracing::debug!(agent = %agent, unread, pending, "pair_update pushed");
            }
            Err(e) => tracing::warn!(agent = %agent, error = %e, "pair_update push failed"),
        }
    }

    /// Revision last delivered, for tests.
    pub fn last_pushed_rev(&self) -> Option<u128> {
        *self.last_pushed.lock()
    }
}

impl<C: Clock> Triggerable for Notifier<C> {
    /// Called by the state service after every commit: forget the pushed
    /// revision and schedule a debounced check, so in-process writes never
    /// depend on the OS delivering a filesystem event.
    fn trigger(&self) {
        *self.last_pushed.lock() = None;
        let _ = self.wake_tx.send(());
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
