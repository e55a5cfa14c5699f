//! Sync Coordinator.
//!
//! A small state machine driven by connectivity signals:
//!
//! ```text
//!            Available                 probe + bulk push ok
//! Offline ─────────────▶ OnlineUnsynced ─────────────────────▶ OnlineSynced
//!    ▲                                                             │
//!    └──────────────────────── Unavailable ◀───────────────────────┘
//! ```
//!
//! Going online installs one change subscription per live collection
//! (albums, essays, videos). A change to the collection currently on screen
//! reloads that view through the facade and hands it to the [`ViewSink`].

use crate::facade::{Portfolio, View, ViewContent};
use folio_engine::CollectionKind;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Collections with live change subscriptions.
pub const LIVE_COLLECTIONS: [CollectionKind; 3] = [
    CollectionKind::Albums,
    CollectionKind::Essays,
    CollectionKind::Videos,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Offline,
    OnlineUnsynced,
    OnlineSynced,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Offline => "offline",
            SyncState::OnlineUnsynced => "online (unsynced)",
            SyncState::OnlineSynced => "online (synced)",
        };
        f.write_str(name)
    }
}

/// Connectivity changes reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSignal {
    Available,
    Unavailable,
}

/// Receives reloaded view content.
pub trait ViewSink: Send + Sync {
    fn show(&self, view: View, content: ViewContent);
}

impl View {
    /// The live collection this view displays, if any.
    pub fn collection(&self) -> Option<CollectionKind> {
        match self {
            View::Albums => Some(CollectionKind::Albums),
            View::Essays => Some(CollectionKind::Essays),
            View::Videos => Some(CollectionKind::Videos),
            View::Home | View::Album(_) => None,
        }
    }
}

/// Drives sync state from connectivity signals.
pub struct SyncCoordinator {
    portfolio: Arc<Portfolio>,
    sink: Arc<dyn ViewSink>,
    state: watch::Sender<SyncState>,
    view: watch::Sender<View>,
    subscriptions: Vec<JoinHandle<()>>,
}

impl SyncCoordinator {
    /// Create a coordinator. `reachable` is whether the network was up at
    /// startup.
    pub fn new(portfolio: Arc<Portfolio>, sink: Arc<dyn ViewSink>, reachable: bool) -> Self {
        let initial = if reachable {
            SyncState::OnlineUnsynced
        } else {
            SyncState::Offline
        };
        Self {
            portfolio,
            sink,
            state: watch::Sender::new(initial),
            view: watch::Sender::new(View::Home),
            subscriptions: Vec::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Observe state changes.
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Record which view is on screen.
    pub fn set_view(&self, view: View) {
        self.view.send_replace(view);
    }

    pub fn view(&self) -> View {
        *self.view.borrow()
    }

    /// Active subscription tasks.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.iter().filter(|s| !s.is_finished()).count()
    }

    /// Bring sync up if the network was reachable at startup.
    pub async fn start(&mut self) {
        if self.state() == SyncState::OnlineUnsynced {
            self.go_online().await;
        }
    }

    /// Start, then process signals one at a time until the sender closes.
    pub async fn run(mut self, mut signals: mpsc::Receiver<NetworkSignal>) {
        self.start().await;
        while let Some(signal) = signals.recv().await {
            self.handle(signal).await;
        }
        debug!("network signal channel closed, coordinator stopping");
        self.abort_subscriptions();
    }

    pub async fn handle(&mut self, signal: NetworkSignal) {
        match (signal, self.state()) {
            (NetworkSignal::Available, SyncState::OnlineSynced) => {
                debug!("already synced, ignoring network signal");
            }
            (NetworkSignal::Available, _) => self.go_online().await,
            (NetworkSignal::Unavailable, _) => self.go_offline(),
        }
    }

    async fn go_online(&mut self) {
        self.transition(SyncState::OnlineUnsynced);

        if !self.portfolio.enable_sync().await {
            warn!("could not reach remote, staying unsynced");
            return;
        }

        self.install_subscriptions().await;
        self.transition(SyncState::OnlineSynced);
    }

    /// Subscriptions are left running; remote calls fail and fall back
    /// until the network returns.
    fn go_offline(&mut self) {
        self.transition(SyncState::Offline);
    }

    fn transition(&self, next: SyncState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "sync state changed");
        }
    }

    fn abort_subscriptions(&mut self) {
        for handle in self.subscriptions.drain(..) {
            handle.abort();
        }
    }

    async fn install_subscriptions(&mut self) {
        self.abort_subscriptions();

        let Some(mirror) = self.portfolio.mirror() else {
            return;
        };

        for kind in LIVE_COLLECTIONS {
            let mut changes = match mirror.subscribe(kind).await {
                Ok(changes) => changes,
                Err(e) => {
                    warn!(collection = %kind, error = %e, "could not subscribe to changes");
                    continue;
                }
            };

            let portfolio = Arc::clone(&self.portfolio);
            let sink = Arc::clone(&self.sink);
            let view = self.view.subscribe();

            self.subscriptions.push(tokio::spawn(async move {
                loop {
                    match changes.recv().await {
                        Ok(event) => {
                            debug!(collection = %kind, remote_id = %event.remote_id, "remote change");
                        }
                        Err(RecvError::Lagged(missed)) => {
                            debug!(collection = %kind, missed, "change feed lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }

                    let current = *view.borrow();
                    if current.collection() == Some(kind) {
                        let content = portfolio.load_view(current).await;
                        sink.show(current, content);
                    }
                }
            }));
        }
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.abort_subscriptions();
    }
}
