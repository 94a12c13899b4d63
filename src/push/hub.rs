use super::protocol::{ServerFrame, Snapshot};
use super::snapshot;
use crate::clock::Clock;
use crate::db::Store;
use crate::errors::Result;
use crate::monitor::events::MonitorEvent;
use crate::monitoring::Metrics;
use crate::token_meta::TokenMeta;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::warn;
use uuid::Uuid;

struct ConnectionHandle {
    subscribed: Arc<RwLock<HashSet<String>>>,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

/// Fan-out layer sitting on top of the Monitor's event bus. Holds no
/// per-connection I/O itself — connection tasks register a channel and poll
/// it; the hub only decides who gets which frame.
pub struct PushHub {
    store: Arc<dyn Store>,
    token_meta: Arc<TokenMeta>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
    connections: RwLock<HashMap<Uuid, ConnectionHandle>>,
}

impl PushHub {
    pub fn new(store: Arc<dyn Store>, token_meta: Arc<TokenMeta>, clock: Arc<dyn Clock>, metrics: Arc<Metrics>) -> Arc<Self> {
        Arc::new(Self {
            store,
            token_meta,
            clock,
            metrics,
            connections: RwLock::new(HashMap::new()),
        })
    }

    /// Drains the Monitor's broadcast channel until it closes. Meant to run
    /// on its own task for the lifetime of the process.
    pub async fn run_event_loop(self: Arc<Self>, mut events: broadcast::Receiver<MonitorEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "push hub lagged behind monitor events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn handle_event(&self, event: MonitorEvent) {
        let wallet = event.wallet().to_string();
        let frame = match event {
            MonitorEvent::Trade { wallet, trade } => ServerFrame::TradeUpdate { wallet, trade },
            MonitorEvent::Balance { wallet, snapshot } => ServerFrame::BalanceUpdate { wallet, snapshot },
            MonitorEvent::Pnl { wallet, daily_pnl } => ServerFrame::PnlUpdate { wallet, daily_pnl },
        };
        self.broadcast_to_subscribers(&wallet, frame).await;

        match self.snapshot_for(&wallet).await {
            Ok(snap) => self.broadcast_to_all(ServerFrame::UsersUpdate { snapshot: snap }).await,
            Err(e) => warn!(wallet = %wallet, error = %e, "snapshot assembly failed for users_update"),
        }
    }

    async fn broadcast_to_subscribers(&self, wallet: &str, frame: ServerFrame) {
        let connections = self.connections.read().await;
        for handle in connections.values() {
            if handle.subscribed.read().await.contains(wallet) {
                let _ = handle.tx.send(frame.clone());
            }
        }
    }

    pub async fn broadcast_to_all(&self, frame: ServerFrame) {
        let connections = self.connections.read().await;
        for handle in connections.values() {
            let _ = handle.tx.send(frame.clone());
        }
    }

    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<ServerFrame>, Arc<RwLock<HashSet<String>>>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let subscribed = Arc::new(RwLock::new(HashSet::new()));
        self.connections.write().await.insert(id, ConnectionHandle { subscribed: subscribed.clone(), tx });
        self.metrics.push_connections.with_label_values(&["ws"]).inc();
        (id, rx, subscribed)
    }

    pub async fn unregister(&self, id: Uuid) {
        self.connections.write().await.remove(&id);
        self.metrics.push_connections.with_label_values(&["ws"]).dec();
    }

    pub async fn users_list(&self) -> Result<Vec<Snapshot>> {
        snapshot::build_users_list(self.store.as_ref(), &self.token_meta, self.clock.as_ref()).await
    }

    pub async fn snapshot_for(&self, wallet: &str) -> Result<Snapshot> {
        snapshot::build_snapshot(self.store.as_ref(), &self.token_meta, self.clock.as_ref(), wallet).await
    }
}
