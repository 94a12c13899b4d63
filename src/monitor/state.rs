use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct WalletState {
    pub user_id: Option<i64>,
    pub last_seen_signature: Option<String>,
}

/// `walletAddress → {userId, lastSeenSignature}`, reconciled against the
/// Store on every cycle. One coarse lock; readers take a snapshot.
#[derive(Default)]
pub struct ActiveWalletSet {
    wallets: RwLock<HashMap<String, WalletState>>,
}

impl ActiveWalletSet {
    pub async fn snapshot(&self) -> Vec<(String, WalletState)> {
        self.wallets
            .read()
            .await
            .iter()
            .map(|(w, s)| (w.clone(), s.clone()))
            .collect()
    }

    pub async fn contains(&self, wallet: &str) -> bool {
        self.wallets.read().await.contains_key(wallet)
    }

    pub async fn insert(&self, wallet: String, state: WalletState) {
        self.wallets.write().await.insert(wallet, state);
    }

    pub async fn retain_live(&self, live_wallets: &HashSet<String>) {
        self.wallets.write().await.retain(|w, _| live_wallets.contains(w));
    }

    pub async fn last_seen_signature(&self, wallet: &str) -> Option<String> {
        self.wallets.read().await.get(wallet).and_then(|s| s.last_seen_signature.clone())
    }

    pub async fn set_last_seen_signature(&self, wallet: &str, signature: String) {
        if let Some(state) = self.wallets.write().await.get_mut(wallet) {
            state.last_seen_signature = Some(signature);
        }
    }
}

/// Signatures already observed by this process; the primary dedupe layer
/// ahead of the Store lookup. Never purged for wallets that go inactive.
#[derive(Default)]
pub struct SeenSignatures {
    seen: RwLock<HashSet<String>>,
}

impl SeenSignatures {
    pub async fn contains(&self, signature: &str) -> bool {
        self.seen.read().await.contains(signature)
    }

    pub async fn insert(&self, signature: String) {
        self.seen.write().await.insert(signature);
    }

    pub async fn preload(&self, signatures: impl IntoIterator<Item = String>) {
        let mut seen = self.seen.write().await;
        seen.extend(signatures);
    }

    pub async fn len(&self) -> usize {
        self.seen.read().await.len()
    }
}
