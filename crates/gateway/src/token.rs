use std::sync::Arc;

use tokio::sync::RwLock;

/// Process-wide holder for the current bearer token.
///
/// The gateway signals token expiry reactively (auth-failure replies), so no
/// TTL is tracked. `set` replaces the whole value atomically; readers always
/// observe a fully-written token. Clones share the same underlying slot.
#[derive(Clone, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_the_same_slot() {
        let store = TokenStore::new();
        let handle = store.clone();
        store.set("abc").await;
        assert_eq!(handle.get().await.as_deref(), Some("abc"));
        handle.clear().await;
        assert!(store.get().await.is_none());
    }
}
