//! Process-wide client state.
//!
//! One [`ClientContext`] is built at startup and shared with every handler
//! through `AppState`. Each piece of state sits behind its own async mutex, so
//! a mutation runs start to finish inside one lock scope.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::compare::CompareSet;
use crate::config::Settings;
use crate::customer_forms::CustomerFormQueue;
use crate::favorites::Favorites;
use crate::listing::ListingState;
use crate::session::Session;
use crate::storage::KeyValueStore;
use crate::theme::ThemeState;

#[derive(Clone)]
pub struct ClientContext {
    store: Arc<dyn KeyValueStore>,
    pub session: Arc<Mutex<Session>>,
    pub favorites: Arc<Mutex<Favorites>>,
    pub compare: Arc<Mutex<CompareSet>>,
    pub theme: Arc<Mutex<ThemeState>>,
    pub listing: Arc<Mutex<ListingState>>,
    pub forms: CustomerFormQueue,
}

impl ClientContext {
    /// Restores persisted state. The session is usable once this returns.
    pub fn init(store: Arc<dyn KeyValueStore>, settings: &Settings) -> Self {
        let mut session = Session::new(store.clone());
        session.restore_on_startup();

        let context = ClientContext {
            session: Arc::new(Mutex::new(session)),
            favorites: Arc::new(Mutex::new(Favorites::restore(store.clone()))),
            compare: Arc::new(Mutex::new(CompareSet::new())),
            theme: Arc::new(Mutex::new(ThemeState::init(store.clone(), settings.prefers_dark))),
            listing: Arc::new(Mutex::new(ListingState::new(settings.search_debounce()))),
            forms: CustomerFormQueue::new(store.clone()),
            store,
        };
        tracing::info!("Client context initialized");
        context
    }

    /// Drops the session-only state and flushes storage.
    pub async fn dispose(&self) {
        self.compare.lock().await.clear();
        self.listing.lock().await.reset();
        if let Err(e) = self.store.flush() {
            tracing::error!(error = %e, "Failed to flush storage on shutdown");
        }
        tracing::info!("Client context disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::FAVORITES_KEY;
    use crate::session::TOKEN_KEY;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn init_restores_and_dispose_keeps_favorites() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(FAVORITES_KEY, "[4,7]").unwrap();
        store.set(TOKEN_KEY, "stray-token").unwrap();

        let context = ClientContext::init(store.clone(), &Settings::for_tests());
        {
            let session = context.session.lock().await;
            assert!(!session.is_loading());
            assert!(!session.is_authenticated());
        }
        assert_eq!(store.get(TOKEN_KEY), None);
        assert_eq!(context.favorites.lock().await.ids(), &[4, 7]);

        context.compare.lock().await.add(4);
        context.dispose().await;
        assert_eq!(context.compare.lock().await.count(), 0);
        assert_eq!(store.get(FAVORITES_KEY).as_deref(), Some("[4,7]"));
    }
}
