use tokio::sync::Mutex;

use crate::{auth::TokenConfig, store::TableStore};

pub(crate) struct AppState {
    pub(crate) store: Mutex<TableStore>,
    pub(crate) tokens: TokenConfig,
}

impl AppState {
    pub(crate) fn new(tokens: TokenConfig) -> Self {
        Self {
            store: Mutex::new(TableStore::default()),
            tokens,
        }
    }
}
