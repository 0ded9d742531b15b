use crate::storage::FileSlot;
use crate::store::QuitStore;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<QuitStore<FileSlot>>>,
}

impl AppState {
    pub fn new(store: QuitStore<FileSlot>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }
}
