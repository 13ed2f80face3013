use std::sync::Arc;

use crate::config::AppConfig;
use crate::hub::EventHub;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<EventHub>,
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
}
