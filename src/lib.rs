pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::infra::classifier::ContentClassifier;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub classifier: Arc<dyn ContentClassifier>,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
}
