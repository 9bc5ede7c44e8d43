//! Shared application state handed to actix handlers.

use std::sync::Arc;

use crate::auth::AuthStore;
use crate::catalog::CatalogDb;
use crate::config::UploadLimits;
use crate::ingest::Ingestor;
use crate::storage::StorageBackend;

pub struct AppState {
    pub catalog: CatalogDb,
    pub storage: Arc<dyn StorageBackend>,
    pub auth: AuthStore,
    pub ingestor: Ingestor,
    pub limits: UploadLimits,
}
