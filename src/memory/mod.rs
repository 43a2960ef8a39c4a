//! Memory core: CRUD, keyword search, and context assembly over scoped stores.

pub mod context;
pub mod scope;
pub mod search;
pub mod store;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use crate::config::LumenConfig;
use crate::db::StoreRegistry;

use scope::ScopedStores;
use search::SearchService;
use store::MemoryService;

/// Both services bound to one project, sharing a single set of store routes.
pub struct MemoryCore {
    pub memories: MemoryService,
    pub search: SearchService,
}

impl MemoryCore {
    pub fn new(registry: Arc<StoreRegistry>, config: Arc<LumenConfig>, project_path: &Path) -> Self {
        let stores = Arc::new(ScopedStores::new(registry, config, project_path));
        Self {
            memories: MemoryService::new(Arc::clone(&stores)),
            search: SearchService::new(stores),
        }
    }
}
