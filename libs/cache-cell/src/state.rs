use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::store::CacheStore;

/// Shared handles wired once at startup and passed explicitly to every cell.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub supabase: Arc<SupabaseClient>,
    pub cache: CacheStore,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let supabase = Arc::new(SupabaseClient::new(&config));
        let cache = CacheStore::new(config.redis_url.as_deref());

        Arc::new(Self {
            config: Arc::new(config),
            supabase,
            cache,
        })
    }

    /// State wired against an arbitrary base URL with caching off; used by
    /// wiremock-backed tests.
    pub fn for_tests(config: AppConfig) -> Arc<Self> {
        let supabase = Arc::new(SupabaseClient::new(&config));

        Arc::new(Self {
            config: Arc::new(config),
            supabase,
            cache: CacheStore::disabled(),
        })
    }
}
