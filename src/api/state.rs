use crate::{
    config::Config,
    db::{create_redis_client, Cache, CacheWriterHandle},
    services::{mood::MoodService, tmdb::TmdbClient},
};

/// Shared application state, cheap to clone into handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Cache,
    pub tmdb: TmdbClient,
    pub moods: MoodService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<(Self, CacheWriterHandle)> {
        let redis_client = create_redis_client(&config.redis_url)?;
        let (cache, writer_handle) = Cache::new(redis_client).await;
        let tmdb = TmdbClient::new(config, cache.clone())?;
        let moods = MoodService::new(cache.clone(), tmdb.clone());

        Ok((
            Self { cache, tmdb, moods },
            writer_handle,
        ))
    }
}
