use crate::{
    config::Config,
    error::AppResult,
    infrastructure::database::{initialize_storage, StorageHandles},
    services::{FilmService, ReferenceService, ServiceContext, UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub films: FilmService,
    pub references: ReferenceService,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let storage = initialize_storage(&config).await?;
        Ok(Self::with_storage(storage, config))
    }

    /// Builds the services over already opened storage
    pub fn with_storage(storage: StorageHandles, config: Config) -> Self {
        let ctx = ServiceContext::new(storage);
        Self {
            users: UserService::new(ctx.clone()),
            films: FilmService::new(ctx.clone()),
            references: ReferenceService::new(ctx),
            config,
        }
    }
}
