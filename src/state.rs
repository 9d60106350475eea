use std::sync::Arc;

use opentelemetry::{global, metrics::Counter};
use tracing::info;

use crate::{
    config::Config,
    models::{StoredUser, Tweet},
    store::{JsonStore, StoreError},
    telemetry::SERVICE_NAME,
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<JsonStore<StoredUser>>,
    pub tweets: Arc<JsonStore<Tweet>>,
    pub users_created_counter: Counter<u64>,
    pub tweets_created_counter: Counter<u64>,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self, StoreError> {
        let users: JsonStore<StoredUser> = JsonStore::open(&config.users_path).await?;
        let tweets: JsonStore<Tweet> = JsonStore::open(&config.tweets_path).await?;
        info!(
            users = %users.path().display(),
            tweets = %tweets.path().display(),
            "Data stores ready"
        );

        Ok(Self::from_stores(users, tweets))
    }

    pub fn from_stores(users: JsonStore<StoredUser>, tweets: JsonStore<Tweet>) -> Self {
        // Without an installed meter provider these are no-ops.
        let meter = global::meter(SERVICE_NAME);

        Self {
            users: Arc::new(users),
            tweets: Arc::new(tweets),
            users_created_counter: meter.u64_counter("users_created").build(),
            tweets_created_counter: meter.u64_counter("tweets_created").build(),
        }
    }
}
