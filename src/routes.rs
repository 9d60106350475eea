use axum::{
    Router,
    routing::{delete, get, post, put},
};
use axum_tracing_opentelemetry::middleware::{OtelAxumLayer, OtelInResponseLayer};

use crate::{
    handlers::{
        delete_tweet, delete_user, get_tweet, get_tweets, get_user, get_users, login, post_tweet,
        signup, update_tweet, update_user,
    },
    state::AppState,
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/users", get(get_users))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/delete", delete(delete_user))
        .route("/users/{id}/update", put(update_user))
        .route("/", get(get_tweets))
        .route("/post", post(post_tweet))
        .route(
            "/tweets/{id}",
            get(get_tweet).delete(delete_tweet).put(update_tweet),
        )
        .layer(OtelInResponseLayer::default())
        .layer(OtelAxumLayer::default())
        .with_state(state)
}
