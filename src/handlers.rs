use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    extract::{RecordId, ValidJson},
    models::{
        CreateTweetRequest, LoginRequest, SignupRequest, StoredUser, Tweet, TweetPatch, User,
        UserPatch, same_email,
    },
    password,
    state::AppState,
};

// Users

pub async fn signup(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let password_hash = password::hash(body.password).await?;

    let stored = StoredUser {
        user: User {
            user_id: Uuid::new_v4(),
            email: body.email,
            first_name: body.first_name,
            last_name: body.last_name,
            birth_date: body.birth_date,
        },
        password_hash,
    };
    let stored = state.users.append(stored).await?;

    state.users_created_counter.add(1, &[]);
    info!(user_id = %stored.user.user_id, "User signed up");

    Ok((StatusCode::CREATED, Json(stored.into())))
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> ApiResult<Json<User>> {
    let found = state
        .users
        .find(|u| same_email(&u.user.email, &body.email))
        .await?;

    let Some(stored) = found else {
        warn!("Login attempt for unknown email");
        return Err(ApiError::Unauthorized);
    };

    if !password::verify(body.password, stored.password_hash.clone()).await? {
        warn!(user_id = %stored.user.user_id, "Login attempt with wrong password");
        return Err(ApiError::Unauthorized);
    }

    Ok(Json(stored.into()))
}

pub async fn get_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(User::from).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.get(id).await?.into()))
}

/// Tweets keep their embedded snapshot of a deleted author.
pub async fn delete_user(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> ApiResult<Json<User>> {
    let removed = state.users.delete(id).await?;
    info!(user_id = %id, "User deleted");
    Ok(Json(removed.into()))
}

pub async fn update_user(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    ValidJson(patch): ValidJson<UserPatch>,
) -> ApiResult<Json<User>> {
    let updated = state
        .users
        .update(id, |stored| patch.apply(&mut stored.user))
        .await?;
    info!(user_id = %id, "User updated");
    Ok(Json(updated.into()))
}

// Tweets

pub async fn get_tweets(State(state): State<AppState>) -> ApiResult<Json<Vec<Tweet>>> {
    Ok(Json(state.tweets.list().await?))
}

pub async fn post_tweet(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<CreateTweetRequest>,
) -> ApiResult<(StatusCode, Json<Tweet>)> {
    let author = state.users.get(body.user_id).await?;

    let tweet = Tweet {
        tweet_id: Uuid::new_v4(),
        content: body.content,
        created_at: Utc::now(),
        updated_at: None,
        by: author.into(),
    };
    let tweet = state.tweets.append(tweet).await?;

    state.tweets_created_counter.add(1, &[]);
    info!(tweet_id = %tweet.tweet_id, user_id = %tweet.by.user_id, "Tweet posted");

    Ok((StatusCode::CREATED, Json(tweet)))
}

pub async fn get_tweet(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> ApiResult<Json<Tweet>> {
    Ok(Json(state.tweets.get(id).await?))
}

pub async fn delete_tweet(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> ApiResult<Json<Tweet>> {
    let removed = state.tweets.delete(id).await?;
    info!(tweet_id = %id, "Tweet deleted");
    Ok(Json(removed))
}

pub async fn update_tweet(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    ValidJson(patch): ValidJson<TweetPatch>,
) -> ApiResult<Json<Tweet>> {
    let now = Utc::now();
    let updated = state
        .tweets
        .update(id, |tweet| patch.apply(tweet, now))
        .await?;
    info!(tweet_id = %id, "Tweet updated");
    Ok(Json(updated))
}
