use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Public user shape. Never carries credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

/// A user as persisted in the users file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    #[serde(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// Emails compare case-insensitively, with full Unicode case folding.
pub fn same_email(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<StoredUser> for User {
    fn from(stored: StoredUser) -> Self {
        stored.user
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 2, max = 20))]
    pub first_name: String,
    #[validate(length(min = 2, max = 20))]
    pub last_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[validate(length(min = 8, max = 50))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 50))]
    pub password: String,
}

/// Partial user update; absent fields stay untouched and `birth_date: null` clears it.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserPatch {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 2, max = 20))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 20))]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub birth_date: Option<Option<NaiveDate>>,
}

impl UserPatch {
    pub fn apply(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(birth_date) = self.birth_date {
            user.birth_date = birth_date;
        }
    }
}

/// `by` is a snapshot of the author taken when the tweet was posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub tweet_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub by: User,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTweetRequest {
    #[validate(length(min = 2, max = 256))]
    pub content: String,
    pub user_id: Uuid,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TweetPatch {
    #[validate(length(min = 2, max = 256))]
    pub content: Option<String>,
}

impl TweetPatch {
    pub fn apply(self, tweet: &mut Tweet, now: DateTime<Utc>) {
        if let Some(content) = self.content {
            tweet.content = content;
        }
        tweet.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jo() -> User {
        User {
            user_id: Uuid::new_v4(),
            email: "a@b.com".into(),
            first_name: "Jo".into(),
            last_name: "Do".into(),
            birth_date: None,
        }
    }

    #[test]
    fn stored_user_flattens_and_public_user_drops_hash() {
        let stored = StoredUser {
            user: jo(),
            password_hash: "$argon2id$stub".into(),
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["email"], "a@b.com");
        assert_eq!(value["password_hash"], "$argon2id$stub");

        let public = serde_json::to_value(User::from(stored)).unwrap();
        assert!(public.get("password_hash").is_none());
        assert!(public.get("password").is_none());
    }

    #[test]
    fn tweet_content_bounds() {
        let too_short = CreateTweetRequest {
            content: "a".into(),
            user_id: Uuid::new_v4(),
        };
        assert!(too_short.validate().is_err());

        let too_long = CreateTweetRequest {
            content: "x".repeat(257),
            user_id: Uuid::new_v4(),
        };
        assert!(too_long.validate().is_err());

        let max = CreateTweetRequest {
            content: "x".repeat(256),
            user_id: Uuid::new_v4(),
        };
        assert!(max.validate().is_ok());
    }

    #[test]
    fn signup_rejects_bad_email_and_short_password() {
        let req = SignupRequest {
            email: "not-an-email".into(),
            first_name: "Jo".into(),
            last_name: "Do".into(),
            birth_date: None,
            password: "short".into(),
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn user_patch_keeps_absent_fields() {
        let mut user = jo();
        UserPatch {
            last_name: Some("Smith".into()),
            ..Default::default()
        }
        .apply(&mut user);
        assert_eq!(user.first_name, "Jo");
        assert_eq!(user.last_name, "Smith");
        assert_eq!(user.email, "a@b.com");
    }

    #[test]
    fn user_patch_null_birth_date_clears_it() {
        let mut user = jo();
        user.birth_date = NaiveDate::from_ymd_opt(1990, 4, 1);

        let absent: UserPatch = serde_json::from_str(r#"{"first_name":"Al"}"#).unwrap();
        absent.apply(&mut user);
        assert_eq!(user.birth_date, NaiveDate::from_ymd_opt(1990, 4, 1));

        let cleared: UserPatch = serde_json::from_str(r#"{"birth_date":null}"#).unwrap();
        cleared.apply(&mut user);
        assert_eq!(user.birth_date, None);

        let set: UserPatch = serde_json::from_str(r#"{"birth_date":"2001-12-31"}"#).unwrap();
        set.apply(&mut user);
        assert_eq!(user.birth_date, NaiveDate::from_ymd_opt(2001, 12, 31));
    }

    #[test]
    fn emails_fold_beyond_ascii() {
        assert!(same_email("a@b.com", "A@B.COM"));
        assert!(same_email("élodie@b.com", "ÉLODIE@b.com"));
        assert!(!same_email("a@b.com", "c@b.com"));
    }

    #[test]
    fn tweet_patch_stamps_updated_at() {
        let now = Utc::now();
        let mut tweet = Tweet {
            tweet_id: Uuid::new_v4(),
            content: "hello".into(),
            created_at: now,
            updated_at: None,
            by: jo(),
        };
        TweetPatch {
            content: Some("edited".into()),
        }
        .apply(&mut tweet, now);
        assert_eq!(tweet.content, "edited");
        assert_eq!(tweet.updated_at, Some(now));
        assert_eq!(tweet.created_at, now);
    }
}
