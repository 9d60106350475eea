use anyhow::{Context, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a plain password with argon2id off the async runtime.
pub async fn hash(password: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| anyhow!("failed to hash password: {e}"))
    })
    .await
    .context("password hashing task panicked")?
}

/// Verify a password against a stored argon2 PHC string. Unparseable hashes never match.
pub async fn verify(password: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || match PasswordHash::new(&hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .context("password verification task panicked")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hashed = hash("password1".into()).await.unwrap();
        assert!(hashed.starts_with("$argon2id$"));
        assert!(verify("password1".into(), hashed.clone()).await.unwrap());
        assert!(!verify("password2".into(), hashed).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_never_matches() {
        assert!(!verify("password1".into(), "plaintext".into()).await.unwrap());
    }
}
