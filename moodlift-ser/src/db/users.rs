//! User and token persistence

use chrono::{DateTime, Duration, Utc};
use moodlift_common::auth::{PasswordHash, TOKEN_LIFETIME_HOURS};
use moodlift_common::Result;
use sqlx::{Row, SqlitePool};

/// Stored user record
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub password: PasswordHash,
}

/// Issued bearer token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Insert a new user.
///
/// Returns false (and writes nothing) when the username is already taken.
pub async fn create_user(pool: &SqlitePool, username: &str, password: &PasswordHash) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO users (username, password_hash, salt)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(&password.hash)
    .bind(&password.salt)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn find_user(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT username, password_hash, salt FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| User {
        username: row.get("username"),
        password: PasswordHash {
            hash: row.get("password_hash"),
            salt: row.get("salt"),
        },
    }))
}

/// Record `token` for `username`, valid for [`TOKEN_LIFETIME_HOURS`]
pub async fn store_token(pool: &SqlitePool, username: &str, token: &str) -> Result<IssuedToken> {
    let expires_at = Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS);

    sqlx::query("INSERT INTO tokens (token, username, expires_at) VALUES (?, ?, ?)")
        .bind(token)
        .bind(username)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(IssuedToken {
        token: token.to_string(),
        username: username.to_string(),
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use moodlift_common::auth::{generate_token, hash_password, verify_password};

    #[tokio::test]
    async fn test_create_and_find_user() {
        let pool = init_memory_database().await.unwrap();
        let password = hash_password("hunter2");

        assert!(create_user(&pool, "alice", &password).await.unwrap());

        let user = find_user(&pool, "alice").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert!(verify_password("hunter2", &user.password));
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let pool = init_memory_database().await.unwrap();
        assert!(create_user(&pool, "bob", &hash_password("a")).await.unwrap());
        assert!(!create_user(&pool, "bob", &hash_password("b")).await.unwrap());

        // Original password survives
        let user = find_user(&pool, "bob").await.unwrap().unwrap();
        assert!(verify_password("a", &user.password));
    }

    #[tokio::test]
    async fn test_missing_user() {
        let pool = init_memory_database().await.unwrap();
        assert!(find_user(&pool, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_stored_with_expiry() {
        let pool = init_memory_database().await.unwrap();
        create_user(&pool, "carol", &hash_password("pw")).await.unwrap();

        let token = generate_token();
        let issued = store_token(&pool, "carol", &token).await.unwrap();
        let lifetime = issued.expires_at - Utc::now();
        assert!(lifetime > Duration::hours(TOKEN_LIFETIME_HOURS - 1));

        let row = sqlx::query("SELECT username, expires_at FROM tokens WHERE token = ?")
            .bind(&token)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("username"), "carol");
        let stored: DateTime<Utc> = row.get("expires_at");
        assert_eq!(stored.timestamp(), issued.expires_at.timestamp());
    }

    #[tokio::test]
    async fn test_token_requires_known_user() {
        let pool = init_memory_database().await.unwrap();
        assert!(store_token(&pool, "ghost", &generate_token()).await.is_err());
    }
}
