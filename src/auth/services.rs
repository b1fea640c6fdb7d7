use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRef;
use rand::rngs::OsRng;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{dto::SessionToken, jwt::JwtKeys},
    error::AppError,
    state::AppState,
    store::{StoreError, User},
};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Email must contain @")]
    EmailInvalid,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("User Already Registered")]
    AlreadyRegistered,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::EmailInvalid | AccountError::PasswordMismatch => {
                AppError::BadRequest(e.to_string())
            }
            AccountError::AlreadyRegistered => AppError::Conflict(e.to_string()),
            AccountError::InvalidCredentials | AccountError::InvalidToken => {
                AppError::Unauthorized(e.to_string())
            }
            AccountError::Internal(inner) => AppError::Internal(inner),
        }
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[instrument(skip(st, password, confirm))]
pub async fn register(
    st: &AppState,
    name: &str,
    email: &str,
    password: &str,
    confirm: &str,
) -> Result<User, AccountError> {
    let email = normalize_email(email);
    if !email.contains('@') {
        return Err(AccountError::EmailInvalid);
    }
    if password != confirm {
        return Err(AccountError::PasswordMismatch);
    }
    if st.store.find_user_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AccountError::AlreadyRegistered);
    }

    let hash = hash_password(password)?;
    let user = match st.store.create_user(name.trim(), &email, &hash).await {
        Ok(u) => u,
        // lost a race with a concurrent registration
        Err(StoreError::DuplicateEmail) => return Err(AccountError::AlreadyRegistered),
        Err(StoreError::Other(e)) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

#[instrument(skip(st, password))]
pub async fn authenticate(
    st: &AppState,
    email: &str,
    password: &str,
) -> Result<(User, SessionToken), AccountError> {
    let email = normalize_email(email);
    if !email.contains('@') {
        return Err(AccountError::EmailInvalid);
    }

    let Some(user) = st.store.find_user_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AccountError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AccountError::InvalidCredentials);
    }

    let session = issue_session(&JwtKeys::from_ref(st), &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, session))
}

/// Exchanges a refresh token for a fresh access/refresh pair.
#[instrument(skip_all)]
pub fn refresh_session(st: &AppState, refresh_token: &str) -> Result<SessionToken, AccountError> {
    let keys = JwtKeys::from_ref(st);
    let claims = keys.verify_refresh(refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AccountError::InvalidToken
    })?;
    Ok(SessionToken {
        access_token: keys.sign_access(claims.sub)?,
        refresh_token: keys.sign_refresh(claims.sub)?,
        token_type: "Bearer",
        expires_in: keys.access_ttl.as_secs(),
    })
}

fn issue_session(keys: &JwtKeys, user: &User) -> anyhow::Result<SessionToken> {
    Ok(SessionToken {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        token_type: "Bearer",
        expires_in: keys.access_ttl.as_secs(),
    })
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert_ne!(a, b);
    }
}
