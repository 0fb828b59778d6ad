use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;
use uuid::Uuid;

use tasker_db::{Database, UserRow};
use tasker_types::api::Claims;

use crate::middleware::Session;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Wrong email or wrong password; callers never learn which.
    #[error("Unable to login")]
    InvalidCredentials,

    /// Bad signature, malformed token, unknown user or revoked session.
    #[error("Please authenticate.")]
    InvalidToken,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Password hashing and session tokens. The token set itself lives in the
/// store; this type only signs, checks and records membership.
pub struct CredentialManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl CredentialManager {
    pub fn new(config: &AuthConfig) -> Self {
        // Sessions end by revocation, not expiry
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Argon2id with a fresh salt. Blocking: call off the async runtime.
    pub fn hash_password(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
            .to_string();
        Ok(hash)
    }

    /// Save-pipeline step: hashes only a newly supplied password, otherwise
    /// hands back the stored hash untouched.
    pub fn hash_if_changed(&self, change: Option<&str>, current_hash: &str) -> anyhow::Result<String> {
        match change {
            Some(plain) => self.hash_password(plain),
            None => Ok(current_hash.to_string()),
        }
    }

    pub fn verify_password(&self, plain: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok())
            .unwrap_or(false)
    }

    pub fn verify_credentials(
        &self,
        db: &Database,
        email: &str,
        plain: &str,
    ) -> Result<UserRow, AuthError> {
        let email = email.trim().to_lowercase();
        let user = db.get_user_by_email(&email)?.ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(plain, &user.password) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat: chrono::Utc::now().timestamp() as usize,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Mints a token for `user_id` and appends it to the stored session set.
    pub fn issue_token(&self, db: &Database, user_id: &str) -> anyhow::Result<String> {
        let id: Uuid = user_id.parse()?;
        let token = self.sign(id)?;
        db.append_token(user_id, &token)?;
        debug!("Issued session token for user {}", user_id);
        Ok(token)
    }

    pub fn revoke_token(&self, db: &Database, user_id: &str, token: &str) -> anyhow::Result<bool> {
        db.remove_token(user_id, token)
    }

    pub fn revoke_all_tokens(&self, db: &Database, user_id: &str) -> anyhow::Result<usize> {
        db.clear_tokens(user_id)
    }

    /// Resolves a bearer token to its live session. Every rejection reason
    /// collapses into [`AuthError::InvalidToken`].
    pub fn verify_token(&self, db: &Database, token: &str) -> Result<Session, AuthError> {
        let claims = self.decode(token)?;
        let user_id = claims.sub.to_string();

        let user = db.get_user_by_id(&user_id)?.ok_or(AuthError::InvalidToken)?;
        if !db.token_exists(&user_id, token)? {
            return Err(AuthError::InvalidToken);
        }

        Ok(Session {
            user,
            token: token.to_string(),
        })
    }
}
