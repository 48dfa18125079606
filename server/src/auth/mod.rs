//! Session capabilities.
//!
//! Identity is issued elsewhere (passcode login, admin login) as an HS256
//! token. Handlers never consult ambient state: they take a `UserSession`
//! or `AdminSession` argument, and that value is the capability.

mod extractors;

use std::collections::HashSet;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

pub use extractors::BearerToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub exp: i64,
}

/// An authenticated ticket buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub user_id: String,
    pub email: Option<String>,
}

/// An authenticated, recognized gate admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub admin_id: String,
}

pub struct SessionAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    admin_ids: HashSet<String>,
}

impl SessionAuthority {
    /// `admin_ids` empty means any admin-role token is recognized.
    pub fn new(secret: &str, admin_ids: HashSet<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            admin_ids,
        }
    }

    pub fn issue(
        &self,
        subject: &str,
        email: Option<&str>,
        role: Role,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: subject.to_string(),
            email: email.map(str::to_string),
            role,
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("token signing failed: {e}")))
    }

    pub fn authenticate(&self, token: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AppError::AuthError("Invalid or expired session".to_string())
        })?;
        if data.claims.sub.trim().is_empty() {
            return Err(AppError::AuthError("Session has no subject".to_string()));
        }
        Ok(data.claims)
    }

    pub fn user(&self, token: &str) -> Result<UserSession, AppError> {
        let claims = self.authenticate(token)?;
        Ok(UserSession {
            user_id: claims.sub,
            email: claims.email,
        })
    }

    pub fn admin(&self, token: &str) -> Result<AdminSession, AppError> {
        let claims = self.authenticate(token)?;
        if claims.role != Role::Admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        if !self.admin_ids.is_empty() && !self.admin_ids.contains(&claims.sub) {
            tracing::warn!(subject = %claims.sub, "Admin token for unrecognized admin");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminSession {
            admin_id: claims.sub,
        })
    }
}
