use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// Caller role as a closed enum. Tokens issued by the legacy system carry
/// localized role labels, so deserialization goes through a mapping table
/// rather than comparing natural-language strings in authorization logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Role {
    Student,
    Advisor,
    Admin,
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim() {
            "Student" | "Mahasiswa" => Ok(Role::Student),
            "Advisor" | "Dosen Wali" => Ok(Role::Advisor),
            "Admin" => Ok(Role::Admin),
            other => Err(format!("unknown role label '{other}'")),
        }
    }
}

/// Claims carried by a bearer token. Token issuance lives in a separate
/// identity service; this API only verifies and reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: usize,
}

#[async_trait]
impl FromRequestParts<AppState> for Claims {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let data = decode::<Claims>(token, &state.decoding_key, &Validation::default())
            .map_err(|_| AppError::Unauthorized)?;
        Ok(data.claims)
    }
}
