use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::claims::Role;
use super::extractors::Validate;
use super::repo_types::Account;
use crate::error::ApiError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Request body for signup. Missing fields deserialize as empty and are
/// rejected by validation.
#[derive(Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for SignupRequest {
    fn validate(&mut self) -> Result<(), ApiError> {
        self.name = self.name.trim().to_string();
        self.email = normalize_email(&self.email);
        require("Name", &self.name)?;
        require("Email", &self.email)?;
        require("Password", &self.password)?;
        if !is_valid_email(&self.email) {
            return Err(ApiError::validation("Invalid email"));
        }
        Ok(())
    }
}

/// Request body for login. A `name` sent by the signup form is ignored.
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&mut self) -> Result<(), ApiError> {
        self.email = normalize_email(&self.email);
        require("Email", &self.email)?;
        require("Password", &self.password)?;
        if !is_valid_email(&self.email) {
            return Err(ApiError::validation("Invalid email"));
        }
        Ok(())
    }
}

/// Response returned after signup or login.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub account_id: Uuid,
}

/// Public part of the account returned to its owner.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Account> for PublicAccount {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            name: a.name,
            email: a.email,
            role: a.role,
            created_at: a.created_at,
        }
    }
}
