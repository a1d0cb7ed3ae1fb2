use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account namespace: job seekers and job providers (recruiters) are
/// registered and authenticated independently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Seeker,
    Provider,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Seeker => "seeker",
            Role::Provider => "provider",
        }
    }

    /// Table holding this role's accounts.
    pub(crate) fn table(self) -> &'static str {
        match self {
            Role::Seeker => "job_seekers",
            Role::Provider => "job_providers",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // account ID
    pub role: Role,  // namespace the account lives in
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.sub,
            role: self.role,
        }
    }
}

/// Verified caller identity, injected into request extensions by
/// [`authenticate`](super::extractors::authenticate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: Uuid,
    pub role: Role,
}
