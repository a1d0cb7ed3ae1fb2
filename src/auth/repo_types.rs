use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::claims::Role;

/// Seeker or provider account.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String, // trimmed + lowercased
    pub password_hash: String, // Argon2 PHC string
    pub role: Role,
    pub created_at: OffsetDateTime,
}

/// Row shape shared by `job_seekers` and `job_providers`; the table implies the role.
#[derive(Debug, FromRow)]
pub(crate) struct AccountRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl AccountRow {
    pub(crate) fn into_account(self, role: Role) -> Account {
        Account {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            role,
            created_at: self.created_at,
        }
    }
}

/// Input to [`AccountStore::create`](super::repo::AccountStore::create).
/// The password is already hashed by the time it gets here.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}
