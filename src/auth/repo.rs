use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::claims::Role;
use super::repo_types::{Account, AccountRow, NewAccount};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered for this role")]
    DuplicateEmail,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for seeker and provider accounts.
///
/// Email lookups are case-insensitive and scoped to one role; uniqueness is
/// enforced by the backend itself so concurrent signups cannot both win.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create(&self, role: Role, new: NewAccount) -> Result<Account, StoreError>;
    async fn find_by_email(&self, role: Role, email: &str) -> Result<Option<Account>, StoreError>;
    async fn find_by_id(&self, role: Role, id: Uuid) -> Result<Option<Account>, StoreError>;
}

/// Postgres-backed store. Relies on the unique index over `lower(email)`
/// created by the migrations.
#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(&self, role: Role, new: NewAccount) -> Result<Account, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO {} (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, created_at
            "#,
            role.table()
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.name)
            .bind(new.email.to_lowercase())
            .bind(&new.password_hash)
            .fetch_one(&self.db)
            .await
            .map_err(map_insert_error)?;
        Ok(row.into_account(role))
    }

    async fn find_by_email(&self, role: Role, email: &str) -> Result<Option<Account>, StoreError> {
        let sql = format!(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM {}
            WHERE lower(email) = $1
            "#,
            role.table()
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(email.to_lowercase())
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| r.into_account(role)))
    }

    async fn find_by_id(&self, role: Role, id: Uuid) -> Result<Option<Account>, StoreError> {
        let sql = format!(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM {}
            WHERE id = $1
            "#,
            role.table()
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| r.into_account(role)))
    }
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<(Role, String), Account>>,
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(&self, role: Role, new: NewAccount) -> Result<Account, StoreError> {
        let email = new.email.to_lowercase();
        // Check and insert under one write guard.
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&(role, email.clone())) {
            return Err(StoreError::DuplicateEmail);
        }
        let account = Account {
            id: Uuid::new_v4(),
            name: new.name,
            email: email.clone(),
            password_hash: new.password_hash,
            role,
            created_at: OffsetDateTime::now_utc(),
        };
        accounts.insert((role, email), account.clone());
        Ok(account)
    }

    async fn find_by_email(&self, role: Role, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&(role, email.to_lowercase())).cloned())
    }

    async fn find_by_id(&self, role: Role, id: Uuid) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.role == role && a.id == id)
            .cloned())
    }
}
