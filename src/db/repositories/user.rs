use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use sha2::{Digest, Sha256};
use tokio::task;
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::db::now_rfc3339;
use crate::entities::{prelude::*, sessions, users};
use crate::error::{CoreError, CoreResult};

/// User role. Stored as a plain string column; parsed here so the rest
/// of the crate never string-compares roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(CoreError::Validation(format!(
                "unknown role '{other}' (expected 'admin' or 'user')"
            ))),
        }
    }
}

/// User data returned from the repository (password hash stripped).
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub created_at: String,
}

impl TryFrom<users::Model> for User {
    type Error = CoreError;

    fn try_from(model: users::Model) -> CoreResult<Self> {
        Ok(Self {
            id: model.id,
            username: model.username,
            role: Role::parse(&model.role)?,
            created_at: model.created_at,
        })
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
    security: SecurityConfig,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, security: SecurityConfig) -> Self {
        Self { conn, security }
    }

    /// Create a user with an Argon2id-hashed password.
    pub async fn create(&self, username: &str, password: &str, role: Role) -> CoreResult<i32> {
        let hash = self.hash_password_blocking(password).await?;
        let now = now_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(hash),
            role: Set(role.as_str().to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = Users::insert(active).exec(&self.conn).await;
        match result {
            Ok(res) => {
                info!("Created user '{}' with role {}", username, role.as_str());
                Ok(res.last_insert_id)
            }
            Err(err) => match err.sql_err() {
                Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
                    Err(CoreError::DuplicateUsername(username.to_string()))
                }
                _ => Err(err.into()),
            },
        }
    }

    pub async fn get_by_id(&self, id: i32) -> CoreResult<Option<User>> {
        let user = Users::find_by_id(id).one(&self.conn).await?;
        user.map(User::try_from).transpose()
    }

    pub async fn get_by_username(&self, username: &str) -> CoreResult<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await?;
        user.map(User::try_from).transpose()
    }

    pub async fn list(&self) -> CoreResult<Vec<User>> {
        let rows = Users::find().all(&self.conn).await?;
        rows.into_iter().map(User::try_from).collect()
    }

    /// Verify credentials; `None` on unknown user or wrong password,
    /// without distinguishing the two.
    ///
    /// Legacy rows holding a bare SHA-256 hex digest are accepted once
    /// and transparently re-hashed to Argon2id when migration is
    /// enabled in the security config.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> CoreResult<Option<User>> {
        let Some(model) = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await?
        else {
            return Ok(None);
        };

        let stored_hash = model.password_hash.clone();

        if is_legacy_sha256(&stored_hash) {
            if sha256_hex(password) != stored_hash {
                return Ok(None);
            }
            if self.security.auto_migrate_password_hashes {
                let new_hash = self.hash_password_blocking(password).await?;
                let mut active: users::ActiveModel = model.clone().into();
                active.password_hash = Set(new_hash);
                active.updated_at = Set(now_rfc3339());
                active.update(&self.conn).await?;
                info!("Migrated legacy password hash for user '{}'", username);
            }
            return User::try_from(model).map(Some);
        }

        let password = password.to_string();
        let is_valid = task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&stored_hash)
                .map_err(|e| CoreError::Store(format!("invalid password hash format: {e}")))?;
            Ok::<bool, CoreError>(
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok(),
            )
        })
        .await
        .map_err(|e| CoreError::Store(format!("password verification task panicked: {e}")))??;

        if is_valid {
            User::try_from(model).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Re-verifies the old password before overwriting; `Unauthorized`
    /// on mismatch.
    pub async fn change_password(
        &self,
        user_id: i32,
        old_password: &str,
        new_password: &str,
    ) -> CoreResult<()> {
        let model = Users::find_by_id(user_id)
            .one(&self.conn)
            .await?
            .ok_or(CoreError::NotFound("user"))?;

        let verified = self
            .verify_credentials(&model.username, old_password)
            .await?;
        if verified.is_none() {
            return Err(CoreError::Unauthorized);
        }

        let new_hash = self.hash_password_blocking(new_password).await?;

        let mut active: users::ActiveModel = model.into();
        active.password_hash = Set(new_hash);
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;

        info!("Password changed for user id {}", user_id);
        Ok(())
    }

    /// Delete a user and all of their sessions in one transaction.
    /// Returns the number of deleted user rows (always 1 on success).
    pub async fn delete(&self, user_id: i32) -> CoreResult<u64> {
        let txn = self.conn.begin().await?;

        sessions::Entity::delete_many()
            .filter(sessions::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let result = Users::delete_by_id(user_id).exec(&txn).await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(CoreError::NotFound("user"));
        }

        txn.commit().await?;
        info!("Deleted user id {} (sessions cascaded)", user_id);
        Ok(result.rows_affected)
    }

    /// Bootstrap: create `admin`/`admin` iff the users table is empty.
    pub async fn ensure_default_admin(&self) -> CoreResult<()> {
        let count = Users::find().count(&self.conn).await?;
        if count > 0 {
            return Ok(());
        }

        self.create("admin", "admin", Role::Admin).await?;
        warn!("No users found; created default 'admin' user. Change its password immediately.");
        Ok(())
    }

    async fn hash_password_blocking(&self, password: &str) -> CoreResult<String> {
        let password = password.to_string();
        let security = self.security.clone();
        task::spawn_blocking(move || hash_password(&password, &security))
            .await
            .map_err(|e| CoreError::Store(format!("password hashing task panicked: {e}")))?
    }
}

/// Hash a password with Argon2id using the configured work factors.
pub fn hash_password(password: &str, security: &SecurityConfig) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        security.argon2_memory_cost_kib,
        security.argon2_time_cost,
        security.argon2_parallelism,
        None,
    )
    .map_err(|e| CoreError::Store(format!("invalid argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CoreError::Store(format!("failed to hash password: {e}")))?;

    Ok(hash.to_string())
}

/// Legacy scheme detection: an unsalted SHA-256 digest stored as 64
/// lowercase hex chars. Real argon2 hashes carry a PHC `$` prefix.
fn is_legacy_sha256(stored: &str) -> bool {
    stored.len() == 64 && stored.chars().all(|c| c.is_ascii_hexdigit())
}

fn sha256_hex(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_hash_detection() {
        let sha = sha256_hex("password");
        assert_eq!(sha.len(), 64);
        assert!(is_legacy_sha256(&sha));
        assert!(!is_legacy_sha256(
            "$argon2id$v=19$m=8192,t=3,p=1$abc$def"
        ));
        assert!(!is_legacy_sha256("short"));
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert_eq!(Role::parse("user").unwrap(), Role::User);
        assert!(Role::parse("root").is_err());
    }
}
