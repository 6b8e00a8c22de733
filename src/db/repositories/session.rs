use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::{debug, info};

use crate::db::now_rfc3339;
use crate::entities::{prelude::*, sessions};
use crate::error::{CoreError, CoreResult};

use super::user::{Role, User};

/// Fixed session lifetime. Sessions are never renewed; a new login
/// issues a new token.
pub const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: i32,
    pub expires_at: String,
}

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Issue a new session for a user. The token is 256 bits from the
    /// OS random source, hex-encoded.
    pub async fn create(&self, user_id: i32) -> CoreResult<Session> {
        let token = generate_token();
        let now = Utc::now();
        let expires = now + Duration::hours(SESSION_TTL_HOURS);

        let active = sessions::ActiveModel {
            token: Set(token.clone()),
            user_id: Set(user_id),
            created_at: Set(now.to_rfc3339_opts(SecondsFormat::Micros, true)),
            expires_at: Set(expires.to_rfc3339_opts(SecondsFormat::Micros, true)),
        };

        Sessions::insert(active).exec(&self.conn).await?;

        debug!("Issued session for user id {}", user_id);
        Ok(Session {
            token,
            user_id,
            expires_at: expires.to_rfc3339_opts(SecondsFormat::Micros, true),
        })
    }

    /// Resolve a token to its user. Returns `None` for unknown tokens
    /// and for sessions whose `expires_at <= now`. A single `now` is
    /// captured up front so a concurrent purge cannot flip the answer
    /// mid-call.
    pub async fn verify(&self, token: &str) -> CoreResult<Option<User>> {
        let now = Utc::now();

        let Some((session, user)) = Sessions::find_by_id(token)
            .find_also_related(Users)
            .one(&self.conn)
            .await?
        else {
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&session.expires_at)
            .map_err(|e| CoreError::Store(format!("unparseable session expiry: {e}")))?;
        if expires_at.with_timezone(&Utc) <= now {
            return Ok(None);
        }

        let user = user.ok_or_else(|| {
            CoreError::Store(format!("session {} has no backing user row", session.token))
        })?;

        Ok(Some(User {
            id: user.id,
            username: user.username,
            role: Role::parse(&user.role)?,
            created_at: user.created_at,
        }))
    }

    /// Idempotent: deleting an absent token is not an error.
    pub async fn delete(&self, token: &str) -> CoreResult<()> {
        Sessions::delete_by_id(token).exec(&self.conn).await?;
        Ok(())
    }

    /// Delete every session with `expires_at < now`; returns the count.
    pub async fn purge_expired(&self) -> CoreResult<u64> {
        let now = now_rfc3339();

        let result = Sessions::delete_many()
            .filter(sessions::Column::ExpiresAt.lt(&now))
            .exec(&self.conn)
            .await?;

        if result.rows_affected > 0 {
            info!("Purged {} expired sessions", result.rows_affected);
        }
        Ok(result.rows_affected)
    }
}

/// 64-char hex token from 32 random bytes.
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
