use chrono::{SecondsFormat, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::error::CoreResult;

pub mod migrator;
pub mod repositories;

pub use repositories::product::{ProductListing, StockRow};
pub use repositories::session::{SESSION_TTL_HOURS, Session};
pub use repositories::user::{Role, User};

use crate::entities::{products, quantity_history};

/// One timestamp format everywhere: rfc3339 UTC with fixed-width
/// microseconds, so lexicographic order on stored strings matches
/// chronological order.
#[must_use]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    security: SecurityConfig,
}

impl Store {
    pub async fn new(db_url: &str, security: SecurityConfig) -> CoreResult<Self> {
        Self::with_pool_options(db_url, security, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        security: SecurityConfig,
        max_connections: u32,
        min_connections: u32,
    ) -> CoreResult<Self> {
        use sea_orm_migration::MigratorTrait;

        if let Some(path_str) = db_url.strip_prefix("sqlite:")
            && path_str != ":memory:"
            && !path_str.starts_with(':')
        {
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                tokio::fs::File::create(path_str)
                    .await
                    .map_err(|e| crate::error::CoreError::Store(e.to_string()))?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn, security })
    }

    pub async fn ping(&self) -> CoreResult<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn product_repo(&self) -> repositories::product::ProductRepository {
        repositories::product::ProductRepository::new(self.conn.clone())
    }

    fn session_repo(&self) -> repositories::session::SessionRepository {
        repositories::session::SessionRepository::new(self.conn.clone())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone(), self.security.clone())
    }

    // ========== Ledger ==========

    pub async fn add_product(
        &self,
        name: &str,
        category: Option<&str>,
        quantity: i64,
        min_stock: i64,
        actor_user_id: Option<i32>,
    ) -> CoreResult<i32> {
        self.product_repo()
            .add(name, category, quantity, min_stock, actor_user_id)
            .await
    }

    pub async fn update_quantity(
        &self,
        product_id: i32,
        new_quantity: i64,
        counterparty_name: Option<&str>,
        invoice_number: Option<&str>,
        actor_user_id: Option<i32>,
    ) -> CoreResult<()> {
        self.product_repo()
            .update_quantity(
                product_id,
                new_quantity,
                counterparty_name,
                invoice_number,
                actor_user_id,
            )
            .await
    }

    pub async fn delete_product(&self, product_id: i32) -> CoreResult<u64> {
        self.product_repo().delete(product_id).await
    }

    pub async fn get_product(&self, product_id: i32) -> CoreResult<Option<products::Model>> {
        self.product_repo().get(product_id).await
    }

    pub async fn get_product_listing(
        &self,
        product_id: i32,
    ) -> CoreResult<Option<ProductListing>> {
        self.product_repo().get_listing(product_id).await
    }

    pub async fn get_history(
        &self,
        product_id: i32,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> CoreResult<Vec<quantity_history::Model>> {
        self.product_repo()
            .history(product_id, start_date, end_date)
            .await
    }

    pub async fn list_products(
        &self,
        search_term: Option<&str>,
    ) -> CoreResult<Vec<ProductListing>> {
        self.product_repo().list(search_term).await
    }

    pub async fn list_stock(&self) -> CoreResult<Vec<StockRow>> {
        self.product_repo().stock().await
    }

    // ========== Sessions ==========

    pub async fn create_session(&self, user_id: i32) -> CoreResult<Session> {
        self.session_repo().create(user_id).await
    }

    pub async fn verify_session(&self, token: &str) -> CoreResult<Option<User>> {
        self.session_repo().verify(token).await
    }

    pub async fn delete_session(&self, token: &str) -> CoreResult<()> {
        self.session_repo().delete(token).await
    }

    pub async fn purge_expired_sessions(&self) -> CoreResult<u64> {
        self.session_repo().purge_expired().await
    }

    // ========== Users ==========

    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> CoreResult<i32> {
        self.user_repo().create(username, password, role).await
    }

    pub async fn get_user(&self, user_id: i32) -> CoreResult<Option<User>> {
        self.user_repo().get_by_id(user_id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> CoreResult<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn list_users(&self) -> CoreResult<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> CoreResult<Option<User>> {
        self.user_repo().verify_credentials(username, password).await
    }

    pub async fn change_password(
        &self,
        user_id: i32,
        old_password: &str,
        new_password: &str,
    ) -> CoreResult<()> {
        self.user_repo()
            .change_password(user_id, old_password, new_password)
            .await
    }

    pub async fn delete_user(&self, user_id: i32) -> CoreResult<u64> {
        self.user_repo().delete(user_id).await
    }

    pub async fn ensure_default_admin(&self) -> CoreResult<()> {
        self.user_repo().ensure_default_admin().await
    }
}
