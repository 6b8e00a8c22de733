//! The inventory ledger: product rows plus their append-only quantity
//! history, mutated only through the transactional operations here.
//!
//! Invariant maintained by every write path: a product's `quantity`
//! column equals the `new_quantity` of its newest history row (or the
//! initial row written at creation). `update_quantity` re-checks the
//! chain before appending and aborts on any mismatch.

use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use tracing::info;

use crate::db::now_rfc3339;
use crate::entities::{prelude::*, products, quantity_history, users};
use crate::error::{CoreError, CoreResult};

/// Listing row: product plus the username of the last user to touch
/// its quantity, when known.
#[derive(Debug, Clone)]
pub struct ProductListing {
    pub product: products::Model,
    pub last_changed_by: Option<String>,
}

/// Read-only stock projection.
#[derive(Debug, Clone, FromQueryResult)]
pub struct StockRow {
    pub name: String,
    pub category: Option<String>,
    pub quantity: i64,
}

pub struct ProductRepository {
    conn: DatabaseConnection,
}

impl ProductRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a product and its initial history row {old: 0, new:
    /// quantity} in one transaction.
    pub async fn add(
        &self,
        name: &str,
        category: Option<&str>,
        quantity: i64,
        min_stock: i64,
        actor_user_id: Option<i32>,
    ) -> CoreResult<i32> {
        let now = now_rfc3339();
        let txn = self.conn.begin().await?;

        let active = products::ActiveModel {
            name: Set(name.to_string()),
            category: Set(category.map(ToString::to_string)),
            quantity: Set(quantity),
            min_stock: Set(min_stock),
            created_date: Set(now.clone()),
            ..Default::default()
        };

        let product_id = match Products::insert(active).exec(&txn).await {
            Ok(res) => res.last_insert_id,
            Err(err) => {
                return match err.sql_err() {
                    Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
                        Err(CoreError::DuplicateName(name.to_string()))
                    }
                    _ => Err(err.into()),
                };
            }
        };

        let history = quantity_history::ActiveModel {
            product_id: Set(product_id),
            old_quantity: Set(0),
            new_quantity: Set(quantity),
            change_date: Set(now),
            counterparty_name: Set(None),
            invoice_number: Set(None),
            user_id: Set(actor_user_id),
            ..Default::default()
        };
        QuantityHistory::insert(history).exec(&txn).await?;

        txn.commit().await?;

        info!("Added product '{}' (id {}, qty {})", name, product_id, quantity);
        Ok(product_id)
    }

    /// Set a product's quantity and append the matching history row.
    ///
    /// The product row is read under an exclusive row lock inside the
    /// transaction, so two concurrent updates serialize instead of both
    /// reading the same stale quantity.
    pub async fn update_quantity(
        &self,
        product_id: i32,
        new_quantity: i64,
        counterparty_name: Option<&str>,
        invoice_number: Option<&str>,
        actor_user_id: Option<i32>,
    ) -> CoreResult<()> {
        let txn = self.conn.begin().await?;

        let product = Products::find_by_id(product_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(CoreError::NotFound("product"))?;

        let latest = QuantityHistory::find()
            .filter(quantity_history::Column::ProductId.eq(product_id))
            .order_by_desc(quantity_history::Column::ChangeDate)
            .order_by_desc(quantity_history::Column::Id)
            .one(&txn)
            .await?;

        if let Some(ref entry) = latest
            && entry.new_quantity != product.quantity
        {
            txn.rollback().await?;
            return Err(CoreError::Store(format!(
                "quantity history out of sync for product {product_id}: \
                 latest entry says {} but product row says {}",
                entry.new_quantity, product.quantity
            )));
        }

        let old_quantity = product.quantity;
        let now = now_rfc3339();

        let mut active: products::ActiveModel = product.into();
        active.quantity = Set(new_quantity);
        active.update(&txn).await?;

        let history = quantity_history::ActiveModel {
            product_id: Set(product_id),
            old_quantity: Set(old_quantity),
            new_quantity: Set(new_quantity),
            change_date: Set(now),
            counterparty_name: Set(counterparty_name.map(ToString::to_string)),
            invoice_number: Set(invoice_number.map(ToString::to_string)),
            user_id: Set(actor_user_id),
            ..Default::default()
        };
        QuantityHistory::insert(history).exec(&txn).await?;

        txn.commit().await?;

        info!(
            "Updated product {} quantity: {} -> {}",
            product_id, old_quantity, new_quantity
        );
        Ok(())
    }

    /// Delete a product and its history. Returns the number of deleted
    /// product rows; 0 when the product does not exist (not an error).
    pub async fn delete(&self, product_id: i32) -> CoreResult<u64> {
        let txn = self.conn.begin().await?;

        quantity_history::Entity::delete_many()
            .filter(quantity_history::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        let result = Products::delete_by_id(product_id).exec(&txn).await?;

        txn.commit().await?;

        if result.rows_affected > 0 {
            info!("Deleted product {} and its history", product_id);
        }
        Ok(result.rows_affected)
    }

    pub async fn get(&self, product_id: i32) -> CoreResult<Option<products::Model>> {
        Ok(Products::find_by_id(product_id).one(&self.conn).await?)
    }

    /// Like [`Self::get`], but carries the last-modifying user's name
    /// the same way [`Self::list`] does.
    pub async fn get_listing(&self, product_id: i32) -> CoreResult<Option<ProductListing>> {
        let Some(product) = Products::find_by_id(product_id).one(&self.conn).await? else {
            return Ok(None);
        };

        let last_actors = self
            .last_actor_usernames(std::slice::from_ref(&product))
            .await?;
        let last_changed_by = last_actors.get(&product.id).cloned();

        Ok(Some(ProductListing {
            product,
            last_changed_by,
        }))
    }

    /// History for one product, newest first, optionally bounded by an
    /// inclusive rfc3339 date range.
    pub async fn history(
        &self,
        product_id: i32,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> CoreResult<Vec<quantity_history::Model>> {
        let mut query = QuantityHistory::find()
            .filter(quantity_history::Column::ProductId.eq(product_id))
            .order_by_desc(quantity_history::Column::ChangeDate)
            .order_by_desc(quantity_history::Column::Id);

        if let Some(start) = start_date {
            query = query.filter(quantity_history::Column::ChangeDate.gte(start));
        }
        if let Some(end) = end_date {
            query = query.filter(quantity_history::Column::ChangeDate.lte(end));
        }

        Ok(query.all(&self.conn).await?)
    }

    /// All products, or those whose name OR category contains the
    /// search term (case-insensitive). Order is whatever the engine
    /// returns; callers must sort if they care.
    pub async fn list(&self, search_term: Option<&str>) -> CoreResult<Vec<ProductListing>> {
        let mut query = Products::find();

        if let Some(term) = search_term {
            let pattern = format!("%{}%", term.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(products::Column::Name)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(products::Column::Category)))
                            .like(pattern),
                    ),
            );
        }

        let rows = query.all(&self.conn).await?;
        let last_actors = self.last_actor_usernames(&rows).await?;

        Ok(rows
            .into_iter()
            .map(|product| {
                let last_changed_by = last_actors.get(&product.id).cloned();
                ProductListing {
                    product,
                    last_changed_by,
                }
            })
            .collect())
    }

    /// (name, category, quantity) projection over the whole catalog.
    pub async fn stock(&self) -> CoreResult<Vec<StockRow>> {
        Ok(Products::find()
            .select_only()
            .column(products::Column::Name)
            .column(products::Column::Category)
            .column(products::Column::Quantity)
            .into_model::<StockRow>()
            .all(&self.conn)
            .await?)
    }

    /// Map product id -> username of the newest history entry's actor.
    async fn last_actor_usernames(
        &self,
        rows: &[products::Model],
    ) -> CoreResult<HashMap<i32, String>> {
        if rows.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<i32> = rows.iter().map(|p| p.id).collect();
        let entries = QuantityHistory::find()
            .filter(quantity_history::Column::ProductId.is_in(ids))
            .order_by_asc(quantity_history::Column::ChangeDate)
            .order_by_asc(quantity_history::Column::Id)
            .all(&self.conn)
            .await?;

        // Ascending order, so later entries overwrite earlier ones.
        let mut last_user: HashMap<i32, i32> = HashMap::new();
        for entry in entries {
            if let Some(user_id) = entry.user_id {
                last_user.insert(entry.product_id, user_id);
            }
        }

        if last_user.is_empty() {
            return Ok(HashMap::new());
        }

        let user_ids: Vec<i32> = last_user.values().copied().collect();
        let user_rows = Users::find()
            .filter(users::Column::Id.is_in(user_ids))
            .all(&self.conn)
            .await?;
        let usernames: HashMap<i32, String> =
            user_rows.into_iter().map(|u| (u.id, u.username)).collect();

        Ok(last_user
            .into_iter()
            .filter_map(|(product_id, user_id)| {
                usernames
                    .get(&user_id)
                    .map(|name| (product_id, name.clone()))
            })
            .collect())
    }
}
