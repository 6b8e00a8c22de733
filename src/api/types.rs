use serde::{Deserialize, Serialize};

use crate::db::{ProductListing, StockRow, User};
use crate::entities::{products, quantity_history};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDto {
    pub id: i32,
    pub name: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub min_stock: i64,
    pub created_date: String,
    /// Display-only flag: quantity <= min_stock.
    pub low_stock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_changed_by: Option<String>,
}

impl ProductDto {
    #[must_use]
    pub fn from_model(model: products::Model, last_changed_by: Option<String>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            category: model.category,
            quantity: model.quantity,
            min_stock: model.min_stock,
            low_stock: model.quantity <= model.min_stock,
            created_date: model.created_date,
            last_changed_by,
        }
    }
}

impl From<ProductListing> for ProductDto {
    fn from(listing: ProductListing) -> Self {
        Self::from_model(listing.product, listing.last_changed_by)
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryEntryDto {
    pub id: i32,
    pub old_quantity: i64,
    pub new_quantity: i64,
    pub change_date: String,
    pub counterparty_name: Option<String>,
    pub invoice_number: Option<String>,
    pub user_id: Option<i32>,
}

impl From<quantity_history::Model> for HistoryEntryDto {
    fn from(model: quantity_history::Model) -> Self {
        Self {
            id: model.id,
            old_quantity: model.old_quantity,
            new_quantity: model.new_quantity,
            change_date: model.change_date,
            counterparty_name: model.counterparty_name,
            invoice_number: model.invoice_number,
            user_id: model.user_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockRowDto {
    pub name: String,
    pub category: Option<String>,
    pub quantity: i64,
}

impl From<StockRow> for StockRowDto {
    fn from(row: StockRow) -> Self {
        Self {
            name: row.name,
            category: row.category,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role.as_str().to_string(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddProductRequest {
    pub name: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub min_stock: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub new_quantity: i64,
    pub counterparty_name: Option<String>,
    pub invoice_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedDto {
    pub deleted: u64,
}
