pub use super::products::Entity as Products;
pub use super::quantity_history::Entity as QuantityHistory;
pub use super::sessions::Entity as Sessions;
pub use super::users::Entity as Users;
