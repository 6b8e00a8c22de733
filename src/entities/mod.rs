pub mod prelude;

pub mod products;
pub mod quantity_history;
pub mod sessions;
pub mod users;
