use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    pub category: Option<String>,

    /// Mirrors the newest quantity_history row's new_quantity. Only the
    /// ledger operations in the product repository may write this.
    pub quantity: i64,

    pub min_stock: i64,

    pub created_date: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::quantity_history::Entity")]
    QuantityHistory,
}

impl Related<super::quantity_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QuantityHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
