use crate::entities::prelude::*;
use crate::entities::{quantity_history, sessions};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        // Dependency order: quantity_history references both products
        // and users, sessions references users. Postgres rejects a
        // REFERENCES clause against a table that does not exist yet.
        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Sessions)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Products)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(QuantityHistory)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // History is always read per-product ordered by change date.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_quantity_history_product_date")
                    .table(QuantityHistory)
                    .col(quantity_history::Column::ProductId)
                    .col(quantity_history::Column::ChangeDate)
                    .to_owned(),
            )
            .await?;

        // The janitor purges by expiry, logout deletes by token (pk).
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sessions_expires_at")
                    .table(Sessions)
                    .col(sessions::Column::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuantityHistory).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
