use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum RestaurantInvoices {
    Table,
    Id,
    RestaurantId,
    PeriodStart,
    PeriodEnd,
    Status,
    SubtotalSales,
    CommissionRateBp,
    CommissionTotal,
    OrdersCount,
    SentAt,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RestaurantInvoiceItems {
    Table,
    Id,
    InvoiceId,
    OrderId,
    OrderTotal,
    CommissionRateBp,
    CommissionAmount,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RestaurantInvoices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RestaurantInvoices::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::RestaurantId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::PeriodStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::PeriodEnd)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::Status)
                            .string_len(16)
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::SubtotalSales)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::CommissionRateBp)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::CommissionTotal)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::OrdersCount)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::SentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_restaurant_invoices_restaurant_period")
                    .table(RestaurantInvoices::Table)
                    .col(RestaurantInvoices::RestaurantId)
                    .col(RestaurantInvoices::PeriodStart)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RestaurantInvoiceItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RestaurantInvoiceItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoiceItems::InvoiceId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoiceItems::OrderId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoiceItems::OrderTotal)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoiceItems::CommissionRateBp)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantInvoiceItems::CommissionAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 一个订单最多属于一张发票
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_restaurant_invoice_items_order_unique")
                    .table(RestaurantInvoiceItems::Table)
                    .col(RestaurantInvoiceItems::OrderId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_restaurant_invoice_items_invoice_id")
                    .table(RestaurantInvoiceItems::Table)
                    .col(RestaurantInvoiceItems::InvoiceId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RestaurantInvoiceItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RestaurantInvoices::Table).to_owned())
            .await
    }
}
