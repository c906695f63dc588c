use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Restaurants {
    Table,
    Id,
    Name,
    CommissionRateBp,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Meals {
    Table,
    Id,
    RestaurantId,
    Name,
    Price,
    OriginalPrice,
    QuantityAvailable,
    AvailableUntil,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    RestaurantId,
    CustomerId,
    CustomerPhone,
    Status,
    TotalAmount,
    PaymentMethod,
    PickupWindowStart,
    PickupWindowEnd,
    PickupCodeEncrypted,
    PickupCodeAttempts,
    PickupCodeLastSentAt,
    AcceptedAt,
    ReadyAt,
    CompletedAt,
    CancelledAt,
    ExpiredAt,
    InvoicedAt,
    RestockedAt,
    CancelledBy,
    CancelReason,
    CommissionRateBp,
    CommissionAmount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    Id,
    OrderId,
    MealId,
    Quantity,
    Price,
    OriginalPrice,
}

#[derive(DeriveIden)]
enum OrderEvents {
    Table,
    Id,
    OrderId,
    EventType,
    Meta,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 订单核心表：餐厅、餐品、订单、订单明细、订单事件
///
/// 金额统一使用分 (cents)，佣金费率使用 basis points (700 = 7.00%)
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Restaurants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Restaurants::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Restaurants::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Restaurants::CommissionRateBp)
                            .integer()
                            .null(), // NULL = 使用全局默认费率
                    )
                    .col(
                        ColumnDef::new(Restaurants::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Restaurants::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Meals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Meals::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Meals::RestaurantId).integer().not_null())
                    .col(ColumnDef::new(Meals::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Meals::Price).big_integer().not_null())
                    .col(ColumnDef::new(Meals::OriginalPrice).big_integer().not_null())
                    .col(
                        ColumnDef::new(Meals::QuantityAvailable)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Meals::AvailableUntil)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Meals::CreatedAt)
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
                    .name("idx_meals_restaurant_id")
                    .table(Meals::Table)
                    .col(Meals::RestaurantId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::RestaurantId).integer().not_null())
                    .col(ColumnDef::new(Orders::CustomerId).integer().not_null())
                    .col(ColumnDef::new(Orders::CustomerPhone).string_len(32).null())
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Orders::TotalAmount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Orders::PaymentMethod)
                            .string_len(32)
                            .not_null()
                            .default("cash_on_pickup"),
                    )
                    .col(
                        ColumnDef::new(Orders::PickupWindowStart)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Orders::PickupWindowEnd)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Orders::PickupCodeEncrypted).text().null())
                    .col(
                        ColumnDef::new(Orders::PickupCodeAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Orders::PickupCodeLastSentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Orders::AcceptedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::ReadyAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::CompletedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::CancelledAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::ExpiredAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::InvoicedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::RestockedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Orders::CancelledBy).string_len(32).null())
                    .col(ColumnDef::new(Orders::CancelReason).text().null())
                    .col(ColumnDef::new(Orders::CommissionRateBp).integer().null())
                    .col(ColumnDef::new(Orders::CommissionAmount).big_integer().null())
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Orders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 过期扫描 / 自动取消 按 (status, 时间) 选取
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_status_window_end")
                    .table(Orders::Table)
                    .col(Orders::Status)
                    .col(Orders::PickupWindowEnd)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_status_created_at")
                    .table(Orders::Table)
                    .col(Orders::Status)
                    .col(Orders::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // 开票：按餐厅选取未开票的已完成订单
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_restaurant_invoicing")
                    .table(Orders::Table)
                    .col(Orders::RestaurantId)
                    .col(Orders::Status)
                    .col(Orders::InvoicedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderItems::OrderId).integer().not_null())
                    .col(ColumnDef::new(OrderItems::MealId).integer().not_null())
                    .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                    .col(ColumnDef::new(OrderItems::Price).big_integer().not_null())
                    .col(
                        ColumnDef::new(OrderItems::OriginalPrice)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_order_items_order_id")
                    .table(OrderItems::Table)
                    .col(OrderItems::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderEvents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderEvents::OrderId).integer().not_null())
                    .col(ColumnDef::new(OrderEvents::EventType).string_len(32).not_null())
                    .col(ColumnDef::new(OrderEvents::Meta).json().not_null())
                    .col(
                        ColumnDef::new(OrderEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 取码查询依赖 (order_id, event_type, created_at)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_order_events_lookup")
                    .table(OrderEvents::Table)
                    .col(OrderEvents::OrderId)
                    .col(OrderEvents::EventType)
                    .col(OrderEvents::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Meals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Restaurants::Table).to_owned())
            .await
    }
}
