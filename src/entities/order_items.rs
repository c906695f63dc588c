use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 订单明细：随订单一起创建，之后不可变
/// - price / original_price: 下单时的单价快照(分)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub meal_id: i32,
    pub quantity: i32,
    pub price: i64,
    pub original_price: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
