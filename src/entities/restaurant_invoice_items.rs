use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 发票明细：每个订单一行，生成时快照金额与费率
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "restaurant_invoice_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub invoice_id: i32,
    pub order_id: i32,
    pub order_total: i64,
    pub commission_rate_bp: i32,
    pub commission_amount: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
