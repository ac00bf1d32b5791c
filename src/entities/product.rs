use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Unit a product is sold and stocked in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum UnitOfMeasure {
    #[default]
    #[sea_orm(string_value = "kg")]
    #[serde(rename = "kg")]
    #[strum(serialize = "kg")]
    Kg,
    #[sea_orm(string_value = "L")]
    #[serde(rename = "L")]
    #[strum(serialize = "L")]
    Litre,
    #[sea_orm(string_value = "drum")]
    #[serde(rename = "drum")]
    #[strum(serialize = "drum")]
    Drum,
    #[sea_orm(string_value = "pallet")]
    #[serde(rename = "pallet")]
    #[strum(serialize = "pallet")]
    Pallet,
    #[sea_orm(string_value = "ton")]
    #[serde(rename = "ton")]
    #[strum(serialize = "ton")]
    Ton,
    #[sea_orm(string_value = "g")]
    #[serde(rename = "g")]
    #[strum(serialize = "g")]
    Gram,
    #[sea_orm(string_value = "mL")]
    #[serde(rename = "mL")]
    #[strum(serialize = "mL")]
    Millilitre,
    #[sea_orm(string_value = "unit")]
    #[serde(rename = "unit")]
    #[strum(serialize = "unit")]
    Unit,
}

/// Catalog product with hazard metadata and on-hand inventory.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "products")]
#[schema(as = Product)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub cas_number: Option<String>,
    pub un_number: Option<String>,
    pub hazard_classification: Option<String>,
    pub storage_requirements: Option<String>,
    pub sds_document_url: Option<String>,
    pub unit_of_measure: UnitOfMeasure,
    pub inventory_level: i32,
    pub reorder_threshold: i32,
    pub price: Decimal,
    pub currency: String,
    pub is_hazardous: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn is_low_stock(&self) -> bool {
        !self.is_archived && self.inventory_level <= self.reorder_threshold
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::batch::Entity")]
    Batches,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batches.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        self.updated_at = Set(Utc::now());
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn unit_of_measure_round_trips_through_its_label() {
        for label in ["kg", "L", "drum", "pallet", "ton", "g", "mL", "unit"] {
            let unit = UnitOfMeasure::from_str(label).unwrap();
            assert_eq!(unit.to_string(), label);
        }
        assert!(UnitOfMeasure::from_str("gallon").is_err());
    }
}
