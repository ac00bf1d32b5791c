//! Read-only business reports. Rows are loaded with sea-orm and aggregated in memory so the
//! same code runs on SQLite and Postgres.

use crate::{
    db::DbPool,
    entities::{
        batch::{self, Entity as BatchEntity},
        customer::{self, Entity as CustomerEntity},
        invoice::{self, Entity as InvoiceEntity, InvoiceStatus},
        order::{self, Entity as OrderEntity, OrderStatus},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity, UnitOfMeasure},
    },
    errors::ServiceError,
    services::batches::BatchView,
};
use chrono::{DateTime, Datelike, Duration, Months, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Statuses counted as realized sales.
const SOLD_STATUSES: [OrderStatus; 3] = [OrderStatus::Paid, OrderStatus::Invoiced, OrderStatus::Shipped];
const EXPIRATION_RISK_DAYS: i64 = 90;
const TOP_CUSTOMER_LIMIT: usize = 10;

pub const REPORT_NAMES: &[&str] = &[
    "sales",
    "revenue",
    "top-customers",
    "inventory-turnover",
    "margins",
    "expiration-risk",
    "hazmat-sales",
    "outstanding-receivables",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RevenuePeriod {
    #[default]
    Monthly,
    Quarterly,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlySales {
    pub year: i32,
    pub month: u32,
    pub revenue: Decimal,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RevenueBucket {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<u32>,
    pub total_revenue: Decimal,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TopCustomer {
    pub customer_id: Uuid,
    pub company_name: String,
    pub total_spend: Decimal,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductStock {
    pub id: Uuid,
    pub name: String,
    pub inventory_level: i32,
    pub reorder_threshold: i32,
    pub unit_of_measure: UnitOfMeasure,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductMargin {
    pub product_id: Uuid,
    pub name: String,
    pub total_revenue: Decimal,
    pub total_qty: i64,
    pub unit_price: Decimal,
    pub avg_sell_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HazmatSales {
    pub product_id: Uuid,
    pub name: String,
    pub hazard_class: Option<String>,
    pub total_revenue: Decimal,
    pub total_qty: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Receivable {
    #[serde(flatten)]
    pub invoice: invoice::Model,
    pub company_name: Option<String>,
    pub contact_email: Option<String>,
}

/// Groups orders by calendar month of creation.
pub fn monthly_sales(orders: &[order::Model]) -> Vec<MonthlySales> {
    let mut buckets: BTreeMap<(i32, u32), (Decimal, u64)> = BTreeMap::new();
    for o in orders {
        let entry = buckets
            .entry((o.created_at.year(), o.created_at.month()))
            .or_insert((Decimal::ZERO, 0));
        entry.0 = entry.0.saturating_add(o.total_amount);
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|((year, month), (revenue, orders))| MonthlySales {
            year,
            month,
            revenue,
            orders,
        })
        .collect()
}

fn quarter_of(month: u32) -> u32 {
    (month + 2) / 3
}

/// Groups paid invoices by month or quarter of creation.
pub fn revenue_by_period(invoices: &[invoice::Model], period: RevenuePeriod) -> Vec<RevenueBucket> {
    let mut buckets: BTreeMap<(i32, u32), (Decimal, u64)> = BTreeMap::new();
    for inv in invoices {
        let month = inv.created_at.month();
        let slot = match period {
            RevenuePeriod::Monthly => month,
            RevenuePeriod::Quarterly => quarter_of(month),
        };
        let entry = buckets
            .entry((inv.created_at.year(), slot))
            .or_insert((Decimal::ZERO, 0));
        entry.0 = entry.0.saturating_add(inv.total_amount);
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|((year, slot), (total_revenue, count))| RevenueBucket {
            year,
            month: (period == RevenuePeriod::Monthly).then_some(slot),
            quarter: (period == RevenuePeriod::Quarterly).then_some(slot),
            total_revenue,
            count,
        })
        .collect()
}

/// Sums line revenue and quantity per product.
fn line_totals(items: &[order_item::Model]) -> HashMap<Uuid, (Decimal, i64)> {
    let mut totals: HashMap<Uuid, (Decimal, i64)> = HashMap::new();
    for item in items {
        let entry = totals.entry(item.product_id).or_insert((Decimal::ZERO, 0));
        entry.0 = entry.0.saturating_add(item.total);
        entry.1 += i64::from(item.quantity);
    }
    totals
}

pub fn product_margins(
    items: &[order_item::Model],
    products: &HashMap<Uuid, product::Model>,
) -> Vec<ProductMargin> {
    let mut margins: Vec<ProductMargin> = line_totals(items)
        .into_iter()
        .filter_map(|(product_id, (revenue, qty))| {
            let product = products.get(&product_id)?;
            let avg_sell_price = if qty > 0 {
                (revenue / Decimal::from(qty)).round_dp(4)
            } else {
                Decimal::ZERO
            };
            Some(ProductMargin {
                product_id,
                name: product.name.clone(),
                total_revenue: revenue,
                total_qty: qty,
                unit_price: product.price,
                avg_sell_price,
            })
        })
        .collect();
    margins.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));
    margins
}

#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn sold_orders(
        &self,
        statuses: &[OrderStatus],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let mut query = OrderEntity::find().filter(order::Column::Status.is_in(statuses.to_vec()));
        if let Some(since) = since {
            query = query.filter(order::Column::CreatedAt.gte(since));
        }
        Ok(query.all(&*self.db_pool).await?)
    }

    async fn non_cancelled_items(&self) -> Result<Vec<order_item::Model>, ServiceError> {
        let items = OrderItemEntity::find()
            .find_also_related(OrderEntity)
            .all(&*self.db_pool)
            .await?;
        Ok(items
            .into_iter()
            .filter(|(_, o)| o.as_ref().is_some_and(|o| o.status != OrderStatus::Cancelled))
            .map(|(item, _)| item)
            .collect())
    }

    async fn products_by_id(&self) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
        Ok(ProductEntity::find()
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }

    /// Monthly revenue and order count over the last `months` months.
    #[instrument(skip(self))]
    pub async fn sales(&self, months: u32) -> Result<Vec<MonthlySales>, ServiceError> {
        let since = Utc::now()
            .checked_sub_months(Months::new(months.clamp(1, 120)))
            .unwrap_or_else(Utc::now);
        let orders = self.sold_orders(&SOLD_STATUSES, Some(since)).await?;
        Ok(monthly_sales(&orders))
    }

    #[instrument(skip(self))]
    pub async fn revenue(&self, period: RevenuePeriod) -> Result<Vec<RevenueBucket>, ServiceError> {
        let invoices = InvoiceEntity::find()
            .filter(invoice::Column::Status.eq(InvoiceStatus::Paid))
            .all(&*self.db_pool)
            .await?;
        Ok(revenue_by_period(&invoices, period))
    }

    #[instrument(skip(self))]
    pub async fn top_customers(&self) -> Result<Vec<TopCustomer>, ServiceError> {
        let orders = self
            .sold_orders(&[OrderStatus::Paid, OrderStatus::Invoiced], None)
            .await?;
        let mut spend: HashMap<Uuid, (Decimal, u64)> = HashMap::new();
        for o in &orders {
            let entry = spend.entry(o.customer_id).or_insert((Decimal::ZERO, 0));
            entry.0 = entry.0.saturating_add(o.total_amount);
            entry.1 += 1;
        }

        let names: HashMap<Uuid, String> = CustomerEntity::find()
            .filter(customer::Column::Id.is_in(spend.keys().copied().collect::<Vec<_>>()))
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|c| (c.id, c.company_name))
            .collect();

        let mut ranked: Vec<TopCustomer> = spend
            .into_iter()
            .filter_map(|(customer_id, (total_spend, orders))| {
                Some(TopCustomer {
                    company_name: names.get(&customer_id)?.clone(),
                    customer_id,
                    total_spend,
                    orders,
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.total_spend.cmp(&a.total_spend));
        ranked.truncate(TOP_CUSTOMER_LIMIT);
        Ok(ranked)
    }

    #[instrument(skip(self))]
    pub async fn inventory_turnover(&self) -> Result<Vec<ProductStock>, ServiceError> {
        let products = ProductEntity::find()
            .filter(product::Column::IsArchived.eq(false))
            .order_by_asc(product::Column::InventoryLevel)
            .all(&*self.db_pool)
            .await?;
        Ok(products
            .into_iter()
            .map(|p| ProductStock {
                id: p.id,
                name: p.name,
                inventory_level: p.inventory_level,
                reorder_threshold: p.reorder_threshold,
                unit_of_measure: p.unit_of_measure,
                price: p.price,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn margins(&self) -> Result<Vec<ProductMargin>, ServiceError> {
        let items = self.non_cancelled_items().await?;
        let products = self.products_by_id().await?;
        Ok(product_margins(&items, &products))
    }

    #[instrument(skip(self))]
    pub async fn expiration_risk(&self) -> Result<Vec<BatchView>, ServiceError> {
        let now = Utc::now();
        let rows = BatchEntity::find()
            .find_also_related(ProductEntity)
            .filter(batch::Column::ExpirationDate.gte(now))
            .filter(batch::Column::ExpirationDate.lte(now + Duration::days(EXPIRATION_RISK_DAYS)))
            .order_by_asc(batch::Column::ExpirationDate)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(BatchView::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn hazmat_sales(&self) -> Result<Vec<HazmatSales>, ServiceError> {
        let items = self.non_cancelled_items().await?;
        let products = self.products_by_id().await?;
        let mut rows: Vec<HazmatSales> = line_totals(&items)
            .into_iter()
            .filter_map(|(product_id, (total_revenue, total_qty))| {
                let product = products.get(&product_id).filter(|p| p.is_hazardous)?;
                Some(HazmatSales {
                    product_id,
                    name: product.name.clone(),
                    hazard_class: product.hazard_classification.clone(),
                    total_revenue,
                    total_qty,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));
        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn outstanding_receivables(&self) -> Result<Vec<Receivable>, ServiceError> {
        let invoices = InvoiceEntity::find()
            .filter(invoice::Column::Status.is_in([InvoiceStatus::Issued, InvoiceStatus::Overdue]))
            .find_also_related(OrderEntity)
            .order_by_asc(invoice::Column::DueDate)
            .all(&*self.db_pool)
            .await?;
        let customer_ids: Vec<Uuid> = invoices
            .iter()
            .filter_map(|(_, o)| o.as_ref().map(|o| o.customer_id))
            .collect();
        let customers: HashMap<Uuid, customer::Model> = CustomerEntity::find()
            .filter(customer::Column::Id.is_in(customer_ids))
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        Ok(invoices
            .into_iter()
            .map(|(invoice, order)| {
                let customer = order.and_then(|o| customers.get(&o.customer_id));
                Receivable {
                    company_name: customer.map(|c| c.company_name.clone()),
                    contact_email: customer.and_then(|c| c.contact_email.clone()),
                    invoice,
                }
            })
            .collect())
    }
}
