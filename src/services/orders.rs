use crate::{
    db::DbPool,
    documents,
    entities::{
        batch::{self, Entity as BatchEntity},
        customer::{self, ComplianceStatus, Entity as CustomerEntity},
        order::{self, Entity as OrderEntity, OrderStatus},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{alerts::AlertService, invoices, Page, PageRequest},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Targets reachable from `from`. Paid and Cancelled are terminal.
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    match from {
        OrderStatus::Pending => &[OrderStatus::Approved, OrderStatus::Cancelled],
        OrderStatus::Approved => &[OrderStatus::Shipped, OrderStatus::Cancelled],
        OrderStatus::Shipped => &[OrderStatus::Invoiced],
        OrderStatus::Invoiced => &[OrderStatus::Paid],
        OrderStatus::Paid | OrderStatus::Cancelled => &[],
    }
}

pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Order amounts derived from line totals and a percent tax rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

fn out_of_range() -> ServiceError {
    ServiceError::ValidationError("Order total out of range".to_string())
}

/// Price times quantity, rejecting amounts outside the decimal range.
pub fn line_total(unit_price: Decimal, quantity: i32) -> Result<Decimal, ServiceError> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(out_of_range)
}

pub fn compute_totals(
    line_totals: &[Decimal],
    tax_rate: Decimal,
) -> Result<OrderTotals, ServiceError> {
    let subtotal = line_totals
        .iter()
        .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(*line))
        .ok_or_else(out_of_range)?;
    let tax_amount = subtotal
        .checked_mul(tax_rate)
        .and_then(|taxed| taxed.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(out_of_range)?;
    let total_amount = subtotal.checked_add(tax_amount).ok_or_else(out_of_range)?;
    Ok(OrderTotals {
        subtotal,
        tax_amount,
        total_amount,
    })
}

fn validate_tax_rate(rate: &Decimal) -> Result<(), validator::ValidationError> {
    if rate.is_sign_negative() || *rate > Decimal::ONE_HUNDRED {
        return Err(validator::ValidationError::new("tax_rate_out_of_range"));
    }
    Ok(())
}

fn validate_unit_price(price: &Decimal) -> Result<(), validator::ValidationError> {
    if price.is_sign_negative() {
        return Err(validator::ValidationError::new("unit_price_negative"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub batch_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Falls back to the catalog price when omitted.
    #[validate(custom = "validate_unit_price")]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
    /// Percent; defaults to the configured rate.
    #[validate(custom = "validate_tax_rate")]
    pub tax_rate: Option<Decimal>,
    #[validate(length(equal = 3, message = "Currency must be 3 characters"))]
    pub currency: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Option<Vec<OrderItemRequest>>,
    #[validate(custom = "validate_tax_rate")]
    pub tax_rate: Option<Decimal>,
    #[validate(length(equal = 3, message = "Currency must be 3 characters"))]
    pub currency: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub company_name: String,
    pub compliance_status: ComplianceStatus,
}

/// Order with its lines and customer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub customer: Option<CustomerSummary>,
}

#[derive(Debug, Serialize)]
struct OrderCsvRow {
    order_id: Uuid,
    customer: Option<String>,
    status: OrderStatus,
    total_amount: Decimal,
    currency: String,
    created_at: DateTime<Utc>,
}

fn validate_items(items: &[OrderItemRequest]) -> Result<(), ServiceError> {
    for item in items {
        item.validate()?;
    }
    Ok(())
}

struct PricedLine {
    request: OrderItemRequest,
    unit_price: Decimal,
    total: Decimal,
}

/// Order capture and the status workflow that drives stock and invoicing.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    alerts: Arc<AlertService>,
    default_tax_rate: Decimal,
    invoice_due_days: i64,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        alerts: Arc<AlertService>,
        default_tax_rate: Decimal,
        invoice_due_days: i64,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            alerts,
            default_tax_rate,
            invoice_due_days,
        }
    }

    /// Resolves each line's price against the catalog and checks batch ownership.
    async fn price_lines<C: ConnectionTrait>(
        conn: &C,
        items: Vec<OrderItemRequest>,
    ) -> Result<Vec<PricedLine>, ServiceError> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = ProductEntity::find_by_id(item.product_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
            if let Some(batch_id) = item.batch_id {
                let batch = BatchEntity::find_by_id(batch_id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))?;
                if batch.product_id != product.id {
                    return Err(ServiceError::ValidationError(format!(
                        "Batch {} does not belong to product {}",
                        batch_id, product.id
                    )));
                }
            }
            let unit_price = item.unit_price.unwrap_or(product.price);
            let total = line_total(unit_price, item.quantity)?;
            lines.push(PricedLine {
                request: item,
                unit_price,
                total,
            });
        }
        Ok(lines)
    }

    async fn insert_lines(
        txn: &DatabaseTransaction,
        order_id: Uuid,
        lines: Vec<PricedLine>,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let mut items = Vec::with_capacity(lines.len());
        for (position, line) in lines.into_iter().enumerate() {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                position: Set(position as i32),
                product_id: Set(line.request.product_id),
                batch_id: Set(line.request.batch_id),
                quantity: Set(line.request.quantity),
                unit_price: Set(line.unit_price),
                total: Set(line.total),
            }
            .insert(txn)
            .await?;
            items.push(item);
        }
        Ok(items)
    }

    async fn items_for<C: ConnectionTrait>(
        conn: &C,
        order_ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, Vec<order_item::Model>>, ServiceError> {
        let mut grouped: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_item::Column::Position)
            .all(conn)
            .await?;
        for item in items {
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn customers_for(
        &self,
        customer_ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, CustomerSummary>, ServiceError> {
        Ok(CustomerEntity::find()
            .filter(customer::Column::Id.is_in(customer_ids))
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|c| {
                (
                    c.id,
                    CustomerSummary {
                        id: c.id,
                        company_name: c.company_name,
                        compliance_status: c.compliance_status,
                    },
                )
            })
            .collect())
    }

    async fn build_views(&self, orders: Vec<order::Model>) -> Result<Vec<OrderView>, ServiceError> {
        let mut items = Self::items_for(&*self.db_pool, orders.iter().map(|o| o.id).collect()).await?;
        let customers = self
            .customers_for(orders.iter().map(|o| o.customer_id).collect())
            .await?;
        Ok(orders
            .into_iter()
            .map(|order| OrderView {
                items: items.remove(&order.id).unwrap_or_default(),
                customer: customers.get(&order.customer_id).cloned(),
                order,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        paging: PageRequest,
    ) -> Result<Page<OrderView>, ServiceError> {
        let mut query = OrderEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, paging.limit);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(paging.index()).await?;
        let views = self.build_views(orders).await?;
        Ok(Page::new(views, total, paging.page, paging.limit))
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: Uuid) -> Result<OrderView, ServiceError> {
        let order = OrderEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        self.build_views(vec![order])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    /// Creates a Pending order for a compliance-verified customer.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        created_by: Option<Uuid>,
    ) -> Result<OrderView, ServiceError> {
        request.validate()?;
        validate_items(&request.items)?;

        let customer = CustomerEntity::find_by_id(request.customer_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Customer not found".to_string()))?;
        if customer.compliance_status != ComplianceStatus::Verified {
            warn!(customer_id = %customer.id, status = %customer.compliance_status, "Order rejected by compliance gate");
            return Err(ServiceError::ValidationError(
                "Customer compliance is not verified. Cannot create order.".to_string(),
            ));
        }

        let tax_rate = request.tax_rate.unwrap_or(self.default_tax_rate);
        let currency = request
            .currency
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| customer.currency.clone());

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let lines = Self::price_lines(&txn, request.items).await?;
        let line_totals: Vec<Decimal> = lines.iter().map(|l| l.total).collect();
        let totals = compute_totals(&line_totals, tax_rate)?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(customer.id),
            status: Set(OrderStatus::Pending),
            currency: Set(currency),
            subtotal: Set(totals.subtotal),
            tax_rate: Set(tax_rate),
            tax_amount: Set(totals.tax_amount),
            total_amount: Set(totals.total_amount),
            notes: Set(request.notes),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, %order_id, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;
        let items = Self::insert_lines(&txn, order_id, lines).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        counter!("chemops_orders.created", 1);
        info!(%order_id, total = %order.total_amount, "Order created");
        self.event_sender
            .emit(Event::OrderCreated {
                order_id,
                customer_id: order.customer_id,
                total_amount: order.total_amount,
            })
            .await;

        Ok(OrderView {
            order,
            items,
            customer: Some(CustomerSummary {
                id: customer.id,
                company_name: customer.company_name,
                compliance_status: customer.compliance_status,
            }),
        })
    }

    /// Edits a Pending order. Replacing items recomputes totals.
    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<OrderView, ServiceError> {
        request.validate()?;
        if let Some(items) = &request.items {
            validate_items(items)?;
        }

        let txn = self.db_pool.begin().await?;
        let existing = OrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        if existing.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidOperation(
                "Only pending orders can be edited".to_string(),
            ));
        }

        let tax_rate = request.tax_rate.unwrap_or(existing.tax_rate);
        let line_totals = match request.items {
            Some(items) => {
                let lines = Self::price_lines(&txn, items).await?;
                let totals: Vec<Decimal> = lines.iter().map(|l| l.total).collect();
                OrderItemEntity::delete_many()
                    .filter(order_item::Column::OrderId.eq(id))
                    .exec(&txn)
                    .await?;
                Self::insert_lines(&txn, id, lines).await?;
                totals
            }
            None => Self::items_for(&txn, vec![id])
                .await?
                .remove(&id)
                .unwrap_or_default()
                .iter()
                .map(|item| item.total)
                .collect(),
        };
        let totals = compute_totals(&line_totals, tax_rate)?;

        let mut active: order::ActiveModel = existing.into();
        active.tax_rate = Set(tax_rate);
        active.subtotal = Set(totals.subtotal);
        active.tax_amount = Set(totals.tax_amount);
        active.total_amount = Set(totals.total_amount);
        if let Some(currency) = request.currency {
            active.currency = Set(currency.to_uppercase());
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.update(&txn).await?;
        txn.commit().await?;

        self.get_order(id).await
    }

    /// Decrements product and batch stock for every line, guarded so levels never go negative.
    async fn reserve_stock(
        txn: &DatabaseTransaction,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let items = Self::items_for(txn, vec![order_id])
            .await?
            .remove(&order_id)
            .unwrap_or_default();

        for item in items {
            let decremented = ProductEntity::update_many()
                .col_expr(
                    product::Column::InventoryLevel,
                    Expr::col(product::Column::InventoryLevel).sub(item.quantity),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(product::Column::Id.eq(item.product_id))
                .filter(product::Column::InventoryLevel.gte(item.quantity))
                .exec(txn)
                .await?;
            if decremented.rows_affected == 0 {
                let product = ProductEntity::find_by_id(item.product_id).one(txn).await?;
                return Err(match product {
                    Some(p) => ServiceError::InsufficientStock(format!(
                        "Insufficient stock for {}: {} available, {} requested",
                        p.name, p.inventory_level, item.quantity
                    )),
                    None => ServiceError::NotFound(format!("Product {} not found", item.product_id)),
                });
            }

            if let Some(batch_id) = item.batch_id {
                let decremented = BatchEntity::update_many()
                    .col_expr(
                        batch::Column::Quantity,
                        Expr::col(batch::Column::Quantity).sub(item.quantity),
                    )
                    .col_expr(batch::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(batch::Column::Id.eq(batch_id))
                    .filter(batch::Column::Quantity.gte(item.quantity))
                    .exec(txn)
                    .await?;
                if decremented.rows_affected == 0 {
                    return Err(ServiceError::InsufficientStock(format!(
                        "Insufficient quantity in batch {} for {} units",
                        batch_id, item.quantity
                    )));
                }
            }
        }
        Ok(())
    }

    /// Moves an order through the workflow. Stock reservation on Approved and invoice creation on
    /// Invoiced commit atomically with the status write; events go out only after commit.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: Uuid,
        target: OrderStatus,
    ) -> Result<OrderView, ServiceError> {
        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for status change");
            ServiceError::DatabaseError(e)
        })?;

        let existing = OrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        let from = existing.status;
        if !is_valid_transition(from, target) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot transition from {} to {}",
                from, target
            )));
        }

        let mut issued_invoice = None;
        match target {
            OrderStatus::Approved => Self::reserve_stock(&txn, id).await?,
            OrderStatus::Invoiced => {
                issued_invoice = Some(
                    invoices::issue_for_order(&txn, &existing, self.invoice_due_days, None).await?,
                );
            }
            _ => {}
        }

        let mut active: order::ActiveModel = existing.into();
        active.status = Set(target);
        active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to commit status change");
            ServiceError::DatabaseError(e)
        })?;

        counter!("chemops_orders.status_transitions", 1);
        info!(order_id = %id, %from, to = %target, "Order status changed");

        if let Some(invoice) = issued_invoice {
            self.event_sender
                .emit(Event::InvoiceCreated {
                    invoice_id: invoice.id,
                    invoice_number: invoice.invoice_number,
                    total_amount: invoice.total_amount,
                })
                .await;
        }
        if target == OrderStatus::Approved {
            if let Err(e) = self.alerts.check_low_stock().await {
                warn!(error = %e, "Low-stock check failed after approval");
            }
        }
        self.event_sender
            .emit(Event::OrderStatusChanged {
                order_id: id,
                status: target,
            })
            .await;

        self.get_order(id).await
    }

    #[instrument(skip(self))]
    pub async fn export_csv(&self) -> Result<Vec<u8>, ServiceError> {
        let orders = OrderEntity::find()
            .find_also_related(CustomerEntity)
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        let rows: Vec<OrderCsvRow> = orders
            .into_iter()
            .map(|(o, c)| OrderCsvRow {
                order_id: o.id,
                customer: c.map(|c| c.company_name),
                status: o.status,
                total_amount: o.total_amount,
                currency: o.currency,
                created_at: o.created_at,
            })
            .collect();
        documents::csv::write_records(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Approved, true)]
    #[case(OrderStatus::Pending, OrderStatus::Cancelled, true)]
    #[case(OrderStatus::Pending, OrderStatus::Invoiced, false)]
    #[case(OrderStatus::Pending, OrderStatus::Shipped, false)]
    #[case(OrderStatus::Approved, OrderStatus::Shipped, true)]
    #[case(OrderStatus::Approved, OrderStatus::Cancelled, true)]
    #[case(OrderStatus::Approved, OrderStatus::Pending, false)]
    #[case(OrderStatus::Shipped, OrderStatus::Invoiced, true)]
    #[case(OrderStatus::Shipped, OrderStatus::Cancelled, false)]
    #[case(OrderStatus::Invoiced, OrderStatus::Paid, true)]
    #[case(OrderStatus::Paid, OrderStatus::Cancelled, false)]
    #[case(OrderStatus::Cancelled, OrderStatus::Pending, false)]
    fn transition_table(#[case] from: OrderStatus, #[case] to: OrderStatus, #[case] ok: bool) {
        assert_eq!(is_valid_transition(from, to), ok);
    }

    #[test]
    fn no_status_transitions_to_itself() {
        use sea_orm::Iterable;
        for status in OrderStatus::iter() {
            assert!(!is_valid_transition(status, status), "{status} -> {status}");
        }
    }

    #[test]
    fn totals_apply_percent_tax() {
        let totals = compute_totals(&[dec!(100.00), dec!(50.50)], dec!(8.25)).unwrap();
        assert_eq!(totals.subtotal, dec!(150.50));
        assert_eq!(totals.tax_amount, dec!(12.41625));
        assert_eq!(totals.total_amount, dec!(162.91625));
    }

    #[test]
    fn zero_tax_keeps_total_equal_to_subtotal() {
        let totals = compute_totals(&[dec!(19.99)], Decimal::ZERO).unwrap();
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total_amount, dec!(19.99));
    }

    #[test]
    fn amounts_beyond_decimal_range_are_rejected() {
        assert_matches!(line_total(Decimal::MAX, 2), Err(ServiceError::ValidationError(_)));
        assert_matches!(
            compute_totals(&[Decimal::MAX, Decimal::ONE], Decimal::ZERO),
            Err(ServiceError::ValidationError(msg)) if msg == "Order total out of range"
        );
        assert_matches!(
            compute_totals(&[Decimal::MAX], dec!(50)),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(line_total(dec!(2.50), 4).unwrap(), dec!(10.00));
    }
}
