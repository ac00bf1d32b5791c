use crate::{
    db::DbPool,
    documents::pdf::{self, InvoiceLine},
    entities::{
        customer::Entity as CustomerEntity,
        invoice::{self, Entity as InvoiceEntity, InvoiceStatus},
        order::{self, Entity as OrderEntity, OrderStatus},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{unique_violation, Page, PageRequest},
};
use chrono::{Datelike, Duration, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Prefix shared by every invoice number issued in `year`.
pub fn invoice_prefix(year: i32) -> String {
    format!("INV-{}-", year)
}

/// Next number after the highest existing suffix for `year`; unparsable suffixes are ignored.
/// A suffix already at `u64::MAX` yields the same number again, which the unique index rejects.
pub fn next_invoice_number<'a>(year: i32, existing: impl IntoIterator<Item = &'a str>) -> String {
    let prefix = invoice_prefix(year);
    let highest = existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(prefix.as_str()))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:04}", prefix, highest.saturating_add(1))
}

async fn generate_invoice_number<C: ConnectionTrait>(conn: &C) -> Result<String, ServiceError> {
    let year = Utc::now().year();
    let numbers: Vec<String> = InvoiceEntity::find()
        .select_only()
        .column(invoice::Column::InvoiceNumber)
        .filter(invoice::Column::InvoiceNumber.starts_with(invoice_prefix(year).as_str()))
        .into_tuple()
        .all(conn)
        .await?;
    Ok(next_invoice_number(year, numbers.iter().map(String::as_str)))
}

/// Issues an invoice mirroring the order's amounts: status Issued, due in `due_days`.
pub(crate) async fn issue_for_order<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
    due_days: i64,
    notes: Option<String>,
) -> Result<invoice::Model, ServiceError> {
    let invoice_number = generate_invoice_number(conn).await?;
    let now = Utc::now();

    let model = invoice::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        invoice_number: Set(invoice_number.clone()),
        currency: Set(order.currency.clone()),
        subtotal: Set(order.subtotal),
        tax_amount: Set(order.tax_amount),
        total_amount: Set(order.total_amount),
        status: Set(InvoiceStatus::Issued),
        due_date: Set(now + Duration::days(due_days)),
        issued_at: Set(Some(now)),
        paid_at: Set(None),
        notes: Set(notes),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(|e| {
        error!(error = %e, invoice_number = %invoice_number, "Failed to insert invoice");
        unique_violation(e, "Invoice number already issued; retry the request")
    })?;

    counter!("chemops_invoices.issued", 1);
    Ok(model)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    pub order_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateInvoiceStatusRequest {
    pub status: InvoiceStatus,
}

/// Invoice with the owning order's customer resolved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: invoice::Model,
    pub customer_id: Option<Uuid>,
    pub company_name: Option<String>,
}

/// Invoicing, overdue tracking and PDF rendering
#[derive(Clone)]
pub struct InvoiceService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    due_days: i64,
}

impl InvoiceService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, due_days: i64) -> Self {
        Self {
            db_pool,
            event_sender,
            due_days,
        }
    }

    /// Flips Issued invoices past their due date to Overdue. Each invoice is flipped by a
    /// guarded update, and `invoice.overdue` is emitted only by the call whose update landed.
    #[instrument(skip(self))]
    pub async fn mark_overdue(&self) -> Result<usize, ServiceError> {
        let now = Utc::now();
        let due: Vec<invoice::Model> = InvoiceEntity::find()
            .filter(invoice::Column::Status.eq(InvoiceStatus::Issued))
            .filter(invoice::Column::DueDate.lt(now))
            .all(&*self.db_pool)
            .await?;

        let mut flipped = 0;
        for inv in due {
            let result = InvoiceEntity::update_many()
                .col_expr(invoice::Column::Status, Expr::value(InvoiceStatus::Overdue))
                .col_expr(invoice::Column::UpdatedAt, Expr::value(now))
                .filter(invoice::Column::Id.eq(inv.id))
                .filter(invoice::Column::Status.eq(InvoiceStatus::Issued))
                .exec(&*self.db_pool)
                .await?;
            if result.rows_affected != 1 {
                continue;
            }

            flipped += 1;
            self.event_sender
                .emit(Event::InvoiceOverdue {
                    invoice_id: inv.id,
                    invoice_number: inv.invoice_number,
                })
                .await;
        }

        if flipped > 0 {
            warn!(count = flipped, "Invoices marked overdue");
        }
        Ok(flipped)
    }

    /// Lists invoices newest first after running the overdue sweep.
    #[instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
        paging: PageRequest,
    ) -> Result<Page<InvoiceView>, ServiceError> {
        self.mark_overdue().await?;

        let mut query = InvoiceEntity::find();
        if let Some(status) = status {
            query = query.filter(invoice::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(invoice::Column::CreatedAt)
            .paginate(&*self.db_pool, paging.limit);
        let total = paginator.num_items().await?;
        let invoices = paginator.fetch_page(paging.index()).await?;

        let items = self.with_customers(invoices).await?;
        Ok(Page::new(items, total, paging.page, paging.limit))
    }

    async fn with_customers(
        &self,
        invoices: Vec<invoice::Model>,
    ) -> Result<Vec<InvoiceView>, ServiceError> {
        let order_ids: Vec<Uuid> = invoices.iter().map(|i| i.order_id).collect();
        let orders: HashMap<Uuid, Uuid> = OrderEntity::find()
            .filter(order::Column::Id.is_in(order_ids))
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|o| (o.id, o.customer_id))
            .collect();
        let customer_ids: Vec<Uuid> = orders.values().copied().collect();
        let names: HashMap<Uuid, String> = CustomerEntity::find()
            .filter(crate::entities::customer::Column::Id.is_in(customer_ids))
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|c| (c.id, c.company_name))
            .collect();

        Ok(invoices
            .into_iter()
            .map(|invoice| {
                let customer_id = orders.get(&invoice.order_id).copied();
                InvoiceView {
                    company_name: customer_id.and_then(|id| names.get(&id).cloned()),
                    customer_id,
                    invoice,
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_invoice(&self, id: Uuid) -> Result<invoice::Model, ServiceError> {
        InvoiceEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Invoice not found".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn get_invoice_view(&self, id: Uuid) -> Result<InvoiceView, ServiceError> {
        let invoice = self.get_invoice(id).await?;
        let mut views = self.with_customers(vec![invoice]).await?;
        views
            .pop()
            .ok_or_else(|| ServiceError::NotFound("Invoice not found".to_string()))
    }

    /// Manually invoices an existing order.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_invoice(
        &self,
        request: CreateInvoiceRequest,
    ) -> Result<invoice::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = OrderEntity::find_by_id(request.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        let invoice = issue_for_order(&txn, &order, self.due_days, request.notes).await?;
        txn.commit().await?;

        info!(invoice_id = %invoice.id, invoice_number = %invoice.invoice_number, "Invoice issued");
        self.event_sender
            .emit(Event::InvoiceCreated {
                invoice_id: invoice.id,
                invoice_number: invoice.invoice_number.clone(),
                total_amount: invoice.total_amount,
            })
            .await;
        Ok(invoice)
    }

    /// Paid stamps `paid_at` and settles the parent order in the same transaction.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<invoice::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let existing = InvoiceEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Invoice not found".to_string()))?;

        let order_id = existing.order_id;
        let mut active: invoice::ActiveModel = existing.into();
        active.status = Set(status);
        if status == InvoiceStatus::Paid {
            active.paid_at = Set(Some(Utc::now()));
        }
        let updated = active.update(&txn).await?;

        if status == InvoiceStatus::Paid {
            if let Some(order) = OrderEntity::find_by_id(order_id).one(&txn).await? {
                let mut order: order::ActiveModel = order.into();
                order.status = Set(OrderStatus::Paid);
                order.update(&txn).await?;
            } else {
                warn!(invoice_id = %id, %order_id, "Paid invoice has no parent order");
            }
        }
        txn.commit().await?;

        match status {
            InvoiceStatus::Paid => {
                counter!("chemops_invoices.paid", 1);
                self.event_sender
                    .emit(Event::InvoicePaid {
                        invoice_id: updated.id,
                        invoice_number: updated.invoice_number.clone(),
                    })
                    .await;
            }
            InvoiceStatus::Overdue => {
                self.event_sender
                    .emit(Event::InvoiceOverdue {
                        invoice_id: updated.id,
                        invoice_number: updated.invoice_number.clone(),
                    })
                    .await;
            }
            InvoiceStatus::Draft | InvoiceStatus::Issued => {}
        }

        info!(invoice_id = %id, status = %status, "Invoice status updated");
        Ok(updated)
    }

    /// Renders the invoice PDF; returns the file name and bytes.
    #[instrument(skip(self))]
    pub async fn render_pdf(&self, id: Uuid) -> Result<(String, Vec<u8>), ServiceError> {
        let invoice = self.get_invoice(id).await?;
        let order = OrderEntity::find_by_id(invoice.order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        let customer = CustomerEntity::find_by_id(order.customer_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Customer not found".to_string()))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::Position)
            .find_also_related(ProductEntity)
            .all(&*self.db_pool)
            .await?;
        let lines: Vec<InvoiceLine> = items
            .into_iter()
            .map(|(item, product): (order_item::Model, Option<product::Model>)| InvoiceLine {
                product_name: product
                    .map(|p| p.name)
                    .unwrap_or_else(|| "Product".to_string()),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: item.total,
            })
            .collect();

        let bytes = pdf::render_invoice(&invoice, &customer, &lines)?;
        Ok((format!("{}.pdf", invoice.invoice_number), bytes))
    }
}
