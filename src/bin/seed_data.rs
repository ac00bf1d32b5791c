//! Seed data script - populates the database with a realistic chemical catalog
//!
//! Run with: cargo run --bin seed-data [-- --fresh]
//!
//! Everything goes through the service layer, so stock, totals and invoice numbers come out
//! exactly as they would through the API:
//! - one user per role
//! - 10 products with 3 batches each
//! - 5 customers across all compliance states
//! - 10 orders walked through the workflow to their target status

use chrono::{Months, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use chemops_api::{
    config, db,
    entities::{
        customer::ComplianceStatus,
        invoice::{self, InvoiceStatus},
        order::OrderStatus,
        product::{self, UnitOfMeasure},
        user::UserRole,
    },
    events::EventSender,
    migrator::Migrator,
    services::{
        batches::CreateBatchRequest,
        customers::{Address, CreateCustomerRequest},
        features::FeatureFlags,
        orders::{CreateOrderRequest, OrderItemRequest},
        products::CreateProductRequest,
        users::CreateUserRequest,
    },
    AppState,
};

#[derive(Parser)]
#[command(name = "seed-data", about = "Load ChemOps demo data")]
struct Cli {
    /// Drop and recreate all tables before seeding
    #[arg(long)]
    fresh: bool,
}

struct ProductSeed {
    name: &'static str,
    cas: &'static str,
    un: Option<&'static str>,
    hazard: &'static str,
    storage: &'static str,
    sds: Option<&'static str>,
    unit: UnitOfMeasure,
    stock: i32,
    reorder: i32,
    price: Decimal,
}

const WAREHOUSES: [&str; 4] = [
    "Warehouse A - Rack 1",
    "Warehouse A - Rack 2",
    "Warehouse B - Cold Storage",
    "Warehouse B - Hazmat Zone",
];

fn product_seeds() -> Vec<ProductSeed> {
    vec![
        ProductSeed {
            name: "Sulfuric Acid 98%",
            cas: "7664-93-9",
            un: Some("UN1830"),
            hazard: "Class 8 - Corrosive",
            storage: "Store in cool, dry, ventilated area. Segregate from bases.",
            sds: Some("https://example.com/sds/sulfuric-acid.pdf"),
            unit: UnitOfMeasure::Litre,
            stock: 500,
            reorder: 50,
            price: dec!(2.50),
        },
        ProductSeed {
            name: "Sodium Hydroxide",
            cas: "1310-73-2",
            un: Some("UN1823"),
            hazard: "Class 8 - Corrosive",
            storage: "Keep dry. Store away from acids and moisture.",
            sds: Some("https://example.com/sds/sodium-hydroxide.pdf"),
            unit: UnitOfMeasure::Kg,
            stock: 1200,
            reorder: 100,
            price: dec!(1.20),
        },
        ProductSeed {
            name: "Ethanol 99.9%",
            cas: "64-17-5",
            un: Some("UN1170"),
            hazard: "Class 3 - Flammable Liquid",
            storage: "Keep away from heat and ignition sources.",
            sds: Some("https://example.com/sds/ethanol.pdf"),
            unit: UnitOfMeasure::Litre,
            stock: 800,
            reorder: 100,
            price: dec!(3.80),
        },
        ProductSeed {
            name: "Hydrochloric Acid 37%",
            cas: "7647-01-0",
            un: Some("UN1789"),
            hazard: "Class 8 - Corrosive",
            storage: "Store in fume hood. Segregate from alkalis.",
            sds: Some("https://example.com/sds/hcl.pdf"),
            unit: UnitOfMeasure::Litre,
            stock: 300,
            reorder: 30,
            price: dec!(3.10),
        },
        ProductSeed {
            name: "Acetone",
            cas: "67-64-1",
            un: Some("UN1090"),
            hazard: "Class 3 - Flammable Liquid",
            storage: "Keep cool and away from ignition sources.",
            sds: Some("https://example.com/sds/acetone.pdf"),
            unit: UnitOfMeasure::Litre,
            stock: 600,
            reorder: 80,
            price: dec!(2.90),
        },
        ProductSeed {
            name: "Sodium Chloride (Industrial)",
            cas: "7647-14-5",
            un: None,
            hazard: "Not hazardous",
            storage: "Keep in dry, sealed containers.",
            sds: None,
            unit: UnitOfMeasure::Kg,
            stock: 5000,
            reorder: 500,
            price: dec!(0.35),
        },
        ProductSeed {
            name: "Methanol Technical Grade",
            cas: "67-56-1",
            un: Some("UN1230"),
            hazard: "Class 3 - Flammable Liquid, Toxic",
            storage: "Store away from heat. Highly toxic if ingested.",
            sds: Some("https://example.com/sds/methanol.pdf"),
            unit: UnitOfMeasure::Litre,
            stock: 400,
            reorder: 50,
            price: dec!(1.75),
        },
        ProductSeed {
            name: "Calcium Carbonate",
            cas: "471-34-1",
            un: None,
            hazard: "Not hazardous",
            storage: "Store in cool, dry place.",
            sds: None,
            unit: UnitOfMeasure::Kg,
            stock: 8000,
            reorder: 1000,
            price: dec!(0.25),
        },
        ProductSeed {
            name: "Hydrogen Peroxide 35%",
            cas: "7722-84-1",
            un: Some("UN2014"),
            hazard: "Class 5.1 - Oxidizer",
            storage: "Keep refrigerated. Away from organic materials.",
            sds: Some("https://example.com/sds/h2o2.pdf"),
            unit: UnitOfMeasure::Litre,
            stock: 150,
            reorder: 20,
            price: dec!(5.60),
        },
        ProductSeed {
            name: "Isopropyl Alcohol 70%",
            cas: "67-63-0",
            un: Some("UN1219"),
            hazard: "Class 3 - Flammable Liquid",
            storage: "Store away from oxidizers and heat.",
            sds: Some("https://example.com/sds/ipa.pdf"),
            unit: UnitOfMeasure::Litre,
            stock: 1000,
            reorder: 100,
            price: dec!(2.20),
        },
    ]
}

#[allow(clippy::too_many_arguments)]
fn customer_seed(
    company: &str,
    tax_id: &str,
    credit: Decimal,
    status: ComplianceStatus,
    street: &str,
    city: &str,
    state: &str,
    postal_code: &str,
    contact: (&str, &str, &str),
) -> CreateCustomerRequest {
    CreateCustomerRequest {
        company_name: company.to_string(),
        tax_id: Some(tax_id.to_string()),
        credit_limit: Some(credit),
        compliance_status: Some(status),
        address: Some(Address {
            street: Some(street.to_string()),
            city: Some(city.to_string()),
            state: Some(state.to_string()),
            postal_code: Some(postal_code.to_string()),
            country: Some("USA".to_string()),
        }),
        contact_name: Some(contact.0.to_string()),
        contact_email: Some(contact.1.to_string()),
        contact_phone: Some(contact.2.to_string()),
        currency: Some("USD".to_string()),
        notes: None,
    }
}

/// Statuses an order passes through on its way to `target`.
fn path_to(target: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match target {
        Pending => &[],
        Approved => &[Approved],
        Shipped => &[Approved, Shipped],
        Invoiced | Paid => &[Approved, Shipped, Invoiced],
        Cancelled => &[Cancelled],
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    config::init_tracing(&cfg.log_level, cfg.log_json);

    info!("=== ChemOps Seed Data ===");
    let pool = db::establish_connection_from_app_config(&cfg).await?;
    if cli.fresh {
        info!("Dropping existing tables");
        Migrator::fresh(&pool).await?;
    } else {
        db::run_migrations(&pool).await?;
    }

    // Nobody consumes events during seeding; a full channel only logs a warning.
    let (event_tx, _event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let state = AppState::new(
        Arc::new(pool),
        cfg.clone(),
        Arc::new(EventSender::new(event_tx)),
        FeatureFlags::default(),
    )?;
    let services = &state.services;

    info!("Creating users...");
    let users = [
        ("Admin User", "admin@chemops.com", "admin123", UserRole::Admin),
        ("Sarah Sales", "sales@chemops.com", "sales123", UserRole::Sales),
        ("Frank Finance", "finance@chemops.com", "finance123", UserRole::Finance),
        (
            "Carl Compliance",
            "compliance@chemops.com",
            "compliance123",
            UserRole::Compliance,
        ),
    ];
    let mut admin_id = None;
    for (name, email, password, role) in users {
        let user = services
            .users
            .create_user(CreateUserRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: Some(password.to_string()),
                role: Some(role),
                is_active: Some(true),
            })
            .await?;
        if role == UserRole::Admin {
            admin_id = Some(user.id);
        }
    }
    info!("  Created {} users", users.len());

    info!("Creating products and batches...");
    let mut products: Vec<product::Model> = Vec::new();
    let mut batch_ids: Vec<Uuid> = Vec::new();
    for (i, seed) in product_seeds().into_iter().enumerate() {
        let product = services
            .products
            .create_product(CreateProductRequest {
                name: seed.name.to_string(),
                cas_number: Some(seed.cas.to_string()),
                un_number: seed.un.map(str::to_string),
                hazard_classification: Some(seed.hazard.to_string()),
                storage_requirements: Some(seed.storage.to_string()),
                sds_document_url: seed.sds.map(str::to_string),
                unit_of_measure: Some(seed.unit),
                // Stock arrives with the batches below
                inventory_level: Some(0),
                reorder_threshold: Some(seed.reorder),
                price: seed.price,
                currency: Some("USD".to_string()),
                is_hazardous: Some(seed.un.is_some()),
            })
            .await?;

        for b in 1..=3u32 {
            let expiration = Utc::now().checked_add_months(Months::new(b * 4 + i as u32));
            let batch = services
                .batches
                .create_batch(CreateBatchRequest {
                    product_id: product.id,
                    batch_number: format!("BATCH-{:03}-{:02}", i + 1, b),
                    quantity: seed.stock / 3,
                    expiration_date: expiration,
                    warehouse_location: Some(WAREHOUSES[b as usize % WAREHOUSES.len()].to_string()),
                })
                .await?;
            batch_ids.push(batch.id);
        }
        products.push(product);
    }
    info!(
        "  Created {} products with {} batches",
        products.len(),
        batch_ids.len()
    );

    info!("Creating customers...");
    let customer_requests = vec![
        customer_seed(
            "ChemTech Industries",
            "TAX-001",
            dec!(50000),
            ComplianceStatus::Verified,
            "123 Industrial Blvd",
            "Houston",
            "TX",
            "77001",
            ("John Miller", "john@chemtech.com", "+1-555-0101"),
        ),
        customer_seed(
            "NovaChem Labs",
            "TAX-002",
            dec!(30000),
            ComplianceStatus::Verified,
            "456 Research Dr",
            "Boston",
            "MA",
            "02101",
            ("Lisa Chen", "lisa@novachem.com", "+1-555-0102"),
        ),
        customer_seed(
            "Global Pharma Supply",
            "TAX-003",
            dec!(100000),
            ComplianceStatus::Verified,
            "789 Pharma Way",
            "Chicago",
            "IL",
            "60601",
            ("Robert Davis", "robert@globalpharma.com", "+1-555-0103"),
        ),
        customer_seed(
            "Apex Manufacturing",
            "TAX-004",
            dec!(20000),
            ComplianceStatus::Pending,
            "321 Factory Rd",
            "Detroit",
            "MI",
            "48201",
            ("Amy Johnson", "amy@apexmfg.com", "+1-555-0104"),
        ),
        customer_seed(
            "EcoClean Solutions",
            "TAX-005",
            dec!(15000),
            ComplianceStatus::Rejected,
            "654 Green St",
            "Seattle",
            "WA",
            "98101",
            ("Tom Green", "tom@ecoclean.com", "+1-555-0105"),
        ),
    ];
    let mut verified = Vec::new();
    for request in customer_requests {
        let status = request.compliance_status;
        let customer = services.customers.create_customer(request).await?;
        if status == Some(ComplianceStatus::Verified) {
            verified.push(customer.id);
        }
    }
    info!("  Created 5 customers ({} verified)", verified.len());

    info!("Creating orders...");
    // (customer, target status, [(product, batch, quantity)], tax rate)
    let order_defs: Vec<(usize, OrderStatus, Vec<(usize, usize, i32)>, Decimal)> = vec![
        (0, OrderStatus::Paid, vec![(0, 0, 100), (1, 3, 50)], dec!(10)),
        (1, OrderStatus::Invoiced, vec![(2, 6, 200)], dec!(8)),
        (2, OrderStatus::Shipped, vec![(3, 9, 30), (4, 12, 100)], dec!(10)),
        (0, OrderStatus::Approved, vec![(5, 15, 500)], dec!(5)),
        (1, OrderStatus::Pending, vec![(6, 18, 80)], dec!(8)),
        (2, OrderStatus::Paid, vec![(7, 21, 1000), (8, 24, 40)], dec!(10)),
        (0, OrderStatus::Invoiced, vec![(9, 27, 150)], dec!(10)),
        (1, OrderStatus::Approved, vec![(0, 1, 60)], dec!(8)),
        (2, OrderStatus::Pending, vec![(1, 4, 300)], dec!(10)),
        (0, OrderStatus::Shipped, vec![(2, 7, 120), (3, 10, 40)], dec!(10)),
    ];

    let mut invoice_count = 0;
    for (customer, target, lines, tax_rate) in &order_defs {
        let items = lines
            .iter()
            .map(|(p, b, qty)| OrderItemRequest {
                product_id: products[*p].id,
                batch_id: Some(batch_ids[*b]),
                quantity: *qty,
                unit_price: None,
            })
            .collect();
        let order = services
            .orders
            .create_order(
                CreateOrderRequest {
                    customer_id: verified[*customer],
                    items,
                    tax_rate: Some(*tax_rate),
                    currency: Some("USD".to_string()),
                    notes: None,
                },
                admin_id,
            )
            .await?;
        let order_id = order.order.id;

        for status in path_to(*target) {
            services.orders.update_status(order_id, *status).await?;
        }

        if matches!(target, OrderStatus::Invoiced | OrderStatus::Paid) {
            invoice_count += 1;
        }
        if *target == OrderStatus::Paid {
            let issued = invoice::Entity::find()
                .filter(invoice::Column::OrderId.eq(order_id))
                .one(state.db.as_ref())
                .await?;
            if let Some(issued) = issued {
                services
                    .invoices
                    .update_status(issued.id, InvoiceStatus::Paid)
                    .await?;
            }
        }
    }
    info!(
        "  Created {} orders and {} invoices",
        order_defs.len(),
        invoice_count
    );

    info!("=== Seed complete ===");
    info!("Login credentials:");
    info!("  Admin:      admin@chemops.com      / admin123");
    info!("  Sales:      sales@chemops.com      / sales123");
    info!("  Finance:    finance@chemops.com    / finance123");
    info!("  Compliance: compliance@chemops.com / compliance123");
    info!(
        "Explore interactively at: http://{}:{}/swagger-ui",
        cfg.host, cfg.port
    );

    Ok(())
}
