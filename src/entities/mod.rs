pub mod audit_log;
pub mod batch;
pub mod customer;
pub mod invoice;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;
pub mod webhook;
