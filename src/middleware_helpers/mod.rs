pub mod audit;
pub mod request_id;

pub use audit::{audit_middleware, AuditContext, AuditRouterExt};
pub use request_id::request_id_middleware;
