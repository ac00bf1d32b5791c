/*!
 * # Permissions Module
 *
 * Permission strings are `resource:action`. Routes require a permission; roles grant them
 * (see [`super::rbac`]).
 */

/// Common permission string constants for compile-time safety
pub mod consts {
    // Products
    pub const PRODUCTS_WRITE: &str = "products:write";
    pub const PRODUCTS_ARCHIVE: &str = "products:archive";

    // Batches
    pub const BATCHES_WRITE: &str = "batches:write";
    pub const BATCHES_DELETE: &str = "batches:delete";

    // Customers
    pub const CUSTOMERS_CREATE: &str = "customers:create";
    pub const CUSTOMERS_UPDATE: &str = "customers:update";
    pub const CUSTOMERS_DELETE: &str = "customers:delete";

    // Orders
    pub const ORDERS_WRITE: &str = "orders:write";
    pub const ORDERS_STATUS: &str = "orders:status";

    // Invoices
    pub const INVOICES_WRITE: &str = "invoices:write";

    // Compliance
    pub const COMPLIANCE_MANAGE: &str = "compliance:manage";

    // Audit trail
    pub const AUDIT_READ: &str = "audit:read";

    // Administration
    pub const WEBHOOKS_MANAGE: &str = "webhooks:manage";
    pub const USERS_MANAGE: &str = "users:manage";
    pub const SETTINGS_MANAGE: &str = "settings:manage";
}

/// Every permission known to the system.
pub const ALL_PERMISSIONS: &[&str] = &[
    consts::PRODUCTS_WRITE,
    consts::PRODUCTS_ARCHIVE,
    consts::BATCHES_WRITE,
    consts::BATCHES_DELETE,
    consts::CUSTOMERS_CREATE,
    consts::CUSTOMERS_UPDATE,
    consts::CUSTOMERS_DELETE,
    consts::ORDERS_WRITE,
    consts::ORDERS_STATUS,
    consts::INVOICES_WRITE,
    consts::COMPLIANCE_MANAGE,
    consts::AUDIT_READ,
    consts::WEBHOOKS_MANAGE,
    consts::USERS_MANAGE,
    consts::SETTINGS_MANAGE,
];
