/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Maps each [`UserRole`] to the permissions it grants.
 */

use super::permissions::{consts::*, ALL_PERMISSIONS};
use crate::entities::user::UserRole;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: UserRole,
    pub description: &'static str,
    pub permissions: Vec<&'static str>,
}

lazy_static! {
    pub static ref ROLES: HashMap<UserRole, Role> = {
        let mut roles = HashMap::new();

        roles.insert(
            UserRole::Admin,
            Role {
                name: UserRole::Admin,
                description: "Full access including users, webhooks and settings",
                permissions: ALL_PERMISSIONS.to_vec(),
            },
        );

        roles.insert(
            UserRole::Sales,
            Role {
                name: UserRole::Sales,
                description: "Maintains catalog, batches, customers and orders",
                permissions: vec![
                    PRODUCTS_WRITE,
                    BATCHES_WRITE,
                    CUSTOMERS_CREATE,
                    CUSTOMERS_UPDATE,
                    ORDERS_WRITE,
                    ORDERS_STATUS,
                ],
            },
        );

        roles.insert(
            UserRole::Finance,
            Role {
                name: UserRole::Finance,
                description: "Moves orders through billing and manages invoices",
                permissions: vec![ORDERS_STATUS, INVOICES_WRITE, AUDIT_READ],
            },
        );

        roles.insert(
            UserRole::Compliance,
            Role {
                name: UserRole::Compliance,
                description: "Verifies customers and produces regulatory exports",
                permissions: vec![CUSTOMERS_UPDATE, COMPLIANCE_MANAGE, AUDIT_READ],
            },
        );

        roles
    };
}

/// Permissions granted to `role`.
pub fn permissions_for(role: UserRole) -> Vec<String> {
    ROLES
        .get(&role)
        .map(|r| r.permissions.iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(UserRole::Admin, WEBHOOKS_MANAGE, true)]
    #[case(UserRole::Sales, ORDERS_WRITE, true)]
    #[case(UserRole::Sales, PRODUCTS_ARCHIVE, false)]
    #[case(UserRole::Sales, INVOICES_WRITE, false)]
    #[case(UserRole::Finance, ORDERS_STATUS, true)]
    #[case(UserRole::Finance, ORDERS_WRITE, false)]
    #[case(UserRole::Compliance, CUSTOMERS_UPDATE, true)]
    #[case(UserRole::Compliance, CUSTOMERS_CREATE, false)]
    #[case(UserRole::Compliance, COMPLIANCE_MANAGE, true)]
    #[case(UserRole::Sales, AUDIT_READ, false)]
    fn role_grants(#[case] role: UserRole, #[case] permission: &str, #[case] granted: bool) {
        assert_eq!(
            permissions_for(role).iter().any(|p| p == permission),
            granted
        );
    }

    #[test]
    fn every_role_is_defined() {
        use sea_orm::Iterable;
        for role in UserRole::iter() {
            assert!(ROLES.contains_key(&role), "{role} has no definition");
        }
    }
}
