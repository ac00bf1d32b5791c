//! Property-based tests for the pure pieces of the order and invoice workflow.

use chemops_api::{
    auth::{consts as perm, permissions_for, ALL_PERMISSIONS},
    entities::{order::OrderStatus, user::UserRole},
    services::{
        invoices::next_invoice_number,
        orders::{allowed_transitions, compute_totals, is_valid_transition},
    },
    webhooks::SignatureGenerator,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use sea_orm::Iterable;

fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn tax_rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..5_000).prop_map(|basis| Decimal::new(basis, 2))
}

fn status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::iter().collect::<Vec<_>>())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn totals_add_up(lines in prop::collection::vec(money_strategy(), 0..20), rate in tax_rate_strategy()) {
        let totals = compute_totals(&lines, rate).unwrap();
        let subtotal: Decimal = lines.iter().copied().sum();

        prop_assert_eq!(totals.subtotal, subtotal);
        prop_assert_eq!(totals.total_amount, totals.subtotal + totals.tax_amount);
        prop_assert!(totals.tax_amount >= Decimal::ZERO);
        prop_assert!(totals.tax_amount <= totals.subtotal);
    }

    #[test]
    fn zero_tax_means_total_equals_subtotal(lines in prop::collection::vec(money_strategy(), 1..10)) {
        let totals = compute_totals(&lines, Decimal::ZERO).unwrap();
        prop_assert_eq!(totals.tax_amount, Decimal::ZERO);
        prop_assert_eq!(totals.total_amount, totals.subtotal);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn next_number_exceeds_every_existing_suffix(
        year in 2000i32..2100,
        suffixes in prop::collection::vec(1u32..9_999, 0..30),
    ) {
        let existing: Vec<String> = suffixes
            .iter()
            .map(|n| format!("INV-{}-{:04}", year, n))
            .collect();
        let next = next_invoice_number(year, existing.iter().map(String::as_str));

        let expected = suffixes.iter().max().copied().unwrap_or(0) + 1;
        prop_assert_eq!(&next, &format!("INV-{}-{:04}", year, expected));
        prop_assert!(!existing.contains(&next));
    }

    #[test]
    fn other_years_do_not_affect_numbering(
        year in 2000i32..2100,
        suffixes in prop::collection::vec(1u32..9_999, 1..10),
    ) {
        let last_year: Vec<String> = suffixes
            .iter()
            .map(|n| format!("INV-{}-{:04}", year - 1, n))
            .collect();
        let next = next_invoice_number(year, last_year.iter().map(String::as_str));
        prop_assert_eq!(next, format!("INV-{}-0001", year));
    }

    #[test]
    fn transitions_agree_with_the_table(from in status_strategy(), to in status_strategy()) {
        prop_assert_eq!(is_valid_transition(from, to), allowed_transitions(from).contains(&to));
        prop_assert!(!is_valid_transition(from, from), "{} must not transition to itself", from);
    }

    #[test]
    fn signatures_verify_only_the_signed_body(
        secret in "[a-f0-9]{16,64}",
        body in prop::collection::vec(any::<u8>(), 0..256),
        flip in any::<prop::sample::Index>(),
    ) {
        let signer = SignatureGenerator::new(secret);
        let signature = signer.sign_payload(&body).unwrap();
        prop_assert!(signer.verify(&body, &signature));

        if !body.is_empty() {
            let mut tampered = body.clone();
            let at = flip.index(tampered.len());
            tampered[at] ^= 0x01;
            prop_assert!(!signer.verify(&tampered, &signature));
        }
    }
}

#[test]
fn terminal_states_have_no_exits() {
    for status in [OrderStatus::Paid, OrderStatus::Cancelled] {
        assert!(allowed_transitions(status).is_empty());
    }
}

#[test]
fn only_admin_holds_every_permission() {
    for role in UserRole::iter() {
        let granted = permissions_for(role);
        assert_eq!(granted.len() == ALL_PERMISSIONS.len(), role == UserRole::Admin, "{role}");
        assert_eq!(
            granted.iter().any(|p| p == perm::USERS_MANAGE),
            role == UserRole::Admin,
            "{role}"
        );
    }
}
