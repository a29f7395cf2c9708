//! Role policy table
//!
//! One central `(role, action)` table consulted at the handler boundary,
//! instead of inline role comparisons scattered through business logic.

use crate::error::AppError;

/// Privileged actions on the fulfillment engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateOrder,
    ViewOrder,
    UpdateOrderStatus,
    UpdatePayment,
    ApproveCommission,
    PayCommission,
    AdjustStock,
}

/// Policy rows: which roles may perform which action.
const POLICY: &[(Action, &[&str])] = &[
    (Action::CreateOrder, &["admin", "manager", "staff"]),
    (Action::ViewOrder, &["admin", "manager", "staff"]),
    (Action::UpdateOrderStatus, &["admin", "manager"]),
    (Action::UpdatePayment, &["admin", "manager"]),
    (Action::ApproveCommission, &["admin", "manager"]),
    (Action::PayCommission, &["admin"]),
    (Action::AdjustStock, &["admin", "manager"]),
];

pub fn is_allowed(role: &str, action: Action) -> bool {
    if role == "admin" {
        return true;
    }
    POLICY
        .iter()
        .find(|(a, _)| *a == action)
        .is_some_and(|(_, roles)| roles.contains(&role))
}

/// Evaluate the policy once at the boundary; handlers call this and then
/// stay role-free.
pub fn require(role: &str, action: Action) -> Result<(), AppError> {
    if is_allowed(role, action) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "Role '{role}' may not perform {action:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_can_do_everything() {
        for action in [
            Action::CreateOrder,
            Action::UpdateOrderStatus,
            Action::UpdatePayment,
            Action::ApproveCommission,
            Action::PayCommission,
            Action::AdjustStock,
        ] {
            assert!(is_allowed("admin", action));
        }
    }

    #[test]
    fn staff_limited_to_order_entry() {
        assert!(is_allowed("staff", Action::CreateOrder));
        assert!(is_allowed("staff", Action::ViewOrder));
        assert!(!is_allowed("staff", Action::UpdateOrderStatus));
        assert!(!is_allowed("staff", Action::ApproveCommission));
        assert!(!is_allowed("staff", Action::PayCommission));
    }

    #[test]
    fn only_admin_pays_commissions() {
        assert!(!is_allowed("manager", Action::PayCommission));
        assert!(is_allowed("manager", Action::ApproveCommission));
    }

    #[test]
    fn unknown_role_denied() {
        assert!(!is_allowed("intern", Action::CreateOrder));
        assert!(require("intern", Action::CreateOrder).is_err());
    }
}
