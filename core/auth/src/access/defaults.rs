//! Rule table shipped with the application.
//!
//! Must match the row-level security policies deployed to the backend database.
use super::ActionKind::Clone;
use super::ActionKind::Create;
use super::ActionKind::Edit;
use super::ActionKind::List;
use super::ActionKind::Show;
use super::RoleRules;
use super::RuleTable;
use crate::Role;

/// Default rules for the roles working in and with the repair shop.
pub fn shop_rules() -> RuleTable {
    let front_desk = RoleRules::none()
        .grant("customers", [List, Show, Create, Edit])
        .grant("devices", [List, Show, Create, Edit])
        .grant("pos_sales", [List, Show, Create])
        .grant("quotes", [List, Show, Create, Edit])
        .grant("repair_components", [List, Show])
        .grant("repair_orders", [List, Show, Create, Edit, Clone])
        .grant("retail_items", [List, Show])
        .grant("transactions", [List, Show])
        .grant("warranty_claims", [List, Show, Create]);
    let partner = RoleRules::none().grant("quotes", [List, Show, Create]);
    let technician = RoleRules::none()
        .grant("customers", [List, Show])
        .grant("devices", [List, Show])
        .grant("repair_components", [List, Show, Edit])
        .grant("repair_orders", [List, Show, Edit])
        .grant("stock_receiving", [List, Show])
        .grant("warranty_claims", [List, Show, Edit]);

    // Staff, suppliers, purchase orders and deletions are reserved to administrators.
    RuleTable::new([
        (Role::Admin, RoleRules::All),
        (Role::FrontDesk, front_desk),
        (Role::Partner, partner),
        (Role::Technician, technician),
    ])
}
