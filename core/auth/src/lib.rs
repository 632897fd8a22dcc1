//! Identity models and Authorisation decisions for the RepairDesk staff application.
//!
//! First of all:
//!
//! - Authentication: answers "who is using the application?" (it is about identity).
//!   This crate only models the outcome of authentication as an [`Identity`],
//!   the process itself is performed by the session gate.
//! - Authorisation: answers "can they do what they are asking to do?" (it is about access).
//!
//! ## Access decisions are a rendering hint
//!
//! The [`AccessEngine`] decides if a [`Role`] can perform an [`ActionKind`] on a resource
//! so the application can hide affordances (buttons, menu entries) the principal cannot use.
//!
//! The engine is NOT the security boundary: the backend row-level rules are.
//! The [`RuleTable`] must be kept consistent with them by configuration discipline.
pub mod access;
pub mod identity;

pub use self::access::AccessEngine;
pub use self::access::ActionKind;
pub use self::access::Decision;
pub use self::access::DenyReason;
pub use self::access::RoleRules;
pub use self::access::RuleTable;
pub use self::identity::Identity;
pub use self::identity::Role;
pub use self::identity::UnknownRole;
