//! Module to deal with the Authorisation (what can be done) side of Auth.
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

mod defaults;
mod rules;


pub use self::rules::InvalidRuleTable;
pub use self::rules::RoleRules;
pub use self::rules::RuleTable;

use crate::Role;

/// Kinds of actions a principal can perform on a resource.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Clone,
    Create,
    Delete,
    Edit,
    List,
    Show,
}

impl ActionKind {
    /// All action kinds known to the application.
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Clone,
        ActionKind::Create,
        ActionKind::Delete,
        ActionKind::Edit,
        ActionKind::List,
        ActionKind::Show,
    ];

    /// Canonical string representation of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Clone => "clone",
            ActionKind::Create => "create",
            ActionKind::Delete => "delete",
            ActionKind::Edit => "edit",
            ActionKind::List => "list",
            ActionKind::Show => "show",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| UnknownAction(value.to_string()))
    }
}

/// The action name is not one of the known action kinds.
#[derive(Debug, thiserror::Error)]
#[error("action \"{0}\" is not recognised")]
pub struct UnknownAction(pub String);

/// Decide if roles can perform actions on resources based on a static [`RuleTable`].
///
/// The engine never performs I/O and has no mutable state:
/// identical inputs always produce identical [`Decision`]s.
#[derive(Clone, Debug)]
pub struct AccessEngine {
    rules: Arc<RuleTable>,
}

impl AccessEngine {
    /// Check if a role, identified by name, can perform an action on a resource.
    ///
    /// Role names that are missing or not recognised are denied,
    /// this method never fails.
    pub fn can(&self, role: Option<&str>, resource: &str, action: ActionKind) -> Decision {
        let role = match role {
            None => return Decision::Deny(DenyReason::NoRole),
            Some(role) => role,
        };
        match role.parse::<Role>() {
            Ok(role) => self.can_role(Some(role), resource, action),
            Err(error) => Decision::Deny(DenyReason::UnrecognisedRole(error.0)),
        }
    }

    /// Check if a [`Role`] can perform an action on a resource.
    pub fn can_role(&self, role: Option<Role>, resource: &str, action: ActionKind) -> Decision {
        let role = match role {
            None => return Decision::Deny(DenyReason::NoRole),
            Some(role) => role,
        };
        let resources = match self.rules.get(role) {
            None => return Decision::Deny(DenyReason::UnrecognisedRole(role.to_string())),
            Some(RoleRules::All) => return Decision::Allow,
            Some(RoleRules::Resources(resources)) => resources,
        };
        let actions = match resources.get(resource) {
            None => {
                let resource = resource.to_string();
                return Decision::Deny(DenyReason::ResourceNotAccessible { role, resource });
            }
            Some(actions) => actions,
        };
        if actions.contains(&action) {
            Decision::Allow
        } else {
            let resource = resource.to_string();
            Decision::Deny(DenyReason::ActionNotPermitted {
                action,
                resource,
                role,
            })
        }
    }

    /// Create an engine evaluating requests against the given rules.
    pub fn new(rules: RuleTable) -> AccessEngine {
        let rules = Arc::new(rules);
        AccessEngine { rules }
    }

    /// Access the rules the engine evaluates requests against.
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }
}

impl Default for AccessEngine {
    fn default() -> Self {
        AccessEngine::new(RuleTable::default())
    }
}

/// Result of an access check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    /// The role is allowed to perform the action.
    Allow,

    /// The role is not allowed to perform the action, for the attached reason.
    Deny(DenyReason),
}

impl Decision {
    /// Check if the decision allows the request.
    pub fn allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert the decision into a [`Result`] with a [`DenyReason`] error on denial.
    ///
    /// This makes code checking for access clear and concise:
    ///
    /// ```
    /// # use repairdesk_auth::{AccessEngine, ActionKind};
    /// # fn main() -> anyhow::Result<()> {
    /// let engine = AccessEngine::default();
    /// engine
    ///     .can(Some("technician"), "repair_orders", ActionKind::Edit)
    ///     .into_result()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn into_result(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(anyhow::anyhow!(reason)),
        }
    }

    /// Reason the request was denied, if it was.
    pub fn reason(&self) -> Option<&DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(reason),
        }
    }
}

/// Shape of [`Decision`]s exposed to UI consumers.
#[derive(Serialize)]
struct DecisionReport {
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl Serialize for Decision {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let report = DecisionReport {
            allowed: self.allowed(),
            reason: self.reason().map(ToString::to_string),
        };
        report.serialize(serializer)
    }
}

/// Reasons a role is not allowed to perform an action on a resource.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DenyReason {
    /// The role is allowed on the resource but not to perform the action.
    #[error("role \"{role}\" cannot perform \"{action}\" on resource \"{resource}\"")]
    ActionNotPermitted {
        action: ActionKind,
        resource: String,
        role: Role,
    },

    /// No role is assigned to the principal.
    #[error("no role is assigned to the principal")]
    NoRole,

    /// The role cannot access the resource at all.
    #[error("role \"{role}\" cannot access resource \"{resource}\"")]
    ResourceNotAccessible { resource: String, role: Role },

    /// The role is not recognised.
    #[error("role \"{0}\" is not recognised")]
    UnrecognisedRole(String),
}
