//! Static mapping of roles to the resources and actions they are permitted.
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use super::ActionKind;
use crate::Role;

/// Permissions granted to a single role.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "RoleRulesRepr", into = "RoleRulesRepr")]
pub enum RoleRules {
    /// The role can perform all actions on all resources.
    All,

    /// The role can perform the listed actions on the listed resources only.
    Resources(BTreeMap<String, BTreeSet<ActionKind>>),
}

impl RoleRules {
    /// Grant the listed actions on a resource.
    ///
    /// Granting actions to a role with [`RoleRules::All`] access has no effect.
    pub fn grant<S, A>(mut self, resource: S, actions: A) -> Self
    where
        S: Into<String>,
        A: IntoIterator<Item = ActionKind>,
    {
        if let RoleRules::Resources(resources) = &mut self {
            resources
                .entry(resource.into())
                .or_default()
                .extend(actions);
        }
        self
    }

    /// Start a set of rules that grants nothing.
    pub fn none() -> Self {
        RoleRules::Resources(BTreeMap::new())
    }
}

/// Serialised representation of [`RoleRules`].
///
/// Unrestricted roles are represented by the string `all`,
/// other roles by a map of resource names to lists of actions.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RoleRulesRepr {
    Tag(RoleRulesTag),
    Resources(BTreeMap<String, BTreeSet<ActionKind>>),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RoleRulesTag {
    All,
}

impl From<RoleRulesRepr> for RoleRules {
    fn from(value: RoleRulesRepr) -> Self {
        match value {
            RoleRulesRepr::Tag(RoleRulesTag::All) => RoleRules::All,
            RoleRulesRepr::Resources(resources) => RoleRules::Resources(resources),
        }
    }
}

impl From<RoleRules> for RoleRulesRepr {
    fn from(value: RoleRules) -> Self {
        match value {
            RoleRules::All => RoleRulesRepr::Tag(RoleRulesTag::All),
            RoleRules::Resources(resources) => RoleRulesRepr::Resources(resources),
        }
    }
}

/// Immutable mapping from each [`Role`] to its [`RoleRules`].
///
/// The table is only constructed at process start and is never changed afterwards.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    roles: BTreeMap<Role, RoleRules>,
}

impl RuleTable {
    /// Lookup the rules for a role, if the role has any.
    pub fn get(&self, role: Role) -> Option<&RoleRules> {
        self.roles.get(&role)
    }

    /// Iterate over roles and their rules in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&Role, &RoleRules)> {
        self.roles.iter()
    }

    /// Create a rule table from a mapping of roles to rules.
    pub fn new<I>(roles: I) -> RuleTable
    where
        I: IntoIterator<Item = (Role, RoleRules)>,
    {
        let roles = roles.into_iter().collect();
        RuleTable { roles }
    }

    /// Check the table for entries that are almost certainly configuration mistakes.
    ///
    /// - Resources must have a non-empty name.
    /// - Resources must grant at least one action (omit the resource to deny access).
    pub fn validate(&self) -> Result<()> {
        for (role, rules) in &self.roles {
            let resources = match rules {
                RoleRules::All => continue,
                RoleRules::Resources(resources) => resources,
            };
            for (resource, actions) in resources {
                if resource.trim().is_empty() {
                    anyhow::bail!(InvalidRuleTable::EmptyResourceName { role: *role });
                }
                if actions.is_empty() {
                    anyhow::bail!(InvalidRuleTable::NoActions {
                        resource: resource.clone(),
                        role: *role,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        super::defaults::shop_rules()
    }
}

/// Errors detected while validating a [`RuleTable`].
#[derive(Debug, thiserror::Error)]
pub enum InvalidRuleTable {
    /// A resource with an empty name is listed for a role.
    #[error("role \"{role}\" lists a resource with an empty name")]
    EmptyResourceName { role: Role },

    /// A resource grants no actions for a role.
    #[error("role \"{role}\" lists resource \"{resource}\" without any action")]
    NoActions { resource: String, role: Role },
}
