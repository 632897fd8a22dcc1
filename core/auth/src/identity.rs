//! Models for authenticated principals using the application.
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

/// Closed set of roles staff and partners can be assigned.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Shop administrators, with unrestricted access.
    #[serde(alias = "administrator")]
    Admin,

    /// Counter staff handling customers, intake and point of sale.
    #[serde(alias = "front-desk", alias = "staff")]
    FrontDesk,

    /// External partners requesting repair quotes.
    Partner,

    /// Repair technicians working on repair orders.
    Technician,
}

impl Role {
    /// All roles known to the application.
    pub const ALL: [Role; 4] = [Role::Admin, Role::FrontDesk, Role::Partner, Role::Technician];

    /// Canonical string representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::FrontDesk => "front_desk",
            Role::Partner => "partner",
            Role::Technician => "technician",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" | "administrator" => Ok(Role::Admin),
            "front_desk" | "front-desk" | "staff" => Ok(Role::FrontDesk),
            "partner" => Ok(Role::Partner),
            "technician" => Ok(Role::Technician),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The role name is not one of the known roles.
#[derive(Debug, thiserror::Error)]
#[error("role \"{0}\" is not recognised")]
pub struct UnknownRole(pub String);

/// An authenticated principal (a staff member or partner).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque unique identifier of the principal.
    pub id: String,

    /// Email address the principal signs in with.
    pub email: String,

    /// Display name of the principal, if one is set.
    #[serde(default)]
    pub full_name: Option<String>,

    /// Role assigned to the principal.
    ///
    /// A missing role grants no access.
    #[serde(default)]
    pub role: Option<Role>,

    /// Time the principal record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Identity {
    /// Name to show for the principal, falling back to the email when no name is set.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}
