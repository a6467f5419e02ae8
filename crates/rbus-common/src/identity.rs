//! ---
//! rbus_section: "01-core-functionality"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Shared primitives and utilities for the node runtime."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Identity of one of the two nodes sharing the bus.
///
/// The host GUI names the boards `ESP1`/`ESP2`; both spellings parse.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum NodeId {
    #[serde(rename = "A", alias = "a")]
    #[strum(to_string = "A", serialize = "ESP1")]
    A,
    #[serde(rename = "B", alias = "b")]
    #[strum(to_string = "B", serialize = "ESP2")]
    B,
}

impl NodeId {
    /// Canonical single-letter name.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeId::A => "A",
            NodeId::B => "B",
        }
    }

    /// The other node on the bus.
    pub fn peer(self) -> NodeId {
        match self {
            NodeId::A => NodeId::B,
            NodeId::B => NodeId::A,
        }
    }

    /// Compile-time style default role: node A drives the bus out of reset.
    pub fn default_role(self) -> Role {
        match self {
            NodeId::A => Role::Active,
            NodeId::B => Role::Passive,
        }
    }
}

/// Bus arbitration role.
///
/// Only the `Active` node originates telemetry and data requests; the
/// `Passive` node answers them. On the host link the roles are spelled
/// `MAESTRO` and `ESCLAVO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "maestro", alias = "master")]
    #[strum(to_string = "ACTIVE")]
    Active,
    #[serde(alias = "esclavo", alias = "slave")]
    #[strum(to_string = "PASSIVE")]
    Passive,
}

impl Role {
    /// Log-facing spelling (`ACTIVE` / `PASSIVE`).
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Active => "ACTIVE",
            Role::Passive => "PASSIVE",
        }
    }

    /// Host-facing spelling of the role.
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::Active => "MAESTRO",
            Role::Passive => "ESCLAVO",
        }
    }

    /// Parse the host-facing spelling.
    pub fn from_wire_name(name: &str) -> Option<Role> {
        match name {
            "MAESTRO" => Some(Role::Active),
            "ESCLAVO" => Some(Role::Passive),
            _ => None,
        }
    }

    /// The role the peer must take when this node takes `self`.
    pub fn complement(self) -> Role {
        match self {
            Role::Active => Role::Passive,
            Role::Passive => Role::Active,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Role::Active)
    }
}
