//! Core types shared by the roster, scraping, import and store subsystems

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// External identifier of a leader or member (e.g. a register person ID)
pub type PersonId = String;

/// Internal database ID of a country
pub type CountryId = i32;

// ============================================================================
// Roster
// ============================================================================

/// A department and its people, as listed in one roster file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    /// Display name
    pub name: String,
    /// Unique abbreviation (natural key)
    pub abbreviation: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Leaders in roster order
    #[serde(default)]
    pub leaders: Vec<Leader>,
    /// Members in roster order
    #[serde(default)]
    pub members: Vec<Member>,
}

/// A department leader whose meetings are published on the listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leader {
    pub id: Option<PersonId>,
    pub name: String,
    #[serde(default)]
    pub role: String,
    /// ISO 3166-1 alpha-2 code
    #[serde(default)]
    pub country: String,
    /// Listing host for meetings the leader attended
    #[serde(default)]
    pub leader_host_id: String,
    /// Listing host for meetings attended by the leader's members
    #[serde(default)]
    pub member_host_id: String,
}

/// A member of a department (cabinet staff)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Option<PersonId>,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
}

/// A role a member holds under a given leader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub leader: Option<PersonId>,
    pub role: String,
}

// ============================================================================
// Meetings
// ============================================================================

/// Lobbying register entity referenced by a meeting
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// Register identification code (`NNNN-NN`)
    Registered(String),
    /// The participant is not in the register
    Unregistered,
}

impl EntityRef {
    /// Sentinel stored for entities missing from the register
    pub const UNREGISTERED: &'static str = "Unregistered";

    pub fn as_str(&self) -> &str {
        match self {
            EntityRef::Registered(id) => id,
            EntityRef::Unregistered => Self::UNREGISTERED,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who attended a meeting, depending on which listing produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participants {
    /// By-leader listing: the leader whose host was scraped
    Leader(PersonId),
    /// By-member listing: the roster members the names resolved to
    Members(Vec<PersonId>),
}

/// A meeting row extracted from a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    pub date: Option<NaiveDate>,
    pub cancelled: bool,
    pub location: String,
    pub subject: String,
    pub entities: Vec<EntityRef>,
    pub participants: Participants,
}

// ============================================================================
// Organizations
// ============================================================================

/// An organization from the register's bulk export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Register identification code (natural key)
    pub identification_code: String,
    /// Original (untranslated) name
    pub name: String,
    /// Country as written in the export
    pub country_name: String,
    /// Resolved country ID, `None` when the name is not in the lookup table
    pub country_id: Option<CountryId>,
    pub legal_status: String,
    pub registered_at: DateTime<Utc>,
    /// Authority for conflict resolution in the store
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Countries
// ============================================================================

/// Read-only snapshot of the country lookup tables, taken once per run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryTables {
    /// ISO alpha-2 code → country ID (roster leaders)
    pub by_code: HashMap<String, CountryId>,
    /// Display name → country ID (export organizations)
    pub by_name: HashMap<String, CountryId>,
}

impl CountryTables {
    pub fn new(by_code: HashMap<String, CountryId>, by_name: HashMap<String, CountryId>) -> Self {
        Self { by_code, by_name }
    }

    pub fn id_for_code(&self, code: &str) -> Option<CountryId> {
        self.by_code.get(code.trim()).copied()
    }

    pub fn id_for_name(&self, name: &str) -> Option<CountryId> {
        self.by_name.get(name.trim()).copied()
    }
}
