//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID kinds (e.g., using a
//! ContractId where a TrainId is expected) and make the code more
//! self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A train identifier as it appears in the log, e.g. `A123` or `Reg1024`.
///
/// One id names one physical run. The alphabetic prefix is the route family
/// and the digits group trains onto a contract; see
/// [`contract_key`](crate::parse::contract_key) for the derivation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainId(pub String);

impl TrainId {
    pub fn new(s: impl Into<String>) -> Self {
        TrainId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TrainId {
    fn from(s: String) -> Self {
        TrainId(s)
    }
}

impl From<&str> for TrainId {
    fn from(s: &str) -> Self {
        TrainId(s.to_string())
    }
}

/// The grouping key shared by all trains running the same route.
///
/// Usually the 3-digit suffix of the train id (`A123` → `123`); the `Reg`
/// family carries one extra disambiguating character (`Reg1024` → `1024`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(pub String);

impl ContractId {
    pub fn new(s: impl Into<String>) -> Self {
        ContractId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContractId {
    fn from(s: String) -> Self {
        ContractId(s)
    }
}

impl From<&str> for ContractId {
    fn from(s: &str) -> Self {
        ContractId(s.to_string())
    }
}

/// The route family token, i.e. the alphabetic prefix of a train id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractType(pub String);

impl ContractType {
    pub fn new(s: impl Into<String>) -> Self {
        ContractType(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContractType {
    fn from(s: &str) -> Self {
        ContractType(s.to_string())
    }
}
