//! Part model: a component attached to a bike.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Fixed set of part categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartType {
    Chain,
    Cassette,
    Chainring,
    Tire,
    BrakePad,
}

impl PartType {
    pub const ALL: [PartType; 5] = [
        PartType::Chain,
        PartType::Cassette,
        PartType::Chainring,
        PartType::Tire,
        PartType::BrakePad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartType::Chain => "chain",
            PartType::Cassette => "cassette",
            PartType::Chainring => "chainring",
            PartType::Tire => "tire",
            PartType::BrakePad => "brake_pad",
        }
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown part type: {0}")]
pub struct UnknownPartType(pub String);

impl FromStr for PartType {
    type Err = UnknownPartType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownPartType(s.to_string()))
    }
}

impl TryFrom<String> for PartType {
    type Error = UnknownPartType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Stored part record.
#[derive(Debug, Clone, FromRow)]
pub struct Part {
    pub id: i64,
    /// Globally unique name
    pub name: String,
    #[sqlx(try_from = "String")]
    pub part_type: PartType,
    pub bike_id: String,
    pub starting_mileage: f64,
    pub current_mileage: f64,
    pub mileage_limit: f64,
}

/// Part as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct PartView {
    pub id: i64,
    pub name: String,
    pub part_type: PartType,
    pub bike_id: String,
    pub starting_mileage: f64,
    pub current_mileage: f64,
    pub mileage_limit: f64,
}

impl From<Part> for PartView {
    fn from(part: Part) -> Self {
        Self {
            id: part.id,
            name: part.name,
            part_type: part.part_type,
            bike_id: part.bike_id,
            starting_mileage: part.starting_mileage,
            current_mileage: part.current_mileage,
            mileage_limit: part.mileage_limit,
        }
    }
}
