//! Rider profile shared by every segment's scoring.
//!
//! The accepted vocabularies follow what event organisers send: German licence classes
//! ("c-lizenz", "anfänger", "profi") as well as their English equivalents.

use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Experience / licence class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RiderType {
    #[default]
    #[serde(rename = "hobby")]
    Hobby,
    #[serde(rename = "c-lizenz", alias = "c-license")]
    LicenseC,
    #[serde(rename = "anfänger", alias = "beginner", alias = "novice")]
    Beginner,
    #[serde(rename = "a")]
    LicenseA,
    #[serde(rename = "b")]
    LicenseB,
    #[serde(rename = "elite")]
    Elite,
    #[serde(rename = "profi", alias = "pro")]
    Professional,
}

impl RiderType {
    /// Recreational riders and entry licences.
    pub fn is_novice(&self) -> bool {
        matches!(self, RiderType::Hobby | RiderType::LicenseC | RiderType::Beginner)
    }

    /// Upper licence classes and professionals.
    pub fn is_experienced(&self) -> bool {
        matches!(
            self,
            RiderType::LicenseA | RiderType::LicenseB | RiderType::Elite | RiderType::Professional
        )
    }
}

impl FromStr for RiderType {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hobby" => Ok(RiderType::Hobby),
            "c-lizenz" | "c-license" | "c" => Ok(RiderType::LicenseC),
            "anfänger" | "anfaenger" | "beginner" | "novice" => Ok(RiderType::Beginner),
            "a" => Ok(RiderType::LicenseA),
            "b" => Ok(RiderType::LicenseB),
            "elite" => Ok(RiderType::Elite),
            "profi" | "pro" | "professional" => Ok(RiderType::Professional),
            other => Err(RiskError::invalid(
                "rider_type",
                format!("unknown rider type '{}'", other),
            )),
        }
    }
}

/// Event discipline. Any discipline means a competitive event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceType {
    Downhill,
    Freeride,
    #[serde(rename = "rennen", alias = "race")]
    Race,
    Road,
    Mtb,
}

impl RaceType {
    /// Downhill and freeride: high speed, big drops.
    pub fn is_gravity(&self) -> bool {
        matches!(self, RaceType::Downhill | RaceType::Freeride)
    }

    /// Disciplines where body protectors are standard equipment.
    pub fn is_offroad(&self) -> bool {
        matches!(self, RaceType::Downhill | RaceType::Freeride | RaceType::Mtb)
    }

    /// Parse a discipline; the empty string means "no race".
    pub fn parse_optional(s: &str) -> Result<Option<Self>> {
        match s.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "downhill" => Ok(Some(RaceType::Downhill)),
            "freeride" => Ok(Some(RaceType::Freeride)),
            "rennen" | "race" => Ok(Some(RaceType::Race)),
            "road" => Ok(Some(RaceType::Road)),
            "mtb" => Ok(Some(RaceType::Mtb)),
            other => Err(RiskError::invalid(
                "race_type",
                format!("unknown race type '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[serde(alias = "m", alias = "mann")]
    Male,
    #[serde(alias = "w", alias = "frau")]
    Female,
    #[serde(alias = "divers", alias = "non-binary")]
    Diverse,
}

impl Gender {
    /// Parse a gender; the empty string means "not given".
    pub fn parse_optional(s: &str) -> Result<Option<Self>> {
        match s.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "m" | "mann" | "male" => Ok(Some(Gender::Male)),
            "w" | "frau" | "female" => Ok(Some(Gender::Female)),
            "divers" | "diverse" | "non-binary" => Ok(Some(Gender::Diverse)),
            other => Err(RiskError::invalid(
                "gender",
                format!("unknown gender '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameMaterial {
    Carbon,
    #[default]
    Aluminium,
    Steel,
}

impl FromStr for FrameMaterial {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "carbon" => Ok(FrameMaterial::Carbon),
            "aluminium" | "aluminum" => Ok(FrameMaterial::Aluminium),
            "steel" | "stahl" => Ok(FrameMaterial::Steel),
            other => Err(RiskError::invalid(
                "material",
                format!("unknown frame material '{}'", other),
            )),
        }
    }
}

/// Protective equipment worn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Equipment {
    pub helmet: bool,
    pub protectors: bool,
}

impl Default for Equipment {
    fn default() -> Self {
        Self {
            helmet: true,
            protectors: false,
        }
    }
}

/// Everything about the rider and event that scoring needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiderContext {
    pub rider_type: RiderType,
    /// Age in years
    pub age: u32,
    pub gender: Option<Gender>,
    /// `None` for recreational rides
    pub race_type: Option<RaceType>,
    pub equipment: Equipment,
    /// History of knee overuse injuries
    pub overuse_knee: bool,
    pub back_pain: bool,
    /// All riders start together
    pub mass_start: bool,
    /// Number of riders on course
    pub participants: u32,
    pub material: FrameMaterial,
}

impl Default for RiderContext {
    fn default() -> Self {
        Self {
            rider_type: RiderType::default(),
            age: 42,
            gender: None,
            race_type: None,
            equipment: Equipment::default(),
            overuse_knee: false,
            back_pain: false,
            mass_start: false,
            participants: 5,
            material: FrameMaterial::default(),
        }
    }
}

impl RiderContext {
    /// Parse a rider context from JSON, naming the problem on failure.
    pub fn from_json(json: &str) -> Result<Self> {
        let rider: Self = serde_json::from_str(json)
            .map_err(|e| RiskError::invalid("rider", e.to_string()))?;
        rider.validate()?;
        Ok(rider)
    }

    /// Reject values outside what the rules were written for.
    pub fn validate(&self) -> Result<()> {
        if !(1..=120).contains(&self.age) {
            return Err(RiskError::invalid(
                "age",
                format!("{} is outside 1..=120", self.age),
            ));
        }
        if self.participants == 0 {
            return Err(RiskError::invalid("participants", "must be at least 1"));
        }
        Ok(())
    }

    /// True when the rider takes part in any kind of race.
    pub fn is_competitive(&self) -> bool {
        self.race_type.is_some()
    }
}
