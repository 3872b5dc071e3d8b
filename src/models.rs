use crate::error::{CoachError, CoachResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_GOAL: &str = "General Fitness";
pub const MIN_AGE: u32 = 10;
pub const MAX_AGE: u32 = 120;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperienceLevel {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(CoachError::validation(format!("unknown experience level '{other}'"))),
        }
    }
}

// Who authored a chat message
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatRole {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(CoachError::validation(format!("unknown chat role '{other}'"))),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogType {
    Workout,
    Weight,
    Note,
}

impl LogType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workout => "Workout",
            Self::Weight => "Weight",
            Self::Note => "Note",
        }
    }

    /// Weight entries must carry a positive weight; other entries carry none.
    pub fn check_weight(self, weight_kg: Option<f64>) -> CoachResult<()> {
        match (self, weight_kg) {
            (Self::Weight, None) => {
                Err(CoachError::validation("a weight entry needs a weight value"))
            }
            (Self::Weight, Some(w)) if !w.is_finite() || w <= 0.0 => {
                Err(CoachError::validation("weight must be a positive number"))
            }
            (Self::Workout | Self::Note, Some(_)) => Err(CoachError::validation(format!(
                "{self} entries cannot carry a weight value"
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogType {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "workout" => Ok(Self::Workout),
            "weight" | "weigh-in" => Ok(Self::Weight),
            "note" => Ok(Self::Note),
            other => Err(CoachError::validation(format!("unknown log type '{other}'"))),
        }
    }
}

/// A named user configuration: goals, biometrics and preferences.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub goal: String,
    pub experience: ExperienceLevel,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<String>,
    pub dietary_notes: Option<String>,
    pub equipment: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Checks every field invariant. Called before any write.
    pub fn validate(&self) -> CoachResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoachError::validation("profile name cannot be empty"));
        }
        if self.goal.trim().is_empty() {
            return Err(CoachError::validation("fitness goal cannot be empty"));
        }
        if let Some(age) = self.age {
            if !(MIN_AGE..=MAX_AGE).contains(&age) {
                return Err(CoachError::validation(format!(
                    "age must be between {MIN_AGE} and {MAX_AGE}, got {age}"
                )));
            }
        }
        for (label, value) in [("height", self.height_cm), ("weight", self.weight_kg)] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    let message = format!("{label} must be a positive number");
                    return Err(CoachError::validation(message));
                }
            }
        }
        Ok(())
    }
}

/// Fields for a new profile. Everything except the name has a default.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NewProfile {
    pub name: String,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub experience: Option<ExperienceLevel>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub activity_level: Option<String>,
    #[serde(default)]
    pub dietary_notes: Option<String>,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builds the profile row this request describes (id 0 until inserted).
    pub fn into_profile(self, created_at: DateTime<Utc>) -> Profile {
        Profile {
            id: 0,
            name: self.name.trim().to_string(),
            goal: self
                .goal
                .map(|g| g.trim().to_string())
                .unwrap_or_else(|| DEFAULT_GOAL.to_string()),
            experience: self.experience.unwrap_or_default(),
            age: self.age,
            sex: clean_text(self.sex),
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            activity_level: clean_text(self.activity_level),
            dietary_notes: clean_text(self.dietary_notes),
            equipment: clean_text(self.equipment),
            notes: clean_text(self.notes),
            created_at,
        }
    }
}

/// A partial profile update. `None` leaves a field untouched; for optional
/// attributes `Some(None)` clears the stored value.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub experience: Option<ExperienceLevel>,
    pub age: Option<Option<u32>>,
    pub sex: Option<Option<String>>,
    pub height_cm: Option<Option<f64>>,
    pub weight_kg: Option<Option<f64>>,
    pub activity_level: Option<Option<String>>,
    pub dietary_notes: Option<Option<String>>,
    pub equipment: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.goal.is_none()
            && self.experience.is_none()
            && self.age.is_none()
            && self.sex.is_none()
            && self.height_cm.is_none()
            && self.weight_kg.is_none()
            && self.activity_level.is_none()
            && self.dietary_notes.is_none()
            && self.equipment.is_none()
            && self.notes.is_none()
    }

    pub fn apply(self, profile: &mut Profile) {
        if let Some(name) = self.name {
            profile.name = name.trim().to_string();
        }
        if let Some(goal) = self.goal {
            profile.goal = goal.trim().to_string();
        }
        if let Some(experience) = self.experience {
            profile.experience = experience;
        }
        if let Some(age) = self.age {
            profile.age = age;
        }
        if let Some(sex) = self.sex {
            profile.sex = clean_text(sex);
        }
        if let Some(height) = self.height_cm {
            profile.height_cm = height;
        }
        if let Some(weight) = self.weight_kg {
            profile.weight_kg = weight;
        }
        if let Some(activity) = self.activity_level {
            profile.activity_level = clean_text(activity);
        }
        if let Some(diet) = self.dietary_notes {
            profile.dietary_notes = clean_text(diet);
        }
        if let Some(equipment) = self.equipment {
            profile.equipment = clean_text(equipment);
        }
        if let Some(notes) = self.notes {
            profile.notes = clean_text(notes);
        }
    }
}

// Blank free text is stored as NULL
fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Represents a single message in a profile's conversation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    pub profile_id: i64,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub id: i64,
    pub profile_id: i64,
    pub log_type: LogType,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// One point of the weight chart.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct WeightPoint {
    pub timestamp: DateTime<Utc>,
    pub weight_kg: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_type_accepts_weigh_in_alias() {
        assert_eq!("Weigh-in".parse::<LogType>().unwrap(), LogType::Weight);
        assert_eq!("workout".parse::<LogType>().unwrap(), LogType::Workout);
        assert!("run".parse::<LogType>().is_err());
    }

    #[test]
    fn new_profile_fills_defaults_and_drops_blank_text() {
        let mut request = NewProfile::named("  Alice ");
        request.equipment = Some("   ".into());
        let profile = request.into_profile(Utc::now());
        assert_eq!(profile.name, "Alice");
        assert_eq!(profile.goal, DEFAULT_GOAL);
        assert_eq!(profile.experience, ExperienceLevel::Beginner);
        assert_eq!(profile.equipment, None);
    }

    #[test]
    fn update_clears_and_sets_fields() {
        let mut profile = NewProfile {
            name: "Bob".into(),
            height_cm: Some(180.0),
            notes: Some("bad knee".into()),
            ..NewProfile::default()
        }
        .into_profile(Utc::now());

        ProfileUpdate {
            notes: Some(None),
            weight_kg: Some(Some(82.5)),
            ..ProfileUpdate::default()
        }
        .apply(&mut profile);

        assert_eq!(profile.notes, None);
        assert_eq!(profile.weight_kg, Some(82.5));
        assert_eq!(profile.height_cm, Some(180.0));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut profile = NewProfile::named("Cara").into_profile(Utc::now());
        assert!(profile.validate().is_ok());

        profile.age = Some(5);
        assert!(matches!(profile.validate(), Err(CoachError::Validation(_))));

        profile.age = Some(30);
        profile.height_cm = Some(0.0);
        assert!(matches!(profile.validate(), Err(CoachError::Validation(_))));

        profile.height_cm = None;
        profile.goal = " ".into();
        assert!(matches!(profile.validate(), Err(CoachError::Validation(_))));
    }
}
