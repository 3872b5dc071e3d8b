use crate::error::CoachResult;
use crate::models::{NewProfile, Profile, ProfileUpdate};
use crate::storage::{last_profile_error, StorageManager};
use serde::Serialize;
use std::fmt;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    fn from_value(bmi: f64) -> Self {
        if bmi < 18.5 {
            Self::Underweight
        } else if bmi < 25.0 {
            Self::Normal
        } else if bmi < 30.0 {
            Self::Overweight
        } else {
            Self::Obese
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Underweight => "Underweight",
            Self::Normal => "Normal weight",
            Self::Overweight => "Overweight",
            Self::Obese => "Obese",
        })
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Bmi {
    Available { value: f64, category: BmiCategory },
    Unavailable,
}

impl Bmi {
    /// The value rounded to one decimal place, as shown to users.
    pub fn rounded(&self) -> Option<f64> {
        match self {
            Self::Available { value, .. } => Some((value * 10.0).round() / 10.0),
            Self::Unavailable => None,
        }
    }
}

impl fmt::Display for Bmi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available { value, category } => write!(f, "{value:.1} ({category})"),
            Self::Unavailable => f.write_str("Enter valid height and weight"),
        }
    }
}

/// weight / height², with height given in centimetres.
pub fn compute_bmi(height_cm: Option<f64>, weight_kg: Option<f64>) -> Bmi {
    match (height_cm, weight_kg) {
        (Some(h), Some(w)) if h.is_finite() && w.is_finite() && h > 0.0 && w > 0.0 => {
            let height_m = h / 100.0;
            let value = w / (height_m * height_m);
            Bmi::Available {
                value,
                category: BmiCategory::from_value(value),
            }
        }
        _ => Bmi::Unavailable,
    }
}

/// Profile CRUD plus the derived views the presentation layer shows.
#[derive(Clone)]
pub struct ProfileManager {
    storage: StorageManager,
}

impl ProfileManager {
    pub fn new(storage: StorageManager) -> Self {
        Self { storage }
    }

    pub async fn list(&self) -> CoachResult<Vec<Profile>> {
        self.storage.list_profiles().await
    }

    pub async fn get(&self, id: i64) -> CoachResult<Profile> {
        self.storage.get_profile(id).await
    }

    pub async fn create(&self, fields: NewProfile) -> CoachResult<Profile> {
        self.storage.create_profile(fields).await
    }

    pub async fn update(&self, id: i64, fields: ProfileUpdate) -> CoachResult<Profile> {
        self.storage.update_profile(id, fields).await
    }

    /// Deletes a profile and everything it owns. At least one profile must remain.
    pub async fn delete(&self, id: i64) -> CoachResult<()> {
        // An unknown id is NotFound even when only one profile remains
        self.storage.get_profile(id).await?;
        if self.storage.count_profiles().await? <= 1 {
            log::warn!("Rejected delete of profile {}: last remaining profile", id);
            return Err(last_profile_error());
        }
        self.storage.delete_profile(id).await
    }

    pub async fn bmi(&self, id: i64) -> CoachResult<Bmi> {
        let profile = self.get(id).await?;
        Ok(compute_bmi(profile.height_cm, profile.weight_kg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(height_cm: f64, weight_kg: f64) -> BmiCategory {
        match compute_bmi(Some(height_cm), Some(weight_kg)) {
            Bmi::Available { category, .. } => category,
            Bmi::Unavailable => panic!("expected a BMI for {height_cm} cm / {weight_kg} kg"),
        }
    }

    #[test]
    fn computes_value_from_centimetres() {
        let bmi = compute_bmi(Some(180.0), Some(90.0));
        assert_eq!(bmi.rounded(), Some(27.8));
        assert_eq!(bmi.to_string(), "27.8 (Overweight)");
    }

    #[test]
    fn category_boundaries_are_inclusive_on_the_lower_edge() {
        // 1 m tall makes the BMI equal to the weight
        assert_eq!(category(100.0, 18.4), BmiCategory::Underweight);
        assert_eq!(category(100.0, 18.5), BmiCategory::Normal);
        assert_eq!(category(100.0, 24.95), BmiCategory::Normal);
        assert_eq!(category(100.0, 25.0), BmiCategory::Overweight);
        assert_eq!(category(100.0, 29.99), BmiCategory::Overweight);
        assert_eq!(category(100.0, 30.0), BmiCategory::Obese);
    }

    #[test]
    fn monotonic_in_weight_for_fixed_height() {
        let mut previous = 0.0;
        for tenth in 300_u32..1500 {
            let weight = f64::from(tenth) / 10.0;
            let Bmi::Available { value, .. } = compute_bmi(Some(172.0), Some(weight)) else {
                panic!("height and weight are valid");
            };
            assert!(value > previous);
            previous = value;
        }
    }

    #[test]
    fn missing_or_non_positive_inputs_are_unavailable() {
        assert_eq!(compute_bmi(None, Some(70.0)), Bmi::Unavailable);
        assert_eq!(compute_bmi(Some(170.0), None), Bmi::Unavailable);
        assert_eq!(compute_bmi(Some(0.0), Some(70.0)), Bmi::Unavailable);
        assert_eq!(compute_bmi(Some(170.0), Some(-1.0)), Bmi::Unavailable);
        assert_eq!(compute_bmi(Some(f64::NAN), Some(70.0)), Bmi::Unavailable);
        assert_eq!(Bmi::Unavailable.rounded(), None);
    }
}
