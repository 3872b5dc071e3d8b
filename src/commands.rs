// Commands exposed to the presentation layer. Each one logs the request and
// turns component errors into messages fit to show the user.

use crate::error::{CoachError, ErrorKind};
use crate::models::{
    ChatMessage, LogEntry, LogType, NewProfile, Profile, ProfileUpdate, WeightPoint,
};
use crate::profile::Bmi;
use crate::state::AppState;
use serde::Serialize;
use std::fmt;

/// A failed command as the user sees it.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
    /// True when resubmitting the same request may succeed.
    pub retryable: bool,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CommandError {}

impl From<CoachError> for CommandError {
    fn from(err: CoachError) -> Self {
        let message = match &err {
            CoachError::Service(e) => {
                format!("The coach is unavailable right now ({e}). Please try again.")
            }
            CoachError::Storage(_) => "Something went wrong while saving your data.".to_string(),
            other => other.to_string(),
        };
        Self {
            kind: err.kind(),
            retryable: err.is_retryable(),
            message,
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

fn report(action: &str, err: CoachError) -> CommandError {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::Policy | ErrorKind::NotFound => {
            log::warn!("{} rejected: {}", action, err)
        }
        ErrorKind::Service | ErrorKind::Storage => log::error!("{} failed: {:?}", action, err),
    }
    err.into()
}

// --- Profiles ---

pub async fn list_profiles(state: &AppState) -> CommandResult<Vec<Profile>> {
    log::info!("Requested to list profiles");
    state
        .profiles
        .list()
        .await
        .map_err(|e| report("Listing profiles", e))
}

/// A saved profile plus the outcome of the schedule request that followed it.
#[derive(Serialize, Clone, Debug)]
pub struct SavedProfile {
    pub profile: Profile,
    /// The new plan, when one was requested and generation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_error: Option<CommandError>,
}

impl SavedProfile {
    // A failed schedule never undoes the profile write
    async fn with_schedule(state: &AppState, profile: Profile, action: &str) -> Self {
        let (schedule, schedule_error) = match state.schedules.generate(profile.id).await {
            Ok(message) => (Some(message), None),
            Err(e) => (None, Some(report(action, e))),
        };
        Self {
            profile,
            schedule,
            schedule_error,
        }
    }
}

/// Creates a profile and then tries to generate its first schedule.
pub async fn create_profile(state: &AppState, fields: NewProfile) -> CommandResult<SavedProfile> {
    log::info!("Requested to create profile '{}'", fields.name);
    let profile = state
        .profiles
        .create(fields)
        .await
        .map_err(|e| report("Creating profile", e))?;
    Ok(SavedProfile::with_schedule(state, profile, "Generating starter schedule").await)
}

/// Applies `fields`; with `regenerate_schedule` a fresh plan is requested afterwards.
pub async fn update_profile(
    state: &AppState,
    profile_id: i64,
    fields: ProfileUpdate,
    regenerate_schedule: bool,
) -> CommandResult<SavedProfile> {
    log::info!("Requested to update profile {}", profile_id);
    let profile = state
        .profiles
        .update(profile_id, fields)
        .await
        .map_err(|e| report("Updating profile", e))?;

    if !regenerate_schedule {
        return Ok(SavedProfile {
            profile,
            schedule: None,
            schedule_error: None,
        });
    }
    Ok(SavedProfile::with_schedule(state, profile, "Regenerating schedule").await)
}

pub async fn delete_profile(state: &AppState, profile_id: i64) -> CommandResult<()> {
    log::warn!("Requested to delete profile {}", profile_id);
    state
        .profiles
        .delete(profile_id)
        .await
        .map_err(|e| report("Deleting profile", e))
}

pub async fn profile_bmi(state: &AppState, profile_id: i64) -> CommandResult<Bmi> {
    state
        .profiles
        .bmi(profile_id)
        .await
        .map_err(|e| report("Computing BMI", e))
}

// --- Chat ---

pub async fn open_chat(state: &AppState, profile_id: i64) -> CommandResult<Vec<ChatMessage>> {
    log::info!("Requested chat history for profile {}", profile_id);
    state
        .chat
        .open(profile_id)
        .await
        .map_err(|e| report("Loading chat history", e))
}

pub async fn send_message(
    state: &AppState,
    profile_id: i64,
    content: &str,
) -> CommandResult<ChatMessage> {
    log::info!("Requested to send a message for profile {}", profile_id);
    state
        .chat
        .send_user_message(profile_id, content)
        .await
        .map_err(|e| report("Sending message", e))
}

pub async fn clear_history(state: &AppState, profile_id: i64) -> CommandResult<ChatMessage> {
    log::warn!("Requested to clear chat history for profile {}", profile_id);
    state
        .chat
        .clear_history(profile_id)
        .await
        .map_err(|e| report("Clearing chat history", e))
}

pub async fn generate_schedule(state: &AppState, profile_id: i64) -> CommandResult<ChatMessage> {
    log::info!("Requested a new schedule for profile {}", profile_id);
    state
        .schedules
        .generate(profile_id)
        .await
        .map_err(|e| report("Generating schedule", e))
}

// --- Activity log ---

pub async fn log_activity(
    state: &AppState,
    profile_id: i64,
    log_type: LogType,
    note: &str,
    weight_kg: Option<f64>,
) -> CommandResult<LogEntry> {
    log::info!("Requested to log a {} entry for profile {}", log_type, profile_id);
    state
        .activity
        .log_activity(profile_id, log_type, note, weight_kg)
        .await
        .map_err(|e| report("Logging activity", e))
}

pub async fn recent_activity(
    state: &AppState,
    profile_id: i64,
    limit: u32,
) -> CommandResult<Vec<LogEntry>> {
    state
        .activity
        .recent_activity(profile_id, limit)
        .await
        .map_err(|e| report("Loading recent activity", e))
}

pub async fn weight_series(state: &AppState, profile_id: i64) -> CommandResult<Vec<WeightPoint>> {
    state
        .activity
        .weight_series(profile_id)
        .await
        .map_err(|e| report("Loading weight history", e))
}
