use crate::error::{CoachError, CoachResult};
use crate::models::{LogEntry, LogType, WeightPoint};
use crate::storage::StorageManager;

pub const DEFAULT_RECENT_LIMIT: u32 = 10;

/// Workout, weigh-in and note logging for a profile.
#[derive(Clone)]
pub struct ActivityLogger {
    storage: StorageManager,
}

impl ActivityLogger {
    pub fn new(storage: StorageManager) -> Self {
        Self { storage }
    }

    pub async fn log_activity(
        &self,
        profile_id: i64,
        log_type: LogType,
        note: &str,
        weight_kg: Option<f64>,
    ) -> CoachResult<LogEntry> {
        log_type.check_weight(weight_kg)?;
        // A weigh-in may stand alone; other entries need some text
        if log_type != LogType::Weight && note.trim().is_empty() {
            return Err(CoachError::validation(format!(
                "{log_type} entries need some notes"
            )));
        }
        self.storage.get_profile(profile_id).await?;
        self.storage
            .append_log(profile_id, log_type, note, weight_kg)
            .await
    }

    /// The latest `limit` entries, newest first.
    pub async fn recent_activity(&self, profile_id: i64, limit: u32) -> CoachResult<Vec<LogEntry>> {
        self.storage.get_profile(profile_id).await?;
        self.storage.list_logs(profile_id, Some(limit)).await
    }

    /// Weigh-ins oldest first, ready for charting.
    pub async fn weight_series(&self, profile_id: i64) -> CoachResult<Vec<WeightPoint>> {
        self.storage.get_profile(profile_id).await?;
        self.storage.list_weights(profile_id).await
    }
}
