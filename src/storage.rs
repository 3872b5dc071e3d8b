use crate::error::{CoachError, CoachResult};
use crate::models::{
    ChatMessage, ChatRole, ExperienceLevel, LogEntry, LogType, NewProfile, Profile, ProfileUpdate,
    WeightPoint, DEFAULT_GOAL,
};
use anyhow::Context;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_PROFILE_NAME: &str = "Default";

// Define the database schema using CREATE TABLE IF NOT EXISTS statements
const MIGRATIONS_SQL: &str = "
-- Profiles Table
CREATE TABLE IF NOT EXISTS user_profile (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL,
    goal TEXT NOT NULL DEFAULT 'General Fitness',
    experience TEXT NOT NULL DEFAULT 'Beginner',
    age INTEGER,
    sex TEXT,
    height_cm REAL,
    weight_kg REAL,
    activity_level TEXT,
    dietary_notes TEXT,
    equipment TEXT,
    notes TEXT,
    created_at INTEGER NOT NULL -- Unix Timestamp (milliseconds)
);

-- Chat History Table
CREATE TABLE IF NOT EXISTS chat_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id INTEGER NOT NULL,
    role TEXT NOT NULL, -- 'user', 'assistant' or 'system'
    content TEXT NOT NULL,
    timestamp INTEGER NOT NULL, -- Unix Timestamp (milliseconds)
    FOREIGN KEY (profile_id) REFERENCES user_profile(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_chat_history_profile_id ON chat_history(profile_id);

-- Activity Log Table
CREATE TABLE IF NOT EXISTS workout_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id INTEGER NOT NULL,
    log_type TEXT NOT NULL, -- 'Workout', 'Weight' or 'Note'
    note TEXT NOT NULL DEFAULT '',
    weight_kg REAL, -- only set for 'Weight' rows
    timestamp INTEGER NOT NULL, -- Unix Timestamp (milliseconds)
    FOREIGN KEY (profile_id) REFERENCES user_profile(id) ON DELETE CASCADE,
    CHECK ((log_type = 'Weight') = (weight_kg IS NOT NULL))
);
CREATE INDEX IF NOT EXISTS idx_workout_log_profile_id ON workout_log(profile_id);
";

const PROFILE_COLUMNS: &str = "id, name, goal, experience, age, sex, height_cm, weight_kg, \
     activity_level, dietary_notes, equipment, notes, created_at";

/// SQLite-backed persistence for profiles, chat history and activity logs.
#[derive(Debug, Clone)]
pub struct StorageManager {
    pool: SqlitePool,
}

impl StorageManager {
    /// Opens (creating if needed) the database file at `path` and ensures the schema.
    pub async fn open(path: &Path) -> Result<Self, anyhow::Error> {
        // Ensure the parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }
        log::info!("Connecting to database: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let storage = Self::connect(options).await?;
        storage.init().await?;
        Ok(storage)
    }

    /// A private in-memory database with the schema in place.
    pub async fn in_memory() -> Result<Self, anyhow::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database URL")?
            .foreign_keys(true);
        let storage = Self::connect(options).await?;
        storage.init().await?;
        Ok(storage)
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self, anyhow::Error> {
        // One long-lived connection: the app has a single writer, and an
        // in-memory database only lives as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;
        Ok(Self { pool })
    }

    /// Creates any missing tables and seeds the default profile. Safe to call on every start.
    pub async fn init(&self) -> Result<(), anyhow::Error> {
        log::info!("Running database migrations...");
        sqlx::query(MIGRATIONS_SQL)
            .execute(&self.pool)
            .await
            .context("Failed to run database migrations")?;

        let seeded = sqlx::query(
            r#"
            INSERT INTO user_profile (name, goal, experience, created_at)
            SELECT ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM user_profile)
            "#,
        )
        .bind(DEFAULT_PROFILE_NAME)
        .bind(DEFAULT_GOAL)
        .bind(ExperienceLevel::default().as_str())
        .bind(now().timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to seed default profile")?;

        if seeded.rows_affected() > 0 {
            log::info!("No profiles found, created '{}'", DEFAULT_PROFILE_NAME);
        }
        log::info!("Database migrations completed.");
        Ok(())
    }

    // --- Profiles ---

    pub async fn create_profile(&self, fields: NewProfile) -> CoachResult<Profile> {
        let mut profile = fields.into_profile(now());
        profile.validate()?;
        log::info!("Creating profile '{}'", profile.name);

        let result = sqlx::query(
            r#"
            INSERT INTO user_profile (name, goal, experience, age, sex, height_cm, weight_kg,
                                      activity_level, dietary_notes, equipment, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.name)
        .bind(&profile.goal)
        .bind(profile.experience.as_str())
        .bind(profile.age.map(i64::from))
        .bind(&profile.sex)
        .bind(profile.height_cm)
        .bind(profile.weight_kg)
        .bind(&profile.activity_level)
        .bind(&profile.dietary_notes)
        .bind(&profile.equipment)
        .bind(&profile.notes)
        .bind(profile.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| profile_write_error(e, &profile.name, "Failed to insert profile"))?;

        profile.id = result.last_insert_rowid();
        log::info!("Created profile '{}' with ID: {}", profile.name, profile.id);
        Ok(profile)
    }

    pub async fn get_profile(&self, id: i64) -> CoachResult<Profile> {
        log::debug!("Fetching profile {}", id);
        let row = sqlx::query(&format!("SELECT {PROFILE_COLUMNS} FROM user_profile WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch profile from database")?;

        match row {
            Some(row) => Ok(profile_from_row(&row)?),
            None => Err(CoachError::NotFound(id)),
        }
    }

    /// Fetches all profiles, ordered by id.
    pub async fn list_profiles(&self) -> CoachResult<Vec<Profile>> {
        log::debug!("Fetching all profiles from database");
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profile ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch profiles from database")?;

        let profiles = rows
            .iter()
            .map(profile_from_row)
            .collect::<Result<Vec<Profile>, anyhow::Error>>()?;
        log::debug!("Fetched {} profiles", profiles.len());
        Ok(profiles)
    }

    pub async fn count_profiles(&self) -> CoachResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_profile")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count profiles")?;
        Ok(count)
    }

    /// Applies the given fields to a stored profile and returns the result.
    pub async fn update_profile(&self, id: i64, fields: ProfileUpdate) -> CoachResult<Profile> {
        let mut profile = self.get_profile(id).await?;
        if fields.is_empty() {
            log::debug!("Empty update for profile {}, nothing to do", id);
            return Ok(profile);
        }
        fields.apply(&mut profile);
        profile.validate()?;
        log::info!("Updating profile {} ('{}')", id, profile.name);

        let result = sqlx::query(
            r#"
            UPDATE user_profile
            SET name = ?, goal = ?, experience = ?, age = ?, sex = ?, height_cm = ?, weight_kg = ?,
                activity_level = ?, dietary_notes = ?, equipment = ?, notes = ?
            WHERE id = ?
            "#,
        )
        .bind(&profile.name)
        .bind(&profile.goal)
        .bind(profile.experience.as_str())
        .bind(profile.age.map(i64::from))
        .bind(&profile.sex)
        .bind(profile.height_cm)
        .bind(profile.weight_kg)
        .bind(&profile.activity_level)
        .bind(&profile.dietary_notes)
        .bind(&profile.equipment)
        .bind(&profile.notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| profile_write_error(e, &profile.name, "Failed to update profile"))?;

        if result.rows_affected() == 0 {
            log::warn!("Attempted to update non-existent profile: {}", id);
            return Err(CoachError::NotFound(id));
        }
        Ok(profile)
    }

    /// Deletes a profile together with its chat history and log entries.
    /// The last remaining profile cannot be deleted.
    pub async fn delete_profile(&self, id: i64) -> CoachResult<()> {
        log::warn!("Deleting profile with ID: {}", id);
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM user_profile WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to look up profile")?;
        if exists.is_none() {
            log::warn!("Attempted to delete non-existent profile: {}", id);
            return Err(CoachError::NotFound(id));
        }

        let remaining = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_profile")
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count profiles")?;
        if remaining <= 1 {
            log::warn!("Refusing to delete profile {}: it is the last one", id);
            return Err(last_profile_error());
        }

        let messages = sqlx::query("DELETE FROM chat_history WHERE profile_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete chat history")?
            .rows_affected();
        let logs = sqlx::query("DELETE FROM workout_log WHERE profile_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete log entries")?
            .rows_affected();
        sqlx::query("DELETE FROM user_profile WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete profile")?;

        tx.commit().await.context("Failed to commit profile deletion")?;
        log::info!(
            "Deleted profile {} with {} messages and {} log entries",
            id,
            messages,
            logs
        );
        Ok(())
    }

    // --- Chat history ---

    pub async fn append_message(
        &self,
        profile_id: i64,
        role: ChatRole,
        content: &str,
    ) -> CoachResult<ChatMessage> {
        log::debug!("Saving {} message for profile {}", role, profile_id);

        // Never earlier than the profile's latest message, so a clock step
        // backwards cannot reorder the history
        let row = sqlx::query(
            r#"
            INSERT INTO chat_history (profile_id, role, content, timestamp)
            SELECT ?, ?, ?, MAX(?, COALESCE(
                (SELECT MAX(timestamp) FROM chat_history WHERE profile_id = ?), 0))
            RETURNING id, timestamp
            "#,
        )
        .bind(profile_id)
        .bind(role.as_str())
        .bind(content)
        .bind(now().timestamp_millis())
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| child_write_error(e, profile_id, "Failed to insert message into database"))?;
        let millis: i64 = row.try_get("timestamp").context("Failed to read message timestamp")?;
        let timestamp = from_millis(millis)?;

        Ok(ChatMessage {
            id: row.try_get("id").context("Failed to read message id")?,
            profile_id,
            role,
            content: content.to_string(),
            timestamp,
        })
    }

    /// Fetches a profile's messages in the order they were written.
    pub async fn list_messages(&self, profile_id: i64) -> CoachResult<Vec<ChatMessage>> {
        log::debug!("Fetching messages for profile {}", profile_id);
        let rows = sqlx::query(
            r#"
            SELECT id, profile_id, role, content, timestamp
            FROM chat_history
            WHERE profile_id = ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch messages from database")?;

        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<ChatMessage>, anyhow::Error>>()?;
        log::debug!("Fetched {} messages for profile {}", messages.len(), profile_id);
        Ok(messages)
    }

    pub async fn clear_messages(&self, profile_id: i64) -> CoachResult<u64> {
        log::warn!("Clearing chat history for profile {}", profile_id);
        let removed = sqlx::query("DELETE FROM chat_history WHERE profile_id = ?")
            .bind(profile_id)
            .execute(&self.pool)
            .await
            .context("Failed to clear chat history")?
            .rows_affected();
        Ok(removed)
    }

    // --- Activity log ---

    pub async fn append_log(
        &self,
        profile_id: i64,
        log_type: LogType,
        note: &str,
        weight_kg: Option<f64>,
    ) -> CoachResult<LogEntry> {
        log_type.check_weight(weight_kg)?;
        let note = note.trim();
        log::info!("Logging {} entry for profile {}", log_type, profile_id);

        // Same clamp as chat messages: entries never predate the latest one
        let row = sqlx::query(
            r#"
            INSERT INTO workout_log (profile_id, log_type, note, weight_kg, timestamp)
            SELECT ?, ?, ?, ?, MAX(?, COALESCE(
                (SELECT MAX(timestamp) FROM workout_log WHERE profile_id = ?), 0))
            RETURNING id, timestamp
            "#,
        )
        .bind(profile_id)
        .bind(log_type.as_str())
        .bind(note)
        .bind(weight_kg)
        .bind(now().timestamp_millis())
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| child_write_error(e, profile_id, "Failed to insert log entry"))?;
        let millis: i64 = row.try_get("timestamp").context("Failed to read log timestamp")?;
        let timestamp = from_millis(millis)?;

        Ok(LogEntry {
            id: row.try_get("id").context("Failed to read log entry id")?,
            profile_id,
            log_type,
            note: note.to_string(),
            weight_kg,
            timestamp,
        })
    }

    /// Newest entries first; `None` returns the whole log.
    pub async fn list_logs(
        &self,
        profile_id: i64,
        limit: Option<u32>,
    ) -> CoachResult<Vec<LogEntry>> {
        log::debug!("Fetching logs for profile {} (limit {:?})", profile_id, limit);
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(i64::from).unwrap_or(-1);
        let rows = sqlx::query(
            r#"
            SELECT id, profile_id, log_type, note, weight_kg, timestamp
            FROM workout_log
            WHERE profile_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(profile_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch log entries from database")?;

        let logs = rows
            .iter()
            .map(log_from_row)
            .collect::<Result<Vec<LogEntry>, anyhow::Error>>()?;
        Ok(logs)
    }

    /// Weigh-ins in chronological order.
    pub async fn list_weights(&self, profile_id: i64) -> CoachResult<Vec<WeightPoint>> {
        log::debug!("Fetching weight history for profile {}", profile_id);
        let rows = sqlx::query(
            r#"
            SELECT timestamp, weight_kg
            FROM workout_log
            WHERE profile_id = ? AND weight_kg IS NOT NULL
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch weight history from database")?;

        let points = rows
            .iter()
            .map(|row| -> Result<WeightPoint, anyhow::Error> {
                Ok(WeightPoint {
                    timestamp: from_millis(row.try_get("timestamp")?)?,
                    weight_kg: row.try_get("weight_kg")?,
                })
            })
            .collect::<Result<Vec<WeightPoint>, anyhow::Error>>()?;
        Ok(points)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn last_profile_error() -> CoachError {
    CoachError::Policy("Cannot delete the last profile.".to_string())
}

// Millisecond precision so a value read back equals the value written
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, anyhow::Error> {
    DateTime::from_timestamp_millis(ms).context("Invalid timestamp")
}

fn profile_write_error(err: sqlx::Error, name: &str, what: &'static str) -> CoachError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CoachError::validation(format!("A profile named '{name}' already exists."))
        }
        _ => anyhow::Error::from(err).context(what).into(),
    }
}

fn child_write_error(err: sqlx::Error, profile_id: i64, what: &'static str) -> CoachError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            CoachError::NotFound(profile_id)
        }
        _ => anyhow::Error::from(err).context(what).into(),
    }
}

fn profile_from_row(row: &SqliteRow) -> Result<Profile, anyhow::Error> {
    let experience: String = row.try_get("experience")?;
    let age: Option<i64> = row.try_get("age")?;
    Ok(Profile {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        goal: row.try_get("goal")?,
        experience: experience
            .parse::<ExperienceLevel>()
            .context("Failed to parse experience level")?,
        age: age
            .map(u32::try_from)
            .transpose()
            .context("Stored age out of range")?,
        sex: row.try_get("sex")?,
        height_cm: row.try_get("height_cm")?,
        weight_kg: row.try_get("weight_kg")?,
        activity_level: row.try_get("activity_level")?,
        dietary_notes: row.try_get("dietary_notes")?,
        equipment: row.try_get("equipment")?,
        notes: row.try_get("notes")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<ChatMessage, anyhow::Error> {
    let role: String = row.try_get("role")?;
    Ok(ChatMessage {
        id: row.try_get("id")?,
        profile_id: row.try_get("profile_id")?,
        role: role.parse::<ChatRole>().context("Failed to parse message role")?,
        content: row.try_get("content")?,
        timestamp: from_millis(row.try_get("timestamp")?)?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<LogEntry, anyhow::Error> {
    let log_type: String = row.try_get("log_type")?;
    Ok(LogEntry {
        id: row.try_get("id")?,
        profile_id: row.try_get("profile_id")?,
        log_type: log_type.parse::<LogType>().context("Failed to parse log type")?,
        note: row.try_get("note")?,
        weight_kg: row.try_get("weight_kg")?,
        timestamp: from_millis(row.try_get("timestamp")?)?,
    })
}
