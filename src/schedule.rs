use crate::api::{CompletionMessage, CompletionRequest, CompletionService};
use crate::chat::GenerationSettings;
use crate::error::{CoachResult, ServiceError};
use crate::models::{ChatMessage, ChatRole, Profile};
use crate::prompts::{SCHEDULE_FORMAT_INSTRUCTIONS, SCHEDULE_SYSTEM_PROMPT};
use crate::storage::StorageManager;
use serde::Serialize;
use std::sync::Arc;

pub const SCHEDULE_START: &str = "[SCHEDULE_START]";
pub const SCHEDULE_END: &str = "[SCHEDULE_END]";
const SCHEDULE_HEADING: &str = "**📅 Here is a sample 4-week schedule based on your profile:**";

/// Builds the plan request for `profile`.
pub fn schedule_prompt(profile: &Profile) -> String {
    let or = |value: &Option<String>, fallback: &str| {
        value.clone().unwrap_or_else(|| fallback.to_string())
    };
    format!(
        "Create a detailed 4-week fitness schedule tailored for a user \
         with the following profile:\n\
         - Goal: {goal}\n\
         - Experience Level: {experience}\n\
         - Age: {age}\n\
         - Sex: {sex}\n\
         - Activity Level: {activity}\n\
         - Available Equipment: {equipment}\n\
         - General Notes: {notes}\n\n\
         {SCHEDULE_FORMAT_INSTRUCTIONS}",
        goal = profile.goal,
        experience = profile.experience,
        age = profile
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "Not specified".to_string()),
        sex = or(&profile.sex, "Not specified"),
        activity = or(&profile.activity_level, "Not specified"),
        equipment = or(&profile.equipment, "Basic bodyweight/home equipment"),
        notes = or(&profile.notes, "None"),
    )
}

/// The message text stored for a generated plan.
pub fn wrap_schedule(plan: &str) -> String {
    format!("{SCHEDULE_HEADING}\n{SCHEDULE_START}\n{}\n{SCHEDULE_END}", plan.trim())
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ScheduleWeek {
    pub title: String,
    pub body: String,
}

/// A stored plan split for display.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Schedule {
    /// Anything the model wrote before the first week heading.
    pub intro: String,
    pub weeks: Vec<ScheduleWeek>,
}

/// Extracts the plan between the schedule markers and splits it on
/// `## Week` headings. Returns `None` for ordinary chat messages.
pub fn parse_schedule(content: &str) -> Option<Schedule> {
    let start = content.find(SCHEDULE_START)? + SCHEDULE_START.len();
    let end = content[start..].find(SCHEDULE_END).map_or(content.len(), |i| start + i);
    let plan = &content[start..end];

    let mut intro = String::new();
    let mut weeks: Vec<ScheduleWeek> = Vec::new();
    for line in plan.lines() {
        let heading = line.trim_start();
        let week = heading
            .strip_prefix("## ")
            .filter(|t| t.trim_start().starts_with("Week"));
        if let Some(title) = week {
            weeks.push(ScheduleWeek {
                title: title.trim().to_string(),
                body: String::new(),
            });
            continue;
        }
        let target = match weeks.last_mut() {
            Some(week) => &mut week.body,
            None => &mut intro,
        };
        target.push_str(line);
        target.push('\n');
    }

    for week in &mut weeks {
        week.body = week.body.trim().to_string();
    }
    Some(Schedule {
        intro: intro.trim().to_string(),
        weeks,
    })
}

/// Asks the completion service for a 4-week plan and files it in the chat history.
#[derive(Clone)]
pub struct ScheduleGenerator {
    storage: StorageManager,
    completion: Arc<dyn CompletionService>,
    settings: GenerationSettings,
}

impl ScheduleGenerator {
    pub fn new(
        storage: StorageManager,
        completion: Arc<dyn CompletionService>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            storage,
            completion,
            settings,
        }
    }

    pub async fn generate(&self, profile_id: i64) -> CoachResult<ChatMessage> {
        let profile = self.storage.get_profile(profile_id).await?;
        log::info!("Generating schedule for profile {} ('{}')", profile_id, profile.name);

        let request = CompletionRequest {
            messages: vec![
                CompletionMessage::new(ChatRole::System, SCHEDULE_SYSTEM_PROMPT),
                CompletionMessage::new(ChatRole::User, schedule_prompt(&profile)),
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream: false,
        };

        let plan = self.completion.complete(&request).await.map_err(|e| {
            log::error!("Schedule generation failed for profile {}: {}", profile_id, e);
            e
        })?;
        if plan.trim().is_empty() {
            return Err(ServiceError::EmptyResponse.into());
        }

        let message = self
            .storage
            .append_message(profile_id, ChatRole::Assistant, &wrap_schedule(&plan))
            .await?;
        log::info!("Schedule saved for profile {} as message {}", profile_id, message.id);
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProfile;
    use chrono::Utc;

    #[test]
    fn prompt_falls_back_for_missing_attributes() {
        let profile = NewProfile::named("Alice").into_profile(Utc::now());
        let prompt = schedule_prompt(&profile);
        assert!(prompt.contains("- Goal: General Fitness"));
        assert!(prompt.contains("- Age: Not specified"));
        assert!(prompt.contains("- Available Equipment: Basic bodyweight/home equipment"));
        assert!(prompt.contains("- General Notes: None"));
        assert!(prompt.contains("## Week 1"));
    }

    #[test]
    fn parses_weeks_from_wrapped_plan() {
        let plan = "Here is your plan.\n\n\
                    ## Week 1\n### Monday - Workout A\n- Squats 3x8\n\n\
                    ## Week 2\n### Monday - Workout B\n- Deadlift 3x5";
        let schedule = parse_schedule(&wrap_schedule(plan)).unwrap();

        assert_eq!(schedule.intro, "Here is your plan.");
        assert_eq!(schedule.weeks.len(), 2);
        assert_eq!(schedule.weeks[0].title, "Week 1");
        assert_eq!(schedule.weeks[0].body, "### Monday - Workout A\n- Squats 3x8");
        assert_eq!(schedule.weeks[1].title, "Week 2");
    }

    #[test]
    fn plain_messages_are_not_schedules() {
        assert_eq!(parse_schedule("Great job today! 💪"), None);
    }
}
