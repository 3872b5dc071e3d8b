use crate::api::{CompletionMessage, CompletionRequest, CompletionService};
use crate::config::{CompletionConfig, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::error::{CoachError, CoachResult, ServiceError};
use crate::models::{ChatMessage, ChatRole, Profile};
use crate::prompts::COACH_PERSONA;
use crate::storage::StorageManager;
use std::sync::Arc;
use std::time::Instant;

/// Sampling settings shared by chat turns and schedule requests.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationSettings {
    pub persona: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            persona: COACH_PERSONA.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl From<&CompletionConfig> for GenerationSettings {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            ..Self::default()
        }
    }
}

/// Summarises the profile for the model, e.g. `Goal: Strength; Experience: Beginner; Age: 30`.
pub fn profile_context(profile: &Profile) -> String {
    let mut parts = vec![
        format!("Goal: {}", profile.goal),
        format!("Experience: {}", profile.experience),
    ];
    if let Some(age) = profile.age {
        parts.push(format!("Age: {age}"));
    }
    if let Some(sex) = &profile.sex {
        parts.push(format!("Sex: {sex}"));
    }
    if let Some(height) = profile.height_cm {
        parts.push(format!("Height: {height} cm"));
    }
    if let Some(weight) = profile.weight_kg {
        parts.push(format!("Weight: {weight} kg"));
    }
    if let Some(activity) = &profile.activity_level {
        parts.push(format!("Activity Level: {activity}"));
    }
    if let Some(diet) = &profile.dietary_notes {
        parts.push(format!("Dietary Notes: {diet}"));
    }
    if let Some(equipment) = &profile.equipment {
        parts.push(format!("Equipment: {equipment}"));
    }
    if let Some(notes) = &profile.notes {
        parts.push(format!("General Notes: {notes}"));
    }
    parts.join("; ")
}

/// A per-profile conversation with the coach.
#[derive(Clone)]
pub struct ChatSession {
    storage: StorageManager,
    completion: Arc<dyn CompletionService>,
    settings: GenerationSettings,
}

impl ChatSession {
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

    pub async fn history(&self, profile_id: i64) -> CoachResult<Vec<ChatMessage>> {
        self.storage.get_profile(profile_id).await?;
        self.storage.list_messages(profile_id).await
    }

    /// Loads the history, greeting the user first if the conversation is empty.
    pub async fn open(&self, profile_id: i64) -> CoachResult<Vec<ChatMessage>> {
        let profile = self.storage.get_profile(profile_id).await?;
        let messages = self.storage.list_messages(profile_id).await?;
        if !messages.is_empty() {
            return Ok(messages);
        }

        let welcome = format!(
            "Welcome to profile '{}'! How can I help you today? 💪",
            profile.name
        );
        let greeting = self
            .storage
            .append_message(profile_id, ChatRole::Assistant, &welcome)
            .await?;
        Ok(vec![greeting])
    }

    /// Wipes the conversation and leaves a single confirmation message.
    pub async fn clear_history(&self, profile_id: i64) -> CoachResult<ChatMessage> {
        let profile = self.storage.get_profile(profile_id).await?;
        let removed = self.storage.clear_messages(profile_id).await?;
        log::info!("Cleared {} messages for profile {}", removed, profile_id);

        let notice = format!(
            "Chat history for '{}' cleared! How can I help you?",
            profile.name
        );
        self.storage
            .append_message(profile_id, ChatRole::Assistant, &notice)
            .await
    }

    /// Stores the user's turn, asks the coach and stores the reply.
    ///
    /// On a completion failure the user's message stays in the history and no
    /// reply is written; the caller gets `CoachError::Service` and may resend.
    pub async fn send_user_message(&self, profile_id: i64, text: &str) -> CoachResult<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoachError::validation("message cannot be empty"));
        }
        let profile = self.storage.get_profile(profile_id).await?;
        let prior = self.storage.list_messages(profile_id).await?;

        self.storage
            .append_message(profile_id, ChatRole::User, text)
            .await?;

        let request = self.build_request(&profile, &prior, text);
        log::info!(
            "Sending {} messages to the completion service for profile {}",
            request.messages.len(),
            profile_id
        );
        let started = Instant::now();
        let reply = match self.completion.complete(&request).await {
            Ok(reply) if reply.trim().is_empty() => {
                log::warn!("Empty reply for profile {}; nothing stored", profile_id);
                return Err(ServiceError::EmptyResponse.into());
            }
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Completion failed for profile {}: {}", profile_id, e);
                return Err(e.into());
            }
        };
        log::info!(
            "Reply for profile {} generated in {:.2}s",
            profile_id,
            started.elapsed().as_secs_f64()
        );

        self.storage
            .append_message(profile_id, ChatRole::Assistant, &reply)
            .await
    }

    fn build_request(
        &self,
        profile: &Profile,
        prior: &[ChatMessage],
        text: &str,
    ) -> CompletionRequest {
        let mut messages = Vec::with_capacity(prior.len() + 2);
        messages.push(CompletionMessage::new(ChatRole::System, self.settings.persona.as_str()));
        messages.extend(
            prior
                .iter()
                .map(|m| CompletionMessage::new(m.role, m.content.as_str())),
        );
        messages.push(CompletionMessage::new(
            ChatRole::User,
            format!("(My Profile: {})\n\n{}", profile_context(profile), text),
        ));

        CompletionRequest {
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream: true,
        }
    }
}
