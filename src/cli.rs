//! Command-line driver for the coach.
//!
//! ```bash
//! fitcoach profiles list
//! fitcoach profiles create Alice --goal "Run a 10k" --experience intermediate \
//!     --height 168 --weight 61
//! fitcoach profiles update 2 --clear weight --clear notes
//! fitcoach chat send 2 "How should I warm up before intervals?"
//! fitcoach log add 2 --type weight --weight 60.5
//! fitcoach log weights 2
//! ```

use crate::activity::DEFAULT_RECENT_LIMIT;
use crate::commands;
use crate::models::{ExperienceLevel, LogType, NewProfile, ProfileUpdate};
use crate::schedule::parse_schedule;
use crate::state::AppState;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fitcoach",
    about = "Personal AI fitness coach",
    long_about = "Manage fitness profiles, chat with the AI coach, generate 4-week schedules \
                  and log workouts and weigh-ins."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite database file (overrides FITCOACH_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Profile management
    Profiles {
        #[command(subcommand)]
        action: ProfileCommand,
    },
    /// Conversation with the coach
    Chat {
        #[command(subcommand)]
        action: ChatCommand,
    },
    /// Generate a new 4-week schedule for a profile
    Schedule { profile_id: i64 },
    /// Activity and weigh-in log
    Log {
        #[command(subcommand)]
        action: LogCommand,
    },
    /// Store the API key in the OS keyring (used when FITCOACH_API_KEY_REF=keyring)
    SetKey { api_key: String },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// List all profiles
    List,
    /// Create a profile and generate its starter schedule
    Create {
        name: String,
        #[command(flatten)]
        fields: ProfileFields,
    },
    /// Change profile fields; pass an empty string or --clear to unset one
    Update {
        profile_id: i64,
        /// New profile name
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ProfileFields,
        /// Unset an optional field (repeatable); wins over a value given for the same field
        #[arg(long, value_name = "FIELD")]
        clear: Vec<ClearableField>,
        /// Ask the coach for a new 4-week schedule after saving
        #[arg(long)]
        regenerate_schedule: bool,
    },
    /// Delete a profile with its chat history and logs
    Delete { profile_id: i64 },
    /// Show the body mass index of a profile
    Bmi { profile_id: i64 },
}

#[derive(Args, Debug, Default)]
pub struct ProfileFields {
    /// Primary fitness goal
    #[arg(long)]
    pub goal: Option<String>,
    /// beginner, intermediate or advanced
    #[arg(long)]
    pub experience: Option<ExperienceLevel>,
    #[arg(long)]
    pub age: Option<u32>,
    #[arg(long)]
    pub sex: Option<String>,
    /// Height in centimetres
    #[arg(long)]
    pub height: Option<f64>,
    /// Weight in kilograms
    #[arg(long)]
    pub weight: Option<f64>,
    #[arg(long)]
    pub activity: Option<String>,
    /// Dietary preferences or restrictions
    #[arg(long)]
    pub diet: Option<String>,
    /// Available equipment
    #[arg(long)]
    pub equipment: Option<String>,
    /// Injuries, preferences and anything else the coach should know
    #[arg(long)]
    pub notes: Option<String>,
}

/// Optional profile fields that `profiles update --clear` can unset.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearableField {
    Age,
    Sex,
    Height,
    Weight,
    Activity,
    Diet,
    Equipment,
    Notes,
}

impl ProfileFields {
    fn into_new_profile(self, name: String) -> NewProfile {
        NewProfile {
            name,
            goal: self.goal,
            experience: self.experience,
            age: self.age,
            sex: self.sex,
            height_cm: self.height,
            weight_kg: self.weight,
            activity_level: self.activity,
            dietary_notes: self.diet,
            equipment: self.equipment,
            notes: self.notes,
        }
    }

    fn into_update(self, name: Option<String>, clear: &[ClearableField]) -> ProfileUpdate {
        let mut update = ProfileUpdate {
            name,
            goal: self.goal,
            experience: self.experience,
            age: self.age.map(Some),
            sex: self.sex.map(Some),
            height_cm: self.height.map(Some),
            weight_kg: self.weight.map(Some),
            activity_level: self.activity.map(Some),
            dietary_notes: self.diet.map(Some),
            equipment: self.equipment.map(Some),
            notes: self.notes.map(Some),
        };
        for field in clear {
            match field {
                ClearableField::Age => update.age = Some(None),
                ClearableField::Sex => update.sex = Some(None),
                ClearableField::Height => update.height_cm = Some(None),
                ClearableField::Weight => update.weight_kg = Some(None),
                ClearableField::Activity => update.activity_level = Some(None),
                ClearableField::Diet => update.dietary_notes = Some(None),
                ClearableField::Equipment => update.equipment = Some(None),
                ClearableField::Notes => update.notes = Some(None),
            }
        }
        update
    }
}

#[derive(Subcommand, Debug)]
pub enum ChatCommand {
    /// Show the conversation (greets new profiles)
    History { profile_id: i64 },
    /// Send a message and print the coach's reply
    Send { profile_id: i64, message: String },
    /// Delete the conversation
    Clear { profile_id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// Record a workout, weigh-in or note
    Add {
        profile_id: i64,
        /// workout, weight (or weigh-in) or note
        #[arg(long = "type", value_name = "TYPE")]
        log_type: LogType,
        #[arg(long, default_value = "")]
        note: String,
        /// Weight in kilograms, for weigh-ins
        #[arg(long)]
        weight: Option<f64>,
    },
    /// Most recent entries first
    Recent {
        profile_id: i64,
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: u32,
    },
    /// Weigh-ins in chronological order
    Weights { profile_id: i64 },
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Runs one command against `state` and returns what should be printed.
pub async fn execute(state: &AppState, command: Command) -> anyhow::Result<String> {
    let output = match command {
        Command::Profiles { action } => match action {
            ProfileCommand::List => to_json(&commands::list_profiles(state).await?)?,
            ProfileCommand::Create { name, fields } => {
                to_json(&commands::create_profile(state, fields.into_new_profile(name)).await?)?
            }
            ProfileCommand::Update {
                profile_id,
                name,
                fields,
                clear,
                regenerate_schedule,
            } => {
                let update = fields.into_update(name, &clear);
                let saved =
                    commands::update_profile(state, profile_id, update, regenerate_schedule)
                        .await?;
                to_json(&saved)?
            }
            ProfileCommand::Delete { profile_id } => {
                commands::delete_profile(state, profile_id).await?;
                format!("Profile {profile_id} deleted.")
            }
            ProfileCommand::Bmi { profile_id } => {
                commands::profile_bmi(state, profile_id).await?.to_string()
            }
        },
        Command::Chat { action } => match action {
            ChatCommand::History { profile_id } => {
                to_json(&commands::open_chat(state, profile_id).await?)?
            }
            ChatCommand::Send { profile_id, message } => {
                commands::send_message(state, profile_id, &message).await?.content
            }
            ChatCommand::Clear { profile_id } => {
                commands::clear_history(state, profile_id).await?.content
            }
        },
        Command::Schedule { profile_id } => {
            let message = commands::generate_schedule(state, profile_id).await?;
            match parse_schedule(&message.content) {
                Some(schedule) => to_json(&schedule)?,
                None => message.content,
            }
        }
        Command::Log { action } => match action {
            LogCommand::Add {
                profile_id,
                log_type,
                note,
                weight,
            } => {
                let entry =
                    commands::log_activity(state, profile_id, log_type, &note, weight).await?;
                to_json(&entry)?
            }
            LogCommand::Recent { profile_id, limit } => {
                to_json(&commands::recent_activity(state, profile_id, limit).await?)?
            }
            LogCommand::Weights { profile_id } => {
                to_json(&commands::weight_series(state, profile_id).await?)?
            }
        },
        Command::SetKey { .. } => {
            anyhow::bail!("set-key runs before the application state is built")
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse_update(flags: &[&str]) -> ProfileUpdate {
        let args = ["fitcoach", "profiles", "update", "1"].iter().chain(flags).copied();
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Profiles {
            action: ProfileCommand::Update {
                name,
                fields,
                clear,
                ..
            },
        } = cli.command
        else {
            panic!("expected a profile update");
        };
        fields.into_update(name, &clear)
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_weigh_in_alias() {
        let args = ["fitcoach", "log", "add", "3", "--type", "weigh-in", "--weight", "70.5"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Log {
                action: LogCommand::Add { profile_id, log_type, weight, .. },
            } => {
                assert_eq!(profile_id, 3);
                assert_eq!(log_type, LogType::Weight);
                assert_eq!(weight, Some(70.5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn update_flags_only_touch_given_fields() {
        let update = parse_update(&["--notes", "", "--age", "40"]);
        assert_eq!(update.age, Some(Some(40)));
        assert_eq!(update.notes, Some(Some(String::new())));
        assert!(update.goal.is_none());
        assert!(update.height_cm.is_none());
    }

    #[test]
    fn clear_unsets_numbers_and_beats_a_given_value() {
        let update = parse_update(&[
            "--clear", "age", "--clear", "weight", "--weight", "80", "--height", "175",
        ]);
        assert_eq!(update.age, Some(None));
        assert_eq!(update.weight_kg, Some(None));
        assert_eq!(update.height_cm, Some(Some(175.0)));
        assert!(update.notes.is_none());
    }

    #[test]
    fn clear_rejects_required_fields() {
        let args = ["fitcoach", "profiles", "update", "1", "--clear", "goal"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
