//! Chat commands
//!
//! A static table of the commands members can run, shared by the Discord
//! interaction endpoint and the NATS command subjects. Each entry declares
//! its options once; the same declarations produce the Discord registration
//! payload.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::collaboration::CollaborationWorkflow;
use crate::db::parse_object_id;
use crate::db::schemas::MemberProfile;
use crate::members::MemberRegistry;
use crate::questions::QuestionStore;
use crate::types::{ErrorKind, MentorError, Result};

const COLOR_SUCCESS: u32 = 0x57F287;
const COLOR_FAILURE: u32 = 0xED4245;

/// Discord application command option types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Integer,
}

impl OptionKind {
    fn discord_type(self) -> u8 {
        match self {
            OptionKind::String => 3,
            OptionKind::Integer => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandOption {
    pub name: &'static str,
    pub kind: OptionKind,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Ask,
    Answer,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub options: &'static [CommandOption],
    action: Action,
}

const ASK_OPTIONS: &[CommandOption] = &[
    CommandOption {
        name: "text",
        kind: OptionKind::String,
        required: true,
        description: "What do you need help with?",
    },
    CommandOption {
        name: "skill",
        kind: OptionKind::String,
        required: true,
        description: "Skill the question is about",
    },
];

const ANSWER_OPTIONS: &[CommandOption] = &[
    CommandOption {
        name: "question_id",
        kind: OptionKind::String,
        required: true,
        description: "Id of the question you are answering",
    },
    CommandOption {
        name: "skill_level",
        kind: OptionKind::Integer,
        required: true,
        description: "Your level in the question's skill",
    },
];

/// Every command the service answers to
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "ask",
        description: "Ask the mentors a question",
        options: ASK_OPTIONS,
        action: Action::Ask,
    },
    CommandSpec {
        name: "question",
        description: "Ask the mentors a question",
        options: ASK_OPTIONS,
        action: Action::Ask,
    },
    CommandSpec {
        name: "answer",
        description: "Answer a question and open a voice channel with the asker",
        options: ANSWER_OPTIONS,
        action: Action::Answer,
    },
];

/// Who ran a command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invoker {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
}

impl Invoker {
    fn profile(&self) -> MemberProfile {
        MemberProfile {
            username: self.username.clone(),
            discriminator: self.discriminator.clone(),
        }
    }
}

/// A single command call with its options keyed by name
#[derive(Debug, Clone)]
pub struct Invocation {
    pub name: String,
    pub invoker: Invoker,
    pub options: Map<String, Value>,
}

impl Invocation {
    fn string(&self, name: &str) -> Result<String> {
        match self.options.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Some(Value::String(_)) | None | Some(Value::Null) => Err(MentorError::InvalidInput(
                format!("Option `{}` is required.", name),
            )),
            Some(_) => Err(MentorError::InvalidInput(format!(
                "Option `{}` must be text.",
                name
            ))),
        }
    }

    fn integer(&self, name: &str) -> Result<i32> {
        let invalid = || MentorError::InvalidInput(format!("Option `{}` must be a whole number.", name));
        let raw = match self.options.get(name) {
            Some(Value::Number(n)) => n.as_i64().ok_or_else(invalid)?,
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
            None | Some(Value::Null) => {
                return Err(MentorError::InvalidInput(format!(
                    "Option `{}` is required.",
                    name
                )))
            }
            Some(_) => return Err(invalid()),
        };
        i32::try_from(raw).map_err(|_| invalid())
    }
}

/// Message shown back to the invoker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub title: String,
    pub description: String,
    pub color: u32,
    /// Only visible to the invoker
    #[serde(default)]
    pub ephemeral: bool,
}

impl Reply {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color: COLOR_SUCCESS,
            ephemeral: false,
        }
    }

    pub fn failure(err: &MentorError) -> Self {
        let title = match err.kind() {
            ErrorKind::NotFound => "Not Found",
            ErrorKind::Conflict => "Already Taken",
            ErrorKind::InvalidInput => "Invalid Command",
            _ => "Something Went Wrong",
        };
        Self {
            title: title.to_string(),
            description: err.user_message(),
            color: COLOR_FAILURE,
            ephemeral: true,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.color == COLOR_FAILURE
    }
}

/// Dispatches invocations to the core components
#[derive(Clone)]
pub struct CommandRegistry {
    questions: QuestionStore,
    members: MemberRegistry,
    workflow: CollaborationWorkflow,
}

impl CommandRegistry {
    pub fn new(
        questions: QuestionStore,
        members: MemberRegistry,
        workflow: CollaborationWorkflow,
    ) -> Self {
        Self {
            questions,
            members,
            workflow,
        }
    }

    pub fn find(name: &str) -> Option<&'static CommandSpec> {
        COMMANDS.iter().find(|c| c.name == name)
    }

    /// Run a command, turning any failure into an ephemeral reply
    pub async fn invoke(&self, invocation: Invocation) -> Reply {
        match self.dispatch(&invocation).await {
            Ok(reply) => reply,
            Err(e) => {
                match e.kind() {
                    ErrorKind::UpstreamFailure | ErrorKind::Internal => warn!(
                        command = %invocation.name,
                        user = %invocation.invoker.id,
                        error = %e,
                        "Command failed"
                    ),
                    _ => debug!(
                        command = %invocation.name,
                        user = %invocation.invoker.id,
                        error = %e,
                        "Command rejected"
                    ),
                }
                Reply::failure(&e)
            }
        }
    }

    /// Register the invoker, then run the command
    pub async fn dispatch(&self, invocation: &Invocation) -> Result<Reply> {
        let spec = Self::find(&invocation.name).ok_or_else(|| {
            MentorError::InvalidInput(format!("Unknown command `{}`.", invocation.name))
        })?;

        let member = self
            .members
            .get_or_create(&invocation.invoker.id, invocation.invoker.profile())
            .await?;
        if let Err(e) = self.members.touch(&member.discord_id).await {
            debug!(user = %member.discord_id, error = %e, "Failed to refresh last_active");
        }

        match spec.action {
            Action::Ask => self.ask(&member.discord_id, invocation).await,
            Action::Answer => self.answer(&member.discord_id, invocation).await,
        }
    }

    async fn ask(&self, asker: &str, invocation: &Invocation) -> Result<Reply> {
        let text = invocation.string("text")?;
        let skill = invocation.string("skill")?;

        let question = self.questions.open(asker, &text, &skill).await?;
        Ok(Reply::success(
            "Question Received",
            format!(
                "Your **{}** question has been posted. A mentor can answer it with \
                 `/answer question_id:{}`.",
                question.skill,
                question.id_hex()
            ),
        ))
    }

    async fn answer(&self, mentor: &str, invocation: &Invocation) -> Result<Reply> {
        let question_id = parse_object_id(&invocation.string("question_id")?, "question")?;
        let level = invocation.integer("skill_level")?;

        let outcome = self.workflow.answer(question_id, mentor, level).await?;
        let collaboration = &outcome.collaboration;

        info!(
            question = %question_id,
            mentor = %mentor,
            channel = %collaboration.voice_channel_id,
            "Answer accepted"
        );

        let mut description = format!(
            "Voice channel <#{}> is open for you and <@{}>.\nSkill **{}** level {} (+{} score).",
            collaboration.voice_channel_id,
            collaboration.mentee_id,
            outcome.skill,
            collaboration.skill_level,
            collaboration.mentor_score_increase
        );
        if outcome.score_pending {
            description.push_str("\nYour score will be updated shortly.");
        }

        Ok(Reply::success("Answer Received", description))
    }

    /// Application command definitions for `PUT .../commands`
    pub fn registration_payload() -> Value {
        Value::Array(
            COMMANDS
                .iter()
                .map(|command| {
                    let options: Vec<Value> = command
                        .options
                        .iter()
                        .map(|o| {
                            json!({
                                "name": o.name,
                                "description": o.description,
                                "type": o.kind.discord_type(),
                                "required": o.required,
                            })
                        })
                        .collect();
                    json!({
                        "name": command.name,
                        "description": command.description,
                        "type": 1,
                        "options": options,
                    })
                })
                .collect(),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{tests::go_skill, SkillCatalog};
    use crate::channels::LocalChannels;
    use crate::db::schemas::{CollaborationDoc, MemberDoc, QuestionDoc, SkillDoc};
    use crate::db::MemoryStore;
    use std::sync::Arc;

    pub(crate) async fn registry() -> (CommandRegistry, QuestionStore, MemberRegistry) {
        let questions = QuestionStore::new(Arc::new(MemoryStore::<QuestionDoc>::new()));
        let members = MemberRegistry::new(Arc::new(MemoryStore::<MemberDoc>::new()));
        let catalog = SkillCatalog::new(Arc::new(MemoryStore::<SkillDoc>::new()));
        catalog.create(go_skill()).await.unwrap();

        let workflow = CollaborationWorkflow::new(
            questions.clone(),
            catalog,
            members.clone(),
            Arc::new(MemoryStore::<CollaborationDoc>::new()),
            Arc::new(LocalChannels::new()),
        );

        (
            CommandRegistry::new(questions.clone(), members.clone(), workflow),
            questions,
            members,
        )
    }

    fn invocation(name: &str, user: &str, options: Value) -> Invocation {
        Invocation {
            name: name.to_string(),
            invoker: Invoker {
                id: user.to_string(),
                username: Some(format!("{}-name", user)),
                discriminator: None,
            },
            options: options.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_ask_registers_member_and_opens_question() {
        let (registry, questions, members) = registry().await;

        let reply = registry
            .invoke(invocation("ask", "100", json!({ "text": "what is a channel?", "skill": "Go" })))
            .await;
        assert_eq!(reply.title, "Question Received");
        assert!(!reply.ephemeral);

        let member = members.get("100").await.unwrap();
        assert_eq!(member.username.as_deref(), Some("100-name"));

        let open = questions.list_open(Some("go")).await.unwrap();
        assert_eq!(open.len(), 1);
        assert!(reply.description.contains(&open[0].id_hex()));
    }

    #[tokio::test]
    async fn test_question_alias() {
        let (registry, questions, _) = registry().await;
        let reply = registry
            .invoke(invocation("question", "100", json!({ "text": "why?", "skill": "go" })))
            .await;
        assert!(!reply.is_failure());
        assert_eq!(questions.list_open(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_flow() {
        let (registry, questions, members) = registry().await;
        registry
            .invoke(invocation("ask", "mentee", json!({ "text": "why?", "skill": "go" })))
            .await;
        let qid = questions.list_open(None).await.unwrap()[0].id_hex();

        let reply = registry
            .invoke(invocation(
                "answer",
                "mentor",
                json!({ "question_id": qid, "skill_level": 2 }),
            ))
            .await;
        assert_eq!(reply.title, "Answer Received");
        assert!(reply.description.contains("<@mentee>"));
        assert!(reply.description.contains("Skill **go** level 2 (+25 score)"));
        assert_eq!(members.get("mentor").await.unwrap().mentor_score, 25);

        let again = registry
            .invoke(invocation(
                "answer",
                "other",
                json!({ "question_id": qid, "skill_level": "1" }),
            ))
            .await;
        assert!(again.is_failure());
        assert!(again.ephemeral);
        assert_eq!(again.title, "Already Taken");
    }

    #[tokio::test]
    async fn test_malformed_options() {
        let (registry, _, _) = registry().await;

        let reply = registry
            .invoke(invocation("ask", "u", json!({ "skill": "go" })))
            .await;
        assert_eq!(reply.title, "Invalid Command");

        let reply = registry
            .invoke(invocation(
                "answer",
                "u",
                json!({ "question_id": "not-an-id", "skill_level": 1 }),
            ))
            .await;
        assert_eq!(reply.title, "Invalid Command");

        let reply = registry
            .invoke(invocation(
                "answer",
                "u",
                json!({ "question_id": bson::oid::ObjectId::new().to_hex(), "skill_level": "two" }),
            ))
            .await;
        assert_eq!(reply.title, "Invalid Command");
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (registry, _, _) = registry().await;
        let err = registry
            .dispatch(&invocation("dance", "u", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, MentorError::InvalidInput(_)));
    }

    #[test]
    fn test_registration_payload() {
        let payload = CommandRegistry::registration_payload();
        let commands = payload.as_array().unwrap();
        assert_eq!(commands.len(), COMMANDS.len());

        let answer = commands.iter().find(|c| c["name"] == "answer").unwrap();
        assert_eq!(answer["options"][1]["name"], "skill_level");
        assert_eq!(answer["options"][1]["type"], 4);
        assert_eq!(answer["options"][0]["required"], true);
    }
}
