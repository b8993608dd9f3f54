//! Discord interactions
//!
//! Request signature verification, interaction payload parsing and the
//! response bodies sent back to Discord.
//!
//! Discord waits three seconds for the HTTP response. Commands are therefore
//! acknowledged with a deferred response and their reply is delivered later
//! through an [`InteractionResponder`] using the interaction token.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::commands::{Invocation, Invoker, Reply};
use crate::types::{MentorError, Result};

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

const INTERACTION_PING: u8 = 1;
const INTERACTION_APPLICATION_COMMAND: u8 = 2;

const RESPONSE_PONG: u8 = 1;
const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
const RESPONSE_DEFERRED_CHANNEL_MESSAGE: u8 = 5;

/// Message flag: only the invoker sees it
const FLAG_EPHEMERAL: u64 = 1 << 6;

/// Verifies `X-Signature-Ed25519` against the application public key
#[derive(Debug, Clone)]
pub struct InteractionVerifier {
    key: VerifyingKey,
}

impl InteractionVerifier {
    /// Build from the hex public key shown in the developer portal
    pub fn from_hex(public_key: &str) -> Result<Self> {
        let bytes = hex::decode(public_key.trim())
            .map_err(|e| MentorError::InvalidInput(format!("Public key is not hex: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| MentorError::InvalidInput("Public key must be 32 bytes".into()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| MentorError::InvalidInput(format!("Invalid public key: {}", e)))?;
        Ok(Self { key })
    }

    /// Check that `signature` signs `timestamp || body`
    pub fn verify(&self, signature: &str, timestamp: &str, body: &[u8]) -> Result<()> {
        let bad = || MentorError::Auth("Invalid request signature".into());

        let sig_bytes: [u8; 64] = hex::decode(signature.trim())
            .map_err(|_| bad())?
            .try_into()
            .map_err(|_| bad())?;
        let signature = Signature::from_bytes(&sig_bytes);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key.verify(&message, &signature).map_err(|_| bad())
    }
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    discriminator: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GuildMember {
    user: User,
}

#[derive(Debug, Deserialize)]
struct CommandDataOption {
    name: String,
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CommandData {
    name: String,
    #[serde(default)]
    options: Vec<CommandDataOption>,
}

/// Incoming interaction payload (fields the service reads)
#[derive(Debug, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    data: Option<CommandData>,
    /// Present for guild interactions
    #[serde(default)]
    member: Option<GuildMember>,
    /// Present for DM interactions
    #[serde(default)]
    user: Option<User>,
    /// Webhook token for follow-up messages, valid for 15 minutes
    #[serde(default)]
    token: Option<String>,
}

/// What to do with an interaction
#[derive(Debug)]
pub enum InteractionAction {
    Pong,
    Command {
        invocation: Invocation,
        token: Option<String>,
    },
    Unsupported(u8),
}

/// Delivers a command's reply after a deferred response
#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn deliver(&self, token: &str, reply: &Reply) -> Result<()>;
}

impl Interaction {
    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn into_action(self) -> Result<InteractionAction> {
        match self.kind {
            INTERACTION_PING => Ok(InteractionAction::Pong),
            INTERACTION_APPLICATION_COMMAND => {
                let data = self
                    .data
                    .ok_or_else(|| MentorError::InvalidInput("Command interaction without data".into()))?;
                let user = self
                    .member
                    .map(|m| m.user)
                    .or(self.user)
                    .ok_or_else(|| MentorError::InvalidInput("Interaction has no user".into()))?;

                let options: Map<String, Value> = data
                    .options
                    .into_iter()
                    .map(|o| (o.name, o.value.unwrap_or(Value::Null)))
                    .collect();

                Ok(InteractionAction::Command {
                    invocation: Invocation {
                        name: data.name,
                        invoker: Invoker {
                            id: user.id,
                            username: user.username,
                            discriminator: user.discriminator,
                        },
                        options,
                    },
                    token: self.token,
                })
            }
            other => Ok(InteractionAction::Unsupported(other)),
        }
    }
}

pub fn pong() -> Value {
    json!({ "type": RESPONSE_PONG })
}

/// Acknowledge a command; the reply follows through the webhook
pub fn deferred_response() -> Value {
    json!({ "type": RESPONSE_DEFERRED_CHANNEL_MESSAGE })
}

/// Channel message response carrying `reply` as an embed
pub fn message_response(reply: &Reply) -> Value {
    json!({ "type": RESPONSE_CHANNEL_MESSAGE, "data": reply_message(reply) })
}

/// Message body for `reply`, as used by responses and webhook calls
pub fn reply_message(reply: &Reply) -> Value {
    let mut data = json!({
        "embeds": [{
            "title": reply.title,
            "description": reply.description,
            "color": reply.color,
        }]
    });
    if reply.ephemeral {
        data["flags"] = json!(FLAG_EPHEMERAL);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use tokio_test::{assert_err, assert_ok};

    fn keypair() -> (SigningKey, InteractionVerifier) {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let verifier =
            InteractionVerifier::from_hex(&hex::encode(signing.verifying_key().to_bytes())).unwrap();
        (signing, verifier)
    }

    fn sign(key: &SigningKey, timestamp: &str, body: &[u8]) -> String {
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        hex::encode(key.sign(&message).to_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let (key, verifier) = keypair();
        let body = br#"{"type":1}"#;
        let sig = sign(&key, "1700000000", body);
        assert_ok!(verifier.verify(&sig, "1700000000", body));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let (key, verifier) = keypair();
        let sig = sign(&key, "1700000000", br#"{"type":1}"#);

        let err = verifier
            .verify(&sig, "1700000000", br#"{"type":2}"#)
            .unwrap_err();
        assert!(matches!(err, MentorError::Auth(_)));
        assert_err!(verifier.verify(&sig, "1700000001", br#"{"type":1}"#));
        assert_err!(verifier.verify("zz", "1700000000", br#"{"type":1}"#));
    }

    #[test]
    fn test_bad_public_key() {
        assert_err!(InteractionVerifier::from_hex("abcd"));
        assert_err!(InteractionVerifier::from_hex("not hex"));
    }

    #[test]
    fn test_parse_ping() {
        let action = Interaction::parse(br#"{"type":1}"#).unwrap().into_action().unwrap();
        assert!(matches!(action, InteractionAction::Pong));
    }

    #[test]
    fn test_parse_guild_command() {
        let body = br#"{
            "type": 2,
            "data": {"name": "answer", "options": [
                {"name": "question_id", "type": 3, "value": "abc"},
                {"name": "skill_level", "type": 4, "value": 2}
            ]},
            "member": {"user": {"id": "42", "username": "ada", "discriminator": "0001"}},
            "token": "aW50ZXJhY3Rpb24"
        }"#;
        let InteractionAction::Command { invocation, token } =
            Interaction::parse(body).unwrap().into_action().unwrap()
        else {
            panic!("expected a command");
        };
        assert_eq!(invocation.name, "answer");
        assert_eq!(invocation.invoker.id, "42");
        assert_eq!(invocation.invoker.username.as_deref(), Some("ada"));
        assert_eq!(invocation.options["skill_level"], json!(2));
        assert_eq!(token.as_deref(), Some("aW50ZXJhY3Rpb24"));
    }

    #[test]
    fn test_command_without_user_rejected() {
        let body = br#"{"type": 2, "data": {"name": "ask"}}"#;
        assert!(Interaction::parse(body).unwrap().into_action().is_err());
    }

    #[test]
    fn test_message_response_flags() {
        let ok = message_response(&Reply::success("Question Received", "posted"));
        assert_eq!(ok["type"], 4);
        assert_eq!(ok["data"]["embeds"][0]["title"], "Question Received");
        assert!(ok["data"].get("flags").is_none());

        let failed = message_response(&Reply::failure(&MentorError::InvalidInput("x".into())));
        assert_eq!(failed["data"]["flags"], 64);
        assert_eq!(deferred_response(), json!({ "type": 5 }));
    }
}
