//! POST /interactions - Discord's HTTP interactions endpoint

use hyper::{Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::discord::interactions::{
    deferred_response, message_response, pong, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use crate::discord::{Interaction, InteractionAction};
use crate::routes::{bad_request_response, json_response, ApiRequest, BoxBody};
use crate::server::AppState;

/// Verify, parse and answer one interaction
pub async fn handle_interaction(state: &AppState, req: ApiRequest) -> Response<BoxBody> {
    let Some(verifier) = &state.verifier else {
        return json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &json!({ "error": "Interactions are not configured", "code": "NOT_CONFIGURED" }),
        );
    };

    let (Some(signature), Some(timestamp)) =
        (req.header(SIGNATURE_HEADER), req.header(TIMESTAMP_HEADER))
    else {
        return unauthorized();
    };

    if let Err(e) = verifier.verify(signature, timestamp, &req.body) {
        debug!(error = %e, "Rejected interaction");
        return unauthorized();
    }

    let action = match Interaction::parse(&req.body).and_then(Interaction::into_action) {
        Ok(action) => action,
        Err(e) => {
            warn!(error = %e, "Malformed interaction");
            return bad_request_response(&e.user_message());
        }
    };

    match action {
        InteractionAction::Pong => json_response(StatusCode::OK, &pong()),
        InteractionAction::Command { invocation, token } => match (&state.responder, token) {
            (Some(responder), Some(token)) => {
                let commands = state.commands.clone();
                let responder = Arc::clone(responder);
                tokio::spawn(async move {
                    let command = invocation.name.clone();
                    let reply = commands.invoke(invocation).await;
                    if let Err(e) = responder.deliver(&token, &reply).await {
                        warn!(command = %command, error = %e, "Failed to deliver command reply");
                    }
                });
                json_response(StatusCode::OK, &deferred_response())
            }
            _ => {
                let reply = state.commands.invoke(invocation).await;
                json_response(StatusCode::OK, &message_response(&reply))
            }
        },
        InteractionAction::Unsupported(kind) => {
            debug!(kind, "Unsupported interaction type");
            bad_request_response(&format!("Unsupported interaction type {}", kind))
        }
    }
}

fn unauthorized() -> Response<BoxBody> {
    json_response(
        StatusCode::UNAUTHORIZED,
        &json!({ "error": "Invalid request signature", "code": "UNAUTHORIZED" }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::go_skill;
    use crate::channels::LocalChannels;
    use crate::commands::Reply;
    use crate::config::Args;
    use crate::db::Stores;
    use crate::discord::InteractionResponder;
    use crate::types::Result;
    use async_trait::async_trait;
    use clap::Parser;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use ed25519_dalek::{Signer, SigningKey};
    use http_body_util::BodyExt;
    use hyper::Method;
    use serde_json::Value;

    const TIMESTAMP: &str = "1700000000";

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[9u8; 32])
    }

    fn state() -> AppState {
        let public_key = hex::encode(signing_key().verifying_key().to_bytes());
        let args = Args::parse_from([
            "guild-mentor",
            "--dev-mode",
            "--discord-public-key",
            public_key.as_str(),
        ]);
        AppState::new(args, Stores::memory(), Arc::new(LocalChannels::new()), None).unwrap()
    }

    fn signed(body: &str) -> ApiRequest {
        let mut message = TIMESTAMP.as_bytes().to_vec();
        message.extend_from_slice(body.as_bytes());
        let signature = hex::encode(signing_key().sign(&message).to_bytes());

        ApiRequest::new(Method::POST, "/interactions", body.to_string())
            .with_header(SIGNATURE_HEADER, &signature)
            .with_header(TIMESTAMP_HEADER, TIMESTAMP)
    }

    async fn send(state: &AppState, req: ApiRequest) -> (StatusCode, Value) {
        let response = handle_interaction(state, req).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn command(name: &str, user: &str, options: Value) -> String {
        let options: Vec<Value> = options
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| json!({ "name": k, "value": v }))
            .collect();
        json!({
            "type": 2,
            "data": { "name": name, "options": options },
            "member": { "user": { "id": user, "username": user } },
            "token": format!("token-{}", user)
        })
        .to_string()
    }

    /// Hands delivered replies to the test
    struct ChannelResponder(mpsc::UnboundedSender<(String, Reply)>);

    #[async_trait]
    impl InteractionResponder for ChannelResponder {
        async fn deliver(&self, token: &str, reply: &Reply) -> Result<()> {
            let _ = self.0.send((token.to_string(), reply.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let state = state();
        let (status, body) = send(&state, signed(r#"{"type":1}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], 1);
    }

    #[tokio::test]
    async fn test_bad_signature() {
        let state = state();
        let mut req = signed(r#"{"type":1}"#);
        req.body = bytes::Bytes::from_static(br#"{"type":2}"#);
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let unsigned = ApiRequest::new(Method::POST, "/interactions", r#"{"type":1}"#);
        let (status, _) = send(&state, unsigned).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_not_configured() {
        let args = Args::parse_from(["guild-mentor", "--dev-mode"]);
        let state =
            AppState::new(args, Stores::memory(), Arc::new(LocalChannels::new()), None).unwrap();
        let (status, _) = send(&state, signed(r#"{"type":1}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ask_then_answer() {
        let state = state();
        state.catalog.create(go_skill()).await.unwrap();

        let (status, body) = send(
            &state,
            signed(&command("ask", "mentee", json!({ "text": "why?", "skill": "go" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], 4);
        assert_eq!(body["data"]["embeds"][0]["title"], "Question Received");

        let question = state.questions.list_open(None).await.unwrap().remove(0);
        let answer = command(
            "answer",
            "mentor",
            json!({ "question_id": question.id_hex(), "skill_level": 1 }),
        );

        let (_, body) = send(&state, signed(&answer)).await;
        assert_eq!(body["data"]["embeds"][0]["title"], "Answer Received");
        assert_eq!(state.members.get("mentor").await.unwrap().mentor_score, 10);

        let (_, body) = send(&state, signed(&answer)).await;
        assert_eq!(body["data"]["flags"], 64);
        assert_eq!(body["data"]["embeds"][0]["title"], "Already Taken");
    }

    #[tokio::test]
    async fn test_command_reply_is_deferred() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = state().with_responder(Arc::new(ChannelResponder(tx)));
        state.catalog.create(go_skill()).await.unwrap();

        let (status, body) = send(
            &state,
            signed(&command("ask", "mentee", json!({ "text": "why?", "skill": "go" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "type": 5 }));

        let (token, reply) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token, "token-mentee");
        assert_eq!(reply.title, "Question Received");
        assert_eq!(state.questions.list_open(None).await.unwrap().len(), 1);

        let answer = command("answer", "mentor", json!({ "question_id": "nope", "skill_level": 1 }));
        let (_, body) = send(&state, signed(&answer)).await;
        assert_eq!(body["type"], 5);

        let (token, reply) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token, "token-mentor");
        assert!(reply.ephemeral);
        assert_eq!(reply.title, "Invalid Command");
    }
}
