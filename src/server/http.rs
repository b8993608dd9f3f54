//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{JwtValidator, ManagerService};
use crate::catalog::SkillCatalog;
use crate::channels::ChannelAdapter;
use crate::collaboration::{spawn_reconcile_task, CollaborationWorkflow, WorkflowConfig};
use crate::commands::CommandRegistry;
use crate::config::Args;
use crate::db::{MongoClient, Stores};
use crate::discord::{InteractionResponder, InteractionVerifier};
use crate::members::MemberRegistry;
use crate::nats::{EventSink, NatsClient};
use crate::questions::QuestionStore;
use crate::routes::{self, ApiRequest, BoxBody};
use crate::types::{MentorError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub questions: QuestionStore,
    pub catalog: SkillCatalog,
    pub members: MemberRegistry,
    pub workflow: CollaborationWorkflow,
    pub managers: ManagerService,
    pub commands: CommandRegistry,
    /// Present when a Discord public key is configured
    pub verifier: Option<InteractionVerifier>,
    /// Delivers deferred command replies; without it commands answer inline
    pub responder: Option<Arc<dyn InteractionResponder>>,
    pub nats: Option<NatsClient>,
    pub mongo: Option<MongoClient>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the services over `stores`, opening channels through `channels`
    pub fn new(
        args: Args,
        stores: Stores,
        channels: Arc<dyn ChannelAdapter>,
        events: Option<Arc<dyn EventSink>>,
    ) -> Result<Self> {
        let jwt = match args.jwt_secret.clone() {
            Some(secret) => JwtValidator::new(secret, args.jwt_expiry_seconds)?,
            None if args.dev_mode => JwtValidator::new_dev(),
            None => {
                return Err(MentorError::Auth(
                    "JWT_SECRET is required in production mode".into(),
                ))
            }
        };

        let verifier = args
            .discord
            .discord_public_key
            .as_deref()
            .map(InteractionVerifier::from_hex)
            .transpose()?;

        let mut questions = QuestionStore::new(stores.questions);
        let catalog = SkillCatalog::new(stores.skills);
        let members = MemberRegistry::new(stores.members);

        let mut workflow = CollaborationWorkflow::new(
            questions.clone(),
            catalog.clone(),
            members.clone(),
            stores.collaborations,
            channels,
        )
        .with_config(WorkflowConfig {
            step_timeout: args.request_timeout(),
        });

        if let Some(sink) = events {
            questions = questions.with_events(Arc::clone(&sink));
            workflow = workflow.with_events(sink);
        }

        let commands = CommandRegistry::new(questions.clone(), members.clone(), workflow.clone());
        let managers = ManagerService::new(stores.managers, jwt);

        Ok(Self {
            args,
            questions,
            catalog,
            members,
            workflow,
            managers,
            commands,
            verifier,
            responder: None,
            nats: None,
            mongo: None,
            started_at: Instant::now(),
        })
    }

    pub fn with_responder(mut self, responder: Arc<dyn InteractionResponder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn with_nats(mut self, nats: NatsClient) -> Self {
        self.nats = Some(nats);
        self
    }

    pub fn with_mongo(mut self, mongo: MongoClient) -> Self {
        self.mongo = Some(mongo);
        self
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Guild Mentor listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory state is lost on restart");
    }
    if state.verifier.is_none() {
        warn!("No Discord public key configured - /interactions is disabled");
    }

    if let Some(interval) = state.args.reconcile_interval() {
        spawn_reconcile_task(state.workflow.clone(), interval);
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Route one request
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(routes::preflight_response());
    }

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/health" | "/healthz") => routes::health_check(&state),
        (&Method::GET, "/version") => routes::version_info(),

        (&Method::POST, "/interactions") => match ApiRequest::from_hyper(req).await {
            Ok(req) => routes::handle_interaction(&state, req).await,
            Err(e) => routes::error_response(&e),
        },

        (_, p) if p.starts_with("/api/") => match ApiRequest::from_hyper(req).await {
            Ok(req) => routes::handle_api_request(&state, req).await,
            Err(e) => routes::error_response(&e),
        },

        _ => routes::not_found_response(&path),
    };

    debug!("[{}] {} {} -> {}", addr, method, path, response.status());
    Ok(response)
}
