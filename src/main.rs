//! Guild Mentor - Discord mentoring gateway

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guild_mentor::{
    catalog::SkillCatalog,
    channels::{ChannelAdapter, LocalChannels},
    commands::CommandRegistry,
    config::Args,
    db::{MongoClient, Stores},
    discord::{DiscordChannels, DiscordRest},
    nats::{self, EventSink, NatsClient},
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("guild_mentor={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Guild Mentor");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("NATS: {}", args.nats.nats_url);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("======================================");

    // MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => Some(client),
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let stores = match &mongo {
        Some(client) => Stores::mongo(client).await?,
        None => Stores::memory(),
    };

    // NATS (optional in dev mode)
    let nats = match NatsClient::new(&args.nats, &format!("guild-mentor-{}", args.node_id)).await {
        Ok(client) => Some(client.with_timeout(args.request_timeout())),
        Err(e) => {
            if args.dev_mode {
                warn!("NATS connection failed (dev mode, continuing without): {}", e);
                None
            } else {
                error!("NATS connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };
    let events = nats
        .clone()
        .map(|client| Arc::new(client) as Arc<dyn EventSink>);

    // Voice channels: Discord when configured, local ids otherwise
    let discord = if args.discord.discord_token.is_some() {
        Some(DiscordRest::new(&args.discord, args.request_timeout())?)
    } else {
        warn!("No Discord token configured - voice channels are local placeholders");
        None
    };
    let channels: Arc<dyn ChannelAdapter> = match &discord {
        Some(rest) => Arc::new(DiscordChannels::new(
            rest.clone(),
            args.discord.voice_category_id.clone(),
        )),
        None => Arc::new(LocalChannels::new()),
    };

    if args.discord.register_commands {
        match &discord {
            Some(rest) => {
                rest.register_commands(&CommandRegistry::registration_payload())
                    .await?;
            }
            None => warn!("--register-commands set but Discord is not configured"),
        }
    }

    let mut state = server::AppState::new(args.clone(), stores, channels, events)?;
    if let Some(rest) = &discord {
        state = state.with_responder(Arc::new(rest.clone()));
    }
    if let Some(client) = mongo {
        state = state.with_mongo(client);
    }
    if let Some(client) = nats.clone() {
        state = state.with_nats(client);
    }

    if let Some(path) = &args.skills_file {
        let skills = SkillCatalog::load_seed_file(path).await?;
        let added = state.catalog.seed(skills).await?;
        info!("Seeded {} skill(s) from {}", added, path.display());
    }

    if let (Some(email), Some(password)) = (&args.super_admin_email, &args.super_admin_password) {
        state.managers.seed_superadmin(email, password).await?;
    }

    if let Some(client) = nats {
        let commands = state.commands.clone();
        tokio::spawn(async move {
            if let Err(e) = nats::serve_commands(client, commands).await {
                error!("Command responder stopped: {}", e);
            }
        });
    }

    let state = Arc::new(state);
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
