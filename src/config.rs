//! Configuration for the mentoring gateway
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Guild Mentor - questions, answers and mentor collaborations for Discord
#[derive(Parser, Debug, Clone)]
#[command(name = "guild-mentor")]
#[command(about = "Discord mentoring gateway: ask, answer, collaborate")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory stores, local channels, insecure JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// Discord configuration
    #[command(flatten)]
    pub discord: DiscordArgs,

    /// MongoDB connection URI
    #[arg(long, env = "MONGO_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGO_DB", default_value = "guild_mentor")]
    pub mongodb_db: String,

    /// JWT secret for manager tokens (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Super admin email, seeded on startup when set together with the password
    #[arg(long, env = "SUPER_ADMIN_EMAIL")]
    pub super_admin_email: Option<String>,

    /// Super admin password
    #[arg(long, env = "SUPER_ADMIN_PASSWORD", hide_env_values = true)]
    pub super_admin_password: Option<String>,

    /// JSON file with skills to seed into the catalog on startup
    #[arg(long, env = "SKILLS_FILE")]
    pub skills_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Upper bound for each external call made while answering a question
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Seconds between scheduled score reconciliation passes (0 disables)
    #[arg(long, env = "RECONCILE_INTERVAL_SECS", default_value = "60")]
    pub reconcile_interval_secs: u64,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

/// Discord application configuration
#[derive(Parser, Debug, Clone)]
pub struct DiscordArgs {
    /// Bot token used for REST calls
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: Option<String>,

    /// Application (client) id
    #[arg(long, env = "CLIENT_ID")]
    pub discord_application_id: Option<String>,

    /// Guild the bot operates in
    #[arg(long, env = "GUILD_ID")]
    pub discord_guild_id: Option<String>,

    /// Hex-encoded Ed25519 public key used to verify interaction requests
    #[arg(long, env = "DISCORD_PUBLIC_KEY")]
    pub discord_public_key: Option<String>,

    /// Discord REST API base URL
    #[arg(long, env = "DISCORD_API_URL", default_value = "https://discord.com/api/v10")]
    pub discord_api_url: String,

    /// Category under which discussion voice channels are created
    #[arg(long, env = "DISCORD_VOICE_CATEGORY_ID")]
    pub voice_category_id: Option<String>,

    /// Register slash commands with Discord on startup
    #[arg(long, env = "REGISTER_COMMANDS", default_value = "false")]
    pub register_commands: bool,
}

impl DiscordArgs {
    /// True when every setting needed to talk to Discord is present
    pub fn is_configured(&self) -> bool {
        self.discord_token.is_some()
            && self.discord_application_id.is_some()
            && self.discord_guild_id.is_some()
            && self.discord_public_key.is_some()
    }
}

impl Args {
    /// Timeout applied to channel and store calls in the answer workflow
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Interval of the background reconciliation task, if enabled
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.jwt_secret.is_none() {
                return Err("JWT_SECRET is required in production mode".to_string());
            }
            if !self.discord.is_configured() {
                return Err(
                    "DISCORD_TOKEN, CLIENT_ID, GUILD_ID and DISCORD_PUBLIC_KEY are required in production mode"
                        .to_string(),
                );
            }
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.super_admin_email.is_some() != self.super_admin_password.is_some() {
            return Err(
                "SUPER_ADMIN_EMAIL and SUPER_ADMIN_PASSWORD must be set together".to_string(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["guild-mentor"];
        argv.extend_from_slice(args);
        Args::parse_from(argv)
    }

    #[test]
    fn test_dev_mode_validates_without_secrets() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert!(args.jwt_secret.is_none());
        assert_eq!(args.reconcile_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_production_requires_jwt_secret() {
        let args = parse(&[]);
        let err = args.validate().unwrap_err();
        assert!(err.contains("JWT_SECRET"));
    }

    #[test]
    fn test_reconcile_can_be_disabled() {
        let args = parse(&["--dev-mode", "--reconcile-interval-secs", "0"]);
        assert_eq!(args.reconcile_interval(), None);
    }

    #[test]
    fn test_super_admin_pair() {
        let args = parse(&["--dev-mode", "--super-admin-email", "root@example.com"]);
        assert!(args.validate().is_err());
    }
}
