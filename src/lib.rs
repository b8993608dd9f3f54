//! Guild Mentor - Discord mentoring gateway
//!
//! Members ask questions tagged with a skill; a mentor answers one by
//! claiming a skill level. Answering records a collaboration, marks the
//! question answered, opens a voice channel for mentor and mentee, and
//! credits the mentor's score.
//!
//! ## Surfaces
//!
//! - **Interactions**: Discord slash commands over `POST /interactions`
//! - **Bus**: `mentor.cmd.*` request/response and `mentor.events.*` over NATS
//! - **REST**: `/api/*` for questions, skills, members and collaborations
//!
//! State lives in MongoDB; dev mode runs on in-memory stores.

pub mod auth;
pub mod catalog;
pub mod channels;
pub mod collaboration;
pub mod commands;
pub mod config;
pub mod db;
pub mod discord;
pub mod members;
pub mod nats;
pub mod questions;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{MentorError, Result};
