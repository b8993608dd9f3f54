//! Discord integration
//!
//! REST client for channels and command registration, the voice channel
//! adapter, and the interactions endpoint helpers.

mod channels;
pub mod interactions;
mod rest;

pub use channels::DiscordChannels;
pub use interactions::{Interaction, InteractionAction, InteractionResponder, InteractionVerifier};
pub use rest::{DiscordRest, GuildChannel};
