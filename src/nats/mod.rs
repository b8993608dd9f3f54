//! NATS integration
//!
//! Command request/response subjects for other services and best-effort
//! domain event publishing.

mod client;
mod events;
mod messages;
mod responder;

pub use client::NatsClient;
pub use events::EventSink;
pub use messages::{
    CommandRequest, CommandResponse, DomainEvent, COMMAND_SUBJECT_PREFIX, EVENT_SUBJECT_PREFIX,
};
pub use responder::serve_commands;
