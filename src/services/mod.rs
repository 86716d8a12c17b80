pub mod backend;
pub mod config;
pub mod events;
pub mod message_builder;
pub mod mock_backend;
mod signal_bus;
pub mod state;
pub mod user_session;
pub mod workers;
