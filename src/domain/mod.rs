pub mod chat_log;
pub mod commands;
pub mod errors;
pub mod events;
pub mod user;
