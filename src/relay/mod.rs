pub mod chat;
pub mod location;
