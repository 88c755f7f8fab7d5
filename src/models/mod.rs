pub mod chat;
pub mod dispatch;
pub mod events;
pub mod order;
pub mod room;
