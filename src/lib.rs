pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geo;
pub mod models;
pub mod observability;
pub mod relay;
pub mod rooms;
pub mod routing;
pub mod state;
