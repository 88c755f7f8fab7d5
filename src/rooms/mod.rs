pub mod reaper;
pub mod registry;
