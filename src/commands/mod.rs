pub mod config;
pub mod delete;
pub mod events;
pub mod heartbeat;
pub mod new;
pub mod online;
pub mod update;
