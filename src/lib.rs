pub mod clock;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod movement;
pub mod registry;
pub mod rng;
pub mod types;
pub mod world;
