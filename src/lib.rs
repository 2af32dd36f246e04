pub mod adapters;
pub mod cli;
pub mod config;
pub mod engine;
pub mod event;
pub mod host;
pub mod job;
pub mod key;
pub mod markers;
pub mod operations;
pub mod probe;
pub mod registry;
pub mod state;
pub mod util;
