pub mod config;
pub mod core;
pub mod handler;
pub mod resources;
pub mod server;
