pub mod cli;
pub mod config;
pub mod engine;
pub mod extract;
pub mod format;
pub mod gateway;
pub mod language;
pub mod postprocess;
pub mod render;
pub mod server;
pub mod upload;
pub mod util;
pub mod writer;
