pub mod auth;
pub mod cache;
pub mod config;
pub mod generate;
pub mod graph;
pub mod http;
pub mod resolve;
pub mod runtime;
