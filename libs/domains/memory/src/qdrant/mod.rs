mod client;
mod config;
pub mod payload;

pub use client::QdrantRepository;
pub use config::QdrantConfig;
