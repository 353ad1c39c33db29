pub mod address;
pub mod client;
pub mod types;

pub use client::TronClient;
