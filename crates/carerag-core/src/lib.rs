pub mod catalog;
pub mod chunker;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod logging;
pub mod stringify;
pub mod traits;
pub mod types;
