pub mod aggregator;
pub mod app;
pub mod backend;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod demo;
pub mod error;
pub mod external;
pub mod logging;
pub mod metrics;
pub mod redis_client;
pub mod resolver;
pub mod service;
pub mod types;
