pub mod config;
pub mod fetch;
pub mod geo;
pub mod output;
pub mod ring;
pub mod sampler;
pub mod services;
pub mod stats;
pub mod store;
