pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod http;
pub mod ligand;
pub mod output;
pub mod pool;
pub mod sampler;
pub mod scrape;
pub mod sdf;
pub mod store;
pub mod watch;
