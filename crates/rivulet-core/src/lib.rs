pub use env_logger::Env;
pub use log::{debug, info};

pub mod bridge;
pub mod config;
pub mod engine;
pub mod event;
pub mod filter;
pub mod mirror;
pub mod registry;
pub mod relay;
pub mod schnorr;
pub mod store;
pub mod validator;
pub mod wire;
