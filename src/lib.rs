pub mod attachment;
pub mod board;
pub mod config;
pub mod directory;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod lifecycle;
pub mod logging;
pub mod permissions;
pub mod request;
pub mod service;
pub mod store;
pub mod utils;
pub mod validation;
