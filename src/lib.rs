pub mod config;
pub mod error;
pub mod pose;
pub mod replay;
pub mod tracker;
