pub mod config;
pub mod logging;
pub mod monitor;
pub mod pose;
pub mod tracker;
