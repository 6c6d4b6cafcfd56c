pub mod app;
pub mod cmd;
pub mod config;
pub mod controller;
pub mod error;
pub mod features;
pub mod logging;
pub mod message;
