pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod debug;
pub mod doctor;
pub mod documents;
pub mod error;
pub mod input;
pub mod markdown;
pub mod policy;
pub mod profiles;
pub mod session;
pub mod shell;
pub mod streaming;
pub mod telemetry;
pub mod theme;
