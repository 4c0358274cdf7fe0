//! Dyson - a terminal front end for a DysonASI chat service.
//!
//! Architecture:
//! - `tracker` owns chat threads and drives each exchange
//! - `client` talks to the chat service over HTTP
//! - `format` turns reply text into HTML bubbles
//! - `library` keeps saved transcripts on disk
//! - `server` is a local stand-in for the chat service

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod input;
pub mod library;
pub mod logging;
pub mod models;
pub mod render;
pub mod server;
pub mod tracker;
