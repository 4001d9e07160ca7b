//! Generates YouTube content packages (title, description, tags and four
//! thumbnail candidates) from channel metadata and a video topic.

pub mod generation;
pub mod models;
pub mod server;
pub mod state;
pub mod version;
pub mod web;
pub mod workflow;
