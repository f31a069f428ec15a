//! Deepfake Tasks: asynchronous media analysis jobs with pollable status.

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod tasks;
