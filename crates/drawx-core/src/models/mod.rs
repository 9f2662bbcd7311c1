//! Data models for extracted drawings, order results and configuration.

pub mod config;
pub mod item;
pub mod order;
