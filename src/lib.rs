// src/lib.rs
pub mod config;
pub mod downstream;
pub mod extract;
pub mod fetch;
pub mod history;
pub mod partition;
