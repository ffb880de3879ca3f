//! Core library for spotify-history-sync
pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod schedule;
pub mod transform;
