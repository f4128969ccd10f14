//! Shared types for the scanner clip player: data model, backend client,
//! demo fixtures, configuration and platform paths.

pub mod api;
pub mod config;
pub mod demo;
pub mod models;
pub mod platform;
