//! Domain types - core business entities
//!
//! These types are independent of persistence and transport concerns.

pub mod config;
pub mod project;
pub mod state;
