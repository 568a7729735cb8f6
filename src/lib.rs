//! Library crate for sketch-relay, exposing modules for binaries and integration tests.

pub mod config;
/// Shared store seam and raw records.
pub mod dao;
mod dto;
mod error;
/// HTTP routes.
pub mod routes;
/// Roster, turn, message and peer services.
pub mod services;
/// Per-peer session state and the turn state machine.
pub mod state;
