//! Lounge chat server library.
//!
//! Real-time chat rooms over WebSocket with presence tracking that stays
//! correct across several server processes sharing one store and bus.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod bootstrap;
pub mod config;
