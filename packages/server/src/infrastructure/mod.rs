//! Infrastructure layer: wire/bus DTOs and the concrete backends behind the
//! domain ports.

pub mod auth;
pub mod bus;
pub mod dto;
pub mod gateway;
pub mod presence;
