//! Convoy Bus - Event distribution between peers
//!
//! This crate provides:
//! - EventBus: broadcast plus local loopback dispatch
//! - Hub: an in-process broadcast channel connecting several peers

pub mod bus;
pub mod hub;

pub use bus::*;
pub use hub::*;
