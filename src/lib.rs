//! Payment order orchestration: unified order creation, channel dispatch,
//! race-safe order state transitions and merchant notification.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
