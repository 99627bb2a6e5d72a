//! Driving adapters: how unified-order requests enter the crate and how the
//! answers leave it.

pub mod csv;
