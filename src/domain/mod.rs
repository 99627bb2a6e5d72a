//! Domain layer: order, channel and merchant models plus the ports the
//! application layer drives.

pub mod channel;
pub mod merchant;
pub mod notify;
pub mod order;
pub mod ports;
pub mod request;
