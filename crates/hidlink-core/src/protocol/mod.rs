//! Protocol module - command set, packets, and decoded frames.

pub mod constants;
pub mod frame;
pub mod packet;

pub use constants::*;
pub use frame::{Frame, FrameError};
pub use packet::Packet;
