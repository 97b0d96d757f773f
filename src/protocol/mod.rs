//! Wire protocol: typed messages and their single-line text encoding.

pub mod message;

pub use self::message::{DecodeError, WireMessage};
