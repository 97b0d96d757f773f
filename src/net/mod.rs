//! Line-oriented TCP transport: listening/connecting endpoints, read loops,
//! host-side relay, and local address discovery.

pub mod discovery;
pub mod transport;

pub use self::discovery::local_ipv4;
pub use self::transport::{NetEvent, NetHandle, connect, listen_and_serve};
