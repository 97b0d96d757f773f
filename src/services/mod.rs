/// Synchronization controller driving the match state machine.
pub mod controller;
/// Presentation-layer notification surface.
pub mod notifier;
/// Session setup for the host and joiner roles.
pub mod session;

pub use self::controller::{Timings, UserAction};
pub use self::notifier::{LogNotifier, Notifier};
pub use self::session::{SessionHandle, host_session, join_session};
