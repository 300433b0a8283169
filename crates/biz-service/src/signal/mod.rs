//! Client-facing signaling: one [`SignalSession`] per open `Signal` stream.

pub mod session;

pub use session::{SignalSession, JOIN_SUCCESS_REASON, LEAVE_REASON};
