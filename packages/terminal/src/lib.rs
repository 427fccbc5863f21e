// ABOUTME: Interactive terminal sessions into workspace sandboxes
// ABOUTME: Bridge state machine, client connection trait, output framing and the session journal

pub mod bridge;
pub mod frames;
pub mod journal;
pub mod messages;
pub mod transport;

pub use bridge::{BridgeError, SessionEnd, SessionPhase, ShellSource, TerminalBridge};
pub use frames::{Frame, TextFramer};
pub use journal::{JournalLevel, TerminalJournal};
pub use transport::{ClientConnection, TransportError};
