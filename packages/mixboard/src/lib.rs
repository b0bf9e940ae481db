//! MixBoard - client driver for the MixBoard video mixer
//!
//! The mixer exposes two plain-text TCP channels: a command channel (701)
//! that answers every command with one response line in order, and an event
//! channel (801) that pushes change notifications. This crate keeps a local
//! replica of the mixer's tally, name and keyer state in sync with both, and
//! exposes it through a cloneable [`SessionHandle`].
//!
//! # Example
//!
//! ```no_run
//! use mixboard::{Action, SessionConfig, SessionEvent, SessionHandle};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SessionConfig {
//!         host: "10.0.0.20".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let session = SessionHandle::spawn(config);
//!     let mut events = session.subscribe();
//!     session.connect().await.unwrap();
//!
//!     // Cut input 2 to program on the current channel
//!     session
//!         .perform(Action::SetProgram { channel: None, input: 2 })
//!         .await
//!         .unwrap();
//!
//!     while let Ok(event) = events.recv().await {
//!         if let SessionEvent::Feedback(kind) = event {
//!             let snapshot = session.snapshot().await.unwrap();
//!             println!("{}: program on 2 = {}", kind.as_str(),
//!                 snapshot.feedback().program_video_input(2));
//!         }
//!     }
//! }
//! ```

mod actor;
pub mod command;
pub mod connection;
mod correlator;
mod error;
pub mod event;
pub mod feedback;
pub mod framing;
pub mod payload;
pub mod query;
pub mod session;
pub mod state;

pub use actor::{SessionHandle, SessionMessage};
pub use command::{Channel, Command, KeyerTarget, PlayDirection, TakeMode};
pub use connection::{
    ConnectionStatus, DEFAULT_COMMAND_PORT, DEFAULT_EVENT_PORT, Port, SessionConfig,
};
pub use correlator::{Continuation, Correlator};
pub use error::MixBoardError;
pub use event::{Event, EventKind, Line, classify};
pub use feedback::{Feedback, FeedbackView};
pub use session::{Action, Session, SessionEvent, Snapshot};
pub use state::{DeviceState, INPUT_ID_LIMIT, KEYER_COUNT, KEYER_LABELS, Keyer, Status, VideoInput};
