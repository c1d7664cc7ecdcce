//! Wire protocol shared by the driver and bridge endpoints.
//!
//! Both endpoints speak the same symmetric, length-prefixed encoding over a
//! stream transport:
//!
//! ```text
//! ┌────────────────┐       TCP socket        ┌────────────────┐
//! │     Driver     │ ◄──────────────────────►│     Bridge     │
//! │  (automation)  │   4-byte length + JSON  │ (inside tool)  │
//! └────────────────┘                         └────────────────┘
//! ```
//!
//! # Wire format
//!
//! Each frame is a 4-byte big-endian unsigned length followed by exactly
//! that many payload bytes. The payload is a JSON object with exactly two
//! fields:
//!
//! ```text
//! [00 00 00 27]{"kind":"loadSimulator","payload":null}
//! ```
//!
//! There is no version field; both endpoints must agree on message kinds
//! out of band.
//!
//! # Layers
//!
//! - [`framing`] - frame boundaries over a byte stream, resilient to
//!   partial reads and writes.
//! - [`message`] - the `{kind, payload}` codec and the typed
//!   [`Request`](message::Request) / [`Response`](message::Response) views.

pub mod framing;
pub mod message;

pub use framing::{read_frame, write_frame};
pub use message::{Message, Request, Response};
