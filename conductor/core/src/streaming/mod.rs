//! Streaming Response Ingestion
//!
//! The read side of a chat session, leaves first:
//!
//! ```text
//!   response body (Bytes)
//!          │
//!          ▼
//!   decoder::decode_lines     complete `\n`-terminated lines
//!          │
//!          ▼
//!   frame::parse_frame        reasoning / answer / error / done
//!          │
//!          ▼
//!   thinking::extract         thinking vs. content buffers
//! ```
//!
//! Everything here is independent of the session state machine so each stage
//! can be tested alone. The conductor strings them together.

pub mod decoder;
pub mod frame;
pub mod thinking;

pub use decoder::{decode_lines, FrameDecoder};
pub use frame::{parse_frame, Frame};
pub use thinking::{extract, placeholder_note, Delimiter, ReplyBuffers, DELIMITERS};
