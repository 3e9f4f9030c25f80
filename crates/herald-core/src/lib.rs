//! # herald-core
//!
//! Foundation types shared by every Herald crate.
//!
//! - **Branded IDs**: [`ConnectionId`] as a newtype over a UUID v7 string
//! - **Events**: [`PushEvent`] with a type label, an opaque serializable payload
//!   and an optional event id; reserved protocol types in [`events::types`]
//! - **Wire framing**: [`frame::encode`] produces the exact server-push bytes,
//!   [`frame::FrameDecoder`] parses them back
//! - **Errors**: [`HeraldError`], [`FrameError`], [`WriteFailure`] via `thiserror`
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod frame;
pub mod ids;
pub mod logging;

pub use errors::{FrameError, HeraldError, Result, WriteFailure};
pub use events::PushEvent;
pub use frame::{DecodedFrame, FrameDecoder};
pub use ids::ConnectionId;
