//! Change feed over WebSocket.
//!
//! Clients connect to `/v1/changes`, subscribe to the collections they care
//! about, and receive a `changed` message for every document created,
//! updated or deleted in those collections.

mod hub;

pub use hub::{ChangeHub, MessageSender};
