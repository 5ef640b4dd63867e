//! Translation between the client-facing chat-completions surface and the
//! backend.
//!
//! Request building, stream re-framing and response reshaping all live here.
//! Every function in this module is pure (no I/O).

pub mod request;
pub mod response;
pub mod streaming;
pub mod types;
