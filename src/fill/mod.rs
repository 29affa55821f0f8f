//! Gap-fill resolution.
//!
//! This module owns the request orchestration: the
//! [`GapFillEngine`] walks up the pyramid until real data is found,
//! reconstructs the requested tile from the ancestor it lands on, and tags
//! results with content-derived [`IdentityTag`]s for conditional responses.

mod engine;
mod identity;

pub use engine::{
    EngineConfig, FillOutcome, FillRequest, GapFillEngine, DEFAULT_MAX_INPUT_SIZE,
};
pub use identity::{IdentityTag, IDENTITY_LEN};
