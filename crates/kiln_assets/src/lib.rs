//! Kiln Assets
//!
//! Shared vocabulary for asynchronously produced assets:
//!
//! - [`AssetState`] and [`Payload`]: the state machine and immutable buffers
//!   every pending asset resolves to
//! - [`DependencyToken`] / [`DependencyValidation`]: file dependency tracking
//!   used by owning caches to decide when to rebuild
//! - [`InvalidAssetRegistry`]: ledger of failed assets with change
//!   notification, read by tooling

pub mod dep_val;
pub mod invalid;
pub mod state;

pub use dep_val::{
    DepValPtr, DependencyToken, DependencyValidation, DependentFileState, FileTimestampValidation,
};
pub use invalid::{ChangeEventId, InvalidAssetRecord, InvalidAssetRegistry, OnChangeEvent};
pub use state::{AssetState, Payload, empty_payload, payload_as_text, text_payload};
