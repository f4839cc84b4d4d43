//! Router module for model selection.
//!
//! Picks the upstream model for a conversation: the text model for pure
//! text, the vision model (with an ordered fallback list) when any message
//! carries an image.

mod selector;

pub use selector::ModelRouter;
