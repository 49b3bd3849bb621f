//! Error type of the crate.
use crate::{datatypes::Label, formula::Atom};
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TddError>;

/// Errors which can occur while compiling, querying or persisting a theory diagram.
#[derive(Debug, Error)]
pub enum TddError {
    /// The theory reasoner gave up; the message is passed on unchanged.
    #[error("theory reasoner failed: {0}")]
    ReasonerFailure(String),

    /// A supplied ordering or vtree does not mention every label exactly once.
    #[error("ordering does not cover the label set exactly once: {0}")]
    OrderingMismatch(String),

    /// A label was refined which the abstraction mapping never assigned.
    #[error("label {0} was never assigned to an atom")]
    UnknownLabel(Label),

    /// An atom reached the diagram builder without being assigned a label.
    #[error("atom '{0}' has no label in the abstraction mapping")]
    UnmappedAtom(Atom),

    /// A persisted diagram folder is incomplete or unreadable.
    #[error("persisted state is corrupt, component '{component}': {reason}")]
    CorruptPersistedState {
        /// The file or section which could not be restored.
        component: String,
        /// What went wrong.
        reason: String,
    },

    /// The textual formula could not be parsed.
    #[error("could not parse formula, remaining input: '{0}'")]
    Parse(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TddError {
    pub(crate) fn corrupt(component: impl Into<String>, reason: impl ToString) -> Self {
        TddError::CorruptPersistedState {
            component: component.into(),
            reason: reason.to_string(),
        }
    }
}
