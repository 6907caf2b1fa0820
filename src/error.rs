//! Error types for the curlew crate.

use thiserror::Error;

/// Result type alias for curlew operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for curlew operations.
///
/// The `detail` fields carry the runtime's drained pending fault, when one
/// was recorded, so the failing call's diagnostics survive the unwind.
#[derive(Error, Debug)]
pub enum Error {
    /// A name string could not be decoded into a runtime string.
    #[error("cannot decode name {name:?}: {detail}")]
    Decode {
        /// The name string that failed to decode.
        name: String,
        /// The drained pending fault.
        detail: String,
    },

    /// Module not found or the import itself failed.
    #[error("failed to import module {module:?}: {detail}")]
    Import {
        /// The module name that was requested.
        module: String,
        /// The drained pending fault.
        detail: String,
    },

    /// The module has no export with the requested name.
    #[error("module {module:?} has no attribute {attribute:?}: {detail}")]
    AttributeMissing {
        /// The module that was searched.
        module: String,
        /// The attribute name that was requested.
        attribute: String,
        /// The drained pending fault.
        detail: String,
    },

    /// The attribute exists but cannot be called.
    #[error("attribute {attribute:?} of module {module:?} is not callable")]
    NotInvocable {
        /// The module the attribute was resolved on.
        module: String,
        /// The attribute name.
        attribute: String,
    },

    /// An argument could not be converted or inserted.
    #[error("argument conversion failed: {0}")]
    ArgumentConversion(String),

    /// The call itself failed or returned a value the host cannot marshal.
    #[error("call to {function} failed: {detail}")]
    CallFailure {
        /// Qualified name of the callable.
        function: String,
        /// The drained pending fault, or the marshaling problem.
        detail: String,
    },

    /// Runtime shutdown reported leaked objects.
    #[error("finalize failed: {0}")]
    Finalize(String),

    /// Session options were invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Check if this is an import failure.
    pub fn is_import(&self) -> bool {
        matches!(self, Error::Import { .. })
    }

    /// Check if this is a missing-attribute failure.
    pub fn is_attribute_missing(&self) -> bool {
        matches!(self, Error::AttributeMissing { .. })
    }

    /// Check if this is a not-invocable failure.
    pub fn is_not_invocable(&self) -> bool {
        matches!(self, Error::NotInvocable { .. })
    }

    /// Check if this is a call failure.
    pub fn is_call_failure(&self) -> bool {
        matches!(self, Error::CallFailure { .. })
    }

    /// Check if this is a finalize failure.
    pub fn is_finalize(&self) -> bool {
        matches!(self, Error::Finalize(_))
    }
}
