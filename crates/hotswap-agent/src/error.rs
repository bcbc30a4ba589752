//! Error types for recording and synthesis

use hotswap_classfile::{CodecError, DecodeError, VerifyError};
use thiserror::Error;

use crate::key::ReflectiveKey;
use crate::loader::LoadError;

/// A proxy could not be built or loaded. Never retried.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The attribute could not be transcoded
    #[error("Cannot transcode annotation attribute: {0}")]
    Codec(#[from] CodecError),

    /// The built definition did not decode
    #[error("Proxy {name} does not decode: {source}")]
    Decode {
        /// Proxy name
        name: String,
        /// Decode failure
        #[source]
        source: DecodeError,
    },

    /// The built definition failed verification
    #[error("Proxy {name} failed verification: {source}")]
    Verify {
        /// Proxy name
        name: String,
        /// Verification failure
        #[source]
        source: VerifyError,
    },

    /// The loader could not define or find the proxy
    #[error("Loading proxy {name} failed: {source}")]
    Load {
        /// Proxy name
        name: String,
        /// Load failure
        #[source]
        source: LoadError,
    },

    /// The loaded parameter proxy has no annotated method
    #[error("Parameter proxy {0} lost its carrier method")]
    MissingParameterMethod(String),
}

/// Metadata store errors
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// Recording failed; the key stays unrecorded
    #[error("Recording annotations for {key} failed: {source}")]
    Synthesis {
        /// Entity being recorded
        key: ReflectiveKey,
        /// Cause
        #[source]
        source: SynthesisError,
    },

    /// A read for a key that was never recorded
    #[error("No annotation data recorded for {0}")]
    Unrecorded(ReflectiveKey),

    /// Parameter attribute arity disagrees with the declaration
    #[error("{key} declares {declared} parameters but the attribute has {recorded}")]
    ParameterCountMismatch {
        /// Method or constructor
        key: ReflectiveKey,
        /// Declared parameter count
        declared: usize,
        /// Positions in the attribute
        recorded: usize,
    },
}

impl AnnotationError {
    /// Entity the error concerns
    pub fn key(&self) -> ReflectiveKey {
        match self {
            AnnotationError::Synthesis { key, .. }
            | AnnotationError::Unrecorded(key)
            | AnnotationError::ParameterCountMismatch { key, .. } => *key,
        }
    }
}
