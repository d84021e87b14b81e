//! Error taxonomy for the runtime: wiring errors, transfer failures, timing
//! errors, and transport/bridge failures, per the error handling design.

use std::fmt;
use thiserror::Error;

/// Raised while assembling the component/port/edge graph. Fatal at
/// construction time: the caller is expected to stop building the graph
/// rather than attempt to recover.
#[derive(Debug, Error)]
pub enum WiringError {
    #[error("component `{0}` does not exist")]
    UnknownComponent(String),

    #[error("component `{component}` already contains a port named `{port}`")]
    DuplicatePort { component: String, port: String },

    #[error("component `{component}` has no {direction} port named `{port}`")]
    NoSuchPort {
        component: String,
        port: String,
        direction: PortDirectionLabel,
    },

    #[error("input port `{component}.{port}` already has an incoming edge")]
    AlreadyWired { component: String, port: String },

    #[error("coupled model already contains a component named `{0}`")]
    DuplicateComponent(String),
}

/// Used only for error messages; mirrors `crate::port::PortDirection`
/// without creating a dependency cycle between the two modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirectionLabel {
    In,
    Out,
}

impl fmt::Display for PortDirectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirectionLabel::In => write!(f, "input"),
            PortDirectionLabel::Out => write!(f, "output"),
        }
    }
}

/// Raised by `Component::execute` in strict mode, or propagated from a
/// user-supplied transfer function.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("transfer function for `{0}` referenced unknown input port `{1}`")]
    UnknownInputPort(String, String),

    #[error("transfer function for `{0}` returned unknown output port `{1}`")]
    UnknownOutputPort(String, String),

    #[error("transfer function for `{0}` panicked or failed: {1}")]
    TransferFailed(String, String),
}

/// One step of the scheduler aborted because a component-local error could
/// not be absorbed (only in-process failures propagate this far; bridge
/// failures are absorbed at the bridge boundary per the design).
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Wiring(#[from] WiringError),
}

/// Failures absorbed by the dispatch bridge: malformed frames, decode
/// failures, and transport-level EOF. These never propagate past the
/// bridge; they are logged and converted to an empty outputs dictionary.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame was truncated or malformed")]
    MalformedFrame,

    #[error("payload codec failed: {0}")]
    Codec(#[from] CodecError),

    #[error("worker closed the connection")]
    Eof,
}

/// Raised by a `Codec` implementation when encoding or decoding a payload
/// fails. The core treats encode/decode as a pluggable bijection; it does
/// not interpret the failure beyond propagating it.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(String),

    #[error("failed to decode payload: {0}")]
    Decode(String),
}
