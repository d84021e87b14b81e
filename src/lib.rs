//! A discrete-event dataflow runtime: components exchange values through
//! named ports on a one-step buffered delivery discipline, driven by a
//! [`scheduler::VirtualTimeScheduler`] across collect/execute/expose
//! phase barriers. Components may run in-process or, via
//! [`bridge`]/[`pool`], in a separate worker process reached over a
//! framed FIFO protocol.

pub mod bridge;
pub mod component;
pub mod error;
pub mod graph;
pub mod payload;
pub mod pool;
pub mod port;
pub mod scheduler;
pub mod timing;

pub use component::{Component, Strictness};
pub use error::{BridgeError, CodecError, ComponentError, StepError, WiringError};
pub use graph::Graph;
pub use payload::{downcast, Dict, Payload, PayloadBox, PortValue, TransferFn};
pub use pool::MultiprocessPool;
pub use port::{Port, PortDirection};
pub use scheduler::VirtualTimeScheduler;
pub use timing::Timing;
