//! The opaque value carried along edges, plus the dictionary shape that
//! flows through collect/execute/expose: a mapping from port name to
//! either a value or the "no value" sentinel.
//!
//! The core only ever needs equality-irrelevant identity on a payload: it
//! is moved around and cloned, never compared or interpreted. Encoding for
//! off-process transport is a separate, pluggable concern (see
//! [`crate::bridge::Codec`]).

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;

/// An opaque, immutable value carried along an edge.
///
/// Mirrors the teacher's `Port<T>` bound (`T: 'static + Clone + Debug`),
/// widened with `Send + Sync` so payloads can cross the thread boundary a
/// worker-backed [`crate::bridge::DispatchBridge`] or a parallel scheduler
/// phase introduces.
pub trait Payload: Any + Debug + Send + Sync {
    /// Clones the payload into a fresh box. Required because `Box<dyn
    /// Payload>` itself can't derive `Clone`.
    fn box_clone(&self) -> PayloadBox;

    /// Type-erased view, for downcasting back to a concrete `T` when the
    /// caller knows what it put in.
    fn as_any(&self) -> &dyn Any;
}

impl<T> Payload for T
where
    T: Any + Debug + Clone + Send + Sync,
{
    fn box_clone(&self) -> PayloadBox {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A boxed, type-erased [`Payload`].
pub type PayloadBox = Box<dyn Payload>;

impl Clone for PayloadBox {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Downcasts a payload box back to a concrete type, e.g. when a transfer
/// function or test wants to inspect a value it knows the shape of.
pub fn downcast<T: 'static>(payload: &PayloadBox) -> Option<&T> {
    payload.as_any().downcast_ref::<T>()
}

/// The value held by one key of an inputs/outputs dictionary: either a
/// concrete payload, or the explicit "no value" sentinel.
///
/// Distinct from a key simply being *absent* from a dictionary: a
/// transfer function that returns a dictionary with no entry for an
/// output port leaves that port's staged slot untouched, whereas
/// returning `PortValue::Empty` for a key actively overwrites (clears)
/// whatever was pending there. See [`crate::port::Port::stage`].
#[derive(Debug, Clone)]
pub enum PortValue {
    Empty,
    Value(PayloadBox),
}

impl PortValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, PortValue::Empty)
    }

    pub fn as_payload(&self) -> Option<&PayloadBox> {
        match self {
            PortValue::Empty => None,
            PortValue::Value(v) => Some(v),
        }
    }

    pub fn into_payload(self) -> Option<PayloadBox> {
        match self {
            PortValue::Empty => None,
            PortValue::Value(v) => Some(v),
        }
    }
}

impl From<PayloadBox> for PortValue {
    fn from(value: PayloadBox) -> Self {
        PortValue::Value(value)
    }
}

/// Mapping from port name to value-or-empty, as passed to and returned
/// from a transfer function.
pub type Dict = HashMap<String, PortValue>;

/// A pure transfer function: `{in-port-name -> value-or-empty} -> {out-port-name -> value-or-empty}`.
///
/// Implemented for any `Fn(&Dict) -> Dict + Send + Sync`, so plain
/// closures work directly; [`crate::bridge::DispatchBridge`] is the other
/// implementer, forwarding the call to a worker process.
pub trait TransferFn: Send + Sync {
    fn call(&self, inputs: &Dict) -> Dict;
}

impl<F> TransferFn for F
where
    F: Fn(&Dict) -> Dict + Send + Sync,
{
    fn call(&self, inputs: &Dict) -> Dict {
        self(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_clone_roundtrips_through_any() {
        let value: PayloadBox = Box::new(42i32);
        let cloned = value.clone();
        assert_eq!(downcast::<i32>(&cloned), Some(&42));
    }

    #[test]
    fn port_value_empty_has_no_payload() {
        assert!(PortValue::Empty.as_payload().is_none());
        let v = PortValue::Value(Box::new(String::from("hi")));
        assert_eq!(downcast::<String>(v.as_payload().unwrap()).unwrap(), "hi");
    }
}
