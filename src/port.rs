//! A named, one-slot buffer belonging to a component, with a staged slot
//! (written by execute, not yet visible) and an exposed slot (visible to
//! downstream collects). Direction is fixed at creation.

use crate::payload::PortValue;
use std::fmt;

/// Direction of a [`Port`], fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    In,
    Out,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::In => write!(f, "input"),
            PortDirection::Out => write!(f, "output"),
        }
    }
}

/// One-slot buffer with a staged and an exposed value.
///
/// Input ports never go through `stage`/`expose` themselves: the
/// scheduler's collect phase writes straight into the exposed slot via
/// [`Port::set_exposed`], since an input has no execute of its own to
/// stage a value in the first place.
#[derive(Debug)]
pub struct Port {
    name: String,
    direction: PortDirection,
    staged: PortValue,
    exposed: PortValue,
}

impl Port {
    pub fn new(name: impl Into<String>, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            staged: PortValue::Empty,
            exposed: PortValue::Empty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Writes the staged slot, overwriting any prior unpromoted value.
    pub fn stage(&mut self, value: PortValue) {
        self.staged = value;
    }

    /// Promotes a non-empty staged value to exposed and clears staged.
    /// If staged is empty, the exposed slot is left untouched (the
    /// previous value stays visible). Calling this twice in a row with
    /// no intervening `stage` is a no-op on the second call.
    pub fn expose(&mut self) {
        if !self.staged.is_empty() {
            self.exposed = std::mem::replace(&mut self.staged, PortValue::Empty);
        }
    }

    pub fn get_exposed(&self) -> &PortValue {
        &self.exposed
    }

    pub fn get_staged(&self) -> &PortValue {
        &self.staged
    }

    /// Used by the collect phase to deliver a value directly into an
    /// input port's exposed slot, bypassing staging entirely.
    pub fn set_exposed(&mut self, value: PortValue) {
        self.exposed = value;
    }

    pub fn is_empty(&self) -> bool {
        self.exposed.is_empty() && self.staged.is_empty()
    }

    pub fn clear(&mut self) {
        self.staged = PortValue::Empty;
        self.exposed = PortValue::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::downcast;

    fn val(v: i32) -> PortValue {
        PortValue::Value(Box::new(v))
    }

    #[test]
    fn new_port_is_empty() {
        let p = Port::new("x", PortDirection::Out);
        assert!(p.get_exposed().is_empty());
        assert!(p.get_staged().is_empty());
    }

    #[test]
    fn expose_promotes_staged_and_clears_it() {
        let mut p = Port::new("x", PortDirection::Out);
        p.stage(val(7));
        assert!(!p.get_staged().is_empty());
        assert!(p.get_exposed().is_empty());

        p.expose();
        assert!(p.get_staged().is_empty());
        assert_eq!(
            downcast::<i32>(p.get_exposed().as_payload().unwrap()),
            Some(&7)
        );
    }

    #[test]
    fn expose_with_empty_staged_leaves_exposed_untouched() {
        let mut p = Port::new("x", PortDirection::Out);
        p.stage(val(1));
        p.expose();
        // no stage() call this round
        p.expose();
        assert_eq!(
            downcast::<i32>(p.get_exposed().as_payload().unwrap()),
            Some(&1)
        );
    }

    #[test]
    fn idempotent_double_expose_is_a_no_op() {
        let mut p = Port::new("x", PortDirection::Out);
        p.stage(val(3));
        p.expose();
        let after_first = format!("{:?}", p.get_exposed());
        p.expose();
        let after_second = format!("{:?}", p.get_exposed());
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn set_exposed_writes_input_port_directly() {
        let mut p = Port::new("x", PortDirection::In);
        p.set_exposed(val(9));
        assert_eq!(
            downcast::<i32>(p.get_exposed().as_payload().unwrap()),
            Some(&9)
        );
        // staged slot never touched for inputs
        assert!(p.get_staged().is_empty());
    }

    proptest::proptest! {
        /// For any sequence of stage/no-stage decisions, repeated `expose`
        /// calls always leave the exposed slot holding either the empty
        /// sentinel or the most recently staged value, never anything
        /// from further back in the sequence.
        #[test]
        fn expose_always_reflects_latest_staged_or_prior_exposed(
            stages in proptest::collection::vec(proptest::option::of(0i32..1000), 1..20),
        ) {
            let mut p = Port::new("x", PortDirection::Out);
            let mut expected: Option<i32> = None;
            for maybe_value in stages {
                match maybe_value {
                    Some(v) => {
                        p.stage(val(v));
                        p.expose();
                        expected = Some(v);
                    }
                    None => {
                        p.expose();
                        // no intervening stage(): exposed must be unchanged
                    }
                }
                match expected {
                    Some(v) => assert_eq!(downcast::<i32>(p.get_exposed().as_payload().unwrap()), Some(&v)),
                    None => assert!(p.get_exposed().is_empty()),
                }
            }
        }
    }
}
