//! A named unit of computation: input ports, output ports, and a pure
//! transfer function, participating in the collect/execute/expose
//! protocol. Grounded on the teacher's `Component` (`modeling/component.rs`):
//! same dual map+vec port storage so iteration over all ports stays
//! cache-friendly while lookup by name stays O(1), minus the `Shared<dyn
//! ErasedPort>` cross-referencing the teacher needs for its port-to-port
//! `propagate` — our ports never reference each other directly, since the
//! graph mediates every cross-component read (see [`crate::graph::Graph`]).

use crate::error::{ComponentError, PortDirectionLabel, WiringError};
use crate::payload::{Dict, PortValue, TransferFn};
use crate::port::{Port, PortDirection};
use std::collections::HashMap;
use std::fmt;

/// Whether missing-port references during collect/execute are fatal or
/// silently ignored. Selected per component (the natural seam, since
/// collect/execute run per-component) rather than globally on the
/// scheduler; see `DESIGN.md` for the rationale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    Strict,
    Permissive,
}

pub struct Component {
    name: String,
    strictness: Strictness,
    input_map: HashMap<String, usize>,
    output_map: HashMap<String, usize>,
    input_vec: Vec<Port>,
    output_vec: Vec<Port>,
    transfer: Box<dyn TransferFn>,
    last_inputs: Dict,
    last_outputs: Dict,
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("strictness", &self.strictness)
            .field("inputs", &self.input_vec.iter().map(Port::name).collect::<Vec<_>>())
            .field("outputs", &self.output_vec.iter().map(Port::name).collect::<Vec<_>>())
            .finish()
    }
}

impl Component {
    pub fn new(name: impl Into<String>, transfer: impl TransferFn + 'static) -> Self {
        Self::with_strictness(name, transfer, Strictness::Strict)
    }

    /// Builds a component with a generated name, for callers that don't
    /// care to name it themselves. Mirrors the optional-name constructor
    /// the original Python components supported.
    pub fn new_anonymous(transfer: impl TransferFn + 'static) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self::new(format!("component-{id}"), transfer)
    }

    pub fn with_strictness(
        name: impl Into<String>,
        transfer: impl TransferFn + 'static,
        strictness: Strictness,
    ) -> Self {
        Self {
            name: name.into(),
            strictness,
            input_map: HashMap::new(),
            output_map: HashMap::new(),
            input_vec: Vec::new(),
            output_vec: Vec::new(),
            transfer: Box::new(transfer),
            last_inputs: Dict::new(),
            last_outputs: Dict::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    fn add_port(
        ports_map: &mut HashMap<String, usize>,
        ports_vec: &mut Vec<Port>,
        name: &str,
        direction: PortDirection,
        component: &str,
    ) -> Result<(), WiringError> {
        if ports_map.contains_key(name) {
            return Err(WiringError::DuplicatePort {
                component: component.to_string(),
                port: name.to_string(),
            });
        }
        ports_map.insert(name.to_string(), ports_vec.len());
        ports_vec.push(Port::new(name, direction));
        Ok(())
    }

    /// Creates a new input port. Errors if an input OR output port
    /// already exists with this name (a port name is unique across both
    /// directions within a component).
    pub fn make_in_port(&mut self, name: &str) -> Result<(), WiringError> {
        if self.output_map.contains_key(name) {
            return Err(WiringError::DuplicatePort {
                component: self.name.clone(),
                port: name.to_string(),
            });
        }
        Self::add_port(&mut self.input_map, &mut self.input_vec, name, PortDirection::In, &self.name)
    }

    pub fn make_out_port(&mut self, name: &str) -> Result<(), WiringError> {
        if self.input_map.contains_key(name) {
            return Err(WiringError::DuplicatePort {
                component: self.name.clone(),
                port: name.to_string(),
            });
        }
        Self::add_port(&mut self.output_map, &mut self.output_vec, name, PortDirection::Out, &self.name)
    }

    pub fn has_in_port(&self, name: &str) -> bool {
        self.input_map.contains_key(name)
    }

    pub fn has_out_port(&self, name: &str) -> bool {
        self.output_map.contains_key(name)
    }

    pub(crate) fn in_port(&self, name: &str) -> Option<&Port> {
        self.input_map.get(name).map(|&i| &self.input_vec[i])
    }

    pub(crate) fn in_port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.input_map.get(name).copied().map(move |i| &mut self.input_vec[i])
    }

    pub(crate) fn out_port(&self, name: &str) -> Option<&Port> {
        self.output_map.get(name).map(|&i| &self.output_vec[i])
    }

    /// Last value delivered to this input at the most recent collect
    /// (the exposed slot of the input port); empty if never delivered.
    pub fn get_input(&self, name: &str) -> Option<&PortValue> {
        self.in_port(name).map(|p| p.get_exposed())
    }

    /// Last value produced by execute for this output: the staged slot
    /// if non-empty, else the exposed slot. Distinct from
    /// [`Component::get_out_port_value`], which is the post-expose view only.
    pub fn get_output(&self, name: &str) -> Option<&PortValue> {
        self.out_port(name).map(|p| {
            if p.get_staged().is_empty() {
                p.get_exposed()
            } else {
                p.get_staged()
            }
        })
    }

    pub fn get_in_port_value(&self, name: &str) -> Option<&PortValue> {
        self.in_port(name).map(|p| p.get_exposed())
    }

    pub fn get_out_port_value(&self, name: &str) -> Option<&PortValue> {
        self.out_port(name).map(|p| p.get_exposed())
    }

    pub fn last_inputs(&self) -> &Dict {
        &self.last_inputs
    }

    pub fn last_outputs(&self) -> &Dict {
        &self.last_outputs
    }

    pub fn is_input_empty(&self) -> bool {
        self.input_vec.iter().all(Port::is_empty)
    }

    pub fn is_output_empty(&self) -> bool {
        self.output_vec.iter().all(Port::is_empty)
    }

    pub(crate) fn input_port_names(&self) -> impl Iterator<Item = &str> {
        self.input_vec.iter().map(Port::name)
    }

    /// Delivers a value into an input port's exposed slot directly,
    /// called by the graph's collect orchestration for each wired input.
    /// Ports without an incoming edge are never touched here, matching
    /// "ports without an incoming edge are left unchanged".
    pub(crate) fn deliver(&mut self, port: &str, value: PortValue) {
        if let Some(p) = self.in_port_mut(port) {
            p.set_exposed(value);
        }
    }

    /// Builds `inputs` from every input port's exposed slot, invokes the
    /// transfer function, records `last_outputs`, and stages each
    /// returned key into its output port. Keys naming no output port are
    /// ignored in permissive mode, or reported in strict mode.
    pub fn execute(&mut self) -> Result<(), ComponentError> {
        let inputs: Dict = self
            .input_vec
            .iter()
            .map(|p| (p.name().to_string(), p.get_exposed().clone()))
            .collect();

        let outputs = self.transfer.call(&inputs);

        self.last_inputs = inputs;

        for (port_name, value) in &outputs {
            match self.output_map.get(port_name) {
                Some(&idx) => self.output_vec[idx].stage(value.clone()),
                None if self.strictness == Strictness::Strict => {
                    return Err(ComponentError::UnknownOutputPort(
                        self.name.clone(),
                        port_name.clone(),
                    ))
                }
                None => {}
            }
        }
        self.last_outputs = outputs;
        Ok(())
    }

    /// Promotes every output port's staged value to exposed.
    pub fn expose(&mut self) {
        for p in &mut self.output_vec {
            p.expose();
        }
    }

    pub(crate) fn port_direction(&self, name: &str) -> Option<PortDirection> {
        self.in_port(name)
            .map(|_| PortDirection::In)
            .or_else(|| self.out_port(name).map(|_| PortDirection::Out))
    }

    pub(crate) fn require_out_port(&self, name: &str) -> Result<(), WiringError> {
        if self.has_out_port(name) {
            Ok(())
        } else {
            Err(WiringError::NoSuchPort {
                component: self.name.clone(),
                port: name.to_string(),
                direction: PortDirectionLabel::Out,
            })
        }
    }

    pub(crate) fn require_in_port(&self, name: &str) -> Result<(), WiringError> {
        if self.has_in_port(name) {
            Ok(())
        } else {
            Err(WiringError::NoSuchPort {
                component: self.name.clone(),
                port: name.to_string(),
                direction: PortDirectionLabel::In,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::downcast;

    fn identity(inputs: &Dict) -> Dict {
        inputs.clone()
    }

    #[test]
    fn duplicate_port_name_is_rejected() {
        let mut c = Component::new("c", identity);
        c.make_in_port("x").unwrap();
        assert!(matches!(c.make_in_port("x"), Err(WiringError::DuplicatePort { .. })));
        assert!(matches!(c.make_out_port("x"), Err(WiringError::DuplicatePort { .. })));
    }

    #[test]
    fn execute_stages_and_expose_promotes() {
        let mut c = Component::new(
            "emit",
            |_: &Dict| -> Dict {
                let mut d = Dict::new();
                d.insert("k".into(), PortValue::Value(Box::new(vec![1, 2, 3])));
                d
            },
        );
        c.make_out_port("k").unwrap();
        assert!(c.get_output("k").unwrap().is_empty());

        c.execute().unwrap();
        assert_eq!(
            downcast::<Vec<i32>>(c.get_output("k").unwrap().as_payload().unwrap()),
            Some(&vec![1, 2, 3])
        );
        assert!(c.get_out_port_value("k").unwrap().is_empty());

        c.expose();
        assert_eq!(
            downcast::<Vec<i32>>(c.get_out_port_value("k").unwrap().as_payload().unwrap()),
            Some(&vec![1, 2, 3])
        );
    }

    #[test]
    fn strict_execute_rejects_unknown_output_key() {
        let mut c = Component::new("bad", |_: &Dict| -> Dict {
            let mut d = Dict::new();
            d.insert("nope".into(), PortValue::Empty);
            d
        });
        assert!(matches!(c.execute(), Err(ComponentError::UnknownOutputPort(_, _))));
    }

    #[test]
    fn permissive_execute_ignores_unknown_output_key() {
        let mut c = Component::with_strictness(
            "ok",
            |_: &Dict| -> Dict {
                let mut d = Dict::new();
                d.insert("nope".into(), PortValue::Empty);
                d
            },
            Strictness::Permissive,
        );
        assert!(c.execute().is_ok());
    }
}
