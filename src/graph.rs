//! The component registry and edge table. Grounded on the teacher's
//! `Coupled` (`modeling/coupled.rs`): the same `comps_map: HashMap<String,
//! usize>` + `comps_vec: Vec<_>` split for O(1) name lookup with
//! cache-friendly iteration, generalized from a DEVS coupling hierarchy
//! (EIC/IC/EOC) to a flat directed edge list, since this runtime has no
//! nested coupled models — wiring order plus buffered delivery already
//! gives the scheduling semantics spec.md calls for.
//!
//! Edges hold component/port name pairs, never handles into one another's
//! ports: per the teacher's own re-architecture note, "graph cycles...
//! are references, not ownership."

use crate::component::Component;
use crate::error::WiringError;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Edge {
    producer: String,
    out_port: String,
    consumer: String,
    in_port: String,
}

/// Owns every component and every edge between them. A component's input
/// port has at most one incoming edge (single-producer); an output port
/// may fan out to arbitrarily many.
#[derive(Default)]
pub struct Graph {
    comps_map: HashMap<String, usize>,
    comps_vec: Vec<Component>,
    edges: Vec<Edge>,
    /// (consumer, in_port) -> index into `edges`, enforcing invariant 3
    /// (at most one incoming edge per input port) in O(1).
    incoming: HashMap<(String, String), usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(&mut self, component: Component) -> Result<(), WiringError> {
        let name = component.name().to_string();
        if self.comps_map.contains_key(&name) {
            return Err(WiringError::DuplicateComponent(name));
        }
        self.comps_map.insert(name, self.comps_vec.len());
        self.comps_vec.push(component);
        Ok(())
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.comps_map.get(name).map(|&i| &self.comps_vec[i])
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.comps_map.get(name).copied().map(move |i| &mut self.comps_vec[i])
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.comps_vec.iter().map(Component::name)
    }

    fn require_component(&self, name: &str) -> Result<&Component, WiringError> {
        self.component(name)
            .ok_or_else(|| WiringError::UnknownComponent(name.to_string()))
    }

    /// Registers a directed edge from `producer.out_port` to
    /// `consumer.in_port`. Rejects if either component is missing, either
    /// port is missing or has the wrong direction, or `in_port` already
    /// has an incoming edge.
    pub fn connect(
        &mut self,
        producer: &str,
        out_port: &str,
        consumer: &str,
        in_port: &str,
    ) -> Result<(), WiringError> {
        self.require_component(producer)?.require_out_port(out_port)?;
        self.require_component(consumer)?.require_in_port(in_port)?;

        let key = (consumer.to_string(), in_port.to_string());
        if self.incoming.contains_key(&key) {
            return Err(WiringError::AlreadyWired {
                component: consumer.to_string(),
                port: in_port.to_string(),
            });
        }

        let idx = self.edges.len();
        self.edges.push(Edge {
            producer: producer.to_string(),
            out_port: out_port.to_string(),
            consumer: consumer.to_string(),
            in_port: in_port.to_string(),
        });
        self.incoming.insert(key, idx);
        Ok(())
    }

    /// For every input port of `component` with an incoming edge, reads
    /// the producer's exposed output value and writes it into the input
    /// port's exposed slot. Inputs with no incoming edge are untouched.
    pub fn collect(&mut self, component: &str) -> Result<(), WiringError> {
        let port_names: Vec<String> = self
            .require_component(component)?
            .input_port_names()
            .map(str::to_string)
            .collect();

        for in_port in port_names {
            let key = (component.to_string(), in_port.clone());
            let Some(&edge_idx) = self.incoming.get(&key) else {
                continue;
            };
            let edge = self.edges[edge_idx].clone();
            let value = self
                .require_component(&edge.producer)?
                .get_out_port_value(&edge.out_port)
                .cloned()
                .unwrap_or(crate::payload::PortValue::Empty);

            self.component_mut(component)
                .expect("component existed a moment ago")
                .deliver(&in_port, value);
        }
        Ok(())
    }
}
