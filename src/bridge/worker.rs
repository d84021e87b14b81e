//! The worker side of the dispatch bridge: a blocking loop that mirrors
//! `_brica/__init__.py`'s `run(name, f)` — read an opcode, act on it,
//! repeat until shutdown or the parent closes the pipe.

use super::{read_dict, write_dict, CodecTable, OP_EXECUTE, OP_SHUTDOWN};
use crate::bridge::transport::FrameTransport;
use crate::error::BridgeError;
use crate::payload::{Dict, TransferFn};
use std::collections::HashMap;

/// One entry a worker process can dispatch to: the transfer function
/// plus the codec table describing its ports' wire encoding.
pub struct WorkerEntry {
    pub transfer: Box<dyn TransferFn>,
    pub codecs: CodecTable,
}

/// Maps component ids to the transfer function a worker process should
/// run for them. Populated identically on both sides of a fork/spawn: the
/// parent knows it only as a name to route to, the worker resolves it to
/// an actual closure.
#[derive(Default)]
pub struct WorkerRegistry {
    entries: HashMap<String, WorkerEntry>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, entry: WorkerEntry) {
        self.entries.insert(id.into(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&WorkerEntry> {
        self.entries.get(id)
    }
}

/// Runs the worker loop for component `id` against `transport` until the
/// parent sends [`OP_SHUTDOWN`] or closes its end. `OP_INTROSPECT` is
/// deliberately not handled here (see its doc comment in
/// [`super::OP_INTROSPECT`]) and falls through to the unknown-opcode log;
/// a missing registry entry is fatal, since the worker process was
/// spawned specifically to serve `id`.
pub fn run_worker_for(
    id: &str,
    transport: &mut dyn FrameTransport,
    registry: &WorkerRegistry,
) -> Result<(), BridgeError> {
    let entry = registry
        .get(id)
        .unwrap_or_else(|| panic!("worker process has no registry entry for `{id}`"));

    loop {
        let Some(opcode) = transport.read_frame()? else {
            return Ok(());
        };
        let Some(&op) = opcode.first() else {
            continue;
        };
        match op {
            OP_SHUTDOWN => return Ok(()),
            OP_EXECUTE => {
                let inputs = read_dict(transport, &entry.codecs)?;
                let outputs = entry.transfer.call(&inputs);
                write_dict(transport, &outputs, &entry.codecs)?;
            }
            other => {
                log::warn!("worker `{id}` received unknown opcode {other:#x}, ignoring");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::transport::DuplexTransport;
    use crate::bridge::BincodeCodec;
    use crate::payload::PortValue;

    fn double(inputs: &Dict) -> Dict {
        let mut out = Dict::new();
        if let Some(v) = inputs.get("k").and_then(|v| v.as_payload()) {
            if let Some(n) = crate::payload::downcast::<i32>(v) {
                out.insert("k".to_string(), PortValue::Value(Box::new(n * 2)));
            }
        }
        out
    }

    #[test]
    fn worker_loop_executes_then_shuts_down_on_opcode() {
        let (mut parent, mut child) = DuplexTransport::pair();
        let mut codecs: CodecTable = HashMap::new();
        codecs.insert("k".to_string(), Box::new(BincodeCodec::<i32>::new()));

        let mut registry = WorkerRegistry::new();
        registry.register(
            "doubler",
            WorkerEntry {
                transfer: Box::new(double),
                codecs,
            },
        );

        let handle = std::thread::spawn(move || {
            let registry = registry;
            run_worker_for("doubler", &mut child, &registry)
        });

        parent.write_frame(&[OP_EXECUTE]).unwrap();
        let mut req = Dict::new();
        req.insert("k".to_string(), PortValue::Value(Box::new(21i32)));
        let mut parent_codecs: CodecTable = HashMap::new();
        parent_codecs.insert("k".to_string(), Box::new(BincodeCodec::<i32>::new()));
        write_dict(&mut parent, &req, &parent_codecs).unwrap();
        let reply = read_dict(&mut parent, &parent_codecs).unwrap();
        assert_eq!(
            crate::payload::downcast::<i32>(reply.get("k").unwrap().as_payload().unwrap()),
            Some(&42)
        );

        parent.write_frame(&[OP_SHUTDOWN]).unwrap();
        handle.join().unwrap().unwrap();
    }
}
