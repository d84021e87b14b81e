//! Spawns and owns one worker process per off-process component,
//! wiring each to a [`crate::bridge::DispatchBridge`] over a FIFO pair.
//!
//! Grounded on `_brica/__init__.py`'s `Dispatcher`, generalized from one
//! worker per `Dispatcher` instance to a pool keyed by component id, and
//! on the FIFO path/mode conventions from `python/tests/multiprocess.py`.

use crate::bridge::transport::fifo;
use crate::bridge::DispatchBridge;
use crate::error::BridgeError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::sync::Arc;

struct Worker {
    id: String,
    child: Child,
}

/// Owns the child processes backing a set of off-process components. The
/// worker binary is re-exec'd from `std::env::current_exe`, given the
/// component id as an argument, and expected to call back into
/// [`crate::bridge::worker::run_worker_for`] for that id.
///
/// Bridges are kept behind `Arc` so the pool can both retain one for
/// `shutdown_all` and hand a clone to the `Component` that installs it as
/// a transfer function.
pub struct MultiprocessPool {
    base_dir: PathBuf,
    bridges: HashMap<String, Arc<DispatchBridge>>,
    workers: Vec<Worker>,
}

impl MultiprocessPool {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            bridges: HashMap::new(),
            workers: Vec::new(),
        }
    }

    /// Creates the FIFO pair for `id`, spawns `worker_command` (typically
    /// the current executable re-invoked with a flag identifying `id`)
    /// bound to it, and opens the parent side as a [`DispatchBridge`]
    /// ready to install on a [`crate::component::Component`].
    pub fn spawn(
        &mut self,
        id: impl Into<String>,
        worker_command: &mut std::process::Command,
        codecs: crate::bridge::CodecTable,
    ) -> Result<Arc<DispatchBridge>, BridgeError> {
        let id = id.into();
        fifo::create_pair(&self.base_dir, &id)?;
        let child = worker_command.spawn()?;
        let transport = fifo::open_as_parent(&self.base_dir, &id)?;
        let bridge = Arc::new(DispatchBridge::new(id.clone(), Box::new(transport), codecs));

        self.workers.push(Worker { id: id.clone(), child });
        self.bridges.insert(id.clone(), bridge.clone());
        Ok(bridge)
    }

    pub fn bridge(&self, id: &str) -> Option<Arc<DispatchBridge>> {
        self.bridges.get(id).cloned()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Sends the shutdown opcode to every worker and waits for each
    /// process to exit. Errors from an individual shutdown are logged
    /// and do not stop the rest of the pool from being torn down.
    pub fn shutdown_all(&mut self) {
        for (id, bridge) in &self.bridges {
            if let Err(e) = bridge.shutdown() {
                log::warn!("failed to signal shutdown to worker `{id}`: {e}");
            }
        }
        for worker in &mut self.workers {
            match worker.child.wait() {
                Ok(status) if !status.success() => {
                    log::warn!("worker `{}` exited with {status}", worker.id)
                }
                Err(e) => log::warn!("failed to join worker `{}`: {e}", worker.id),
                _ => {}
            }
        }
    }
}

impl Drop for MultiprocessPool {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}
