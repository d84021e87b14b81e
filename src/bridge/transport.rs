//! Byte-level framing over any duplex channel: a `u32` little-endian
//! length prefix followed by that many bytes. A zero-length frame is a
//! valid frame in its own right (the dictionary terminator and the "no
//! value" sentinel both rely on it), so framing never conflates "empty
//! frame" with "no more frames" — only a transport-level EOF means that.
//!
//! Grounded on the original `pfifo` Reader/Writer pulled in by
//! `_brica/__init__.py`: one blocking read/write per frame, no internal
//! buffering scheme beyond the length prefix.

use crate::error::BridgeError;
use std::io::{Read, Write};

/// A duplex, frame-oriented channel. Implementors only need to move
/// bytes; dictionary and opcode structure live in [`super`].
pub trait FrameTransport {
    /// Reads one frame, or `Ok(None)` on a clean EOF before any byte of
    /// the length prefix was read.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, BridgeError>;

    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), BridgeError>;
}

/// Reads/writes length-prefixed frames over any `Read + Write` pair,
/// such as the two ends of a POSIX FIFO opened as files.
pub struct StreamTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> StreamTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: Read, W: Write> FrameTransport for StreamTransport<R, W> {
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, BridgeError> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(BridgeError::Io(e)),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        if len > 0 {
            self.reader
                .read_exact(&mut body)
                .map_err(|_| BridgeError::MalformedFrame)?;
        }
        Ok(Some(body))
    }

    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), BridgeError> {
        let len = u32::try_from(bytes.len()).map_err(|_| BridgeError::MalformedFrame)?;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Opens the pair of named FIFOs a worker process expects, per spec.md
/// §4.6: `<id>c` carries parent-to-child frames (parent writes, child
/// reads) and `<id>p` carries child-to-parent frames (child writes,
/// parent reads). Creates both with `mkfifo` if they don't already exist.
#[cfg(unix)]
pub mod fifo {
    use super::*;
    use nix::sys::stat::Mode;
    use nix::unistd::mkfifo;
    use std::fs::{File, OpenOptions};
    use std::path::{Path, PathBuf};

    /// The `<id>p` FIFO: carries child-to-parent frames.
    fn parent_path(base: &Path, id: &str) -> PathBuf {
        base.join(format!("{id}p"))
    }

    /// The `<id>c` FIFO: carries parent-to-child frames.
    fn child_path(base: &Path, id: &str) -> PathBuf {
        base.join(format!("{id}c"))
    }

    fn ensure_fifo(path: &Path) -> Result<(), BridgeError> {
        if !path.exists() {
            mkfifo(path, Mode::from_bits_truncate(0o644))
                .map_err(|e| BridgeError::Io(std::io::Error::from_raw_os_error(e as i32)))?;
        }
        Ok(())
    }

    /// Creates both FIFOs for `id` under `base` if missing. Call once,
    /// before either side opens the pair (opening a FIFO for reading
    /// blocks until a writer attaches, and vice versa).
    pub fn create_pair(base: &Path, id: &str) -> Result<(), BridgeError> {
        ensure_fifo(&parent_path(base, id))?;
        ensure_fifo(&child_path(base, id))?;
        Ok(())
    }

    /// Opens the pair from the parent's side: writes to `<id>c`
    /// (parent-to-child), reads from `<id>p` (child-to-parent), per
    /// spec.md §4.6's `parent->child = c, child->parent = p` naming.
    pub fn open_as_parent(
        base: &Path,
        id: &str,
    ) -> Result<StreamTransport<File, File>, BridgeError> {
        let writer = OpenOptions::new().write(true).open(child_path(base, id))?;
        let reader = OpenOptions::new().read(true).open(parent_path(base, id))?;
        Ok(StreamTransport::new(reader, writer))
    }

    /// Opens the pair from the worker's side: reads from `<id>c`
    /// (parent-to-child), writes to `<id>p` (child-to-parent).
    pub fn open_as_worker(
        base: &Path,
        id: &str,
    ) -> Result<StreamTransport<File, File>, BridgeError> {
        let reader = OpenOptions::new().read(true).open(child_path(base, id))?;
        let writer = OpenOptions::new().write(true).open(parent_path(base, id))?;
        Ok(StreamTransport::new(reader, writer))
    }
}

/// An in-memory loopback transport for deterministic tests: frames
/// written on one end appear on the other end's read queue. Stands in
/// for a real FIFO pair without needing a subprocess.
pub struct DuplexTransport {
    inbox: std::sync::mpsc::Receiver<Vec<u8>>,
    outbox: std::sync::mpsc::Sender<Vec<u8>>,
}

impl DuplexTransport {
    /// Builds a connected pair: frames sent on one side's `outbox` are
    /// received on the other's `inbox`.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = std::sync::mpsc::channel();
        let (tx_b, rx_b) = std::sync::mpsc::channel();
        (
            Self { inbox: rx_b, outbox: tx_a },
            Self { inbox: rx_a, outbox: tx_b },
        )
    }
}

impl FrameTransport for DuplexTransport {
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, BridgeError> {
        match self.inbox.recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(_) => Ok(None),
        }
    }

    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), BridgeError> {
        self.outbox
            .send(bytes.to_vec())
            .map_err(|_| BridgeError::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplex_transport_roundtrips_frames_including_empty() {
        let (mut a, mut b) = DuplexTransport::pair();
        a.write_frame(b"hello").unwrap();
        a.write_frame(b"").unwrap();
        assert_eq!(b.read_frame().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(b.read_frame().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn duplex_transport_reports_eof_after_sender_dropped() {
        let (a, mut b) = DuplexTransport::pair();
        drop(a);
        assert_eq!(b.read_frame().unwrap(), None);
    }
}
