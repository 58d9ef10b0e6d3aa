//! In-memory loopback device
//!
//! A set of named rings, each a bounded lock-free queue of frames. Every
//! `open(name)` returns a new channel onto the same ring: what one channel
//! writes, any other channel on that name reads back, frame by frame.
//!
//! Stands in for the SRIO window in tests and in the pipeline tool.

use fica_core::{ChannelProvider, HardwareChannel, HardwareError, HwResult};

use crossbeam_queue::ArrayQueue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

type Ring = Arc<ArrayQueue<Vec<u8>>>;

/// Virtual device with named fixed-depth rings
pub struct LoopbackDevice {
    rings: Mutex<HashMap<String, Ring>>,
    /// Frames per ring
    depth: usize,
    /// Largest frame a single write accepts, 0 = no limit
    max_frame: usize,
}

impl LoopbackDevice {
    /// Empty device; rings hold `depth` frames each.
    pub fn new(depth: usize) -> Self {
        Self {
            rings: Mutex::new(HashMap::new()),
            depth: depth.max(1),
            max_frame: 0,
        }
    }

    /// Device with the given rings already created
    pub fn with_rings(depth: usize, names: &[&str]) -> Self {
        let dev = Self::new(depth);
        for name in names {
            dev.add_ring(name);
        }
        dev
    }

    /// Cap single writes at `bytes`; longer writes are cut short.
    pub fn max_frame(mut self, bytes: usize) -> Self {
        self.max_frame = bytes;
        self
    }

    /// Create ring `name` if it does not exist yet
    pub fn add_ring(&self, name: &str) {
        let mut rings = self.rings.lock().unwrap_or_else(PoisonError::into_inner);
        rings
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ArrayQueue::new(self.depth)));
    }

    /// Frames waiting on ring `name`
    pub fn pending(&self, name: &str) -> Option<usize> {
        let rings = self.rings.lock().unwrap_or_else(PoisonError::into_inner);
        rings.get(name).map(|r| r.len())
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl ChannelProvider for LoopbackDevice {
    type Channel = LoopbackChannel;

    fn open(&self, name: &str) -> HwResult<LoopbackChannel> {
        let rings = self.rings.lock().unwrap_or_else(PoisonError::into_inner);
        let ring = rings
            .get(name)
            .cloned()
            .ok_or_else(|| HardwareError::NotFound(name.to_string()))?;
        Ok(LoopbackChannel {
            ring,
            max_frame: self.max_frame,
            pending: Vec::new(),
            pending_pos: 0,
            closed: false,
        })
    }
}

/// One open handle on a loopback ring
pub struct LoopbackChannel {
    ring: Ring,
    max_frame: usize,
    /// Unread tail of the last frame popped
    pending: Vec<u8>,
    pending_pos: usize,
    closed: bool,
}

impl LoopbackChannel {
    fn check_open(&self) -> HwResult<()> {
        if self.closed {
            Err(HardwareError::Closed)
        } else {
            Ok(())
        }
    }
}

impl HardwareChannel for LoopbackChannel {
    fn read(&mut self, buf: &mut [u8]) -> HwResult<usize> {
        self.check_open()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending_pos >= self.pending.len() {
            match self.ring.pop() {
                Some(frame) => {
                    self.pending = frame;
                    self.pending_pos = 0;
                }
                None => return Ok(0),
            }
        }
        let rest = &self.pending[self.pending_pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pending_pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> HwResult<usize> {
        self.check_open()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let n = if self.max_frame > 0 {
            buf.len().min(self.max_frame)
        } else {
            buf.len()
        };
        match self.ring.push(buf[..n].to_vec()) {
            Ok(()) => Ok(n),
            // Ring full
            Err(_) => Ok(0),
        }
    }

    fn close(&mut self) -> HwResult<()> {
        self.closed = true;
        self.pending.clear();
        self.pending_pos = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_unknown_ring() {
        let dev = LoopbackDevice::new(4);
        assert_eq!(
            dev.open("port0").err(),
            Some(HardwareError::NotFound("port0".into()))
        );
    }

    #[test]
    fn test_write_then_read_back() {
        let dev = LoopbackDevice::with_rings(4, &["port0"]);
        let mut tx = dev.open("port0").unwrap();
        let mut rx = dev.open("port0").unwrap();

        assert_eq!(tx.write(b"hello").unwrap(), 5);
        assert_eq!(tx.write(b"world").unwrap(), 5);
        assert_eq!(dev.pending("port0"), Some(2));

        let mut buf = [0u8; 16];
        assert_eq!(rx.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(rx.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"world");
        assert_eq!(rx.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_partial_read_keeps_remainder() {
        let dev = LoopbackDevice::with_rings(2, &["r"]);
        let mut ch = dev.open("r").unwrap();
        ch.write(b"abcdef").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(ch.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(ch.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(ch.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_full_ring_accepts_nothing() {
        let dev = LoopbackDevice::with_rings(2, &["r"]);
        let mut ch = dev.open("r").unwrap();
        assert_eq!(ch.write(b"1").unwrap(), 1);
        assert_eq!(ch.write(b"2").unwrap(), 1);
        assert_eq!(ch.write(b"3").unwrap(), 0);
    }

    #[test]
    fn test_max_frame_cuts_writes() {
        let dev = LoopbackDevice::with_rings(2, &["r"]).max_frame(3);
        let mut ch = dev.open("r").unwrap();
        assert_eq!(ch.write(b"abcdef").unwrap(), 3);
    }

    #[test]
    fn test_closed_channel() {
        let dev = LoopbackDevice::with_rings(2, &["r"]);
        let mut ch = dev.open("r").unwrap();
        ch.close().unwrap();
        ch.close().unwrap();
        assert_eq!(ch.write(b"x"), Err(HardwareError::Closed));
        assert_eq!(ch.read(&mut [0u8; 1]), Err(HardwareError::Closed));

        // Other handles are unaffected
        let mut other = dev.open("r").unwrap();
        assert_eq!(other.write(b"x").unwrap(), 1);
    }
}
