//! Hardware channel abstraction.
//!
//! A `HardwareChannel` is the narrow synchronous window onto whatever moves
//! the bytes: an SRIO window, a DMA engine, a socket, a register block.
//! The core never implements one; it only calls through these traits.
//!
//! # Implementors
//!
//! - `LoopbackDevice` (fica-runtime): named in-memory rings of fixed depth.
//!   Used by tests and the pipeline tool.
//! - Real devices live in the application: open a device file, ioctl,
//!   mmap the window, implement `read`/`write` against it.
//!
//! # Contract
//!
//! - `read`/`write` may block, but should bound their own waiting: the pool
//!   cannot interrupt a call in flight.
//! - `Ok(0)` means "nothing to move right now" (ring empty on read, ring
//!   full on write). Callers treat it as an idle poll, not an error.
//! - After `close()`, further calls return `Err(HardwareError::Closed)`.

use crate::error::HwResult;

/// One open channel to a device
pub trait HardwareChannel: Send {
    /// Read up to `buf.len()` bytes into `buf`.
    ///
    /// Returns the number of bytes read; 0 when nothing is available.
    fn read(&mut self, buf: &mut [u8]) -> HwResult<usize>;

    /// Write up to `buf.len()` bytes from `buf`.
    ///
    /// Returns the number of bytes accepted; 0 when the device has no room.
    fn write(&mut self, buf: &[u8]) -> HwResult<usize>;

    /// Release the channel. Idempotent.
    fn close(&mut self) -> HwResult<()>;
}

/// Opens channels by name
pub trait ChannelProvider: Send + Sync {
    type Channel: HardwareChannel;

    /// Open the channel called `name`.
    fn open(&self, name: &str) -> HwResult<Self::Channel>;
}

impl<C: HardwareChannel + ?Sized> HardwareChannel for Box<C> {
    fn read(&mut self, buf: &mut [u8]) -> HwResult<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> HwResult<usize> {
        (**self).write(buf)
    }

    fn close(&mut self) -> HwResult<()> {
        (**self).close()
    }
}
