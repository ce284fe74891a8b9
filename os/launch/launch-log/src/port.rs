use core::fmt::{self, Write};

/// The port number of the QEMU debug console.
pub const DEBUGCON_PORT: u16 = 0x402;

/// A byte-oriented output port that can be used as a `fmt::Write` target.
pub trait PortSink {
    fn put(&mut self, byte: u8);
}

/// Debug console at [`DEBUGCON_PORT`]. Write-only, never blocks.
#[derive(Debug, Default, Copy, Clone)]
pub struct DebugConSink;

impl PortSink for DebugConSink {
    #[inline]
    fn put(&mut self, byte: u8) {
        unsafe { outb(DEBUGCON_PORT, byte) }
    }
}

impl Write for DebugConSink {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.put(b);
        }
        Ok(())
    }
}

/// Write one byte to an I/O port.
///
/// # Safety
/// CPL 0 (or an I/O permission bitmap allowing `port`), and `port` must be
/// safe to write with `val`.
#[cfg(feature = "enabled")]
#[inline]
pub(crate) unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
}

/// Read one byte from an I/O port.
///
/// # Safety
/// Same requirements as [`outb`].
#[cfg(feature = "enabled")]
#[inline]
pub(crate) unsafe fn inb(port: u16) -> u8 {
    let v: u8;
    unsafe {
        core::arch::asm!("in al, dx", in("dx") port, out("al") v, options(nomem, nostack, preserves_flags));
    }
    v
}

#[cfg(not(feature = "enabled"))]
#[inline]
pub(crate) unsafe fn outb(_port: u16, _val: u8) {}

#[cfg(not(feature = "enabled"))]
#[inline]
pub(crate) unsafe fn inb(_port: u16) -> u8 {
    // Pretend the transmitter is always empty.
    0xFF
}
