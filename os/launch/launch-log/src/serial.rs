use crate::port::{PortSink, inb, outb};
use core::fmt::{self, Write};

/// COM1 base port.
pub const COM1: u16 = 0x3F8;

const DATA: u16 = 0;
const INT_ENABLE: u16 = 1;
const FIFO_CTRL: u16 = 2;
const LINE_CTRL: u16 = 3;
const MODEM_CTRL: u16 = 4;
const LINE_STATUS: u16 = 5;

/// Line status: transmit holding register empty.
const LSR_THRE: u8 = 0x20;

/// Bounded wait for the transmitter so a missing UART cannot hang the launch.
const TX_SPIN_LIMIT: u32 = 100_000;

/// Polled 16550 UART, 115200 8N1, no interrupts.
#[derive(Debug, Copy, Clone)]
pub struct SerialSink {
    base: u16,
}

impl SerialSink {
    #[must_use]
    pub const fn com1() -> Self {
        Self { base: COM1 }
    }

    /// Program divisor, framing and FIFOs.
    pub fn init(&self) {
        unsafe {
            outb(self.base + INT_ENABLE, 0x00);
            // DLAB on, divisor 1 = 115200 baud
            outb(self.base + LINE_CTRL, 0x80);
            outb(self.base + DATA, 0x01);
            outb(self.base + INT_ENABLE, 0x00);
            // 8 bits, no parity, one stop bit
            outb(self.base + LINE_CTRL, 0x03);
            outb(self.base + FIFO_CTRL, 0xC7);
            // DTR | RTS | OUT2
            outb(self.base + MODEM_CTRL, 0x0B);
        }
    }

    fn transmit_empty(&self) -> bool {
        unsafe { inb(self.base + LINE_STATUS) & LSR_THRE != 0 }
    }
}

impl PortSink for SerialSink {
    fn put(&mut self, byte: u8) {
        let mut spins = 0;
        while !self.transmit_empty() && spins < TX_SPIN_LIMIT {
            core::hint::spin_loop();
            spins += 1;
        }
        unsafe { outb(self.base + DATA, byte) }
    }
}

impl Write for SerialSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.put(b'\r');
            }
            self.put(b);
        }
        Ok(())
    }
}
