//! UART output channel
//!
//! The firmware reports through a byte FIFO behind a status register,
//! polling the TX-full flag before every write. On the device the pair
//! sits at base 0xE0000000, status at +44 and FIFO at +48; only the
//! polling protocol and the decimal/hex rendering live here, over
//! whatever implements [`UartIo`].

use bitflags::bitflags;

bitflags! {
    /// Status register bits.
    pub struct Status: u32 {
        const TX_FULL = 0x10;
    }
}

/// One status-register-plus-FIFO device, as the firmware sees it.
pub trait UartIo {
    fn status(&self) -> Status;
    fn push(&mut self, byte: u8);
}

pub struct Uart<T: UartIo> {
    io: T,
}

impl<T: UartIo> Uart<T> {
    pub fn new(io: T) -> Self {
        Self { io }
    }

    pub fn io(&self) -> &T {
        &self.io
    }

    pub fn into_io(self) -> T {
        self.io
    }

    /// Blocking byte write: poll the status register until TX has
    /// room, then write the FIFO.
    pub fn write_byte(&mut self, byte: u8) {
        while self.io.status().contains(Status::TX_FULL) {
            core::hint::spin_loop();
        }
        self.io.push(byte);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_byte(byte);
        }
    }

    /// Unsigned decimal, no padding; 0 prints as "0".
    pub fn write_dec(&mut self, mut val: u32) {
        let mut buf = [0u8; 10];
        let mut len = 0;
        while val != 0 || len == 0 {
            buf[len] = (val % 10) as u8;
            val /= 10;
            len += 1;
        }
        while len != 0 {
            len -= 1;
            self.write_byte(b'0' + buf[len]);
        }
    }

    /// Fixed-width uppercase hex, most significant nibble first.
    /// A word has at most 8 digits.
    pub fn write_hex(&mut self, val: u32, digits: usize) {
        debug_assert!(digits <= 8, "hex width {} exceeds a word", digits);
        let mut shift = (4 * digits) as isize - 4;
        while shift >= 0 {
            self.write_byte(b"0123456789ABCDEF"[((val >> shift) & 0xF) as usize]);
            shift -= 4;
        }
    }
}

/// Unbounded in-memory sink; TX never fills up. The device the tests
/// and the console default to.
#[derive(Debug, Default)]
pub struct MemoryUart {
    buf: Vec<u8>,
}

impl MemoryUart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl UartIo for MemoryUart {
    fn status(&self) -> Status {
        Status::empty()
    }

    fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }
}
