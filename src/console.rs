//! Console reporting glue
//!
//! Formatted output over the uart channel, plus the conformance
//! markers the test firmware prints: the case name and ".." before a
//! case runs, then "OK" or "ERROR".
//!
//! [`core::fmt::Write`] only needs [`write_str`]; [`write_fmt`] comes
//! for free on top of it.
//!
//! [`write_str`]: core::fmt::Write::write_str
//! [`write_fmt`]: core::fmt::Write::write_fmt

use core::fmt::{self, Write};

use crate::uart::{Uart, UartIo};

pub struct Console<T: UartIo> {
    uart: Uart<T>,
}

impl<T: UartIo> Write for Console<T> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.uart.write_bytes(s.as_bytes());
        Ok(())
    }
}

impl<T: UartIo> Console<T> {
    pub fn new(io: T) -> Self {
        Self {
            uart: Uart::new(io),
        }
    }

    pub fn uart(&mut self) -> &mut Uart<T> {
        &mut self.uart
    }

    pub fn into_io(self) -> T {
        self.uart.into_io()
    }

    /// Announce a case: its name and the ".." separator.
    pub fn begin(&mut self, name: &str) {
        self.uart.write_bytes(name.as_bytes());
        self.uart.write_bytes(b"..");
    }

    /// "OK" marker.
    pub fn pass(&mut self) {
        self.uart.write_bytes(b"OK\n");
    }

    /// "ERROR" marker. The firmware follows this with a debug break;
    /// that is the caller's move, through the trap dispatcher.
    pub fn fail(&mut self) {
        self.uart.write_bytes(b"ERROR\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uart::MemoryUart;

    #[test]
    fn pass_marker_stream() {
        let mut console = Console::new(MemoryUart::new());
        console.begin("mytest");
        console.pass();
        assert_eq!(console.into_io().bytes(), b"mytest..OK\n");
    }

    #[test]
    fn fail_marker_stream() {
        let mut console = Console::new(MemoryUart::new());
        console.begin("mytest");
        console.fail();
        assert_eq!(console.into_io().bytes(), b"mytest..ERROR\n");
    }

    #[test]
    fn formatted_output_goes_through_the_uart() {
        let mut console = Console::new(MemoryUart::new());
        write!(console, "hart {} of {}", 2, 4).unwrap();
        assert_eq!(console.into_io().bytes(), b"hart 2 of 4");
    }
}
