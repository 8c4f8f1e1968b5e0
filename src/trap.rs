//! Trap dispatch seam
//!
//! Debug breaks and hardware exceptions hand the interrupted core's
//! register snapshot to an external dispatcher, which decides how (or
//! whether) execution resumes. Nothing here touches the core registry.

use core::fmt;

/// Snapshot of the interrupted core: the 32 integer registers plus the
/// program counter, as handed to the firmware's irq entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapFrame {
    pub regs: [u32; 32],
    pub pc: u32,
}

impl TrapFrame {
    pub fn new(pc: u32) -> Self {
        Self { regs: [0; 32], pc }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    /// A deliberate `ebreak`.
    Breakpoint,
    /// Pending interrupt lines, one bit per source.
    Irq(u32),
}

/// The dispatcher's verdict. It may have rewritten the frame either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumption {
    /// Continue at the frame's (possibly rewritten) pc.
    Resume,
    /// Stop executing this core.
    Halt,
}

pub trait TrapDispatcher {
    fn dispatch(&self, frame: &mut TrapFrame, cause: TrapCause) -> Resumption;
}

/// Dispatcher for machines that expect no traps at all: any trap is a
/// bug worth dying loudly for.
pub struct NoTraps;

impl TrapDispatcher for NoTraps {
    fn dispatch(&self, frame: &mut TrapFrame, cause: TrapCause) -> Resumption {
        panic!("unexpected trap {:?} at pc {:#x}", cause, frame.pc);
    }
}

impl fmt::Display for TrapCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrapCause::Breakpoint => write!(f, "breakpoint"),
            TrapCause::Irq(mask) => write!(f, "irq {:#x}", mask),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Recorder {
        seen: Cell<Option<TrapCause>>,
    }

    impl TrapDispatcher for Recorder {
        fn dispatch(&self, frame: &mut TrapFrame, cause: TrapCause) -> Resumption {
            self.seen.set(Some(cause));
            // Skip over the 4-byte ebreak.
            frame.pc += 4;
            Resumption::Resume
        }
    }

    #[test]
    fn dispatcher_sees_cause_and_may_rewrite_frame() {
        let recorder = Recorder {
            seen: Cell::new(None),
        };
        let mut frame = TrapFrame::new(0x100);
        let verdict = recorder.dispatch(&mut frame, TrapCause::Breakpoint);
        assert_eq!(verdict, Resumption::Resume);
        assert_eq!(frame.pc, 0x104);
        assert_eq!(recorder.seen.get(), Some(TrapCause::Breakpoint));
    }

    #[test]
    #[should_panic]
    fn no_traps_refuses_everything() {
        NoTraps.dispatch(&mut TrapFrame::new(0), TrapCause::Irq(1));
    }
}
