//! Thread-backed machine
//!
//! Runs the fork/join contract on real OS threads: core 0 boots onto
//! its own thread and every fork activates another, so cores make
//! independent forward progress the way hardware harts do. The machine
//! owns the registry; running cores reach it through their [`Core`]
//! handle.

use std::sync::Arc;
use std::thread;

use log::debug;

use crate::config::Config;
use crate::registry::{CoreId, CoreRegistry, ForkError, JoinError};
use crate::trap::{Resumption, TrapCause, TrapDispatcher, TrapFrame};

pub struct Machine {
    registry: Arc<CoreRegistry>,
    boot: Option<thread::JoinHandle<()>>,
}

impl Machine {
    /// Bring the system up: core 0 goes Running and executes `entry` on
    /// a fresh thread. The core count is fixed here for the lifetime of
    /// the machine.
    pub fn boot<F>(config: Config, entry: F) -> Self
    where
        F: FnOnce(Core) + Send + 'static,
    {
        let registry = Arc::new(CoreRegistry::new(config.cores()));
        debug!("boot: {} cores", config.cores());
        let core0 = Core {
            id: CoreId(0),
            registry: registry.clone(),
        };
        let boot = thread::Builder::new()
            .name("core0".into())
            .spawn(move || entry(core0))
            .unwrap_or_else(|e| panic!("cannot spawn boot core: {}", e));
        Self {
            registry,
            boot: Some(boot),
        }
    }

    pub fn registry(&self) -> &Arc<CoreRegistry> {
        &self.registry
    }

    /// Block until the boot core halts the system. Forked cores that
    /// outlive it find the registry down and wind up on their own.
    pub fn wait(mut self) {
        if let Some(boot) = self.boot.take() {
            if let Err(payload) = boot.join() {
                std::panic::resume_unwind(payload);
            }
        }
    }
}

/// Handle held by one running core. Dropping it halts the core, so a
/// continuation that returns has implicitly exited; a continuation that
/// panics halts its core too, which keeps a parent's join from hanging.
pub struct Core {
    id: CoreId,
    registry: Arc<CoreRegistry>,
}

impl Core {
    /// Own identity. Pure, never fails.
    pub fn id(&self) -> CoreId {
        self.id
    }

    pub fn registry(&self) -> &CoreRegistry {
        &self.registry
    }

    /// Activate the lowest-id idle core and run `f` on it, in parallel
    /// with the caller. The child sees everything written before this
    /// call. Returns the child's id; [`ForkError::Exhausted`] when no
    /// core is idle, and the caller decides its own fallback.
    pub fn fork<F>(&self, f: F) -> Result<CoreId, ForkError>
    where
        F: FnOnce(Core) + Send + 'static,
    {
        let child = self.registry.fork(self.id)?;
        let core = Core {
            id: child,
            registry: self.registry.clone(),
        };
        thread::Builder::new()
            .name(format!("{}", child))
            .spawn(move || f(core))
            .unwrap_or_else(|e| panic!("cannot spawn {}: {}", child, e));
        Ok(child)
    }

    /// Wait for `child` to halt, then reclaim it as idle. Everything
    /// the child wrote before exiting is visible once this returns.
    pub fn join(&self, child: CoreId) -> Result<CoreId, JoinError> {
        self.registry.join(self.id, Some(child))
    }

    /// Wait for the caller's earliest outstanding fork, FIFO over its
    /// live fork records. Returns the reclaimed child's id.
    pub fn join_any(&self) -> Result<CoreId, JoinError> {
        self.registry.join(self.id, None)
    }

    /// Halt this core. A forked core stays reclaimable by its parent;
    /// the boot core takes the whole system down. Consumes the handle,
    /// so no code after it can touch the contract.
    pub fn exit(self) {}

    /// Debug break: hand the register snapshot to the external trap
    /// dispatcher and return its verdict. Registry state is untouched.
    pub fn brk(&self, dispatcher: &dyn TrapDispatcher, frame: &mut TrapFrame) -> Resumption {
        dispatcher.dispatch(frame, TrapCause::Breakpoint)
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        // Implicit exit. After a system halt the registry refuses the
        // transition; a core outliving the simulation has nowhere to
        // report it.
        let _ = self.registry.exit(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CoreState;
    use std::sync::mpsc;

    fn config(cores: usize) -> Config {
        Config::new(cores).unwrap()
    }

    #[test]
    fn boot_core_is_core_zero() {
        let (tx, rx) = mpsc::channel();
        let machine = Machine::boot(config(2), move |core| {
            tx.send(core.id()).unwrap();
        });
        assert_eq!(rx.recv().unwrap(), CoreId(0));
        machine.wait();
    }

    #[test]
    fn returning_from_entry_halts_the_system() {
        let machine = Machine::boot(config(2), |_core| {});
        machine.wait();
    }

    #[test]
    fn explicit_exit_matches_implicit() {
        let machine = Machine::boot(config(2), |core| core.exit());
        machine.wait();
    }

    #[test]
    fn forked_child_runs_concurrently() {
        let (tx, rx) = mpsc::channel();
        let machine = Machine::boot(config(2), move |core| {
            let child = core
                .fork(move |me| {
                    tx.send(me.id()).unwrap();
                })
                .unwrap();
            assert_eq!(child, CoreId(1));
            assert_ne!(child, core.id());
            assert_eq!(core.join(child), Ok(child));
        });
        assert_eq!(rx.recv().unwrap(), CoreId(1));
        machine.wait();
    }

    #[test]
    fn brk_hands_frame_to_dispatcher_and_leaves_registry_alone() {
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

        let machine = Machine::boot(config(2), |core| {
            let recorder = Recorder {
                seen: Cell::new(None),
            };
            let mut frame = TrapFrame::new(0x80);
            let before: Vec<_> = (0u32..2).map(|i| core.registry().state(CoreId(i))).collect();
            let verdict = core.brk(&recorder, &mut frame);
            // The dispatcher's verdict and frame rewrite come back verbatim.
            assert_eq!(verdict, Resumption::Resume);
            assert_eq!(frame.pc, 0x84);
            assert_eq!(recorder.seen.get(), Some(TrapCause::Breakpoint));
            // No core changed state on the way through.
            let after: Vec<_> = (0u32..2).map(|i| core.registry().state(CoreId(i))).collect();
            assert_eq!(before, after);
        });
        machine.wait();
    }

    #[test]
    fn panicking_child_still_halts_for_join() {
        let machine = Machine::boot(config(2), |core| {
            let child = core.fork(|_me| panic!("child blew up")).unwrap();
            assert_eq!(core.join(child), Ok(child));
            assert_eq!(core.registry.state(child), Some(CoreState::Idle));
        });
        machine.wait();
    }
}
