//! Core registry
//!
//! Authoritative store for every core's state and for the live fork
//! records. Fork, join and exit are the only mutators; a single lock
//! serializes them so concurrent callers on different cores always
//! observe a consistent registry (two forks can never claim the same
//! idle core).

use core::fmt;

use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Upper bound on the per-core slot array. The actual core count is
/// chosen at boot, anywhere in `1..=MAX_CORES`.
pub const MAX_CORES: usize = 32;

/// Identifier of one execution unit, dense over `[0, total)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoreId(pub u32);

impl CoreId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    Idle,
    Running,
    Halted,
}

/// How an exit was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// The core was a forked child; it stays Halted until its parent
    /// joins it.
    CoreHalt,
    /// The core was never forked (the boot core). The whole system is
    /// down; the registry refuses every mutation from here on.
    SystemHalt,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForkError {
    /// Every core is Running or Halted-but-unjoined. Recoverable: the
    /// caller falls back to running the work itself.
    #[error("no idle core available")]
    Exhausted,
    #[error("fork caller {0} is not running")]
    CallerNotRunning(CoreId),
    #[error("system has halted")]
    SystemDown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("{0} is outside the core id range")]
    OutOfRange(CoreId),
    #[error("{0} has no live fork record held by the caller")]
    NotForked(CoreId),
    #[error("caller has no outstanding fork")]
    NothingPending,
    #[error("system has halted")]
    SystemDown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExitError {
    #[error("{0} is not running")]
    NotRunning(CoreId),
    #[error("system has halted")]
    SystemDown,
}

/// Live fork record, stored in the child's slot. `seq` orders a
/// parent's outstanding forks for FIFO join.
#[derive(Debug, Clone, Copy)]
struct ForkRecord {
    parent: CoreId,
    seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: CoreState,
    forked: Option<ForkRecord>,
}

impl Slot {
    const IDLE: Slot = Slot {
        state: CoreState::Idle,
        forked: None,
    };
}

struct RegistryInner {
    slots: [Slot; MAX_CORES],
    next_seq: u64,
    down: bool,
}

pub struct CoreRegistry {
    total: usize,
    inner: Mutex<RegistryInner>,
    /// Signaled on every exit so blocked joins can re-check their target.
    halted: Condvar,
}

impl CoreRegistry {
    /// Bring the registry up with `total` cores. Core 0 starts Running
    /// (it is the boot core), everything else Idle.
    ///
    /// `total` must be in `1..=MAX_CORES`; [`crate::config::Config`]
    /// validates this before the machine gets here.
    pub fn new(total: usize) -> Self {
        assert!(
            (1..=MAX_CORES).contains(&total),
            "core count {} outside 1..={}",
            total,
            MAX_CORES
        );
        let mut slots = [Slot::IDLE; MAX_CORES];
        slots[0].state = CoreState::Running;
        debug!("registry up, {} cores", total);
        Self {
            total,
            inner: Mutex::new(RegistryInner {
                slots,
                next_seq: 0,
                down: false,
            }),
            halted: Condvar::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Current state of `id`, or `None` when out of range.
    pub fn state(&self, id: CoreId) -> Option<CoreState> {
        if id.index() >= self.total {
            return None;
        }
        Some(self.inner.lock().slots[id.index()].state)
    }

    /// True once the boot core has exited.
    pub fn is_down(&self) -> bool {
        self.inner.lock().down
    }

    /// Claim the lowest-id Idle core for `parent`: Idle -> Running plus
    /// a fork record binding it to the caller. No idle core leaves the
    /// registry untouched and reports [`ForkError::Exhausted`].
    pub fn fork(&self, parent: CoreId) -> Result<CoreId, ForkError> {
        let mut inner = self.inner.lock();
        if inner.down {
            return Err(ForkError::SystemDown);
        }
        if parent.index() >= self.total
            || inner.slots[parent.index()].state != CoreState::Running
        {
            return Err(ForkError::CallerNotRunning(parent));
        }
        // Lowest id wins, so fork order is reproducible.
        let child = (0..self.total)
            .find(|&i| inner.slots[i].state == CoreState::Idle)
            .map(|i| CoreId(i as u32))
            .ok_or(ForkError::Exhausted)?;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.slots[child.index()] = Slot {
            state: CoreState::Running,
            forked: Some(ForkRecord { parent, seq }),
        };
        trace!("fork: {} claims {}", parent, child);
        Ok(child)
    }

    /// Wait until a forked child of `parent` halts, then reclaim it as
    /// Idle and destroy the fork record. `Some(child)` targets that
    /// child; `None` targets the caller's earliest outstanding fork
    /// (FIFO). Returns the reclaimed id.
    ///
    /// Only the calling core blocks; everything it cannot see yet of
    /// the child's writes becomes visible when this returns.
    pub fn join(&self, parent: CoreId, target: Option<CoreId>) -> Result<CoreId, JoinError> {
        let mut inner = self.inner.lock();
        if inner.down {
            return Err(JoinError::SystemDown);
        }
        let child = match target {
            Some(child) => {
                if child.index() >= self.total {
                    return Err(JoinError::OutOfRange(child));
                }
                match inner.slots[child.index()].forked {
                    Some(rec) if rec.parent == parent => child,
                    _ => return Err(JoinError::NotForked(child)),
                }
            }
            None => (0..self.total)
                .filter_map(|i| {
                    let rec = inner.slots[i].forked?;
                    (rec.parent == parent).then(|| (rec.seq, CoreId(i as u32)))
                })
                .min_by_key(|&(seq, _)| seq)
                .map(|(_, id)| id)
                .ok_or(JoinError::NothingPending)?,
        };
        trace!("join: {} awaits {}", parent, child);
        while inner.slots[child.index()].state != CoreState::Halted {
            self.halted.wait(&mut inner);
            if inner.down {
                return Err(JoinError::SystemDown);
            }
        }
        inner.slots[child.index()] = Slot::IDLE;
        trace!("join: {} reclaims {}", parent, child);
        Ok(child)
    }

    /// Running -> Halted. A child stays Halted for its parent's join; a
    /// core nobody forked (the boot core) takes the whole system down.
    pub fn exit(&self, core: CoreId) -> Result<ExitKind, ExitError> {
        let mut inner = self.inner.lock();
        if inner.down {
            return Err(ExitError::SystemDown);
        }
        if core.index() >= self.total
            || inner.slots[core.index()].state != CoreState::Running
        {
            return Err(ExitError::NotRunning(core));
        }
        inner.slots[core.index()].state = CoreState::Halted;
        let kind = if inner.slots[core.index()].forked.is_some() {
            ExitKind::CoreHalt
        } else {
            inner.down = true;
            debug!("system halt by {}", core);
            ExitKind::SystemHalt
        };
        trace!("exit: {} ({:?})", core, kind);
        self.halted.notify_all();
        Ok(kind)
    }
}
