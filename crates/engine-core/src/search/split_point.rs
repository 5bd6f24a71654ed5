// Split points: the shared coordination record for one parallel subtree.
//
// Slots live in a fixed arena owned by each worker, so a "pointer" to a
// split point is a (worker, slot) index pair and the parent link is an
// optional pair. Fields read without the mutex by other threads
// (slaves_mask for the master's wake check, cutoff for ancestor walks)
// are atomics; they are only written while the split point mutex is held.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::position::Position;
use crate::search::lock_order;
use crate::search::movepicker::SharedMovePicker;
use crate::search::types::{NodeType, SearchFrame};
use crate::types::{Depth, Move, Value};

/// Upper bound on simultaneously open split points per worker.
pub const MAX_SPLITPOINTS_PER_THREAD: usize = 8;

/// Arena index of a split point: (worker index, slot index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPointRef {
    pub thread: usize,
    pub slot: usize,
}

/// Snapshot and shared results of one split point, guarded by its mutex.
pub(crate) struct SplitPointInner {
    pub master: usize,
    pub parent: Option<SplitPointRef>,
    pub depth: Depth,
    pub alpha: Value,
    pub beta: Value,
    pub best_value: Value,
    pub best_move: Move,
    pub threat_move: Move,
    pub node_type: NodeType,
    pub cut_node: bool,
    pub move_count: usize,
    pub nodes: u64,
    /// Master's position at split time; participants clone from it.
    pub pos: Position,
    /// Master's search-stack frame at split time.
    pub frame: SearchFrame,
}

impl SplitPointInner {
    fn idle() -> SplitPointInner {
        SplitPointInner {
            master: 0,
            parent: None,
            depth: 0,
            alpha: -Value::INFINITE,
            beta: Value::INFINITE,
            best_value: -Value::INFINITE,
            best_move: Move::NONE,
            threat_move: Move::NONE,
            node_type: NodeType::NonPv,
            cut_node: false,
            move_count: 0,
            nodes: 0,
            pos: Position::empty(),
            frame: SearchFrame::default(),
        }
    }
}

/// One split point slot.
pub struct SplitPoint {
    slaves_mask: AtomicU64,
    cutoff: AtomicBool,
    inner: Mutex<SplitPointInner>,
    /// The shared move iterator; exclusion is lock-based via the cell.
    pub(crate) picker: SharedMovePicker,
}

impl SplitPoint {
    pub(crate) fn new() -> SplitPoint {
        SplitPoint {
            slaves_mask: AtomicU64::new(0),
            cutoff: AtomicBool::new(false),
            inner: Mutex::new(SplitPointInner::idle()),
            picker: SharedMovePicker::empty(),
        }
    }

    /// Bitset of workers currently booked on this split point.
    #[inline]
    pub fn slaves_mask(&self) -> u64 {
        self.slaves_mask.load(Ordering::Acquire)
    }

    /// Sticky cutoff flag; once set, participants abandon the subtree.
    #[inline]
    pub fn cutoff(&self) -> bool {
        self.cutoff.load(Ordering::Acquire)
    }

    /// Write the slave bitset. Caller must hold the split point mutex.
    #[inline]
    pub(crate) fn store_slaves_mask(&self, mask: u64) {
        self.slaves_mask.store(mask, Ordering::Release);
    }

    /// Raise the cutoff flag. Caller must hold the split point mutex.
    #[inline]
    pub(crate) fn raise_cutoff(&self) {
        self.cutoff.store(true, Ordering::Release);
    }

    /// Clear the cutoff flag for slot reuse. Caller must hold the mutex.
    #[inline]
    pub(crate) fn clear_cutoff(&self) {
        self.cutoff.store(false, Ordering::Release);
    }

    pub(crate) fn lock(&self) -> SplitPointGuard<'_> {
        let order = lock_order::split_acquired();
        SplitPointGuard { guard: self.inner.lock().unwrap(), _order: order }
    }
}

/// Guard over the split point mutex, carrying the debug lock-order token.
pub(crate) struct SplitPointGuard<'a> {
    guard: MutexGuard<'a, SplitPointInner>,
    _order: lock_order::SplitHeld,
}

impl Deref for SplitPointGuard<'_> {
    type Target = SplitPointInner;

    fn deref(&self) -> &SplitPointInner {
        &self.guard
    }
}

impl DerefMut for SplitPointGuard<'_> {
    fn deref_mut(&mut self) -> &mut SplitPointInner {
        &mut self.guard
    }
}
