// YBWC thread pool: a fixed set of workers parked on condition
// variables, a timer thread, and the split/join protocol that shares a
// MovePicker between threads at interior nodes.
//
// The recursion body is supplied by the caller through `SearchBody`;
// the pool owns the scheduling: who sleeps, who helps whom (helpful
// master rule), how a split point is published and joined, and how
// cancellation propagates.
//
// Lock order is pool mutex -> split point mutex -> worker mutex,
// checked in debug builds by `lock_order`.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, log_enabled, trace, Level};

use crate::position::Position;
use crate::search::config::{PoolConfig, MAX_THREADS};
use crate::search::history::History;
use crate::search::lock_order;
use crate::search::movepicker::MovePicker;
use crate::search::split_point::{
    SplitPoint, SplitPointRef, MAX_SPLITPOINTS_PER_THREAD,
};
use crate::search::types::{NodeType, RootMove, RootMoves, SearchFrame, SetupStates, Signals};
use crate::search::SearchLimits;
use crate::types::{Depth, Move, Value};

/// Index of the main worker.
pub const MAIN_THREAD: usize = 0;

// =============================================================================
// Search body seam
// =============================================================================

/// Root work handed to the main worker by `start_thinking`.
pub struct RootJob {
    pub pos: Position,
    pub limits: SearchLimits,
    pub root_moves: RootMoves,
    /// Pre-search state history, ownership taken from the caller.
    pub states: Option<SetupStates>,
    pub start_time: Instant,
}

/// Per-move context handed to `SearchBody::search_move`.
#[derive(Debug, Clone, Copy)]
pub struct SplitSearchContext {
    pub thread_id: usize,
    pub sp: SplitPointRef,
    pub depth: Depth,
    pub alpha: Value,
    pub beta: Value,
    pub node_type: NodeType,
    pub cut_node: bool,
    pub threat_move: Move,
    pub frame: SearchFrame,
    pub move_count: usize,
}

/// The alpha-beta recursion, supplied by the caller.
///
/// `think` runs the whole search on the main worker. `search_move`
/// searches exactly one child below a split point: the position is the
/// worker's own clone, already positioned at the split node, and the
/// implementation is expected to apply `m`, recurse with its own stack,
/// and return the child's value from the split node's point of view.
pub trait SearchBody: Send + Sync + 'static {
    fn think(&self, pool: &ThreadPool, job: &mut RootJob);

    fn search_move(
        &self,
        pool: &ThreadPool,
        ctx: &SplitSearchContext,
        pos: &mut Position,
        m: Move,
    ) -> Value;

    /// Timer tick; default does nothing.
    fn check_time(&self, pool: &ThreadPool) {
        let _ = pool;
    }
}

/// Result of a `split` call.
pub enum SplitOutcome {
    /// No slave could be booked; the caller keeps its picker and
    /// continues draining the node itself.
    Declined(MovePicker),
    /// The subtree completed across the booked workers.
    Done { best_value: Value, best_move: Move },
}

// =============================================================================
// Workers
// =============================================================================

struct WorkerFlags {
    searching: bool,
    exit: bool,
    /// Main worker only.
    thinking: bool,
    /// An OS thread is currently attached to this record.
    alive: bool,
    active_split_point: Option<SplitPointRef>,
}

struct Worker {
    mutex: Mutex<WorkerFlags>,
    cv: Condvar,
    split_points: [SplitPoint; MAX_SPLITPOINTS_PER_THREAD],
    split_points_size: AtomicUsize,
}

impl Worker {
    fn new() -> Worker {
        Worker {
            mutex: Mutex::new(WorkerFlags {
                searching: false,
                exit: false,
                thinking: false,
                alive: false,
                active_split_point: None,
            }),
            cv: Condvar::new(),
            split_points: std::array::from_fn(|_| SplitPoint::new()),
            split_points_size: AtomicUsize::new(0),
        }
    }
}

/// Availability under the helpful-master rule: an idle worker with an
/// open split point of its own may only help masters already booked on
/// the top of its stack.
pub(crate) fn helpful_master_allows(
    split_points_size: usize,
    top_slaves_mask: u64,
    master: usize,
) -> bool {
    split_points_size == 0 || (top_slaves_mask & (1u64 << master)) != 0
}

// =============================================================================
// Timer
// =============================================================================

struct TimerState {
    msec: u64,
    exit: bool,
}

struct TimerShared {
    mutex: Mutex<TimerState>,
    cv: Condvar,
}

// =============================================================================
// ThreadPool
// =============================================================================

/// The worker pool. Created once per engine instance and shared behind
/// an `Arc`; the OS threads each hold a clone, so the pool lives until
/// `shutdown` has joined them all.
pub struct ThreadPool {
    /// Back-reference for handing `Arc` clones to spawned threads.
    self_ref: Weak<ThreadPool>,
    workers: Vec<Arc<Worker>>,
    active_threads: AtomicUsize,
    /// Guards the availability scan and slave recruitment.
    pool_mutex: Mutex<()>,
    /// Paired with the main worker's mutex; signalled when `thinking`
    /// clears so `wait_for_think_finished` callers resume.
    sleep_condition: Condvar,
    signals: Signals,
    history: Arc<History>,
    body: Arc<dyn SearchBody>,
    job: Mutex<Option<RootJob>>,
    min_split_depth: AtomicI32,
    max_threads_per_split_point: AtomicUsize,
    sleep_while_idle: AtomicBool,
    timer: TimerShared,
    handles: Mutex<Vec<Option<thread::JoinHandle<()>>>>,
    timer_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ThreadPool {
    /// Create the pool, spawn the timer, the main worker, and the
    /// configured number of slaves.
    pub fn new(cfg: &PoolConfig, body: Arc<dyn SearchBody>) -> Arc<ThreadPool> {
        let pool = Arc::new_cyclic(|weak| ThreadPool {
            self_ref: weak.clone(),
            workers: (0..MAX_THREADS).map(|_| Arc::new(Worker::new())).collect(),
            active_threads: AtomicUsize::new(0),
            pool_mutex: Mutex::new(()),
            sleep_condition: Condvar::new(),
            signals: Signals::new(),
            history: Arc::new(History::new()),
            body,
            job: Mutex::new(None),
            min_split_depth: AtomicI32::new(cfg.min_split_depth),
            max_threads_per_split_point: AtomicUsize::new(cfg.max_threads_per_split_point),
            sleep_while_idle: AtomicBool::new(cfg.idle_threads_sleep),
            timer: TimerShared {
                mutex: Mutex::new(TimerState { msec: 0, exit: false }),
                cv: Condvar::new(),
            },
            handles: Mutex::new((0..MAX_THREADS).map(|_| None).collect()),
            timer_handle: Mutex::new(None),
        });

        {
            let p = Arc::clone(&pool);
            let handle = thread::Builder::new()
                .name("timer".to_string())
                .spawn(move || p.timer_loop())
                .expect("failed to spawn timer thread");
            *pool.timer_handle.lock().unwrap() = Some(handle);
        }

        pool.set_active_threads(cfg.threads);
        debug!("thread pool up with {} workers", pool.size());
        pool
    }

    /// Number of live workers, main included.
    #[inline]
    pub fn size(&self) -> usize {
        self.active_threads.load(Ordering::Acquire)
    }

    #[inline]
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    #[inline]
    pub fn history(&self) -> &Arc<History> {
        &self.history
    }

    #[inline]
    pub fn min_split_depth(&self) -> Depth {
        self.min_split_depth.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn max_threads_per_split_point(&self) -> usize {
        self.max_threads_per_split_point.load(Ordering::Relaxed)
    }

    fn lock_pool(&self) -> (std::sync::MutexGuard<'_, ()>, lock_order::PoolHeld) {
        let order = lock_order::pool_acquired();
        (self.pool_mutex.lock().unwrap(), order)
    }

    fn arc(&self) -> Arc<ThreadPool> {
        self.self_ref.upgrade().expect("thread pool already dropped")
    }

    fn split_point_at(&self, r: SplitPointRef) -> &SplitPoint {
        &self.workers[r.thread].split_points[r.slot]
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Apply a configuration: split thresholds and worker count. Grows
    /// or shrinks the live worker set; must not run during a search.
    pub fn read_options(&self, cfg: &PoolConfig) {
        self.wait_for_think_finished();
        self.min_split_depth.store(cfg.min_split_depth, Ordering::Relaxed);
        self.max_threads_per_split_point
            .store(cfg.max_threads_per_split_point, Ordering::Relaxed);
        self.sleep_while_idle.store(cfg.idle_threads_sleep, Ordering::Relaxed);
        self.set_active_threads(cfg.threads);
    }

    fn set_active_threads(&self, requested: usize) {
        let requested = requested.clamp(1, MAX_THREADS);
        let current = self.active_threads.load(Ordering::Acquire);
        if requested == current {
            return;
        }
        debug!("resizing worker set {current} -> {requested}");
        for i in current..requested {
            self.spawn_worker(i);
        }
        for i in (requested..current).rev() {
            self.retire_worker(i);
        }
        self.active_threads.store(requested, Ordering::Release);
    }

    fn spawn_worker(&self, i: usize) {
        {
            let w = &self.workers[i];
            let mut flags = w.mutex.lock().unwrap();
            flags.searching = false;
            flags.exit = false;
            flags.thinking = false;
            flags.alive = true;
            flags.active_split_point = None;
            w.split_points_size.store(0, Ordering::Release);
        }
        let p = self.arc();
        let name =
            if i == MAIN_THREAD { "main".to_string() } else { format!("worker-{i}") };
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                if i == MAIN_THREAD {
                    p.main_idle_loop();
                } else {
                    p.idle_loop(i, None);
                }
            })
            .expect("failed to spawn search worker");
        self.handles.lock().unwrap()[i] = Some(handle);
    }

    fn retire_worker(&self, i: usize) {
        {
            let w = &self.workers[i];
            let mut flags = w.mutex.lock().unwrap();
            flags.exit = true;
            w.cv.notify_one();
        }
        let handle = self.handles.lock().unwrap()[i].take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        self.workers[i].mutex.lock().unwrap().alive = false;
    }

    /// Join every worker and the timer. Must be the last call on the
    /// pool; the OS threads hold `Arc` clones, so dropping the pool
    /// without this leaks them.
    pub fn shutdown(&self) {
        self.wait_for_think_finished();
        {
            let mut st = self.timer.mutex.lock().unwrap();
            st.exit = true;
            self.timer.cv.notify_one();
        }
        let timer_handle = self.timer_handle.lock().unwrap().take();
        if let Some(handle) = timer_handle {
            let _ = handle.join();
        }
        let active = self.active_threads.load(Ordering::Acquire);
        for i in (0..active).rev() {
            self.retire_worker(i);
        }
        self.active_threads.store(0, Ordering::Release);
        debug!("thread pool down");
    }

    // =========================================================================
    // Outward search control
    // =========================================================================

    /// Kick off a new search: resets signals, builds the root move
    /// list (restricted to `searchmoves` when non-empty), takes
    /// ownership of the state stack, and wakes the main worker.
    pub fn start_thinking(
        &self,
        pos: &Position,
        limits: SearchLimits,
        searchmoves: &[Move],
        states: &mut Option<SetupStates>,
    ) {
        self.wait_for_think_finished();

        let start_time = Instant::now();
        self.signals.reset();

        let mut root_moves = RootMoves::new();
        for &m in pos.legal_moves().iter() {
            if searchmoves.is_empty() || searchmoves.contains(&m) {
                root_moves.push(RootMove::new(m));
            }
        }

        let job = RootJob {
            pos: pos.clone_for_search(),
            limits,
            root_moves,
            states: states.take(),
            start_time,
        };
        debug_assert!(states.is_none());
        *self.job.lock().unwrap() = Some(job);

        let w = &self.workers[MAIN_THREAD];
        let mut flags = w.mutex.lock().unwrap();
        flags.thinking = true;
        w.cv.notify_one();
    }

    /// Block until the main worker has finished thinking.
    pub fn wait_for_think_finished(&self) {
        let w = &self.workers[MAIN_THREAD];
        let mut flags = w.mutex.lock().unwrap();
        while flags.thinking {
            flags = self.sleep_condition.wait(flags).unwrap();
        }
    }

    /// Reconfigure the timer tick. 0 disables ticking.
    pub fn set_timer_interval(&self, msec: u64) {
        let mut st = self.timer.mutex.lock().unwrap();
        st.msec = msec;
        self.timer.cv.notify_one();
    }

    // =========================================================================
    // Availability
    // =========================================================================

    fn is_available_to(&self, cand: usize, master: usize) -> bool {
        if cand == master {
            return false;
        }
        let w = &self.workers[cand];
        {
            let flags = w.mutex.lock().unwrap();
            if !flags.alive || flags.exit || flags.searching {
                return false;
            }
        }
        // Read the stack size once so the indexed read below stays in
        // bounds even if the stack shrinks concurrently.
        let size = w.split_points_size.load(Ordering::Acquire);
        if cand == MAIN_THREAD && size == 0 {
            // The main worker parks on `thinking` between searches and
            // cannot be booked from there.
            return false;
        }
        if size == 0 {
            return true;
        }
        helpful_master_allows(size, w.split_points[size - 1].slaves_mask(), master)
    }

    /// Quick unlocked probe used by the search body to decide whether a
    /// split is worth attempting. Recruitment re-checks under the pool
    /// mutex.
    pub fn slave_available(&self, master: usize) -> bool {
        let active = self.active_threads.load(Ordering::Acquire);
        (0..active).any(|cand| self.is_available_to(cand, master))
    }

    /// Whether a beta cutoff happened in the worker's active split
    /// point or any of its ancestors.
    pub fn cutoff_occurred(&self, thread: usize) -> bool {
        let mut cur = self.workers[thread].mutex.lock().unwrap().active_split_point;
        while let Some(r) = cur {
            let sp = self.split_point_at(r);
            if sp.cutoff() {
                return true;
            }
            cur = sp.lock().parent;
        }
        false
    }

    // =========================================================================
    // Split
    // =========================================================================

    /// Distribute the remaining moves of a node between available
    /// workers. The caller hands over its picker; on `Declined` it gets
    /// the picker back and continues alone. On `Done`, `pos` has the
    /// split point's node count added and the returned values reflect
    /// the completed subtree.
    #[allow(clippy::too_many_arguments)]
    pub fn split(
        &self,
        master: usize,
        pos: &mut Position,
        frame: &SearchFrame,
        alpha: Value,
        beta: Value,
        best_value: Value,
        best_move: Move,
        depth: Depth,
        threat_move: Move,
        move_count: usize,
        picker: MovePicker,
        node_type: NodeType,
        cut_node: bool,
        fake: bool,
    ) -> SplitOutcome {
        debug_assert!(best_value <= alpha && alpha < beta && beta <= Value::INFINITE);
        debug_assert!(depth >= self.min_split_depth());

        let w = &self.workers[master];
        let slot = w.split_points_size.load(Ordering::Acquire);
        debug_assert!(slot < MAX_SPLITPOINTS_PER_THREAD, "split point stack overflow");
        if slot >= MAX_SPLITPOINTS_PER_THREAD {
            return SplitOutcome::Declined(picker);
        }
        let sp_ref = SplitPointRef { thread: master, slot };
        let sp = &w.split_points[slot];
        let parent = w.mutex.lock().unwrap().active_split_point;

        // Publish the split point and book slaves. Lock order: pool
        // mutex, then split point mutex; slave flags are set and the
        // slave notified with its own mutex held.
        let pool_guard = self.lock_pool();
        let recruited = {
            let mut inner = sp.lock();
            inner.master = master;
            inner.parent = parent;
            inner.depth = depth;
            inner.alpha = alpha;
            inner.beta = beta;
            inner.best_value = best_value;
            inner.best_move = best_move;
            inner.threat_move = threat_move;
            inner.node_type = node_type;
            inner.cut_node = cut_node;
            inner.move_count = move_count;
            inner.nodes = 0;
            inner.pos = pos.clone_for_search();
            inner.frame = *frame;
            sp.clear_cutoff();
            sp.store_slaves_mask(1u64 << master);
            sp.picker.install(picker);

            w.split_points_size.store(slot + 1, Ordering::Release);
            w.mutex.lock().unwrap().active_split_point = Some(sp_ref);

            let mut slaves_cnt = 1usize;
            if !fake {
                let max_slaves = self.max_threads_per_split_point();
                let active = self.active_threads.load(Ordering::Acquire);
                for cand in 0..active {
                    if slaves_cnt >= max_slaves {
                        break;
                    }
                    if !self.is_available_to(cand, master) {
                        continue;
                    }
                    slaves_cnt += 1;
                    sp.store_slaves_mask(sp.slaves_mask() | (1u64 << cand));
                    let cw = &self.workers[cand];
                    let mut cf = cw.mutex.lock().unwrap();
                    cf.active_split_point = Some(sp_ref);
                    cf.searching = true;
                    cw.cv.notify_one();
                }
            }
            slaves_cnt > 1
        };

        if !recruited && !fake {
            // Nobody came: unwind the booking and hand the picker back.
            let picker = {
                let _inner = sp.lock();
                let picker = sp.picker.take().expect("picker was just installed");
                w.split_points_size.store(slot, Ordering::Release);
                w.mutex.lock().unwrap().active_split_point = parent;
                sp.store_slaves_mask(0);
                picker
            };
            drop(pool_guard);
            if log_enabled!(Level::Trace) {
                trace!("split declined on worker {master} at depth {depth}");
            }
            return SplitOutcome::Declined(*picker);
        }

        drop(pool_guard);

        if log_enabled!(Level::Trace) {
            trace!(
                "worker {master} split at depth {depth}, mask {:#x}",
                sp.slaves_mask()
            );
        }

        // The master searches its own split point alongside the slaves
        // by entering the idle loop; it comes back once the last
        // participant has cleared its bit.
        self.idle_loop(master, Some(sp_ref));

        let pool_guard = self.lock_pool();
        let (best_value, best_move) = {
            let inner = sp.lock();
            debug_assert_eq!(sp.slaves_mask(), 0);
            let _ = sp.picker.take();
            {
                let mut flags = w.mutex.lock().unwrap();
                flags.searching = true;
                flags.active_split_point = inner.parent;
            }
            w.split_points_size.store(slot, Ordering::Release);
            pos.set_nodes_searched(pos.nodes_searched() + inner.nodes);
            (inner.best_value, inner.best_move)
        };
        drop(pool_guard);

        SplitOutcome::Done { best_value, best_move }
    }

    // =========================================================================
    // Idle loops
    // =========================================================================

    /// Slave/master idle loop. With `base_sp` set (master waiting on
    /// its own split point), the loop returns as soon as that split
    /// point's slave set empties; otherwise it runs until `exit`.
    fn idle_loop(&self, me: usize, base_sp: Option<SplitPointRef>) {
        loop {
            {
                let w = &self.workers[me];
                let mut flags = w.mutex.lock().unwrap();
                loop {
                    if flags.exit {
                        return;
                    }
                    if flags.searching {
                        break;
                    }
                    if let Some(r) = base_sp {
                        if self.split_point_at(r).slaves_mask() == 0 {
                            return;
                        }
                    }
                    if self.sleep_while_idle.load(Ordering::Relaxed) {
                        flags = w.cv.wait(flags).unwrap();
                    } else {
                        drop(flags);
                        thread::yield_now();
                        flags = w.mutex.lock().unwrap();
                    }
                }
            }

            let assigned = self.workers[me].mutex.lock().unwrap().active_split_point;
            match assigned {
                Some(sp_ref) => self.run_split_point(me, sp_ref),
                None => {
                    // Booked with no split point only happens on
                    // malformed wakeups; park again.
                    debug_assert!(false, "worker {me} searching without a split point");
                    self.workers[me].mutex.lock().unwrap().searching = false;
                }
            }
        }
    }

    /// Main worker loop: parks on `thinking`, runs the search body,
    /// then signals `wait_for_think_finished` callers.
    fn main_idle_loop(&self) {
        loop {
            {
                let w = &self.workers[MAIN_THREAD];
                let mut flags = w.mutex.lock().unwrap();
                while !flags.thinking && !flags.exit {
                    flags = w.cv.wait(flags).unwrap();
                }
                if flags.exit {
                    return;
                }
                flags.searching = true;
            }

            let job = self.job.lock().unwrap().take();
            if let Some(mut job) = job {
                self.body.think(self, &mut job);
            }

            // Thinking clears only after the search body has returned,
            // so wait_for_think_finished cannot resume early.
            {
                let w = &self.workers[MAIN_THREAD];
                let mut flags = w.mutex.lock().unwrap();
                flags.searching = false;
                flags.thinking = false;
                self.sleep_condition.notify_one();
            }
        }
    }

    /// Timer loop: sleeps `msec` milliseconds (forever when 0), then
    /// fires `check_time` on every non-zero tick.
    fn timer_loop(&self) {
        loop {
            let msec = {
                let mut st = self.timer.mutex.lock().unwrap();
                if st.exit {
                    return;
                }
                let interval = st.msec;
                if interval > 0 {
                    let (guard, _) = self
                        .timer
                        .cv
                        .wait_timeout(st, Duration::from_millis(interval))
                        .unwrap();
                    st = guard;
                } else {
                    st = self.timer.cv.wait(st).unwrap();
                }
                if st.exit {
                    return;
                }
                st.msec
            };
            if msec > 0 {
                self.body.check_time(self);
            }
        }
    }

    // =========================================================================
    // Split point participation
    // =========================================================================

    /// The per-move protocol every participant (master included) runs
    /// at a split point: draw a move under the picker lock, read alpha
    /// under the split point mutex, search the child on a private
    /// position clone, then merge the result back under the mutex.
    fn run_split_point(&self, me: usize, sp_ref: SplitPointRef) {
        let sp = self.split_point_at(sp_ref);

        let (snapshot, depth, beta, node_type, cut_node, threat_move, frame) = {
            let inner = sp.lock();
            (
                inner.pos.clone_for_search(),
                inner.depth,
                inner.beta,
                inner.node_type,
                inner.cut_node,
                inner.threat_move,
                inner.frame,
            )
        };

        let mut local_nodes = 0u64;
        loop {
            if self.signals.stop_requested() || self.cutoff_occurred(me) {
                break;
            }

            let m = sp.picker.next_move();
            if m.is_none() {
                break;
            }

            let (alpha, move_count) = {
                let mut inner = sp.lock();
                inner.move_count += 1;
                (inner.alpha, inner.move_count)
            };

            let ctx = SplitSearchContext {
                thread_id: me,
                sp: sp_ref,
                depth,
                alpha,
                beta,
                node_type,
                cut_node,
                threat_move,
                frame,
                move_count,
            };

            let mut pos = snapshot.clone_for_search();
            let value = self.body.search_move(self, &ctx, &mut pos, m);
            local_nodes += pos.nodes_searched();

            {
                let mut inner = sp.lock();
                if !sp.cutoff() && value > inner.best_value {
                    inner.best_value = value;
                    inner.best_move = m;
                    if value > inner.alpha {
                        inner.alpha = value;
                    }
                    if value >= inner.beta {
                        sp.raise_cutoff();
                    }
                }
            }
        }

        // Leaving the split point: merge node counts, clear our bit,
        // and wake the master if we are the last one out.
        let (master, last) = {
            let mut inner = sp.lock();
            inner.nodes += local_nodes;
            let mask = sp.slaves_mask() & !(1u64 << me);
            sp.store_slaves_mask(mask);
            (inner.master, mask == 0)
        };

        if last && me != master {
            let mw = &self.workers[master];
            let _flags = mw.mutex.lock().unwrap();
            mw.cv.notify_one();
        }

        {
            let w = &self.workers[me];
            let mut flags = w.mutex.lock().unwrap();
            flags.searching = false;
            let size = w.split_points_size.load(Ordering::Acquire);
            flags.active_split_point = if size > 0 {
                Some(SplitPointRef { thread: me, slot: size - 1 })
            } else {
                None
            };
        }
    }
}
