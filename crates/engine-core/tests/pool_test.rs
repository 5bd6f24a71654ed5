//! Thread pool lifecycle: start/stop, root move filtering, timer ticks,
//! and bounded shutdown while a search is running.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::init_logger;
use engine_core::position::Position;
use engine_core::search::{
    PoolConfig, RootJob, SearchBody, SearchLimits, SetupStates, SplitSearchContext, StateInfo,
    ThreadPool,
};
use engine_core::types::{File, Move, Rank, Square, Value};

/// Spins until the stop signal is raised, recording what it saw.
struct SpinBody {
    root_moves_seen: Mutex<Option<usize>>,
    states_seen: Mutex<Option<usize>>,
    ticks: AtomicU64,
    stop_after_ticks: u64,
}

impl SpinBody {
    fn new(stop_after_ticks: u64) -> SpinBody {
        SpinBody {
            root_moves_seen: Mutex::new(None),
            states_seen: Mutex::new(None),
            ticks: AtomicU64::new(0),
            stop_after_ticks,
        }
    }
}

impl SearchBody for SpinBody {
    fn think(&self, pool: &ThreadPool, job: &mut RootJob) {
        *self.root_moves_seen.lock().unwrap() = Some(job.root_moves.len());
        *self.states_seen.lock().unwrap() =
            job.states.as_ref().map(|s| s.states.len());
        while !pool.signals().stop_requested() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn search_move(
        &self,
        _pool: &ThreadPool,
        _ctx: &SplitSearchContext,
        _pos: &mut Position,
        _m: Move,
    ) -> Value {
        Value::ZERO
    }

    fn check_time(&self, pool: &ThreadPool) {
        let ticks = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        if ticks >= self.stop_after_ticks {
            pool.signals().stop.store(true, Ordering::SeqCst);
        }
    }
}

fn cfg(threads: usize) -> PoolConfig {
    PoolConfig { threads, ..PoolConfig::default() }
}

#[test]
fn stop_signal_ends_search_promptly() {
    init_logger();
    let body = Arc::new(SpinBody::new(u64::MAX));
    let pool = ThreadPool::new(&cfg(2), Arc::clone(&body) as Arc<dyn SearchBody>);

    pool.start_thinking(&Position::startpos(), SearchLimits::default(), &[], &mut None);
    thread::sleep(Duration::from_millis(30));

    pool.signals().stop.store(true, Ordering::SeqCst);
    let begin = Instant::now();
    pool.wait_for_think_finished();
    assert!(
        begin.elapsed() < Duration::from_millis(500),
        "workers did not return to idle in time"
    );

    pool.shutdown();
}

#[test]
fn timer_ticks_fire_check_time() {
    init_logger();
    let body = Arc::new(SpinBody::new(3));
    let pool = ThreadPool::new(&cfg(1), Arc::clone(&body) as Arc<dyn SearchBody>);

    pool.set_timer_interval(5);
    pool.start_thinking(&Position::startpos(), SearchLimits::default(), &[], &mut None);

    // The third tick raises stop, which ends the spin.
    pool.wait_for_think_finished();
    assert!(body.ticks.load(Ordering::SeqCst) >= 3);

    pool.set_timer_interval(0);
    pool.shutdown();
}

#[test]
fn searchmoves_filters_the_root_list() {
    init_logger();
    let body = Arc::new(SpinBody::new(1));
    let pool = ThreadPool::new(&cfg(1), Arc::clone(&body) as Arc<dyn SearchBody>);
    pool.set_timer_interval(5);

    let e4 = Move::new(
        Square::make(File::FileE, Rank::Rank2),
        Square::make(File::FileE, Rank::Rank4),
    );
    pool.start_thinking(&Position::startpos(), SearchLimits::default(), &[e4], &mut None);
    pool.wait_for_think_finished();
    assert_eq!(*body.root_moves_seen.lock().unwrap(), Some(1));

    pool.shutdown();
}

#[test]
fn start_thinking_takes_state_stack_ownership() {
    init_logger();
    let body = Arc::new(SpinBody::new(1));
    let pool = ThreadPool::new(&cfg(1), Arc::clone(&body) as Arc<dyn SearchBody>);
    pool.set_timer_interval(5);

    let mut states = Some(SetupStates { states: vec![StateInfo::default(); 3] });
    pool.start_thinking(&Position::startpos(), SearchLimits::default(), &[], &mut states);
    // 所有権は移動済み
    assert!(states.is_none());

    pool.wait_for_think_finished();
    assert_eq!(*body.states_seen.lock().unwrap(), Some(3));

    pool.shutdown();
}

#[test]
fn read_options_resizes_the_pool() {
    init_logger();
    let body = Arc::new(SpinBody::new(1));
    let pool = ThreadPool::new(&cfg(1), Arc::clone(&body) as Arc<dyn SearchBody>);
    assert_eq!(pool.size(), 1);

    pool.read_options(&cfg(4));
    assert_eq!(pool.size(), 4);

    pool.read_options(&cfg(2));
    assert_eq!(pool.size(), 2);

    pool.shutdown();
    assert_eq!(pool.size(), 0);
}

#[test]
fn back_to_back_searches_reuse_the_pool() {
    init_logger();
    let body = Arc::new(SpinBody::new(1));
    let pool = ThreadPool::new(&cfg(2), Arc::clone(&body) as Arc<dyn SearchBody>);
    pool.set_timer_interval(5);

    for _ in 0..3 {
        pool.start_thinking(&Position::startpos(), SearchLimits::default(), &[], &mut None);
        pool.wait_for_think_finished();
    }
    assert!(body.ticks.load(Ordering::SeqCst) >= 3);

    pool.shutdown();
}
