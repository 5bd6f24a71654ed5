//! Shared fixtures for the integration tests: a deterministic
//! leaf-scoring search body and a full-width negamax body.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use engine_core::position::Position;
use engine_core::search::{
    MovePicker, NodeType, RootJob, SearchBody, SearchFrame, SplitOutcome, SplitSearchContext,
    ThreadPool, MAIN_THREAD,
};
use engine_core::types::{Move, Value};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic per-move score, independent of search order.
pub fn move_score(m: Move) -> Value {
    Value::new((m.raw() % 997) as i32)
}

/// Outcome recorded by the fixture bodies.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub best_value: Option<Value>,
    pub best_move: Option<Move>,
    pub nodes: u64,
    pub declined: bool,
}

/// A body that splits at the root and scores each move with a pure
/// function. One position node per move, so node accounting is exact.
pub struct SplitterBody {
    pub fake: bool,
    pub beta: Value,
    pub seen: Mutex<Vec<(usize, Move)>>,
    pub recorded: Mutex<Recorded>,
}

impl SplitterBody {
    pub fn new(fake: bool, beta: Value) -> SplitterBody {
        SplitterBody {
            fake,
            beta,
            seen: Mutex::new(Vec::new()),
            recorded: Mutex::new(Recorded::default()),
        }
    }
}

impl SearchBody for SplitterBody {
    fn think(&self, pool: &ThreadPool, job: &mut RootJob) {
        let frame = SearchFrame::new(0);
        let depth = pool.min_split_depth();
        let mut picker = MovePicker::new(
            &job.pos,
            true,
            Move::NONE,
            &frame,
            depth,
            None,
            Arc::clone(pool.history()),
        );

        let alpha = Value::new(-32_000);
        let outcome = pool.split(
            MAIN_THREAD,
            &mut job.pos,
            &frame,
            alpha,
            self.beta,
            alpha,
            Move::NONE,
            depth,
            Move::NONE,
            0,
            picker,
            NodeType::Root,
            false,
            self.fake,
        );

        let mut recorded = self.recorded.lock().unwrap();
        match outcome {
            SplitOutcome::Done { best_value, best_move } => {
                recorded.best_value = Some(best_value);
                recorded.best_move = Some(best_move);
            }
            SplitOutcome::Declined(returned) => {
                // Nobody helped: drain the node ourselves, the same way
                // a participant would.
                recorded.declined = true;
                picker = returned;
                let mut best_value = alpha;
                let mut best_move = Move::NONE;
                loop {
                    let m = picker.next_move();
                    if m.is_none() {
                        break;
                    }
                    let ctx = SplitSearchContext {
                        thread_id: MAIN_THREAD,
                        sp: engine_core::search::SplitPointRef { thread: MAIN_THREAD, slot: 0 },
                        depth,
                        alpha: best_value,
                        beta: self.beta,
                        node_type: NodeType::Root,
                        cut_node: false,
                        threat_move: Move::NONE,
                        frame,
                        move_count: 0,
                    };
                    let mut pos = job.pos.clone_for_search();
                    let value = self.search_move(pool, &ctx, &mut pos, m);
                    job.pos.set_nodes_searched(
                        job.pos.nodes_searched() + pos.nodes_searched(),
                    );
                    if value > best_value {
                        best_value = value;
                        best_move = m;
                        if value >= self.beta {
                            break;
                        }
                    }
                }
                recorded.best_value = Some(best_value);
                recorded.best_move = Some(best_move);
            }
        }
        recorded.nodes = job.pos.nodes_searched();
    }

    fn search_move(
        &self,
        _pool: &ThreadPool,
        ctx: &SplitSearchContext,
        pos: &mut Position,
        m: Move,
    ) -> Value {
        pos.do_move(m);
        self.seen.lock().unwrap().push((ctx.thread_id, m));
        move_score(m)
    }
}

/// Full-width negamax with a material evaluation. No pruning, so the
/// value and the node total are independent of search order and thread
/// count.
pub struct NegamaxBody {
    pub depth: i32,
    pub recorded: Mutex<Recorded>,
    pub splits_done: AtomicU64,
}

impl NegamaxBody {
    pub fn new(depth: i32) -> NegamaxBody {
        NegamaxBody {
            depth,
            recorded: Mutex::new(Recorded::default()),
            splits_done: AtomicU64::new(0),
        }
    }

    fn eval(pos: &Position) -> Value {
        let us = pos.side_to_move();
        let mut score = 0i32;
        for sq in engine_core::types::Square::all() {
            let pc = pos.piece_on(sq);
            if pc.is_none() {
                continue;
            }
            let v = pos.mg_value_of_piece_on(sq);
            score += if pc.color() == us { v } else { -v };
        }
        Value::new(score)
    }

    fn negamax(&self, pool: &ThreadPool, pos: &mut Position, depth: i32, ply: i32) -> Value {
        if depth == 0 {
            return Self::eval(pos);
        }
        let frame = SearchFrame::new(ply);
        let mut picker = MovePicker::new(
            pos,
            false,
            Move::NONE,
            &frame,
            depth,
            None,
            Arc::clone(pool.history()),
        );
        let mut best = Value::new(-30_000);
        let mut any = false;
        loop {
            let m = picker.next_move();
            if m.is_none() {
                break;
            }
            any = true;
            let mut child = pos.clone_for_search();
            child.do_move(m);
            let v = -self.negamax(pool, &mut child, depth - 1, ply + 1);
            pos.set_nodes_searched(pos.nodes_searched() + child.nodes_searched());
            if v > best {
                best = v;
            }
        }
        if !any {
            // Mate or stalemate; a fixed value keeps the tree
            // order-independent.
            return if pos.in_check() { Value::new(-30_000) } else { Value::DRAW };
        }
        best
    }
}

impl SearchBody for NegamaxBody {
    fn think(&self, pool: &ThreadPool, job: &mut RootJob) {
        let depth = self.depth;
        let frame = SearchFrame::new(0);
        let mut picker = MovePicker::new(
            &job.pos,
            true,
            Move::NONE,
            &frame,
            depth,
            None,
            Arc::clone(pool.history()),
        );

        let mut best_value = -Value::INFINITE;
        let mut best_move = Move::NONE;
        let mut move_count = 0usize;

        loop {
            let m = picker.next_move();
            if m.is_none() {
                break;
            }
            move_count += 1;

            let mut child = job.pos.clone_for_search();
            child.do_move(m);
            let v = -self.negamax(pool, &mut child, depth - 1, 1);
            job.pos.set_nodes_searched(job.pos.nodes_searched() + child.nodes_searched());
            if v > best_value {
                best_value = v;
                best_move = m;
            }

            // Younger brothers go parallel once the first child is done.
            if depth >= pool.min_split_depth() && pool.slave_available(MAIN_THREAD) {
                match pool.split(
                    MAIN_THREAD,
                    &mut job.pos,
                    &frame,
                    best_value,
                    Value::INFINITE,
                    best_value,
                    best_move,
                    depth,
                    Move::NONE,
                    move_count,
                    picker,
                    NodeType::Root,
                    false,
                    false,
                ) {
                    SplitOutcome::Done { best_value: bv, best_move: bm } => {
                        self.splits_done.fetch_add(1, Ordering::Relaxed);
                        best_value = bv;
                        best_move = bm;
                        break;
                    }
                    SplitOutcome::Declined(returned) => {
                        picker = returned;
                    }
                }
            }
        }

        let mut recorded = self.recorded.lock().unwrap();
        recorded.best_value = Some(best_value);
        recorded.best_move = Some(best_move);
        recorded.nodes = job.pos.nodes_searched();
    }

    fn search_move(
        &self,
        pool: &ThreadPool,
        ctx: &SplitSearchContext,
        pos: &mut Position,
        m: Move,
    ) -> Value {
        pos.do_move(m);
        -self.negamax(pool, pos, ctx.depth - 1, 1)
    }
}
