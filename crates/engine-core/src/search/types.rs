//! 探索まわりの共有型
//!
//! シグナル・探索スタックのフレーム・ルート手・事前状態スタック。

use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{Move, Piece, Square, Value};

/// ノード種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Root,
    Pv,
    NonPv,
}

/// 探索の停止・進行シグナル
///
/// すべて協調的。検索ループはこれらをサンプリングして自発的に停止する。
#[derive(Debug, Default)]
pub struct Signals {
    pub stop: AtomicBool,
    pub stop_on_ponderhit: AtomicBool,
    pub first_root_move: AtomicBool,
    pub failed_low_at_root: AtomicBool,
}

impl Signals {
    pub fn new() -> Signals {
        Signals::default()
    }

    /// 新しい探索の開始前にすべてリセット
    pub fn reset(&self) {
        self.stop.store(false, Ordering::SeqCst);
        self.stop_on_ponderhit.store(false, Ordering::SeqCst);
        self.first_root_move.store(false, Ordering::SeqCst);
        self.failed_low_at_root.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// 探索スタックの1フレーム
///
/// MovePicker と split point が参照する部分だけを持つ。
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchFrame {
    pub ply: i32,
    pub current_move: Move,
    pub threat_move: Move,
    pub mate_killer: Move,
    pub killers: [Move; 2],
    pub static_eval: Value,
}

impl SearchFrame {
    pub fn new(ply: i32) -> SearchFrame {
        SearchFrame { ply, ..SearchFrame::default() }
    }
}

/// ルートの1手
#[derive(Debug, Clone)]
pub struct RootMove {
    pub mv: Move,
    pub score: Value,
    pub prev_score: Value,
    pub pv: Vec<Move>,
}

impl RootMove {
    pub fn new(mv: Move) -> RootMove {
        RootMove {
            mv,
            score: -Value::INFINITE,
            prev_score: -Value::INFINITE,
            pv: vec![mv],
        }
    }
}

/// ルート手のリスト
pub type RootMoves = SmallVec<[RootMove; 64]>;

/// 1手分の復元情報
///
/// UCI 層が局面へ手を適用しながら積んでいく。探索コアは所有権を
/// 受け取って保持するだけで、中身には触れない。
#[derive(Debug, Clone, Copy, Default)]
pub struct StateInfo {
    pub castling: u8,
    pub ep_square: Option<Square>,
    pub halfmove_clock: u16,
    pub captured: Piece,
}

/// 探索開始前の状態スタック
///
/// `start_thinking` が `Option::take` で所有権を受け取る。
#[derive(Debug, Default)]
pub struct SetupStates {
    pub states: Vec<StateInfo>,
}
