//! History統計
//!
//! 静かな手の成功/失敗を [駒][移動先] で記録し、手の順序付けに利用する。
//! 値は 0 以上 `H_MAX` 以下に保たれる。テーブルは全ワーカーで共有される
//! ため、各エントリは relaxed なアトミックで持つ。

use std::sync::atomic::{AtomicI32, Ordering};

use crate::types::{Move, Piece, Square};

/// History スコアの上限
pub const H_MAX: i32 = 50_000;

/// History テーブル: [piece][to] -> score
pub struct History {
    table: [[AtomicI32; Square::NUM]; Piece::NUM],
}

impl History {
    /// ゼロ初期化されたテーブルを作成
    pub fn new() -> History {
        History {
            table: std::array::from_fn(|_| std::array::from_fn(|_| AtomicI32::new(0))),
        }
    }

    /// すべてクリア
    pub fn clear(&self) {
        for row in &self.table {
            for entry in row {
                entry.store(0, Ordering::Relaxed);
            }
        }
    }

    /// 手の順序付けスコア
    #[inline]
    pub fn move_ordering_score(&self, pc: Piece, m: Move) -> i32 {
        debug_assert!(pc.is_some());
        self.table[pc.index()][m.to().index()].load(Ordering::Relaxed)
    }

    /// ベータカットを起こした手を記録
    pub fn register_success(&self, pc: Piece, m: Move, depth: i32) {
        debug_assert!(pc.is_some());
        let entry = &self.table[pc.index()][m.to().index()];
        let v = (entry.load(Ordering::Relaxed) + depth * depth).min(H_MAX);
        entry.store(v, Ordering::Relaxed);
    }

    /// カットを起こせなかった手を減衰
    pub fn register_failure(&self, pc: Piece, m: Move, depth: i32) {
        debug_assert!(pc.is_some());
        let entry = &self.table[pc.index()][m.to().index()];
        let v = (entry.load(Ordering::Relaxed) - depth * depth).max(0);
        entry.store(v, Ordering::Relaxed);
    }
}

impl Default for History {
    fn default() -> Self {
        History::new()
    }
}
