//! MovePicker（指し手オーダリング）
//!
//! 探索中に指し手を有望な順で1手ずつ返すコンポーネント。
//! 全手を先に生成することはせず、フェーズ単位で必要になったときに
//! 生成・スコアリング・選択を行う。
//!
//! ## フェーズ列（いずれも Stop で終端）
//!
//! - 通常探索: TtMove → MateKiller → GoodCaptures → NonCaptures → BadCaptures
//! - 王手回避: Evasions
//! - 静止探索（王手生成あり）: QCaptures → QChecks
//! - 静止探索（捕獲なし）: QChecks
//! - 静止探索（王手生成なし）: QCaptures
//! - 生成なし: （即 Stop）
//!
//! SEE が負の捕獲は GoodCaptures のスコアリング時に `bad_captures` へ
//! 退避され、BadCaptures フェーズで挿入順に取り出される。

use std::sync::{Arc, Mutex};

use crate::bitboard::Bitboard;
use crate::position::{see_value, Position, ScoredMove, MAX_MOVES};
use crate::search::history::{History, H_MAX};
use crate::search::types::SearchFrame;
use crate::types::{Depth, Move, PieceType, Square};

// =============================================================================
// フェーズ
// =============================================================================

/// 指し手生成のフェーズ
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Phase {
    /// 置換表の指し手
    TtMove,
    /// メイトキラー
    MateKiller,
    /// 良い捕獲手（SEE >= 0）
    GoodCaptures,
    /// 悪い捕獲手（SEE < 0、後回し）
    BadCaptures,
    /// 静かな手
    NonCaptures,
    /// 王手回避
    Evasions,
    /// 静止探索用捕獲手
    QCaptures,
    /// 静止探索用王手
    QChecks,
    /// 終端（以後は常に NONE）
    Stop,
}

/// フェーズ表
///
/// 各シーケンスは Stop で終端する。ピッカーは開始インデックスから
/// 前進するだけで、Stop を越えて進むことはない。
pub(crate) const PHASE_TABLE: &[Phase] = &[
    // 通常探索
    Phase::TtMove,
    Phase::MateKiller,
    Phase::GoodCaptures,
    Phase::NonCaptures,
    Phase::BadCaptures,
    Phase::Stop,
    // 王手回避
    Phase::Evasions,
    Phase::Stop,
    // 静止探索（王手生成あり）
    Phase::QCaptures,
    Phase::QChecks,
    Phase::Stop,
    // 静止探索（捕獲なし、王手のみ）
    Phase::QChecks,
    Phase::Stop,
    // 静止探索（王手生成なし）
    Phase::QCaptures,
    Phase::Stop,
    // 生成なし
    Phase::Stop,
];

pub(crate) const MAIN_SEARCH_IDX: usize = 0;
pub(crate) const EVASIONS_IDX: usize = 6;
pub(crate) const QSEARCH_WITH_CHECKS_IDX: usize = 8;
pub(crate) const QSEARCH_NO_CAPTURES_IDX: usize = 11;
pub(crate) const QSEARCH_WITHOUT_CHECKS_IDX: usize = 13;
pub(crate) const NO_MOVES_IDX: usize = 15;

// =============================================================================
// 定数
// =============================================================================

/// NonCaptures で全走査をやめるまでの手数
///
/// PV ノード以外では、この手数を返した後は失敗気味とみなして
/// 先頭から順に返す。
pub const NONCAPTURE_FULL_SCAN_LIMIT: usize = 12;

/// QCaptures で全走査する手数
pub const QCAPTURE_FULL_SCAN_LIMIT: usize = 4;

/// 静止探索のフェーズが tt_move を重複排除するかどうか
///
/// 静止探索は置換表に手を書かないため、重複は起きない。
/// 静止探索をハッシュするようになったらここを true にして
/// ドレイン側の判定を復活させること。
pub const QSEARCH_FILTERS_TT_MOVE: bool = false;

/// bad_captures バッファの容量
const MAX_BAD_CAPTURES: usize = 64;

/// History が正のとき PST より優先させるための下駄
const HISTORY_OVER_PST: i32 = 1000;

/// 同じマスへの連続攻撃に課すペナルティ
const SQUARE_PENALTY: i32 = 0xB00;

// =============================================================================
// 補助型
// =============================================================================

/// 評価関数から渡される「捕獲が存在し得ない」判定のための情報
#[derive(Debug, Clone, Copy)]
pub struct EvalHint {
    /// 手番側の利きの合併
    pub attacked_by_us: Bitboard,
    /// 特殊化された終盤評価が適用されているか
    pub specialized_eval: bool,
}

/// pick_best_spread 用の累積マスペナルティ
///
/// 選ばれた移動先には `0xB00` が加算され、同じマスを攻める手の
/// 優先度が下がっていく。
#[derive(Debug, Clone)]
pub struct SquarePenalties {
    values: [i32; Square::NUM],
}

impl SquarePenalties {
    pub fn new() -> SquarePenalties {
        SquarePenalties { values: [0; Square::NUM] }
    }

    #[inline]
    pub fn penalty(&self, sq: Square) -> i32 {
        self.values[sq.index()]
    }
}

impl Default for SquarePenalties {
    fn default() -> Self {
        SquarePenalties::new()
    }
}

// =============================================================================
// MovePicker
// =============================================================================

/// 指し手オーダリング器
///
/// 局面の複製を所有するため、split point で複数スレッドから
/// （`SharedMovePicker` 越しに）共有できる。
pub struct MovePicker {
    pos: Position,
    history: Arc<History>,

    pv_node: bool,
    tt_move: Move,
    mate_killer: Move,
    killer1: Move,
    killer2: Move,
    depth: Depth,
    pinned: Bitboard,
    dc: Bitboard,

    phase_index: usize,
    generated: bool,
    moves: [ScoredMove; MAX_MOVES],
    num_moves: usize,
    moves_picked: usize,
    bad_captures: [ScoredMove; MAX_BAD_CAPTURES],
    num_bad_captures: usize,
    bad_captures_picked: usize,
    finished: bool,
}

impl MovePicker {
    /// コンストラクタ
    ///
    /// 開始フェーズは局面と深さから決まる:
    /// - 王手中: Evasions
    /// - depth > 0: 通常探索
    /// - depth == 0: 静止探索（捕獲が無いと分かっていれば王手のみ）
    /// - depth < 0: 静止探索（王手生成なし、捕獲が無ければ何も返さない）
    pub fn new(
        pos: &Position,
        pv_node: bool,
        tt_move: Move,
        frame: &SearchFrame,
        depth: Depth,
        eval_hint: Option<EvalHint>,
        history: Arc<History>,
    ) -> MovePicker {
        let us = pos.side_to_move();
        let them = !us;

        // 評価情報があれば、捕獲が1つも生成され得ないことを
        // 生成前に判定できる
        let no_captures = match eval_hint {
            Some(hint) => {
                (hint.attacked_by_us & pos.pieces_of_color(them)).is_empty()
                    && !hint.specialized_eval
                    && pos.ep_square().is_none()
                    && !pos.has_pawn_on_7th(us)
            }
            None => false,
        };

        let phase_index = if pos.in_check() {
            EVASIONS_IDX
        } else if depth > 0 {
            MAIN_SEARCH_IDX
        } else if depth == 0 {
            if no_captures {
                QSEARCH_NO_CAPTURES_IDX
            } else {
                QSEARCH_WITH_CHECKS_IDX
            }
        } else if no_captures {
            NO_MOVES_IDX
        } else {
            QSEARCH_WITHOUT_CHECKS_IDX
        };

        // tt_move と同じメイトキラーは重複排除
        let mate_killer =
            if frame.mate_killer == tt_move { Move::NONE } else { frame.mate_killer };

        MovePicker {
            pos: pos.clone_for_search(),
            history,
            pv_node,
            tt_move,
            mate_killer,
            killer1: frame.killers[0],
            killer2: frame.killers[1],
            depth,
            pinned: pos.pinned_pieces(us),
            dc: pos.discovered_check_candidates(us),
            phase_index,
            generated: false,
            moves: [ScoredMove::default(); MAX_MOVES],
            num_moves: 0,
            moves_picked: 0,
            bad_captures: [ScoredMove::default(); MAX_BAD_CAPTURES],
            num_bad_captures: 0,
            bad_captures_picked: 0,
            finished: false,
        }
    }

    /// 現在のフェーズ
    #[inline]
    pub fn current_phase(&self) -> Phase {
        PHASE_TABLE[self.phase_index]
    }

    /// 探索深さ
    #[inline]
    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// 次のフェーズへ進む
    fn advance(&mut self) {
        debug_assert!(self.current_phase() != Phase::Stop);
        self.phase_index += 1;
        self.generated = false;
        self.moves_picked = 0;
    }

    /// 次の指し手を返す
    ///
    /// 手が尽きたら `Move::NONE` を返す。Stop フェーズは吸収状態で、
    /// 以後何度呼んでも NONE のまま。
    pub fn next_move(&mut self) -> Move {
        loop {
            match self.current_phase() {
                Phase::TtMove => {
                    self.advance();
                    let ttm = self.tt_move;
                    if ttm.is_some() && self.pos.move_is_legal(ttm, self.pinned) {
                        return ttm;
                    }
                }

                Phase::MateKiller => {
                    self.advance();
                    let mk = self.mate_killer;
                    if mk.is_some() && self.pos.move_is_legal(mk, self.pinned) {
                        return mk;
                    }
                }

                Phase::GoodCaptures => {
                    if !self.generated {
                        self.num_moves = self.pos.generate_captures_scored(&mut self.moves);
                        self.moves_picked = 0;
                        self.score_captures();
                        self.generated = true;
                    }
                    if let Some(m) = self.drain_good_captures() {
                        return m;
                    }
                    self.advance();
                }

                Phase::NonCaptures => {
                    if !self.generated {
                        self.num_moves = self.pos.generate_noncaptures_scored(&mut self.moves);
                        self.moves_picked = 0;
                        self.score_noncaptures();
                        self.generated = true;
                    }
                    if let Some(m) = self.drain_noncaptures() {
                        return m;
                    }
                    self.advance();
                }

                Phase::BadCaptures => {
                    if let Some(m) = self.drain_bad_captures() {
                        return m;
                    }
                    self.advance();
                }

                Phase::Evasions => {
                    if !self.generated {
                        debug_assert!(self.pos.in_check());
                        self.num_moves = self.pos.generate_evasions_scored(&mut self.moves);
                        self.moves_picked = 0;
                        self.score_evasions();
                        self.generated = true;
                    }
                    if let Some(m) = self.drain_evasions() {
                        return m;
                    }
                    self.advance();
                }

                Phase::QCaptures => {
                    if !self.generated {
                        self.num_moves = self.pos.generate_captures_scored(&mut self.moves);
                        self.moves_picked = 0;
                        self.score_qcaptures();
                        self.generated = true;
                    }
                    if let Some(m) = self.drain_qcaptures() {
                        return m;
                    }
                    self.advance();
                }

                Phase::QChecks => {
                    if !self.generated {
                        self.num_moves =
                            self.pos.generate_checks_scored(self.dc, &mut self.moves);
                        self.moves_picked = 0;
                        self.generated = true;
                    }
                    if let Some(m) = self.drain_qchecks() {
                        return m;
                    }
                    self.advance();
                }

                Phase::Stop => return Move::NONE,
            }
        }
    }

    // =========================================================================
    // スコアリング
    // =========================================================================

    /// 捕獲手のスコアを計算
    ///
    /// 勝ちと互角の捕獲は MVV/LVA で並べる。SEE ベースの並びよりも
    /// わずかに良い: 十分に守られた大駒から取り合いを始めても、
    /// 浮き駒は浮き駒のまま残ることが多く、部分木が小さくなる。
    /// SEE が負の捕獲はスコアに SEE 値を入れて bad_captures へ移す。
    fn score_captures(&mut self) {
        let mut i = 0;
        while i < self.num_moves {
            let m = self.moves[i].mv;
            let see = self.pos.see(m);
            if see >= 0 {
                self.moves[i].score = if m.is_promotion() {
                    see_value(PieceType::Queen)
                } else {
                    self.pos.mg_value_of_piece_on(m.to()) - self.pos.type_of_piece_on(m.from())
                };
                i += 1;
            } else {
                debug_assert!(self.num_bad_captures < MAX_BAD_CAPTURES);
                self.moves[i].score = see;
                self.bad_captures[self.num_bad_captures] = self.moves[i];
                self.num_bad_captures += 1;
                self.num_moves -= 1;
                self.moves[i] = self.moves[self.num_moves];
            }
        }
    }

    /// 静かな手のスコアを計算
    ///
    /// まず history、無ければ PST。history が正の手は常に PST 組より
    /// 上に来るよう下駄を履かせる。
    fn score_noncaptures(&mut self) {
        for i in 0..self.num_moves {
            let m = self.moves[i].mv;
            let mut hs = if m == self.killer1 {
                H_MAX + 2
            } else if m == self.killer2 {
                H_MAX + 1
            } else {
                self.history.move_ordering_score(self.pos.piece_on(m.from()), m)
            };
            if hs > 0 {
                hs += HISTORY_OVER_PST;
            }
            self.moves[i].score = hs + self.pos.mg_pst_delta(m);
        }
    }

    /// 回避手のスコアを計算
    fn score_evasions(&mut self) {
        for i in 0..self.num_moves {
            let m = self.moves[i].mv;
            self.moves[i].score = if m == self.tt_move {
                2 * H_MAX
            } else if self.pos.piece_on(m.to()).is_some() {
                let see = self.pos.see(m);
                if see >= 0 {
                    see + H_MAX
                } else {
                    see
                }
            } else {
                self.history.move_ordering_score(self.pos.piece_on(m.from()), m)
            };
        }
    }

    /// 静止探索用捕獲手のスコアを計算（MVV/LVA のみ、SEE は見ない）
    fn score_qcaptures(&mut self) {
        for i in 0..self.num_moves {
            let m = self.moves[i].mv;
            self.moves[i].score = if m.is_promotion() {
                see_value(PieceType::Queen)
            } else {
                self.pos.mg_value_of_piece_on(m.to()) - self.pos.type_of_piece_on(m.from())
            };
        }
    }

    // =========================================================================
    // 選択
    // =========================================================================

    /// moves[moves_picked..num_moves] で最高スコアのインデックス
    ///
    /// 同点は先頭出現を採る。
    fn best_index(&self) -> usize {
        debug_assert!(self.moves_picked < self.num_moves);
        let mut best = self.moves_picked;
        let mut best_score = self.moves[best].score;
        for i in self.moves_picked + 1..self.num_moves {
            if self.moves[i].score > best_score {
                best = i;
                best_score = self.moves[i].score;
            }
        }
        best
    }

    /// best を先頭と入れ替えてカーソルを進め、その手を返す
    #[inline]
    fn take_at(&mut self, index: usize) -> Move {
        self.moves.swap(index, self.moves_picked);
        let m = self.moves[self.moves_picked].mv;
        self.moves_picked += 1;
        m
    }

    /// 累積マスペナルティ付きの選択
    ///
    /// 実効スコア = score - penalty[to] で選び、選ばれた移動先の
    /// ペナルティを上げる。同じマスへの攻めが失敗した直後に、別の
    /// マスを攻める手を先に試したいときに使う。
    pub fn pick_best_spread(&mut self, penalties: &mut SquarePenalties) -> Move {
        if self.moves_picked >= self.num_moves {
            return Move::NONE;
        }
        let mut best = self.moves_picked;
        let mut best_score = i32::MIN;
        for i in self.moves_picked..self.num_moves {
            let hs = self.moves[i].score - penalties.penalty(self.moves[i].mv.to());
            if hs > best_score {
                best = i;
                best_score = hs;
            }
        }
        let m = self.take_at(best);
        penalties.values[m.to().index()] += SQUARE_PENALTY;
        m
    }

    fn drain_good_captures(&mut self) -> Option<Move> {
        debug_assert!(!self.pos.in_check());
        while self.moves_picked < self.num_moves {
            let m = self.take_at(self.best_index());
            if m != self.tt_move
                && m != self.mate_killer
                && self.pos.pl_move_is_legal(m, self.pinned)
            {
                return Some(m);
            }
        }
        None
    }

    fn drain_noncaptures(&mut self) -> Option<Move> {
        debug_assert!(!self.pos.in_check());
        while self.moves_picked < self.num_moves {
            // PV ノードか序盤の数手は全走査で最善を探す。それ以降の
            // non-PV はどうせ fail-low しているので先頭から返す。
            let index = if self.pv_node || self.moves_picked < NONCAPTURE_FULL_SCAN_LIMIT {
                self.best_index()
            } else {
                self.moves_picked
            };
            let m = self.take_at(index);
            if m != self.tt_move
                && m != self.mate_killer
                && self.pos.pl_move_is_legal(m, self.pinned)
            {
                return Some(m);
            }
        }
        None
    }

    fn drain_bad_captures(&mut self) -> Option<Move> {
        debug_assert!(!self.pos.in_check());
        // SEE 順に並べ直す手もあるが、挿入順のまま返す
        while self.bad_captures_picked < self.num_bad_captures {
            let m = self.bad_captures[self.bad_captures_picked].mv;
            self.bad_captures_picked += 1;
            if m != self.tt_move
                && m != self.mate_killer
                && self.pos.pl_move_is_legal(m, self.pinned)
            {
                return Some(m);
            }
        }
        None
    }

    fn drain_evasions(&mut self) -> Option<Move> {
        debug_assert!(self.pos.in_check());
        // 生成器が合法手だけを返すので、ここでの合法性検査は不要
        if self.moves_picked < self.num_moves {
            Some(self.take_at(self.best_index()))
        } else {
            None
        }
    }

    fn drain_qcaptures(&mut self) -> Option<Move> {
        debug_assert!(!self.pos.in_check());
        while self.moves_picked < self.num_moves {
            let index = if self.moves_picked < QCAPTURE_FULL_SCAN_LIMIT {
                self.best_index()
            } else {
                self.moves_picked
            };
            let m = self.take_at(index);
            // 静止探索をハッシュするようになったら tt_move の重複排除を
            // ここに入れること（QSEARCH_FILTERS_TT_MOVE を参照）
            if self.pos.pl_move_is_legal(m, self.pinned) {
                return Some(m);
            }
        }
        None
    }

    fn drain_qchecks(&mut self) -> Option<Move> {
        debug_assert!(!self.pos.in_check());
        while self.moves_picked < self.num_moves {
            let m = self.moves[self.moves_picked].mv;
            self.moves_picked += 1;
            if self.pos.pl_move_is_legal(m, self.pinned) {
                return Some(m);
            }
        }
        None
    }
}

impl Iterator for MovePicker {
    type Item = Move;

    fn next(&mut self) -> Option<Move> {
        let m = self.next_move();
        if m.is_none() {
            None
        } else {
            Some(m)
        }
    }
}

// =============================================================================
// SharedMovePicker
// =============================================================================

/// split point で共有するための mutex 付きセル
///
/// ピッカー自体はスレッド安全ではないので、slave はこの入口だけを
/// 使う。`finished` ラッチにより、一度尽きたピッカーは以後ロックを
/// 取ってもすぐ NONE を返す。
///
/// split point のスロットは再利用されるため、セルは空の状態も持つ。
/// 空のセルは常に NONE を返す。
pub struct SharedMovePicker {
    inner: Mutex<Option<Box<MovePicker>>>,
}

impl SharedMovePicker {
    pub fn new(picker: MovePicker) -> SharedMovePicker {
        SharedMovePicker { inner: Mutex::new(Some(Box::new(picker))) }
    }

    /// 空のセル（split point スロットの初期状態）
    pub(crate) fn empty() -> SharedMovePicker {
        SharedMovePicker { inner: Mutex::new(None) }
    }

    /// ピッカーを据え付ける
    pub(crate) fn install(&self, picker: MovePicker) {
        *self.inner.lock().unwrap() = Some(Box::new(picker));
    }

    /// ピッカーを取り出してセルを空に戻す
    pub(crate) fn take(&self) -> Option<Box<MovePicker>> {
        self.inner.lock().unwrap().take()
    }

    /// ロックを取って1手引く
    pub fn next_move(&self) -> Move {
        let mut guard = self.inner.lock().unwrap();
        let Some(mp) = guard.as_mut() else {
            return Move::NONE;
        };
        if mp.finished {
            return Move::NONE;
        }
        let m = mp.next_move();
        if m.is_none() {
            mp.finished = true;
        }
        m
    }

    /// 現在のフェーズ（ロックを取る、空なら Stop）
    pub fn current_phase(&self) -> Phase {
        match self.inner.lock().unwrap().as_ref() {
            Some(mp) => mp.current_phase(),
            None => Phase::Stop,
        }
    }
}
