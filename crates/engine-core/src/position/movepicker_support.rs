//! MovePicker サポートメソッド
//!
//! MovePicker が必要とする Position のメソッドを実装する。
//! TT手の pseudo-legal 検査、生成済みの手の合法性検査、SEE、
//! PST 差分、スコア付きバッファへの生成。

use super::movegen::{
    generate_captures, generate_checks, generate_evasions, generate_noncaptures, MoveList,
    ScoredMove, MAX_MOVES,
};
use super::Position;
use crate::bitboard::Bitboard;
use crate::types::{Color, Move, MoveKind, PieceType, Square};

impl Position {
    // =========================================================================
    // 指し手の妥当性チェック
    // =========================================================================

    /// pseudo-legal チェック（TT手の妥当性確認用）
    ///
    /// 出所の分からない手（置換表から引いた手など）がこの局面で
    /// 生成され得る手かどうかを確認する。生成系との完全な一致を
    /// 保証するため、生成リストとの照合で判定する。
    pub fn pseudo_legal(&self, m: Move) -> bool {
        if m.is_none() {
            return false;
        }
        let mut list = MoveList::new();
        if self.in_check() {
            generate_evasions(self, &mut list);
        } else {
            generate_captures(self, &mut list);
            generate_noncaptures(self, &mut list);
        }
        list.contains(m)
    }

    /// pseudo-legal な手が自玉を危険に晒さないか
    ///
    /// m は生成系の出力（または pseudo_legal を通った手）であること。
    /// ピンされていない駒の通常の手は盤面検査なしで合法と分かる。
    pub fn pl_move_is_legal(&self, m: Move, pinned: Bitboard) -> bool {
        debug_assert!(m.is_some());
        let from = m.from();
        let pc = self.piece_on(from);
        debug_assert!(pc.is_color(self.side_to_move()));

        if !self.in_check()
            && matches!(m.kind(), MoveKind::Normal | MoveKind::Promotion)
            && pc.piece_type() != PieceType::King
            && !pinned.contains(from)
        {
            return true;
        }
        if m.is_castling() {
            // キャスリングの通過マスは生成時に検査済み
            return true;
        }
        self.leaves_king_safe(m)
    }

    /// TT手・キラー手の完全な検査（pseudo-legal かつ合法）
    pub fn move_is_legal(&self, m: Move, pinned: Bitboard) -> bool {
        self.pseudo_legal(m) && self.pl_move_is_legal(m, pinned)
    }

    // =========================================================================
    // SEE (Static Exchange Evaluation)
    // =========================================================================

    /// 静的交換評価
    ///
    /// to のマスでの取り合いを双方最善（常に最も安い駒で取り返す）と
    /// 仮定したときの駒得を返す。x-ray（取り除いた駒の背後の利き）も
    /// 考慮する。
    pub fn see(&self, m: Move) -> i32 {
        if m.is_castling() {
            return 0;
        }

        let from = m.from();
        let to = m.to();
        let us = self.side_to_move();

        let mut occ = self.occupied();
        let mut gain = [0i32; 32];
        let mut attacker_pt = self.piece_on(from).piece_type();

        gain[0] = if m.is_en_passant() {
            let cap_sq = Square::make(to.file(), from.rank());
            occ.clear(cap_sq);
            see_value(PieceType::Pawn)
        } else if self.piece_on(to).is_some() {
            see_value(self.piece_on(to).piece_type())
        } else {
            0
        };

        occ.clear(from);

        if m.is_promotion() {
            gain[0] += see_value(m.promotion()) - see_value(PieceType::Pawn);
            attacker_pt = m.promotion();
        }

        let mut stm = !us;
        let mut d = 0usize;
        loop {
            d += 1;
            gain[d] = see_value(attacker_pt) - gain[d - 1];

            let Some((sq, pt)) = self.least_valuable_attacker(to, occ, stm) else {
                break;
            };

            // キングで取り返した後に相手の利きが残るなら、その取り返しは不可能
            if pt == PieceType::King {
                let mut occ_after = occ;
                occ_after.clear(sq);
                let opp = self.attackers_to_occ(to, occ_after) & self.pieces_of_color(!stm);
                if !opp.is_empty() {
                    break;
                }
            }

            attacker_pt = pt;
            occ.clear(sq);
            stm = !stm;

            if d + 2 >= gain.len() {
                break;
            }
        }

        // negamax で畳み込む
        for i in (1..d).rev() {
            gain[i - 1] = -std::cmp::max(-gain[i - 1], gain[i]);
        }
        gain[0]
    }

    /// to に利いている stm 側の最も安い駒
    fn least_valuable_attacker(
        &self,
        to: Square,
        occ: Bitboard,
        stm: Color,
    ) -> Option<(Square, PieceType)> {
        let attackers = self.attackers_to_occ(to, occ) & self.pieces_of_color(stm);
        for pt in [
            PieceType::Pawn,
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Rook,
            PieceType::Queen,
            PieceType::King,
        ] {
            let bb = attackers & self.pieces(stm, pt);
            if let Some(sq) = bb.lsb() {
                return Some((sq, pt));
            }
        }
        None
    }

    // =========================================================================
    // 指し手オーダリング用の盤面情報
    // =========================================================================

    /// マス上の駒のミドルゲーム価値（空なら 0）
    #[inline]
    pub fn mg_value_of_piece_on(&self, sq: Square) -> i32 {
        let pc = self.piece_on(sq);
        if pc.is_none() {
            0
        } else {
            see_value(pc.piece_type())
        }
    }

    /// マス上の駒種のインデックス（空なら 0）
    #[inline]
    pub fn type_of_piece_on(&self, sq: Square) -> i32 {
        let pc = self.piece_on(sq);
        if pc.is_none() {
            0
        } else {
            pc.piece_type().index() as i32
        }
    }

    /// PST 差分（移動でどれだけ位置が良くなるか）
    pub fn mg_pst_delta(&self, m: Move) -> i32 {
        let pc = self.piece_on(m.from());
        debug_assert!(pc.is_some());
        psq_mg(pc.piece_type(), pc.color(), m.to()) - psq_mg(pc.piece_type(), pc.color(), m.from())
    }

    // =========================================================================
    // スコア付きバッファへの生成
    // =========================================================================

    /// 取る手をスコア付きバッファへ生成
    pub fn generate_captures_scored(&self, buf: &mut [ScoredMove; MAX_MOVES]) -> usize {
        let mut list = MoveList::new();
        generate_captures(self, &mut list);
        copy_into(&list, buf)
    }

    /// 静かな手をスコア付きバッファへ生成
    pub fn generate_noncaptures_scored(&self, buf: &mut [ScoredMove; MAX_MOVES]) -> usize {
        let mut list = MoveList::new();
        generate_noncaptures(self, &mut list);
        copy_into(&list, buf)
    }

    /// 王手回避手をスコア付きバッファへ生成
    pub fn generate_evasions_scored(&self, buf: &mut [ScoredMove; MAX_MOVES]) -> usize {
        let mut list = MoveList::new();
        generate_evasions(self, &mut list);
        copy_into(&list, buf)
    }

    /// 取らずに王手をかける手をスコア付きバッファへ生成
    pub fn generate_checks_scored(
        &self,
        dc: Bitboard,
        buf: &mut [ScoredMove; MAX_MOVES],
    ) -> usize {
        let mut list = MoveList::new();
        generate_checks(self, dc, &mut list);
        copy_into(&list, buf)
    }
}

fn copy_into(list: &MoveList, buf: &mut [ScoredMove; MAX_MOVES]) -> usize {
    for (i, &m) in list.iter().enumerate() {
        buf[i] = ScoredMove::new(m, 0);
    }
    list.len()
}

/// SEE・MVV 用の駒価値
pub(crate) fn see_value(pt: PieceType) -> i32 {
    match pt {
        PieceType::Pawn => 198,
        PieceType::Knight => 817,
        PieceType::Bishop => 836,
        PieceType::Rook => 1270,
        PieceType::Queen => 2521,
        PieceType::King => 15000,
    }
}

// PST（白から見て rank 8 の行から記述）
#[rustfmt::skip]
const PSQ_PAWN: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
     50,  50,  50,  50,  50,  50,  50,  50,
     10,  10,  20,  30,  30,  20,  10,  10,
      5,   5,  10,  25,  25,  10,   5,   5,
      0,   0,   0,  20,  20,   0,   0,   0,
      5,  -5, -10,   0,   0, -10,  -5,   5,
      5,  10,  10, -20, -20,  10,  10,   5,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const PSQ_KNIGHT: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const PSQ_BISHOP: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const PSQ_ROOK: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
      5,  10,  10,  10,  10,  10,  10,   5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
      0,   0,   0,   5,   5,   0,   0,   0,
];

#[rustfmt::skip]
const PSQ_QUEEN: [i32; 64] = [
    -20, -10, -10,  -5,  -5, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,   5,   5,   5,   0, -10,
     -5,   0,   5,   5,   5,   5,   0,  -5,
      0,   0,   5,   5,   5,   5,   0,  -5,
    -10,   5,   5,   5,   5,   5,   0, -10,
    -10,   0,   5,   0,   0,   0,   0, -10,
    -20, -10, -10,  -5,  -5, -10, -10, -20,
];

#[rustfmt::skip]
const PSQ_KING: [i32; 64] = [
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -10, -20, -20, -20, -20, -20, -20, -10,
     20,  20,   0,   0,   0,   0,  20,  20,
     20,  30,  10,   0,   0,  10,  30,  20,
];

/// 駒種・色・マスの PST 値
fn psq_mg(pt: PieceType, c: Color, sq: Square) -> i32 {
    let table = match pt {
        PieceType::Pawn => &PSQ_PAWN,
        PieceType::Knight => &PSQ_KNIGHT,
        PieceType::Bishop => &PSQ_BISHOP,
        PieceType::Rook => &PSQ_ROOK,
        PieceType::Queen => &PSQ_QUEEN,
        PieceType::King => &PSQ_KING,
    };
    // テーブルは rank 8 の行が先頭。白はランクを反転して引く
    let idx = match c {
        Color::White => sq.index() ^ 56,
        Color::Black => sq.index(),
    };
    table[idx]
}
