//! 局面（Position）
//!
//! 8x8 メールボックス盤面。正しさ優先の実装で、利きはビットボードの
//! レイ走査から都度計算する。探索側が必要とする問い合わせ
//! （王手・ピン・両王手候補・合法性・SEE）をすべて提供する。

mod fen;
mod movegen;
mod movepicker_support;

pub use fen::FenError;
pub(crate) use movepicker_support::see_value;
pub use movegen::{
    generate_captures, generate_checks, generate_evasions, generate_noncaptures, MoveList,
    ScoredMove, MAX_MOVES,
};

use crate::bitboard::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks, Bitboard};
use crate::types::{Color, Move, MoveKind, Piece, PieceType, Rank, Square};

// キャスリング権ビット
pub const WHITE_OO: u8 = 1;
pub const WHITE_OOO: u8 = 2;
pub const BLACK_OO: u8 = 4;
pub const BLACK_OOO: u8 = 8;

/// 局面
#[derive(Clone)]
pub struct Position {
    pub(crate) board: [Piece; Square::NUM],
    pub(crate) side_to_move: Color,
    pub(crate) castling: u8,
    pub(crate) ep_square: Option<Square>,
    pub(crate) halfmove_clock: u16,
    pub(crate) game_ply: u16,
    nodes: u64,
}

impl Position {
    /// 空の盤面
    pub fn empty() -> Position {
        Position {
            board: [Piece::NONE; Square::NUM],
            side_to_move: Color::White,
            castling: 0,
            ep_square: None,
            halfmove_clock: 0,
            game_ply: 0,
            nodes: 0,
        }
    }

    /// 平手初期局面
    pub fn startpos() -> Position {
        Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
            .expect("startpos FEN is valid")
    }

    // =========================================================================
    // 基本アクセサ
    // =========================================================================

    /// 手番
    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// マス上の駒
    #[inline]
    pub fn piece_on(&self, sq: Square) -> Piece {
        self.board[sq.index()]
    }

    /// アンパッサン可能マス
    #[inline]
    pub fn ep_square(&self) -> Option<Square> {
        self.ep_square
    }

    /// キャスリング権（生ビット）
    #[inline]
    pub fn castling_rights(&self) -> u8 {
        self.castling
    }

    /// 手数（ply）
    #[inline]
    pub fn game_ply(&self) -> u16 {
        self.game_ply
    }

    /// 探索ノード数
    #[inline]
    pub fn nodes_searched(&self) -> u64 {
        self.nodes
    }

    /// 探索ノード数を設定（split 後の集計用）
    #[inline]
    pub fn set_nodes_searched(&mut self, nodes: u64) {
        self.nodes = nodes;
    }

    /// 探索用の複製（ノード数カウンタはゼロから）
    pub fn clone_for_search(&self) -> Position {
        let mut pos = self.clone();
        pos.nodes = 0;
        pos
    }

    // =========================================================================
    // ビットボード問い合わせ
    // =========================================================================

    /// 全占有マス
    pub fn occupied(&self) -> Bitboard {
        let mut bb = Bitboard::EMPTY;
        for sq in Square::all() {
            if self.board[sq.index()].is_some() {
                bb.set(sq);
            }
        }
        bb
    }

    /// 指定色の占有マス
    pub fn pieces_of_color(&self, c: Color) -> Bitboard {
        let mut bb = Bitboard::EMPTY;
        for sq in Square::all() {
            if self.board[sq.index()].is_color(c) {
                bb.set(sq);
            }
        }
        bb
    }

    /// 指定色・駒種の占有マス
    pub fn pieces(&self, c: Color, pt: PieceType) -> Bitboard {
        let mut bb = Bitboard::EMPTY;
        let target = Piece::make(c, pt);
        for sq in Square::all() {
            if self.board[sq.index()] == target {
                bb.set(sq);
            }
        }
        bb
    }

    /// キングのマス
    pub fn king_square(&self, c: Color) -> Square {
        let target = Piece::make(c, PieceType::King);
        for sq in Square::all() {
            if self.board[sq.index()] == target {
                return sq;
            }
        }
        debug_assert!(false, "no king for {c:?}");
        Square::A1
    }

    /// sq に利いている駒（両色、occupancy 指定）
    pub fn attackers_to_occ(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        let mut bb = Bitboard::EMPTY;

        bb |= pawn_attacks(Color::Black, sq) & self.pieces(Color::White, PieceType::Pawn);
        bb |= pawn_attacks(Color::White, sq) & self.pieces(Color::Black, PieceType::Pawn);

        let knights = self.pieces(Color::White, PieceType::Knight)
            | self.pieces(Color::Black, PieceType::Knight);
        bb |= knight_attacks(sq) & knights;

        let kings =
            self.pieces(Color::White, PieceType::King) | self.pieces(Color::Black, PieceType::King);
        bb |= king_attacks(sq) & kings;

        let diag = self.pieces(Color::White, PieceType::Bishop)
            | self.pieces(Color::Black, PieceType::Bishop)
            | self.pieces(Color::White, PieceType::Queen)
            | self.pieces(Color::Black, PieceType::Queen);
        bb |= bishop_attacks(sq, occupied) & diag;

        let line = self.pieces(Color::White, PieceType::Rook)
            | self.pieces(Color::Black, PieceType::Rook)
            | self.pieces(Color::White, PieceType::Queen)
            | self.pieces(Color::Black, PieceType::Queen);
        bb |= rook_attacks(sq, occupied) & line;

        bb & occupied
    }

    /// sq が色 c の駒に攻撃されているか（occupancy 指定）
    pub fn attacked_by_occ(&self, sq: Square, c: Color, occupied: Bitboard) -> bool {
        !(self.attackers_to_occ(sq, occupied) & self.pieces_of_color(c)).is_empty()
    }

    /// sq が色 c の駒に攻撃されているか
    #[inline]
    pub fn attacked_by(&self, sq: Square, c: Color) -> bool {
        self.attacked_by_occ(sq, c, self.occupied())
    }

    /// 手番側のキングに王手をかけている駒
    pub fn checkers(&self) -> Bitboard {
        let us = self.side_to_move;
        let ksq = self.king_square(us);
        self.attackers_to_occ(ksq, self.occupied()) & self.pieces_of_color(!us)
    }

    /// 王手がかかっているか
    #[inline]
    pub fn in_check(&self) -> bool {
        !self.checkers().is_empty()
    }

    /// ksq への飛び駒の利きを遮っている blocker_color の駒
    ///
    /// slider_color 側の飛び駒との間にちょうど 1 枚だけ挟まっている駒を返す。
    fn blockers(&self, ksq: Square, blocker_color: Color, slider_color: Color) -> Bitboard {
        let mut result = Bitboard::EMPTY;

        let walk = |dirs: &[(i8, i8)], slider_pt: PieceType, result: &mut Bitboard| {
            for &(df, dr) in dirs {
                let mut cur = ksq;
                let mut blocker: Option<Square> = None;
                while let Some(next) = cur.offset(df, dr) {
                    cur = next;
                    let pc = self.board[cur.index()];
                    if pc.is_none() {
                        continue;
                    }
                    match blocker {
                        None => {
                            if pc.is_color(blocker_color) {
                                blocker = Some(cur);
                            } else {
                                break;
                            }
                        }
                        Some(b) => {
                            if pc.is_color(slider_color)
                                && (pc.piece_type() == slider_pt
                                    || pc.piece_type() == PieceType::Queen)
                            {
                                result.set(b);
                            }
                            break;
                        }
                    }
                }
            }
        };

        walk(&[(0, 1), (1, 0), (0, -1), (-1, 0)], PieceType::Rook, &mut result);
        walk(&[(1, 1), (1, -1), (-1, -1), (-1, 1)], PieceType::Bishop, &mut result);
        result
    }

    /// ピンされている駒（us 側、us のキングに対して）
    pub fn pinned_pieces(&self, us: Color) -> Bitboard {
        self.blockers(self.king_square(us), us, !us)
    }

    /// 両王手（discovered check）候補の駒（us 側、相手キングに対して）
    pub fn discovered_check_candidates(&self, us: Color) -> Bitboard {
        self.blockers(self.king_square(!us), us, us)
    }

    /// us のポーンが昇格一歩手前（相対7段目）にあるか
    pub fn has_pawn_on_7th(&self, us: Color) -> bool {
        for sq in Square::all() {
            if self.board[sq.index()] == Piece::make(us, PieceType::Pawn)
                && sq.rank().relative(us) == Rank::Rank7
            {
                return true;
            }
        }
        false
    }

    /// 取る手かどうか
    #[inline]
    pub fn is_capture(&self, m: Move) -> bool {
        m.is_en_passant() || self.board[m.to().index()].is_some()
    }

    // =========================================================================
    // 指し手の適用
    // =========================================================================

    /// 指し手を適用する
    ///
    /// m は pseudo-legal であること。ノード数カウンタを 1 進める。
    pub fn do_move(&mut self, m: Move) {
        debug_assert!(m.is_some());
        let us = self.side_to_move;
        let from = m.from();
        let to = m.to();
        let pc = self.board[from.index()];
        debug_assert!(pc.is_color(us), "no {us:?} piece on {from}");

        let captured = if m.is_en_passant() {
            Piece::make(!us, PieceType::Pawn)
        } else {
            self.board[to.index()]
        };
        debug_assert!(!captured.is_color(us));

        self.halfmove_clock += 1;
        if captured.is_some() || pc.piece_type() == PieceType::Pawn {
            self.halfmove_clock = 0;
        }

        let mut new_ep = None;
        match m.kind() {
            MoveKind::Normal => {
                self.board[to.index()] = pc;
                self.board[from.index()] = Piece::NONE;
                if pc.piece_type() == PieceType::Pawn
                    && (to.index() as i32 - from.index() as i32).abs() == 16
                {
                    new_ep = Some(Square::from_index((from.index() + to.index()) / 2));
                }
            }
            MoveKind::Promotion => {
                self.board[to.index()] = Piece::make(us, m.promotion());
                self.board[from.index()] = Piece::NONE;
            }
            MoveKind::EnPassant => {
                debug_assert_eq!(self.ep_square, Some(to));
                let cap_sq = Square::make(to.file(), from.rank());
                self.board[to.index()] = pc;
                self.board[from.index()] = Piece::NONE;
                self.board[cap_sq.index()] = Piece::NONE;
            }
            MoveKind::Castling => {
                let (rook_from, rook_to) = if to.file() > from.file() {
                    (Square::make(crate::types::File::FileH, from.rank()),
                     Square::make(crate::types::File::FileF, from.rank()))
                } else {
                    (Square::make(crate::types::File::FileA, from.rank()),
                     Square::make(crate::types::File::FileD, from.rank()))
                };
                let rook = self.board[rook_from.index()];
                debug_assert_eq!(rook, Piece::make(us, PieceType::Rook));
                self.board[to.index()] = pc;
                self.board[from.index()] = Piece::NONE;
                self.board[rook_to.index()] = rook;
                self.board[rook_from.index()] = Piece::NONE;
            }
        }

        self.castling &= castling_mask(from) & castling_mask(to);
        self.ep_square = new_ep;
        self.side_to_move = !us;
        self.game_ply += 1;
        self.nodes += 1;
    }

    /// m を適用した後も自玉が安全か
    pub(crate) fn leaves_king_safe(&self, m: Move) -> bool {
        let us = self.side_to_move;
        let mut copy = self.clone();
        copy.do_move(m);
        !copy.attacked_by(copy.king_square(us), !us)
    }

    /// m が相手に王手をかけるか
    pub fn gives_check(&self, m: Move) -> bool {
        let mut copy = self.clone();
        copy.do_move(m);
        copy.in_check()
    }

    /// 合法手をすべて生成
    pub fn legal_moves(&self) -> MoveList {
        let mut list = MoveList::new();
        if self.in_check() {
            generate_evasions(self, &mut list);
            return list;
        }
        let mut pseudo = MoveList::new();
        generate_captures(self, &mut pseudo);
        generate_noncaptures(self, &mut pseudo);
        let pinned = self.pinned_pieces(self.side_to_move);
        for &m in pseudo.iter() {
            if self.pl_move_is_legal(m, pinned) {
                list.push(m);
            }
        }
        list
    }
}

/// from/to がこのマスに触れたとき残るキャスリング権
fn castling_mask(sq: Square) -> u8 {
    match sq {
        Square::E1 => !(WHITE_OO | WHITE_OOO),
        Square::H1 => !WHITE_OO,
        Square::A1 => !WHITE_OOO,
        Square::E8 => !(BLACK_OO | BLACK_OOO),
        Square::H8 => !BLACK_OO,
        Square::A8 => !BLACK_OOO,
        _ => 0xFF,
    }
}

impl std::fmt::Debug for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Position({} {:?})", self.fen(), self.side_to_move)
    }
}
