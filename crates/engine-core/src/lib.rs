//! チェス探索コア
//!
//! 段階生成の MovePicker と、split point を介した YBWC 並列探索の
//! スケジューラを提供する。盤面・指し手生成・SEE はコアが消費する
//! 範囲で同梱している。評価関数・置換表・UCI・時間管理は外部。

pub mod bitboard;
pub mod position;
pub mod search;
pub mod types;

pub use bitboard::Bitboard;
pub use position::{MoveList, Position};
pub use search::{
    History, MovePicker, PoolConfig, SearchBody, SharedMovePicker, ThreadPool,
};
pub use types::{Color, Move, Piece, PieceType, Square, Value};
