//! 探索深さ（Depth）

/// 探索深さ（ply 単位）
pub type Depth = i32;

/// 1 ply
pub const ONE_PLY: Depth = 1;

/// 最大探索深度
pub const MAX_PLY: Depth = 128;

/// 静止探索の深さ
pub const DEPTH_QS: Depth = 0;

// 定数間の関係をコンパイル時に検証する
const _: () = {
    assert!(ONE_PLY == 1);
    assert!(MAX_PLY > DEPTH_QS);
};
