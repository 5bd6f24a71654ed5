//! 探索制限（SearchLimits）

use std::time::Duration;

use crate::types::Depth;

/// 1回の探索にかける制限
///
/// 複数を同時に指定した場合、どれか1つに達した時点で停止する。
/// 時間・ノードの監視は外部（タイマーコールバック）の責務で、
/// コアはここの値を保持して渡すだけ。
#[derive(Debug, Clone, Default)]
pub struct SearchLimits {
    pub depth: Option<Depth>,
    pub nodes: Option<u64>,
    pub movetime: Option<Duration>,
    pub infinite: bool,
}

impl SearchLimits {
    pub fn builder() -> SearchLimitsBuilder {
        SearchLimitsBuilder::default()
    }
}

/// SearchLimits のビルダー
#[derive(Debug, Default)]
pub struct SearchLimitsBuilder {
    limits: SearchLimits,
}

impl SearchLimitsBuilder {
    pub fn depth(mut self, depth: Depth) -> Self {
        self.limits.depth = Some(depth);
        self
    }

    pub fn nodes(mut self, nodes: u64) -> Self {
        self.limits.nodes = Some(nodes);
        self
    }

    pub fn movetime(mut self, movetime: Duration) -> Self {
        self.limits.movetime = Some(movetime);
        self
    }

    pub fn infinite(mut self) -> Self {
        self.limits.infinite = true;
        self
    }

    pub fn build(self) -> SearchLimits {
        self.limits
    }
}
