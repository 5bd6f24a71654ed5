//! 探索モジュール
//!
//! 指し手オーダリング（MovePicker）と YBWC 並列化の土台（ThreadPool /
//! SplitPoint）。Alpha-Beta の再帰本体は `SearchBody` 経由で外部から
//! 与えられる。
//!
//! - MovePicker: フェーズ分割された遅延生成の指し手オーダリング
//! - History: 静かな手の統計
//! - ThreadPool: condvar で眠るワーカー群と helpful master 方式の split

mod config;
mod history;
mod limits;
mod lock_order;
mod movepicker;
mod split_point;
mod thread;
mod types;

pub use config::*;
pub use history::*;
pub use limits::*;
pub use movepicker::*;
pub use split_point::*;
pub use thread::*;
pub use types::*;
