//! エンジン制御
//!
//! 反復深化のルートループとドライバ向けAPI。

mod controller;

pub use controller::{Engine, DEFAULT_TT_SIZE_MB};
