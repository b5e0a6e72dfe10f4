//! 局面の差分状態（UndoInfo）

use crate::types::{CastlingRights, Move, Piece, Square};

/// 1手分の巻き戻し情報
///
/// `do_move`で積み、`undo_move`で消費する。1回のpushを正確に
/// 逆転するのに十分な情報を持つ。
#[derive(Debug, Clone, Copy)]
pub struct UndoInfo {
    /// 指した手
    pub mv: Move,
    /// 取られた駒（なければNONE、アンパッサンでは取られたポーン）
    pub captured: Piece,
    /// 直前のキャスリング権
    pub castling: CastlingRights,
    /// 直前のアンパッサン升
    pub ep_target: Option<Square>,
    /// 直前のZobristハッシュ
    pub key: u64,
    /// アンパッサンだったか
    pub is_en_passant: bool,
    /// キングサイドキャスリングだったか
    pub is_castle_kingside: bool,
    /// クイーンサイドキャスリングだったか
    pub is_castle_queenside: bool,
    /// プロモーション前の駒（プロモーションでなければNONE）
    pub promoted_from: Piece,
}

/// null move用の巻き戻し情報
///
/// 盤面は動かさないため、手番に依存する状態のみ保存する。
#[derive(Debug, Clone, Copy)]
pub struct NullUndo {
    /// 直前のアンパッサン升
    pub ep_target: Option<Square>,
    /// 直前のZobristハッシュ
    pub key: u64,
}
