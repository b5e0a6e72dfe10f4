//! 局面（Position）本体
//!
//! 駒配置・bitboard・手番・キャスリング権・アンパッサン升・Zobristハッシュを
//! 保持し、`do_move`/`undo_move`で可逆に更新する。

use crate::bitboard::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks, Bitboard,
};
use crate::movegen::{self, MoveList};
use crate::types::{CastlingRights, Color, Move, Piece, PieceType, Rank, Square};

use super::state::{NullUndo, UndoInfo};
use super::zobrist::{zobrist_castling, zobrist_ep, zobrist_psq, zobrist_side};

/// 不正な局面（bulk load後の検証エラー）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    /// キングの数が不正
    KingCount(Color, u32),
    /// アンパッサン升が不正
    BadEnPassant(Square),
    /// キャスリング権とキング・ルークの配置が矛盾
    BadCastling(CastlingRights),
}

impl std::fmt::Display for PositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionError::KingCount(color, n) => {
                write!(f, "invalid king count for {color:?}: {n}")
            }
            PositionError::BadEnPassant(sq) => {
                write!(f, "invalid en passant target: {}", sq.to_uci())
            }
            PositionError::BadCastling(rights) => {
                write!(f, "castling rights {:04b} inconsistent with board", rights.bits())
            }
        }
    }
}

impl std::error::Error for PositionError {}

/// 指し手入力のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveParseError {
    /// 文字列形式が不正（長さ・升表記）
    Malformed(String),
    /// 形式は正しいが合法手でない
    Illegal(String),
}

impl std::fmt::Display for MoveParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveParseError::Malformed(s) => write!(f, "malformed move string: {s}"),
            MoveParseError::Illegal(s) => write!(f, "illegal move: {s}"),
        }
    }
}

impl std::error::Error for MoveParseError {}

/// 局面
pub struct Position {
    /// 各升の駒
    pieces: [Piece; Square::NUM],
    /// 駒種別bitboard [色][駒種]
    piece_bb: [[Bitboard; PieceType::NUM]; Color::NUM],
    /// 色別bitboard
    color_bb: [Bitboard; Color::NUM],
    /// 全駒のbitboard
    occupied: Bitboard,
    /// 手番
    side_to_move: Color,
    /// アンパッサン升
    ep_target: Option<Square>,
    /// キャスリング権
    castling: CastlingRights,
    /// 探索ルートからの手数
    ply: u16,
    /// Zobristハッシュ（差分更新）
    key: u64,
    /// 巻き戻しスタック
    undo_stack: Vec<UndoInfo>,
}

impl Position {
    /// 空の局面を作成
    pub fn new() -> Position {
        let mut pos = Position {
            pieces: [Piece::NONE; Square::NUM],
            piece_bb: [[Bitboard::EMPTY; PieceType::NUM]; Color::NUM],
            color_bb: [Bitboard::EMPTY; Color::NUM],
            occupied: Bitboard::EMPTY,
            side_to_move: Color::White,
            ep_target: None,
            castling: CastlingRights::NONE,
            ply: 0,
            key: 0,
            undo_stack: Vec::with_capacity(128),
        };
        pos.key = pos.compute_key();
        pos
    }

    // =========================================================================
    // アクセサ
    // =========================================================================

    /// 升の駒を取得
    #[inline]
    pub fn piece_on(&self, sq: Square) -> Piece {
        self.pieces[sq.index()]
    }

    /// 指定色・駒種のbitboard
    #[inline]
    pub fn pieces_of(&self, color: Color, pt: PieceType) -> Bitboard {
        self.piece_bb[color.index()][pt.index()]
    }

    /// 指定色の全駒bitboard
    #[inline]
    pub fn color_pieces(&self, color: Color) -> Bitboard {
        self.color_bb[color.index()]
    }

    /// 全駒bitboard
    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.occupied
    }

    /// 手番
    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// アンパッサン升
    #[inline]
    pub fn ep_target(&self) -> Option<Square> {
        self.ep_target
    }

    /// キャスリング権
    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    /// 探索ルートからの手数
    #[inline]
    pub fn ply(&self) -> u16 {
        self.ply
    }

    /// 手数を0に戻す（探索開始時に呼ぶ）
    #[inline]
    pub fn reset_ply(&mut self) {
        self.ply = 0;
    }

    /// Zobristハッシュ
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// 指定色のキングの升
    ///
    /// キングが存在することが前提（§3の不変条件）。
    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        let kings = self.pieces_of(color, PieceType::King);
        debug_assert!(kings.is_not_empty(), "no king for {color:?}");
        kings.lsb_unchecked()
    }

    /// 指定色がポーン・キング以外の駒を持つか（null move pruningの条件）
    #[inline]
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        let minors_majors = self.pieces_of(color, PieceType::Knight)
            | self.pieces_of(color, PieceType::Bishop)
            | self.pieces_of(color, PieceType::Rook)
            | self.pieces_of(color, PieceType::Queen);
        minors_majors.is_not_empty()
    }

    // =========================================================================
    // 利き・王手
    // =========================================================================

    /// 指定色がsqに利かせている駒の集合（占有はoccで指定）
    pub fn attackers_to(&self, sq: Square, by: Color, occ: Bitboard) -> Bitboard {
        let rooks_queens =
            self.pieces_of(by, PieceType::Rook) | self.pieces_of(by, PieceType::Queen);
        let bishops_queens =
            self.pieces_of(by, PieceType::Bishop) | self.pieces_of(by, PieceType::Queen);

        (pawn_attacks(!by, sq) & self.pieces_of(by, PieceType::Pawn))
            | (knight_attacks(sq) & self.pieces_of(by, PieceType::Knight))
            | (king_attacks(sq) & self.pieces_of(by, PieceType::King))
            | (rook_attacks(sq, occ) & rooks_queens)
            | (bishop_attacks(sq, occ) & bishops_queens)
    }

    /// 指定升が指定色に攻撃されているか（占有はoccで指定）
    #[inline]
    pub fn is_square_attacked_with_occ(&self, sq: Square, by: Color, occ: Bitboard) -> bool {
        self.attackers_to(sq, by, occ).is_not_empty()
    }

    /// 指定升が指定色に攻撃されているか
    #[inline]
    pub fn is_square_attacked(&self, sq: Square, by: Color) -> bool {
        self.is_square_attacked_with_occ(sq, by, self.occupied)
    }

    /// 手番のキングに王手している駒の集合
    #[inline]
    pub fn checkers(&self) -> Bitboard {
        let us = self.side_to_move;
        self.attackers_to(self.king_square(us), !us, self.occupied)
    }

    /// 手番のキングが王手されているか
    #[inline]
    pub fn in_check(&self) -> bool {
        self.checkers().is_not_empty()
    }

    // =========================================================================
    // 駒の追加・削除（bitboardと駒リストのみ更新、ハッシュは呼び出し側）
    // =========================================================================

    #[inline]
    fn add_piece(&mut self, sq: Square, piece: Piece) {
        debug_assert!(piece.is_some());
        debug_assert!(self.pieces[sq.index()].is_none());
        let color = piece.color();
        // 不変条件によりpiece_typeは必ず存在する
        let Some(pt) = piece.piece_type() else { return };
        self.pieces[sq.index()] = piece;
        self.piece_bb[color.index()][pt.index()].set(sq);
        self.color_bb[color.index()].set(sq);
        self.occupied.set(sq);
    }

    #[inline]
    fn remove_piece(&mut self, sq: Square) {
        let piece = self.pieces[sq.index()];
        debug_assert!(piece.is_some());
        let color = piece.color();
        let Some(pt) = piece.piece_type() else { return };
        self.pieces[sq.index()] = Piece::NONE;
        self.piece_bb[color.index()][pt.index()].clear(sq);
        self.color_bb[color.index()].clear(sq);
        self.occupied.clear(sq);
    }

    // =========================================================================
    // 指し手の適用・巻き戻し
    // =========================================================================

    /// 指し手を適用する
    ///
    /// 巻き戻し情報を積み、bitboard・駒リスト・キャスリング権・
    /// アンパッサン升・手番・Zobristハッシュを差分更新する。
    /// 合法手であることが前提。
    pub fn do_move(&mut self, mv: Move) {
        let us = self.side_to_move;
        let them = !us;
        let from = mv.from();
        let to = mv.to();
        let piece = self.pieces[from.index()];
        debug_assert!(piece.is_color(us), "do_move: no own piece on {}", from.to_uci());

        let mut undo = UndoInfo {
            mv,
            captured: Piece::NONE,
            castling: self.castling,
            ep_target: self.ep_target,
            key: self.key,
            is_en_passant: false,
            is_castle_kingside: false,
            is_castle_queenside: false,
            promoted_from: Piece::NONE,
        };

        let is_pawn = piece.is(us, PieceType::Pawn);
        let is_en_passant = is_pawn && self.ep_target == Some(to) && from.file() != to.file();

        // 旧アンパッサン升をハッシュから外してクリア
        if let Some(ep) = self.ep_target {
            self.key ^= zobrist_ep(ep);
        }
        self.ep_target = None;

        // 取られる駒を先に外す（通常はto、アンパッサンはto∓8）
        if is_en_passant {
            // SAFETY: epターゲットの1升後ろは必ず盤内
            let cap_sq =
                unsafe { Square::from_u8_unchecked((to.raw() as i8 - us.forward()) as u8) };
            let captured = self.pieces[cap_sq.index()];
            debug_assert!(captured.is(them, PieceType::Pawn));
            undo.captured = captured;
            undo.is_en_passant = true;
            self.remove_piece(cap_sq);
            self.key ^= zobrist_psq(captured, cap_sq);
        } else {
            let captured = self.pieces[to.index()];
            if captured.is_some() {
                debug_assert!(captured.is_color(them));
                undo.captured = captured;
                self.remove_piece(to);
                self.key ^= zobrist_psq(captured, to);
            }
        }

        // 駒を動かす（プロモーションは成り先の駒を置く）
        self.remove_piece(from);
        self.key ^= zobrist_psq(piece, from);
        if let Some(promo) = mv.promotion() {
            debug_assert!(is_pawn && to.rank() == Rank::promotion(us));
            undo.promoted_from = piece;
            let promoted = Piece::new(us, promo);
            self.add_piece(to, promoted);
            self.key ^= zobrist_psq(promoted, to);
        } else {
            self.add_piece(to, piece);
            self.key ^= zobrist_psq(piece, to);
        }

        let diff = to.raw() as i16 - from.raw() as i16;
        if is_pawn && (diff == 16 || diff == -16) {
            // 2升前進: 飛び越えた升をアンパッサン升に設定
            // SAFETY: 2升前進の中間升は必ず盤内
            let ep = unsafe { Square::from_u8_unchecked((from.raw() as i8 + us.forward()) as u8) };
            self.ep_target = Some(ep);
            self.key ^= zobrist_ep(ep);
        } else if piece.is(us, PieceType::King) {
            // キングが動いたら両キャスリング権を失う
            self.castling.remove(CastlingRights::both(us));
            if diff == 2 {
                undo.is_castle_kingside = true;
                self.move_castle_rook(us, true, false);
            } else if diff == -2 {
                undo.is_castle_queenside = true;
                self.move_castle_rook(us, false, false);
            }
        }

        // ルークが隅から動く・隅のルークが取られる場合は該当権を失う
        self.castling.remove(corner_right(from));
        self.castling.remove(corner_right(to));
        self.key ^= zobrist_castling(undo.castling) ^ zobrist_castling(self.castling);

        // 手番を反転
        self.key ^= zobrist_side();
        self.side_to_move = them;
        self.ply += 1;

        self.undo_stack.push(undo);
    }

    /// 直前の指し手を巻き戻す
    pub fn undo_move(&mut self) {
        let Some(undo) = self.undo_stack.pop() else {
            debug_assert!(false, "undo_move on empty stack");
            return;
        };

        self.side_to_move = !self.side_to_move;
        self.ply = self.ply.saturating_sub(1);
        let us = self.side_to_move;

        let mv = undo.mv;
        let from = mv.from();
        let to = mv.to();
        let moved = self.pieces[to.index()];

        // 駒を戻す（プロモーションは元のポーンに戻す）
        self.remove_piece(to);
        if undo.promoted_from.is_some() {
            self.add_piece(from, undo.promoted_from);
        } else {
            self.add_piece(from, moved);
        }

        // 取られた駒を復元
        if undo.captured.is_some() {
            if undo.is_en_passant {
                // SAFETY: epターゲットの1升後ろは必ず盤内
                let cap_sq =
                    unsafe { Square::from_u8_unchecked((to.raw() as i8 - us.forward()) as u8) };
                self.add_piece(cap_sq, undo.captured);
            } else {
                self.add_piece(to, undo.captured);
            }
        }

        // キャスリングのルークを戻す
        if undo.is_castle_kingside {
            self.move_castle_rook(us, true, true);
        } else if undo.is_castle_queenside {
            self.move_castle_rook(us, false, true);
        }

        self.castling = undo.castling;
        self.ep_target = undo.ep_target;
        self.key = undo.key;
    }

    /// null moveを適用する（手番を渡すだけの仮想手）
    ///
    /// アンパッサン升をクリアし、手番とハッシュを更新する。
    /// 盤面は動かさない。
    pub fn do_null_move(&mut self) -> NullUndo {
        let undo = NullUndo {
            ep_target: self.ep_target,
            key: self.key,
        };

        if let Some(ep) = self.ep_target {
            self.key ^= zobrist_ep(ep);
        }
        self.ep_target = None;
        self.key ^= zobrist_side();
        self.side_to_move = !self.side_to_move;
        self.ply += 1;

        undo
    }

    /// null moveを巻き戻す
    pub fn undo_null_move(&mut self, undo: NullUndo) {
        self.side_to_move = !self.side_to_move;
        self.ply = self.ply.saturating_sub(1);
        self.ep_target = undo.ep_target;
        self.key = undo.key;
    }

    /// キャスリングのルーク移動（undo=trueで逆方向）
    fn move_castle_rook(&mut self, us: Color, kingside: bool, undo: bool) {
        let (corner, inner) = match (us, kingside) {
            (Color::White, true) => (Square::H1, Square::F1),
            (Color::White, false) => (Square::A1, Square::D1),
            (Color::Black, true) => (Square::H8, Square::F8),
            (Color::Black, false) => (Square::A8, Square::D8),
        };
        let (rf, rt) = if undo { (inner, corner) } else { (corner, inner) };
        let rook = self.pieces[rf.index()];
        debug_assert!(rook.is(us, PieceType::Rook));
        self.remove_piece(rf);
        self.add_piece(rt, rook);
        if !undo {
            self.key ^= zobrist_psq(rook, rf) ^ zobrist_psq(rook, rt);
        }
    }

    // =========================================================================
    // 合法手生成・指し手入力
    // =========================================================================

    /// 合法手を全て生成する
    pub fn generate_legal_moves(&self) -> MoveList {
        let mut list = MoveList::new();
        movegen::generate_legal(self, &mut list);
        list
    }

    /// 合法な駒取りだけを生成する
    pub fn generate_legal_captures(&self) -> MoveList {
        let mut list = MoveList::new();
        movegen::generate_legal_captures(self, &mut list);
        list
    }

    /// UCI形式の指し手文字列を検証して適用する
    ///
    /// 形式が不正、または合法手でない場合は局面を変更せず拒否する。
    pub fn apply_uci_move(&mut self, s: &str) -> Result<Move, MoveParseError> {
        let mv = Move::from_uci(s).ok_or_else(|| MoveParseError::Malformed(s.to_string()))?;
        if mv.is_none() {
            return Err(MoveParseError::Illegal(s.to_string()));
        }

        let legal = self.generate_legal_moves();
        for &m in legal.iter() {
            if m == mv {
                self.do_move(m);
                return Ok(m);
            }
        }
        Err(MoveParseError::Illegal(s.to_string()))
    }

    // =========================================================================
    // bulk load・検証
    // =========================================================================

    /// 外部パーサーからの一括ロード
    ///
    /// 駒配置・手番・キャスリング権・アンパッサン升を設定し、
    /// ハッシュを再計算して不変条件を検証する。
    pub fn set_from_layout(
        &mut self,
        pieces: [Piece; Square::NUM],
        side: Color,
        castling: CastlingRights,
        ep_target: Option<Square>,
    ) -> Result<(), PositionError> {
        self.pieces = [Piece::NONE; Square::NUM];
        self.piece_bb = [[Bitboard::EMPTY; PieceType::NUM]; Color::NUM];
        self.color_bb = [Bitboard::EMPTY; Color::NUM];
        self.occupied = Bitboard::EMPTY;
        self.undo_stack.clear();
        self.ply = 0;

        for sq in Square::all() {
            let piece = pieces[sq.index()];
            if piece.is_some() {
                self.add_piece(sq, piece);
            }
        }
        self.side_to_move = side;
        self.castling = castling;
        self.ep_target = ep_target;
        self.key = self.compute_key();

        self.validate()
    }

    /// ハッシュを現在の状態から全計算する
    pub fn compute_key(&self) -> u64 {
        let mut key = 0u64;
        for sq in Square::all() {
            let piece = self.pieces[sq.index()];
            if piece.is_some() {
                key ^= zobrist_psq(piece, sq);
            }
        }
        if self.side_to_move == Color::Black {
            key ^= zobrist_side();
        }
        key ^= zobrist_castling(self.castling);
        if let Some(ep) = self.ep_target {
            key ^= zobrist_ep(ep);
        }
        key
    }

    /// §3の不変条件を検証する
    pub fn validate(&self) -> Result<(), PositionError> {
        // 両色ともキングはちょうど1枚
        for color in [Color::White, Color::Black] {
            let kings = self.pieces_of(color, PieceType::King).count();
            if kings != 1 {
                return Err(PositionError::KingCount(color, kings));
            }
        }

        // アンパッサン升はランクが正しく、1升先に相手ポーンがいる
        if let Some(ep) = self.ep_target {
            let expected_rank = match self.side_to_move {
                Color::White => Rank::Rank6,
                Color::Black => Rank::Rank3,
            };
            let pawn_sq = ep.offset(-self.side_to_move.forward());
            let pawn_ok = pawn_sq
                .map(|sq| self.piece_on(sq).is(!self.side_to_move, PieceType::Pawn))
                .unwrap_or(false);
            if ep.rank() != expected_rank || !pawn_ok {
                return Err(PositionError::BadEnPassant(ep));
            }
        }

        // キャスリング権があるならキングとルークが初期位置にいる
        let checks = [
            (CastlingRights::WHITE_KING, Square::E1, Square::H1, Color::White),
            (CastlingRights::WHITE_QUEEN, Square::E1, Square::A1, Color::White),
            (CastlingRights::BLACK_KING, Square::E8, Square::H8, Color::Black),
            (CastlingRights::BLACK_QUEEN, Square::E8, Square::A8, Color::Black),
        ];
        for (right, king_sq, rook_sq, color) in checks {
            if self.castling.has(right) {
                let ok = self.piece_on(king_sq).is(color, PieceType::King)
                    && self.piece_on(rook_sq).is(color, PieceType::Rook);
                if !ok {
                    return Err(PositionError::BadCastling(self.castling));
                }
            }
        }

        Ok(())
    }

    /// 駒リストとbitboardの整合性を検査する（テスト用）
    pub fn assert_consistent(&self) {
        let mut occupied = Bitboard::EMPTY;
        for color in [Color::White, Color::Black] {
            let mut color_union = Bitboard::EMPTY;
            for pt in PieceType::ALL {
                let bb = self.pieces_of(color, pt);
                for sq in bb.iter() {
                    assert_eq!(self.pieces[sq.index()], Piece::new(color, pt));
                }
                color_union |= bb;
            }
            assert_eq!(color_union, self.color_pieces(color));
            occupied |= color_union;
        }
        assert_eq!(occupied, self.occupied);
        assert!((self.color_pieces(Color::White) & self.color_pieces(Color::Black)).is_empty());
        for sq in Square::all() {
            assert_eq!(self.pieces[sq.index()].is_some(), occupied.contains(sq));
        }
        assert_eq!(self.key, self.compute_key());
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::new()
    }
}

impl Clone for Position {
    fn clone(&self) -> Self {
        Position {
            pieces: self.pieces,
            piece_bb: self.piece_bb,
            color_bb: self.color_bb,
            occupied: self.occupied,
            side_to_move: self.side_to_move,
            ep_target: self.ep_target,
            castling: self.castling,
            ply: self.ply,
            key: self.key,
            undo_stack: self.undo_stack.clone(),
        }
    }
}

/// 隅の升に対応するキャスリング権
#[inline]
const fn corner_right(sq: Square) -> CastlingRights {
    match sq.raw() {
        0 => CastlingRights::WHITE_QUEEN,  // a1
        7 => CastlingRights::WHITE_KING,   // h1
        56 => CastlingRights::BLACK_QUEEN, // a8
        63 => CastlingRights::BLACK_KING,  // h8
        _ => CastlingRights::NONE,
    }
}
