//! FEN形式の解析・出力

use crate::types::{CastlingRights, Color, File, Piece, Rank, Square};

use super::pos::Position;

/// 初期局面のFEN
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// FENパースエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// 盤面の形式が不正
    Board(String),
    /// 手番の形式が不正
    SideToMove(String),
    /// キャスリング権の形式が不正
    Castling(String),
    /// アンパッサン升の形式が不正
    EnPassant(String),
    /// フィールド数が不足
    MissingFields(String),
    /// 盤面としては読めたが不変条件を満たさない
    InvalidPosition(String),
}

impl std::fmt::Display for FenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FenError::Board(s) => write!(f, "invalid board field: {s}"),
            FenError::SideToMove(s) => write!(f, "invalid side to move: {s}"),
            FenError::Castling(s) => write!(f, "invalid castling field: {s}"),
            FenError::EnPassant(s) => write!(f, "invalid en passant field: {s}"),
            FenError::MissingFields(s) => write!(f, "not enough FEN fields: {s}"),
            FenError::InvalidPosition(s) => write!(f, "invalid position: {s}"),
        }
    }
}

impl std::error::Error for FenError {}

impl Position {
    /// 初期局面を設定
    pub fn set_startpos(&mut self) {
        // 初期局面FENは定数なので必ず成功する
        if let Err(e) = self.set_fen(STARTPOS_FEN) {
            unreachable!("startpos FEN must parse: {e}");
        }
    }

    /// FEN文字列から局面を設定
    ///
    /// 読み込み後に§3の不変条件を検証し、失敗した場合は
    /// `FenError::InvalidPosition`を返す。ハーフムーブ・フルムーブ数は
    /// 受け取るが保持しない。
    pub fn set_fen(&mut self, fen: &str) -> Result<(), FenError> {
        let mut fields = fen.split_whitespace();
        let board = fields.next().ok_or_else(|| FenError::MissingFields(fen.to_string()))?;
        let side = fields.next().ok_or_else(|| FenError::MissingFields(fen.to_string()))?;
        let castling = fields.next().ok_or_else(|| FenError::MissingFields(fen.to_string()))?;
        let ep = fields.next().ok_or_else(|| FenError::MissingFields(fen.to_string()))?;

        // 1. 盤面
        let mut pieces = [Piece::NONE; Square::NUM];
        let ranks: Vec<&str> = board.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::Board(board.to_string()));
        }
        for (i, row) in ranks.iter().enumerate() {
            // FENは8段目から並ぶ
            let rank = 7 - i as u8;
            let mut file = 0u8;
            for c in row.chars() {
                if let Some(n) = c.to_digit(10) {
                    if n == 0 || n > 8 {
                        return Err(FenError::Board(board.to_string()));
                    }
                    file += n as u8;
                } else {
                    let piece =
                        Piece::from_fen_char(c).ok_or_else(|| FenError::Board(board.to_string()))?;
                    if file >= 8 {
                        return Err(FenError::Board(board.to_string()));
                    }
                    let sq = Square::new(
                        File::from_u8(file).ok_or_else(|| FenError::Board(board.to_string()))?,
                        Rank::from_u8(rank).ok_or_else(|| FenError::Board(board.to_string()))?,
                    );
                    pieces[sq.index()] = piece;
                    file += 1;
                }
            }
            if file != 8 {
                return Err(FenError::Board(board.to_string()));
            }
        }

        // 2. 手番
        let side_to_move = match side {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(FenError::SideToMove(side.to_string())),
        };

        // 3. キャスリング権
        let mut rights = CastlingRights::NONE;
        if castling != "-" {
            for c in castling.chars() {
                rights |= match c {
                    'K' => CastlingRights::WHITE_KING,
                    'Q' => CastlingRights::WHITE_QUEEN,
                    'k' => CastlingRights::BLACK_KING,
                    'q' => CastlingRights::BLACK_QUEEN,
                    _ => return Err(FenError::Castling(castling.to_string())),
                };
            }
        }

        // 4. アンパッサン升
        let ep_target = if ep == "-" {
            None
        } else {
            Some(Square::from_uci(ep).ok_or_else(|| FenError::EnPassant(ep.to_string()))?)
        };

        self.set_from_layout(pieces, side_to_move, rights, ep_target)
            .map_err(|e| FenError::InvalidPosition(e.to_string()))
    }

    /// 現在の局面をFEN文字列に変換
    ///
    /// ハーフムーブ数は保持していないため"0 1"で出力する。
    pub fn fen(&self) -> String {
        let mut s = String::new();

        // 1. 盤面
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                let sq = Square::new(
                    // SAFETY: file, rank < 8
                    unsafe { std::mem::transmute::<u8, File>(file) },
                    unsafe { std::mem::transmute::<u8, Rank>(rank) },
                );
                match self.piece_on(sq).to_fen_char() {
                    Some(c) => {
                        if empty > 0 {
                            s.push_str(&empty.to_string());
                            empty = 0;
                        }
                        s.push(c);
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                s.push_str(&empty.to_string());
            }
            if rank > 0 {
                s.push('/');
            }
        }

        // 2. 手番
        s.push(' ');
        s.push(match self.side_to_move() {
            Color::White => 'w',
            Color::Black => 'b',
        });

        // 3. キャスリング権
        s.push(' ');
        if self.castling().is_empty() {
            s.push('-');
        } else {
            for (right, c) in [
                (CastlingRights::WHITE_KING, 'K'),
                (CastlingRights::WHITE_QUEEN, 'Q'),
                (CastlingRights::BLACK_KING, 'k'),
                (CastlingRights::BLACK_QUEEN, 'q'),
            ] {
                if self.castling().has(right) {
                    s.push(c);
                }
            }
        }

        // 4. アンパッサン升
        s.push(' ');
        match self.ep_target() {
            Some(ep) => s.push_str(&ep.to_uci()),
            None => s.push('-'),
        }

        s.push_str(" 0 1");
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PieceType;

    #[test]
    fn test_fen_startpos_roundtrip() {
        let mut pos = Position::new();
        pos.set_fen(STARTPOS_FEN).unwrap();
        assert_eq!(pos.fen(), STARTPOS_FEN);
    }

    #[test]
    fn test_fen_kiwipete() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let mut pos = Position::new();
        pos.set_fen(fen).unwrap();
        assert_eq!(pos.castling(), CastlingRights::ALL);
        assert_eq!(pos.pieces_of(Color::White, PieceType::Knight).count(), 2);
        assert_eq!(pos.fen(), fen);
        pos.assert_consistent();
    }

    #[test]
    fn test_fen_en_passant_field() {
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq e6 0 2";
        let mut pos = Position::new();
        pos.set_fen(fen).unwrap();
        assert_eq!(pos.ep_target(), Some(Square::from_uci("e6").unwrap()));
    }

    #[test]
    fn test_fen_without_move_counters() {
        // ハーフムーブ・フルムーブ数の省略を許す（§8のFENには無いものがある）
        let fen = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - -";
        let mut pos = Position::new();
        pos.set_fen(fen).unwrap();
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.castling(), CastlingRights::NONE);
    }

    #[test]
    fn test_fen_errors() {
        let mut pos = Position::new();
        assert!(matches!(pos.set_fen(""), Err(FenError::MissingFields(_))));
        assert!(matches!(pos.set_fen("x w - -"), Err(FenError::Board(_))));
        assert!(matches!(
            pos.set_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq -"),
            Err(FenError::SideToMove(_))
        ));
        assert!(matches!(
            pos.set_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w XQkq -"),
            Err(FenError::Castling(_))
        ));
        assert!(matches!(
            pos.set_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e9"),
            Err(FenError::EnPassant(_))
        ));
        // キングのない盤面は不変条件違反
        assert!(matches!(
            pos.set_fen("8/8/8/8/8/8/8/8 w - -"),
            Err(FenError::InvalidPosition(_))
        ));
    }
}
