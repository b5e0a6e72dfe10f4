//! 反復深化negamax探索
//!
//! αβ法に以下の拡張を加える:
//! - 置換表によるカットオフとTT手の先行探索
//! - null move pruning（ゼロ窓ノードのみ、R=2相当）
//! - late move reduction（後方の静かな手を浅く読む）
//! - principal variation search（ゼロ窓＋再探索）
//! - キラー手・historyヒューリスティック
//! - 2048ノードごとの時間・停止チェック

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::eval::evaluate;
use crate::position::Position;
use crate::tt::TranspositionTable;
use crate::types::{Bound, Move, Value};

use super::history::{HistoryTable, KillerTable};
use super::movepicker::{is_capture, order_moves};
use super::types::Pv;

/// 時間・停止フラグを確認するノード間隔
const CHECK_INTERVAL_MASK: u64 = 2047;

/// 1回の探索を実行するワーカー
///
/// 局面と置換表を排他的に借りる。探索中のboardの変更は
/// 必ずdo/undoが対になっており、中断時も不均衡を残さない。
pub struct Searcher<'a> {
    pub(super) pos: &'a mut Position,
    pub(super) tt: &'a mut TranspositionTable,
    pub(super) killers: &'a mut KillerTable,
    pub(super) history: &'a mut HistoryTable,
    /// 探索ノード数
    pub nodes: u64,
    /// 打ち切り時刻
    deadline: Option<Instant>,
    /// ノード数上限
    node_limit: Option<u64>,
    /// 外部からの停止フラグ
    stop_flag: Option<Arc<AtomicBool>>,
    /// 中断したか（中断後の戻り値は使わない）
    pub aborted: bool,
}

impl<'a> Searcher<'a> {
    /// 新しいSearcherを作成
    pub fn new(
        pos: &'a mut Position,
        tt: &'a mut TranspositionTable,
        killers: &'a mut KillerTable,
        history: &'a mut HistoryTable,
        deadline: Option<Instant>,
        node_limit: Option<u64>,
        stop_flag: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            pos,
            tt,
            killers,
            history,
            nodes: 0,
            deadline,
            node_limit,
            stop_flag,
            aborted: false,
        }
    }

    /// 中断条件を確認する
    #[inline]
    fn should_stop(&self) -> bool {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        if let Some(limit) = self.node_limit {
            if self.nodes >= limit {
                return true;
            }
        }
        if let Some(flag) = &self.stop_flag {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        false
    }

    /// ノードを数え、2048ノードごとに中断条件を確認する
    #[inline]
    pub(super) fn bump_node(&mut self) -> bool {
        self.nodes += 1;
        if self.nodes & CHECK_INTERVAL_MASK == 0 && self.should_stop() {
            self.aborted = true;
            return false;
        }
        true
    }

    /// ルートノードの探索
    ///
    /// 戻り値は(スコア, 最善手)。合法手がなければ詰み/ステイルメイトの
    /// スコアとMove::NONEを返す。中断時はabortedが立ち、結果は捨てること。
    pub fn search_root(&mut self, depth: i32) -> (Value, Move) {
        debug_assert!(depth >= 1);
        let ply = self.pos.ply() as i32;

        let mut moves = self.pos.generate_legal_moves();
        if moves.is_empty() {
            let score = if self.pos.in_check() {
                Value::mated_in(ply)
            } else {
                Value::DRAW
            };
            return (score, Move::NONE);
        }

        let key = self.pos.key();
        // ルートでは前回反復の最善手（TT手）を最初に試す
        let tt_move = self.tt.probe(key, i32::MAX, -Value::INFINITE, Value::INFINITE, ply).mv;
        order_moves(self.pos, &mut moves, self.killers, self.history, ply as usize);

        let mut alpha = -Value::INFINITE;
        let beta = Value::INFINITE;
        let mut best_score = -Value::INFINITE;
        let mut best_move = Move::NONE;
        let mut searched = 0u32;

        // TT手をリスト先頭に出す
        let slice = moves.as_mut_slice();
        if tt_move.is_some() {
            if let Some(at) = slice.iter().position(|&m| m == tt_move) {
                slice[..=at].rotate_right(1);
            }
        }

        for idx in 0..moves.len() {
            let mv = moves.at(idx);
            self.pos.do_move(mv);
            let score = if searched == 0 {
                -self.negamax(depth - 1, -beta, -alpha)
            } else {
                let s = -self.negamax(depth - 1, -alpha - 1, -alpha);
                if s > alpha && s < beta {
                    -self.negamax(depth - 1, -beta, -alpha)
                } else {
                    s
                }
            };
            self.pos.undo_move();
            if self.aborted {
                return (best_score, best_move);
            }
            searched += 1;

            if score > best_score {
                best_score = score;
                best_move = mv;
            }
            if best_score > alpha {
                alpha = best_score;
            }
        }

        self.tt.store(key, depth, best_score, Bound::Exact, best_move, ply);
        (best_score, best_move)
    }

    /// negamax本体
    pub(super) fn negamax(&mut self, depth: i32, mut alpha: Value, beta: Value) -> Value {
        if !self.bump_node() {
            return Value::ZERO;
        }

        let alpha_orig = alpha;
        let key = self.pos.key();
        let ply = self.pos.ply() as i32;

        // 置換表のカットオフ確認
        let probe = self.tt.probe(key, depth, alpha, beta, ply);
        if let Some(score) = probe.cutoff {
            return score;
        }
        let tt_move = probe.mv;

        if depth <= 0 {
            return self.qsearch(alpha, beta);
        }

        // null move pruning
        // ゼロ窓ノードで、駒が残っていて王手されておらず、
        // 静的評価がβ以上なら手番を渡しても勝っているか確かめる
        let mut depth = depth;
        let is_null_window = beta.raw() - alpha.raw() == 1;
        if is_null_window
            && depth >= 3
            && self.pos.has_non_pawn_material(self.pos.side_to_move())
            && !self.pos.in_check()
            && evaluate(self.pos) >= beta
        {
            let undo = self.pos.do_null_move();
            let null_score = -self.negamax(depth - 3, -beta, -beta + 1);
            self.pos.undo_null_move(undo);
            if self.aborted {
                return Value::ZERO;
            }
            if null_score >= beta {
                depth -= 4;
                if depth <= 0 {
                    return self.qsearch(alpha, beta);
                }
            }
        }

        let mut moves = self.pos.generate_legal_moves();
        if moves.is_empty() {
            // 合法手なし: 王手なら詰まされ、でなければステイルメイト
            return if self.pos.in_check() {
                Value::mated_in(ply)
            } else {
                Value::DRAW
            };
        }

        let mut best_score = -Value::INFINITE;
        let mut best_move = Move::NONE;
        let mut searched_tt_move = false;

        // 置換表の手を並べ替えの外で最初に試す
        if tt_move.is_some() && moves.contains(tt_move) {
            self.pos.do_move(tt_move);
            let score = -self.negamax(depth - 1, -beta, -alpha);
            self.pos.undo_move();
            if self.aborted {
                return Value::ZERO;
            }
            searched_tt_move = true;
            best_score = score;
            best_move = tt_move;
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                self.tt.store(key, depth, best_score, Bound::Lower, best_move, ply);
                return best_score;
            }
        }

        order_moves(self.pos, &mut moves, self.killers, self.history, ply as usize);

        let mut first = true;
        let mut move_index = 0usize;
        for idx in 0..moves.len() {
            let mv = moves.at(idx);
            if searched_tt_move && mv == tt_move {
                continue;
            }

            let capture = is_capture(self.pos, mv);
            self.pos.do_move(mv);
            let gives_check = self.pos.in_check();

            // late move reduction: 後方の静かな手は1段浅く
            let mut search_depth = depth - 1;
            if depth >= 3 && !capture && !gives_check && move_index > 3 {
                search_depth = depth - 2;
            }

            // principal variation search
            let score = if first {
                -self.negamax(search_depth, -beta, -alpha)
            } else {
                let s = -self.negamax(search_depth, -alpha - 1, -alpha);
                if s > alpha && s < beta {
                    -self.negamax(search_depth, -beta, -alpha)
                } else {
                    s
                }
            };

            self.pos.undo_move();
            if self.aborted {
                return Value::ZERO;
            }
            first = false;
            move_index += 1;

            if score > best_score {
                best_score = score;
                best_move = mv;
            }
            if best_score > alpha {
                alpha = best_score;
            }
            if alpha >= beta {
                // 静かな手のβカットはキラーとhistoryに記録
                if !capture {
                    self.killers.insert(ply as usize, mv);
                    self.history.bump(mv, depth);
                }
                break;
            }
        }

        let bound = if best_score <= alpha_orig {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.tt.store(key, depth, best_score, bound, best_move, ply);

        best_score
    }

    /// 置換表からPVを復元する（ログ・結果表示用）
    pub fn extract_pv(&mut self, max_len: usize) -> Pv {
        let mut pv = Pv::new();
        while pv.len() < max_len {
            let ply = self.pos.ply() as i32;
            let mv =
                self.tt.probe(self.pos.key(), i32::MAX, -Value::INFINITE, Value::INFINITE, ply).mv;
            if mv.is_none() || !self.pos.generate_legal_moves().contains(mv) {
                break;
            }
            self.pos.do_move(mv);
            pv.push(mv);
        }
        for _ in 0..pv.len() {
            self.pos.undo_move();
        }
        pv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::history::{HistoryTable, KillerTable};

    fn search_to_depth(fen: &str, depth: i32) -> (Value, Move, u64) {
        let mut pos = Position::new();
        pos.set_fen(fen).unwrap();
        pos.reset_ply();
        let mut tt = TranspositionTable::new(16);
        let mut killers = KillerTable::new();
        let mut history = HistoryTable::new();
        let mut searcher =
            Searcher::new(&mut pos, &mut tt, &mut killers, &mut history, None, None, None);
        let (score, mv) = searcher.search_root(depth);
        (score, mv, searcher.nodes)
    }

    #[test]
    fn test_mate_in_one_found() {
        let (score, mv, _) = search_to_depth("6k1/5ppp/8/8/8/8/5PPP/R6K w - - 0 1", 3);
        assert_eq!(mv.to_uci(), "a1a8");
        assert!(score.raw() >= Value::MATE.raw() - 2, "score was {}", score.raw());
    }

    #[test]
    fn test_stalemate_returns_zero() {
        // 手番側に合法手がなく王手でもない
        let (score, mv, _) = search_to_depth("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 3);
        assert_eq!(score, Value::DRAW);
        assert!(mv.is_none());
    }

    #[test]
    fn test_checkmate_position_score() {
        // 既に詰まされている
        let (score, mv, _) = search_to_depth("R5k1/5ppp/8/8/8/8/5PPP/7K b - - 0 1", 3);
        assert_eq!(score, Value::mated_in(0));
        assert!(mv.is_none());
    }

    #[test]
    fn test_obvious_capture_preferred() {
        // ただで取れるクイーン: 取ればクイーン劣勢から優勢に転じる
        let (score, mv, _) = search_to_depth("4k3/8/8/3q4/4P3/8/8/4K3 w - - 0 1", 4);
        assert_eq!(mv.to_uci(), "e4d5");
        assert!(score.raw() > 0, "score was {}", score.raw());
    }

    #[test]
    fn test_search_leaves_position_intact() {
        let mut pos = Position::new();
        pos.set_startpos();
        pos.reset_ply();
        let key = pos.key();
        let mut tt = TranspositionTable::new(16);
        let mut killers = KillerTable::new();
        let mut history = HistoryTable::new();
        let mut searcher =
            Searcher::new(&mut pos, &mut tt, &mut killers, &mut history, None, None, None);
        searcher.search_root(4);
        drop(searcher);
        assert_eq!(pos.key(), key);
        pos.assert_consistent();
    }

    #[test]
    fn test_node_limit_aborts() {
        let mut pos = Position::new();
        pos.set_startpos();
        pos.reset_ply();
        let mut tt = TranspositionTable::new(16);
        let mut killers = KillerTable::new();
        let mut history = HistoryTable::new();
        let mut searcher =
            Searcher::new(&mut pos, &mut tt, &mut killers, &mut history, None, Some(4096), None);
        searcher.search_root(64);
        assert!(searcher.aborted);
        // 中断してもdo/undoの不均衡は残らない
        drop(searcher);
        pos.assert_consistent();
    }

    #[test]
    fn test_stop_flag_aborts() {
        let mut pos = Position::new();
        pos.set_startpos();
        pos.reset_ply();
        let mut tt = TranspositionTable::new(16);
        let mut killers = KillerTable::new();
        let mut history = HistoryTable::new();
        let flag = Arc::new(AtomicBool::new(true));
        let mut searcher = Searcher::new(
            &mut pos,
            &mut tt,
            &mut killers,
            &mut history,
            None,
            None,
            Some(flag),
        );
        searcher.search_root(64);
        assert!(searcher.aborted);
    }

    #[test]
    fn test_deeper_search_same_result_on_forced_line() {
        // 詰みのある局面では深さを増やしても同じ手
        for depth in [2, 3, 4] {
            let (_, mv, _) = search_to_depth("6k1/5ppp/8/8/8/8/5PPP/R6K w - - 0 1", depth);
            assert_eq!(mv.to_uci(), "a1a8", "depth {depth}");
        }
    }
}
