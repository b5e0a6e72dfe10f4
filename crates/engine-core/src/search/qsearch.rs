//! 静止探索（quiescence search）
//!
//! 水平線効果を抑えるため、深さ0以降は駒取りだけを読み延ばす。
//! 静的評価をstand-patとして下限に使う。

use crate::eval::evaluate;
use crate::types::Value;

use super::alpha_beta::Searcher;
use super::movepicker::order_moves;

impl Searcher<'_> {
    /// 駒取りのみの再帰探索
    pub(super) fn qsearch(&mut self, mut alpha: Value, beta: Value) -> Value {
        if !self.bump_node() {
            return Value::ZERO;
        }

        // stand-pat: 取り合いを打ち切る自由があるため下限になる
        let stand_pat = evaluate(self.pos);
        if stand_pat >= beta {
            return beta;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        let mut captures = self.pos.generate_legal_captures();
        let ply = self.pos.ply() as usize;
        order_moves(self.pos, &mut captures, self.killers, self.history, ply);

        for idx in 0..captures.len() {
            let mv = captures.at(idx);
            self.pos.do_move(mv);
            let score = -self.qsearch(-beta, -alpha);
            self.pos.undo_move();
            if self.aborted {
                return Value::ZERO;
            }

            if score >= beta {
                return score;
            }
            if score > alpha {
                alpha = score;
            }
        }

        alpha
    }
}
