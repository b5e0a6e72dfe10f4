//! 遠方駒の利き計算（magic bitboard）
//!
//! ルーク・ビショップの利きを `table[((occ & mask) * magic) >> shift]` の
//! 完全ハッシュで引く。magic係数は固定シードの乱数探索で初回参照時に
//! 求め、全ブロッカーパターンをレイ走査と照合して検証する。照合に失敗
//! した場合（衝突）は構築定数のバグなので即座にpanicする。
//!
//! クイーンの利きはルーク∪ビショップ。

use std::sync::LazyLock;

use super::Bitboard;
use crate::types::Square;

/// 1升分のmagicエントリ
struct MagicEntry {
    /// 関連ブロッカーマスク（盤端と自升を除く内部レイ）
    mask: u64,
    /// magic係数
    magic: u64,
    /// 右シフト量（64 - マスクのビット数）
    shift: u32,
    /// 共有テーブル内のオフセット
    offset: usize,
}

/// 駒種1つ分のmagicテーブル
struct SliderTable {
    entries: [MagicEntry; 64],
    attacks: Vec<u64>,
}

impl SliderTable {
    #[inline]
    fn lookup(&self, sq: Square, occ: Bitboard) -> Bitboard {
        let e = &self.entries[sq.index()];
        let idx = ((occ.bits() & e.mask).wrapping_mul(e.magic) >> e.shift) as usize;
        Bitboard::new(self.attacks[e.offset + idx])
    }
}

const ROOK_DIRS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

static ROOK_TABLE: LazyLock<SliderTable> = LazyLock::new(|| build_table(&ROOK_DIRS, 0x9E37_79B9_7F4A_7C15));
static BISHOP_TABLE: LazyLock<SliderTable> = LazyLock::new(|| build_table(&BISHOP_DIRS, 0xD1B5_4A32_D192_ED03));

/// ルークの利き
#[inline]
pub fn rook_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    ROOK_TABLE.lookup(sq, occ)
}

/// ビショップの利き
#[inline]
pub fn bishop_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    BISHOP_TABLE.lookup(sq, occ)
}

/// クイーンの利き
#[inline]
pub fn queen_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    rook_attacks(sq, occ) | bishop_attacks(sq, occ)
}

/// テーブルを即時構築する
///
/// 遅延初期化を探索中に踏まないよう、起動時に呼んでおく。
pub fn init_sliders() {
    LazyLock::force(&ROOK_TABLE);
    LazyLock::force(&BISHOP_TABLE);
}

/// 関連ブロッカーマスク（自升と盤端のレイ末端を除く）
fn relevance_mask(sq: usize, dirs: &[(i32, i32); 4]) -> u64 {
    let rank = (sq / 8) as i32;
    let file = (sq % 8) as i32;
    let mut mask = 0u64;
    for &(dr, df) in dirs {
        let mut r = rank + dr;
        let mut f = file + df;
        // 次の一歩が盤内である間だけ記録する（レイ末端は関連しない）
        while (0..8).contains(&(r + dr)) && (0..8).contains(&(f + df)) {
            mask |= 1u64 << (r * 8 + f);
            r += dr;
            f += df;
        }
    }
    mask
}

/// ブロッカー配置に対する利きをレイ走査で計算
fn sliding_attacks(sq: usize, occ: u64, dirs: &[(i32, i32); 4]) -> u64 {
    let rank = (sq / 8) as i32;
    let file = (sq % 8) as i32;
    let mut attacks = 0u64;
    for &(dr, df) in dirs {
        let mut r = rank + dr;
        let mut f = file + df;
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let bit = 1u64 << (r * 8 + f);
            attacks |= bit;
            if occ & bit != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    attacks
}

/// xorshift64疑似乱数（magic探索用、固定シードで決定的）
fn xorshift64(x: &mut u64) -> u64 {
    *x ^= *x << 13;
    *x ^= *x >> 7;
    *x ^= *x << 17;
    *x
}

/// 立っているビットの少ない乱数（magic候補）
fn sparse_random(state: &mut u64) -> u64 {
    xorshift64(state) & xorshift64(state) & xorshift64(state)
}

/// マスクの部分集合をインデックスから復元
fn index_to_occupancy(index: usize, mut mask: u64) -> u64 {
    let mut occ = 0u64;
    let mut bit = 0;
    while mask != 0 {
        let lsb = mask & mask.wrapping_neg();
        if (index >> bit) & 1 != 0 {
            occ |= lsb;
        }
        mask &= mask - 1;
        bit += 1;
    }
    occ
}

/// magic探索の試行上限（1升あたり）
const MAX_MAGIC_ATTEMPTS: u32 = 100_000_000;

/// 全64升のmagicテーブルを構築・検証する
fn build_table(dirs: &[(i32, i32); 4], seed: u64) -> SliderTable {
    let mut rng = seed;
    let mut attacks: Vec<u64> = Vec::new();
    let mut entries: Vec<MagicEntry> = Vec::with_capacity(64);

    for sq in 0..64 {
        let mask = relevance_mask(sq, dirs);
        let bits = mask.count_ones();
        let size = 1usize << bits;
        let shift = 64 - bits;

        // 全ブロッカーパターンと対応する利きを列挙
        let mut occupancies = Vec::with_capacity(size);
        let mut reference = Vec::with_capacity(size);
        for index in 0..size {
            let occ = index_to_occupancy(index, mask);
            occupancies.push(occ);
            reference.push(sliding_attacks(sq, occ, dirs));
        }

        // 衝突のないmagic係数を探索
        let offset = attacks.len();
        attacks.resize(offset + size, 0);
        let mut found = false;
        let mut attempts = 0;
        'search: while attempts < MAX_MAGIC_ATTEMPTS {
            attempts += 1;
            let magic = sparse_random(&mut rng);
            // 上位ビットへの写像が薄すぎる候補は弾く
            if (mask.wrapping_mul(magic) >> 56).count_ones() < 6 {
                continue;
            }

            let table = &mut attacks[offset..offset + size];
            table.fill(u64::MAX);
            for i in 0..size {
                let idx = (occupancies[i].wrapping_mul(magic) >> shift) as usize;
                if table[idx] == u64::MAX {
                    table[idx] = reference[i];
                } else if table[idx] != reference[i] {
                    // 異なる利きが同じインデックスに写った: 候補棄却
                    continue 'search;
                }
            }

            entries.push(MagicEntry { mask, magic, shift, offset });
            found = true;
            break;
        }

        if !found {
            panic!("magic search failed for square {sq} after {MAX_MAGIC_ATTEMPTS} attempts");
        }
    }

    let table = SliderTable {
        entries: entries.try_into().unwrap_or_else(|_| unreachable!()),
        attacks,
    };
    verify_table(&table, dirs);
    table
}

/// 構築済みテーブルをレイ走査と全件照合する
///
/// 不一致は構築定数のバグなので即座にpanicする。
fn verify_table(table: &SliderTable, dirs: &[(i32, i32); 4]) {
    for sq in 0..64 {
        let e = &table.entries[sq];
        let size = 1usize << (64 - e.shift);
        for index in 0..size {
            let occ = index_to_occupancy(index, e.mask);
            let looked_up = table.lookup(
                // SAFETY: sq < 64
                unsafe { Square::from_u8_unchecked(sq as u8) },
                Bitboard::new(occ),
            );
            let expected = sliding_attacks(sq as usize, occ, dirs);
            if looked_up.bits() != expected {
                panic!("magic table collision detected on square {sq}, occupancy {occ:#x}");
            }
        }
    }
}
