//! UCIプロトコル実装
//!
//! チェスGUIとの通信を行うコマンドループ。探索は専用スレッドで走らせ、
//! `stop`は共有フラグで通知する。同時に走る探索は常に1つ。

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use engine_core::search::SearchLimits;
use engine_core::Engine;

/// エンジン名
const ENGINE_NAME: &str = "rchess";
/// エンジン作者
const ENGINE_AUTHOR: &str = "rchess developers";

/// UCIエンジンの状態
struct UciEngine {
    /// 探索エンジン（go中はスレッドに移動している）
    engine: Option<Engine>,
    /// 探索スレッドのハンドル
    search_thread: Option<thread::JoinHandle<Engine>>,
    /// 探索停止用のフラグ（探索スレッドと共有）
    stop_flag: Option<Arc<AtomicBool>>,
    /// 置換表サイズ（setoption Hashで変更）
    hash_mb: usize,
}

impl UciEngine {
    /// 新しいUCIエンジンを作成
    fn new(hash_mb: usize) -> Self {
        Self {
            engine: Some(Engine::new(hash_mb)),
            search_thread: None,
            stop_flag: None,
            hash_mb,
        }
    }

    /// UCIコマンドを処理。falseを返したら終了。
    fn process_command(&mut self, line: &str) -> bool {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return true;
        };

        match command {
            "uci" => self.cmd_uci(),
            "isready" => println!("readyok"),
            "setoption" => self.cmd_setoption(&tokens),
            "ucinewgame" => self.cmd_ucinewgame(),
            "position" => self.cmd_position(&tokens[1..]),
            "go" => self.cmd_go(&tokens[1..]),
            "stop" => self.finish_search(),
            "quit" => {
                self.finish_search();
                return false;
            }
            // デバッグ用コマンド
            "d" | "display" => self.cmd_display(),
            _ => {
                // 未知のコマンドは無視
                log::debug!("ignoring unknown command: {command}");
            }
        }

        true
    }

    /// usiコマンド相当: エンジン情報とオプションを出力
    fn cmd_uci(&self) {
        println!("id name {} {}", ENGINE_NAME, env!("CARGO_PKG_VERSION"));
        println!("id author {ENGINE_AUTHOR}");
        println!("option name Hash type spin default 256 min 1 max 1024");
        println!("option name Clear Hash type button");
        println!("uciok");
    }

    fn cmd_setoption(&mut self, tokens: &[&str]) {
        // setoption name <name...> [value <value...>]
        let Some(name_at) = tokens.iter().position(|&t| t == "name") else {
            return;
        };
        let value_at = tokens.iter().position(|&t| t == "value");
        let name_end = value_at.unwrap_or(tokens.len());
        let name = tokens[name_at + 1..name_end].join(" ");
        let value = value_at.map(|at| tokens[at + 1..].join(" "));

        self.finish_search();
        let Some(engine) = self.engine.as_mut() else { return };

        match name.as_str() {
            "Hash" => {
                if let Some(mb) = value.and_then(|v| v.parse::<usize>().ok()) {
                    let mb = mb.clamp(1, 1024);
                    engine.set_tt_size_mb(mb);
                    self.hash_mb = mb;
                }
            }
            "Clear Hash" => engine.clear_tt(),
            _ => log::debug!("ignoring unknown option: {name}"),
        }
    }

    fn cmd_ucinewgame(&mut self) {
        self.finish_search();
        let Some(engine) = self.engine.as_mut() else { return };
        engine.clear_tt();
        engine.position_mut().set_startpos();
    }

    /// position [startpos | fen <fen>] [moves <m1> <m2> ...]
    fn cmd_position(&mut self, args: &[&str]) {
        self.finish_search();
        let Some(engine) = self.engine.as_mut() else { return };

        let moves_at = args.iter().position(|&t| t == "moves");
        let setup = &args[..moves_at.unwrap_or(args.len())];

        match setup.first() {
            Some(&"startpos") => engine.position_mut().set_startpos(),
            Some(&"fen") => {
                let fen = setup[1..].join(" ");
                if let Err(e) = engine.position_mut().set_fen(&fen) {
                    log::warn!("rejecting position: {e}");
                    return;
                }
            }
            _ => return,
        }

        if let Some(at) = moves_at {
            for mv in &args[at + 1..] {
                if let Err(e) = engine.position_mut().apply_uci_move(mv) {
                    // 不正な手が来たらそこで打ち切る（局面は変更されない）
                    log::warn!("rejecting move: {e}");
                    break;
                }
            }
        }
    }

    /// goコマンド: 時間予算を計算して探索スレッドを起動
    fn cmd_go(&mut self, args: &[&str]) {
        self.finish_search();
        let Some(mut engine) = self.engine.take() else { return };

        let params = GoParams::parse(args);
        let white_to_move = engine.position().side_to_move() == engine_core::Color::White;

        let mut builder = SearchLimits::builder();
        if let Some(budget) = params.time_budget(white_to_move) {
            builder = builder.movetime(budget);
        }
        if let Some(depth) = params.depth {
            builder = builder.depth(depth);
        }
        if let Some(nodes) = params.nodes {
            builder = builder.nodes(nodes);
        }
        let limits = builder.build();

        // フラグのリセットはスレッド起動前に行う。探索側でリセットすると
        // 直後に届いたstopを消してしまう競合がある。
        engine.reset_stop();
        self.stop_flag = Some(engine.stop_flag());
        let handle = thread::spawn(move || {
            let result = engine.search(limits);
            // 反復1回目すら完了せず中断された場合も必ず手を返す
            let best = result
                .best_move
                .or_else(|| engine.position().generate_legal_moves().iter().next().copied());
            match best {
                Some(mv) => println!("bestmove {}", mv.to_uci()),
                None => println!("bestmove 0000"),
            }
            let _ = io::stdout().flush();
            engine
        });
        self.search_thread = Some(handle);
    }

    /// 実行中の探索を停止させ、エンジンを回収する
    fn finish_search(&mut self) {
        if let Some(handle) = self.search_thread.take() {
            if let Some(flag) = &self.stop_flag {
                flag.store(true, Ordering::Relaxed);
            }
            match handle.join() {
                Ok(engine) => self.engine = Some(engine),
                Err(_) => {
                    log::warn!("search thread panicked; rebuilding engine");
                    self.engine = Some(Engine::new(self.hash_mb));
                }
            }
        }
        self.stop_flag = None;
    }

    fn cmd_display(&mut self) {
        self.finish_search();
        if let Some(engine) = self.engine.as_ref() {
            println!("{}", engine.position().fen());
        }
    }
}

/// goコマンドのパラメータ
#[derive(Default)]
struct GoParams {
    wtime: Option<u64>,
    btime: Option<u64>,
    winc: Option<u64>,
    binc: Option<u64>,
    movetime: Option<u64>,
    depth: Option<u32>,
    nodes: Option<u64>,
    infinite: bool,
}

impl GoParams {
    fn parse(args: &[&str]) -> Self {
        let mut params = GoParams::default();
        let mut iter = args.iter();
        while let Some(&token) = iter.next() {
            match token {
                "wtime" => params.wtime = iter.next().and_then(|v| v.parse().ok()),
                "btime" => params.btime = iter.next().and_then(|v| v.parse().ok()),
                "winc" => params.winc = iter.next().and_then(|v| v.parse().ok()),
                "binc" => params.binc = iter.next().and_then(|v| v.parse().ok()),
                "movetime" => params.movetime = iter.next().and_then(|v| v.parse().ok()),
                "depth" => params.depth = iter.next().and_then(|v| v.parse().ok()),
                "nodes" => params.nodes = iter.next().and_then(|v| v.parse().ok()),
                "infinite" => params.infinite = true,
                "movestogo" | "mate" => {
                    // 受け取るが予算計算では使わない
                    let _ = iter.next();
                }
                _ => {}
            }
        }
        params
    }

    /// 時間予算を決める
    ///
    /// movetimeはそのまま、持ち時間制は残り時間の1/30+加算時間。
    /// infiniteはstopが来るまで探索する。
    fn time_budget(&self, white_to_move: bool) -> Option<Duration> {
        if let Some(ms) = self.movetime {
            return Some(Duration::from_millis(ms));
        }
        if self.infinite {
            return None;
        }

        let (our_time, our_inc) =
            if white_to_move { (self.wtime, self.winc) } else { (self.btime, self.binc) };

        if let Some(remaining) = our_time {
            let mut budget = remaining / 30 + our_inc.unwrap_or(0);
            budget = budget.clamp(1, remaining.max(1));
            return Some(Duration::from_millis(budget));
        }

        // パラメータなしのgoは1秒で返す
        if self.depth.is_none() && self.nodes.is_none() {
            Some(Duration::from_secs(1))
        } else {
            None
        }
    }
}

/// UCIコマンドループを実行する
pub fn run(hash_mb: usize) -> Result<()> {
    let mut uci = UciEngine::new(hash_mb);
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        if !uci.process_command(line.trim()) {
            break;
        }
    }

    uci.finish_search();
    Ok(())
}
