use std::env;
use std::io::{self, BufRead, Write};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use blunder_drill_core::{
    parse_pgn_file, BlunderScanner, Database, DrillConfig, Error, MoveEvaluator, Outcome,
    ScanSummary, SessionController, SessionPhase, UciEngine,
};

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    match args[1].as_str() {
        "ingest" => {
            if args.len() < 4 {
                println!("Usage: {} ingest <pgn_file> <username>", args[0]);
                process::exit(1);
            }
            ingest(&args[2], &args[3]);
        }
        "drill" => {
            let limit = args
                .get(2)
                .and_then(|s| s.parse().ok())
                .unwrap_or(10u32);
            drill(limit);
        }
        "list" => {
            let include_archived = args.get(2).map(|s| s == "--all").unwrap_or(false);
            list(include_archived);
        }
        "archive" => with_record_id(&args, |db, id| db.archive(id)),
        "unarchive" => with_record_id(&args, |db, id| db.unarchive(id)),
        "engine-test" => engine_test(),
        _ => {
            print_usage(&args[0]);
            process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    println!("Usage: {} <command> [arguments]", program);
    println!();
    println!("Commands:");
    println!("  ingest <pgn_file> <username>   Scan games for blunders and store them");
    println!("  drill [limit]                  Review due blunders interactively");
    println!("  list [--all]                   Show stored blunders (--all includes archived)");
    println!("  archive <id>                   Retire a record from drilling");
    println!("  unarchive <id>                 Bring an archived record back");
    println!("  engine-test                    Check the UCI engine connection");
    println!();
    println!("Environment:");
    println!("  BLUNDER_DRILL_DB       Database path (default: blunder_drill.db)");
    println!("  BLUNDER_DRILL_CONFIG   JSON config file with tolerances and intervals");
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn db_path() -> String {
    env::var("BLUNDER_DRILL_DB").unwrap_or_else(|_| "blunder_drill.db".to_string())
}

fn load_config() -> DrillConfig {
    match env::var("BLUNDER_DRILL_CONFIG") {
        Ok(path) => match DrillConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                println!("[ERROR] Could not load config {}: {}", path, e);
                process::exit(1);
            }
        },
        Err(_) => DrillConfig::default(),
    }
}

fn open_db() -> Database {
    let path = db_path();
    tracing::debug!(%path, "opening database");
    match Database::open(&path) {
        Ok(db) => db,
        Err(e) => {
            println!("[ERROR] Could not open database: {}", e);
            process::exit(1);
        }
    }
}

fn open_engine(config: &DrillConfig) -> UciEngine {
    match UciEngine::new(&config.engine_path) {
        Ok(engine) => engine,
        Err(e) => {
            println!("[ERROR] {}", e);
            println!();
            println!("Make sure a UCI engine is installed:");
            println!("  sudo apt install stockfish");
            process::exit(1);
        }
    }
}

fn ingest(pgn_path: &str, username: &str) {
    println!("Loading: {}", pgn_path);

    let games = match parse_pgn_file(pgn_path) {
        Ok(games) => games,
        Err(e) => {
            println!("[ERROR] {}", e);
            process::exit(1);
        }
    };
    println!("[OK] Found {} game(s)", games.len());
    println!();

    let config = load_config();
    let db = open_db();
    let engine = open_engine(&config);
    let mut evaluator = MoveEvaluator::new(engine, &config);
    let mut scanner = BlunderScanner::new(&mut evaluator, &db);

    let mut totals = ScanSummary::default();
    for (index, game) in games.iter().enumerate() {
        println!("Game {}: {}", index + 1, game.summary());
        match scanner.scan_game(game, username, unix_now()) {
            Ok(summary) => {
                println!(
                    "   {} positions, {} blunder(s), {} skipped",
                    summary.positions_evaluated, summary.blunders_recorded, summary.skipped
                );
                totals.positions_evaluated += summary.positions_evaluated;
                totals.blunders_recorded += summary.blunders_recorded;
                totals.skipped += summary.skipped;
            }
            Err(e) => println!("   [WARN] Skipping game: {}", e),
        }
    }

    println!();
    println!(
        "[OK] Ingestion complete: {} blunder(s) recorded, {} position(s) skipped",
        totals.blunders_recorded, totals.skipped
    );
    if totals.skipped > 0 {
        println!("   Skipped positions will be picked up on a rescan.");
    }
}

fn drill(limit: u32) {
    let config = load_config();
    let db = open_db();
    let engine = open_engine(&config);
    let mut evaluator = MoveEvaluator::new(engine, &config);
    let mut controller = SessionController::new(&db, &mut evaluator, config.schedule.clone());

    let mut session = match controller.start(limit, unix_now()) {
        Ok(session) => session,
        Err(e) => {
            println!("[ERROR] Could not start session: {}", e);
            process::exit(1);
        }
    };

    if session.phase() == SessionPhase::Idle {
        println!("Nothing is due for review. Well done!");
        return;
    }

    println!("{} position(s) to review. Enter moves as SAN or UCI;", session.remaining());
    println!("'quit' abandons the session.");
    println!();

    let stdin = io::stdin();
    loop {
        let prompt = match controller.present(&mut session) {
            Ok(Some(prompt)) => prompt,
            Ok(None) => break,
            Err(e) => {
                println!("[ERROR] {}", e);
                break;
            }
        };

        println!("----------------------------------------");
        println!("FEN: {}", prompt.fen);
        println!(
            "{:?} to move. You played {} here ({}x in your games).",
            prompt.side_to_move, prompt.played_san, prompt.frequency
        );

        let feedback = loop {
            print!("Your move: ");
            let _ = io::stdout().flush();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
                // EOF behaves like quitting.
                line = "quit".to_string();
            }
            let input = line.trim();

            if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("q") {
                if let Err(e) = controller.abandon(&mut session, unix_now()) {
                    println!("[WARN] {}", e);
                }
                println!("Session abandoned.");
                return;
            }

            match controller.submit(&mut session, input) {
                Ok(feedback) => break feedback,
                Err(Error::IllegalMove(_)) => {
                    println!("   Not a legal move here, try again.");
                }
                Err(e) => {
                    println!("[ERROR] {}", e);
                    let _ = controller.abandon(&mut session, unix_now());
                    return;
                }
            }
        };

        match feedback.outcome {
            Outcome::Correct => println!("   Correct!"),
            Outcome::Incorrect => println!("   Incorrect."),
            Outcome::Provisional => {
                if feedback.matched {
                    println!("   Provisionally correct (engine unavailable, judged from snapshot).");
                } else {
                    println!("   Provisionally incorrect (engine unavailable, judged from snapshot).");
                }
            }
        }
        println!("   Good moves were: {}", feedback.acceptable.join(", "));

        match controller.next(&mut session, unix_now()) {
            Ok(SessionPhase::Idle) => break,
            Ok(_) => {}
            Err(e) => {
                println!("[ERROR] {}", e);
                return;
            }
        }
    }

    println!();
    println!("[OK] Session complete!");
}

fn list(include_archived: bool) {
    let db = open_db();
    let records = match db.list_records(include_archived) {
        Ok(records) => records,
        Err(e) => {
            println!("[ERROR] {}", e);
            process::exit(1);
        }
    };

    if records.is_empty() {
        println!("No blunders stored yet. Run 'ingest' on some games first.");
        return;
    }

    println!("{} record(s):", records.len());
    println!();
    for record in records {
        let due = format_time(record.stats.due_at);
        let flags = if record.archived { " [archived]" } else { "" };
        println!(
            "#{:<4} {:<10} due {}  played {:<7} {}x  misses {}{}",
            record.id,
            record.stats.stage.as_str(),
            due,
            record.played_san,
            record.frequency,
            record.stats.misses,
            flags
        );
        println!("      {}", record.fen);
    }
}

fn with_record_id<F>(args: &[String], action: F)
where
    F: Fn(&Database, i64) -> blunder_drill_core::Result<()>,
{
    let Some(id) = args.get(2).and_then(|s| s.parse().ok()) else {
        println!("Usage: {} {} <id>", args[0], args[1]);
        process::exit(1);
    };

    let db = open_db();
    match action(&db, id) {
        Ok(()) => println!("[OK] Record {} updated", id),
        Err(e) => {
            println!("[ERROR] {}", e);
            process::exit(1);
        }
    }
}

fn engine_test() {
    use blunder_drill_core::Analyzer;

    let config = load_config();
    println!("Testing engine: {}", config.engine_path);

    let mut engine = open_engine(&config);
    println!("[OK] Engine started");
    println!();

    println!("Scoring 1.e4 and 1.f3 from the starting position...");
    let start_fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    let moves = vec!["e2e4".to_string(), "f2f3".to_string()];

    match engine.evaluate(start_fen, &moves, config.eval_budget()) {
        Ok(scores) => {
            for mv in &moves {
                println!("   {}: {} cp", mv, scores[mv]);
            }
            println!();
            println!("[OK] Engine test complete!");
        }
        Err(e) => {
            println!("[ERROR] Evaluation failed: {}", e);
            process::exit(1);
        }
    }
}

fn format_time(timestamp: u64) -> String {
    chrono::DateTime::from_timestamp(timestamp as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
