//! PongOS simulator CLI
//!
//! Usage:
//!   pongsim [OPTIONS]
//!
//! Examples:
//!   pongsim --keys "enter s*4 .*200"
//!   pongsim --script rally.keys --print-every 10
//!   pongsim --keys enter --winning-score 3 -v

use anyhow::{Context, Result};
use clap::Parser;
use pongos::game::Side;
use pongos::kernel::Config;
use pongsim::render::render_frame;
use pongsim::script::Script;
use pongsim::session::{Settings, StopReason, simulate};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pongsim")]
#[command(author, version, about = "Run the PongOS kernel against a scripted keyboard", long_about = None)]
struct Args {
    /// Inline key script, e.g. "enter s*3 .*50"
    #[arg(short, long, conflicts_with = "script")]
    keys: Option<String>,

    /// Key script file
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Maximum loop iterations to run
    #[arg(short, long, default_value = "10000")]
    frames: u64,

    /// Points needed to win
    #[arg(short = 'w', long, default_value = "10")]
    winning_score: u8,

    /// Print every Nth presented frame; the last frame is always printed
    #[arg(short = 'p', long, default_value = "0")]
    print_every: u64,

    /// Arena size in bytes
    #[arg(long, default_value = "1048576")]
    arena_size: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_script(args: &Args) -> Result<Script> {
    match (&args.keys, &args.script) {
        (Some(keys), _) => Script::parse(keys).context("invalid --keys"),
        (None, Some(path)) => {
            Script::from_file(path).with_context(|| format!("cannot load script {}", path.display()))
        }
        (None, None) => Ok(Script::default()),
    }
}

fn run(args: &Args) -> Result<()> {
    let script = load_script(args)?;

    let settings = Settings {
        frames: args.frames,
        arena_size: args.arena_size,
        kernel: Config {
            winning_score: args.winning_score,
            frame_delay_ms: 0,
            finish_delay_ms: 0,
            ..Config::default()
        },
    };

    // Last frame not printed yet
    let mut pending = None;
    let mut presented = 0u64;
    let summary = simulate(script, &settings, |frame| {
        presented += 1;
        let text = render_frame(frame.surface);
        let heading = format!(
            "frame {} (iteration {}, score {} - {})",
            presented,
            frame.iteration,
            frame.game.score(Side::Left),
            frame.game.score(Side::Right)
        );
        if args.print_every > 0 && presented % args.print_every == 0 {
            println!("{heading}");
            print!("{text}");
            pending = None;
        } else {
            pending = Some((heading, text));
        }
    })
    .context("kernel failed to boot")?;

    if let Some((heading, text)) = pending {
        println!("{heading}");
        print!("{text}");
    }

    let reason = match summary.reason {
        StopReason::Halted => "halted",
        StopReason::OutOfInput => "script ended before start",
        StopReason::FrameLimit => "iteration limit reached",
    };
    println!("stopped: {reason} after {} iterations", summary.iterations);
    println!("score: {} - {}", summary.scores[0], summary.scores[1]);
    if let Some(winner) = summary.winner {
        println!("winner: player {}", winner.player());
    }
    Ok(())
}
