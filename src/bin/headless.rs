use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use famicore::{Console, NsfPlayer};

/// Run a ROM headless for a fixed stretch of emulated time and report a
/// digest of the final frame. Useful for regression checks and timing runs.
#[derive(Parser)]
#[command(name = "headless", about)]
struct Args {
    /// iNES or NSF image to load
    rom: PathBuf,

    /// Emulated seconds to run
    #[arg(long, default_value_t = 1.0)]
    seconds: f64,

    /// Treat the input as an NSF tune
    #[arg(long)]
    nsf: bool,
}

fn frame_digest(frame: &[u8]) -> u64 {
    // FNV-1a over the RGBA buffer.
    let mut hash = 0xCBF2_9CE4_8422_2325u64;
    for &byte in frame {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.nsf {
        let mut player = match NsfPlayer::new(&args.rom) {
            Ok(player) => player,
            Err(err) => {
                eprintln!("error: {}", err);
                return ExitCode::FAILURE;
            }
        };
        let info = player.info().clone();
        println!(
            "{} - {} ({} songs)",
            info.song_name, info.artist_name, info.total_songs
        );
        player.step_seconds(args.seconds);
        println!(
            "song {} played for {}s, cpu cycle {}",
            player.song_index() + 1,
            args.seconds,
            player.console.cpu.cycle_count()
        );
    } else {
        let mut console = match Console::create(&args.rom, false) {
            Ok(console) => console,
            Err(err) => {
                eprintln!("error: {}", err);
                return ExitCode::FAILURE;
            }
        };
        console.step_seconds(args.seconds);
        println!(
            "frame {} cycle {} digest {:016x}",
            console.cpu.bus.ppu.frame,
            console.cpu.cycle_count(),
            frame_digest(console.frame_buffer())
        );
    }

    ExitCode::SUCCESS
}
