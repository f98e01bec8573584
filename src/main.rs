// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing_subscriber::EnvFilter;

use soundsprite::audio::output;
use soundsprite::recording::microphone;
use soundsprite::{
    pads, AppConfig, RecordOptions, Soundboard, NUM_PADS, NUM_STEPS, PAD_KEYS,
};

/// Extra time after a one-shot so the tail is heard before exit
const PLAY_TAIL: Duration = Duration::from_millis(250);

/// Default take length for --record
const DEFAULT_RECORD_SECONDS: u64 = 3;

/// Default loop length for --loop
const DEFAULT_LOOP_BARS: u32 = 4;

fn print_usage() {
    println!("SoundSprite - Nine-pad sampler and step loop");
    println!();
    println!("Usage: soundsprite <COMMAND>");
    println!();
    println!("Commands:");
    println!("  --status                       Show pads, grid, and tempo");
    println!("  --list-devices                 List audio input and output devices");
    println!("  --play <PAD>                   Play a pad");
    println!("  --record <PAD> [SECONDS] [NAME]  Record from the microphone (default 3s)");
    println!("  --name <PAD> <NAME>            Rename a pad");
    println!("  --volume <PAD> <PERCENT>       Set pad volume (100 = unity)");
    println!("  --clear <PAD>                  Empty a pad");
    println!("  --toggle <PAD> <STEP>          Flip a grid cell (steps 0-3)");
    println!("  --tempo <BPM>                  Set loop tempo");
    println!("  --clear-loop                   Turn every grid cell off");
    println!("  --loop [BARS]                  Play the loop (default 4 bars, Ctrl+C stops)");
    println!("  --export <DIR> [PAD]           Write recorded pads as WAV files");
    println!("  --reset                        Clear all pads, the grid, and tempo");
    println!("  --help                         Show this help message");
    println!();
    println!("<PAD> is an index 0-8 or one of the keys {}", PAD_KEYS.iter().collect::<String>());
}

/// Parse a pad given as an index or a key letter
fn parse_pad(arg: &str) -> Result<usize> {
    if let Ok(index) = arg.parse::<usize>() {
        if index < NUM_PADS {
            return Ok(index);
        }
        bail!("Pad index {} out of range (0-{})", index, NUM_PADS - 1);
    }
    let mut chars = arg.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) => {
            pads::index_for_key(key).ok_or_else(|| anyhow!("No pad on key '{}'", key))
        }
        _ => Err(anyhow!("Invalid pad: {}", arg)),
    }
}

fn require<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires {}", args[1], what))
}

fn print_status(board: &Soundboard) {
    println!("Pads:");
    for (i, pad) in board.pads().iter().enumerate() {
        println!(
            "  {} [{}] {:<20} vol {:>3}%  {}",
            i,
            PAD_KEYS[i],
            pad.name,
            pad.volume_percent(),
            if pad.is_loaded() {
                "loaded"
            } else if pad.encoded_sample.is_some() {
                "undecodable"
            } else {
                "-"
            }
        );
    }
    println!();
    println!("Loop at {} BPM:", board.tempo().bpm());
    let grid = board.grid();
    for (i, row) in grid.rows().iter().enumerate() {
        let cells: String = row.iter().map(|&on| if on { 'x' } else { '.' }).collect();
        println!("  {} {}", PAD_KEYS[i], cells);
    }
}

fn print_devices() {
    println!("Output devices:");
    let default_out = output::default_device_name();
    for name in output::list_devices() {
        let mark = if Some(&name) == default_out.as_ref() { "*" } else { " " };
        println!("  {} {}", mark, name);
    }
    println!("Input devices:");
    let default_in = microphone::default_device_name();
    for name in microphone::list_devices() {
        let mark = if Some(&name) == default_in.as_ref() { "*" } else { " " };
        println!("  {} {}", mark, name);
    }
}

async fn play_pad(board: &Soundboard, pad: usize) -> Result<()> {
    if !board.trigger(pad)? {
        println!("Pad {} is empty", PAD_KEYS[pad]);
        return Ok(());
    }
    let length = board
        .pad(pad)?
        .buffer
        .map(|b| b.duration())
        .unwrap_or_default();
    tokio::time::sleep(length + PLAY_TAIL).await;
    Ok(())
}

async fn record_pad(
    board: &Soundboard,
    pad: usize,
    seconds: u64,
    name: Option<String>,
    monitor: bool,
) -> Result<()> {
    board
        .start_recording(pad, RecordOptions { monitor, name })
        .await
        .context("Failed to start recording")?;
    println!("Recording pad {} for {}s (Ctrl+C to stop early)...", PAD_KEYS[pad], seconds);

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    match board.stop_recording().await.context("Recording failed")? {
        Some(sample) => println!(
            "Saved \"{}\" to pad {} ({:.2}s)",
            sample.name,
            PAD_KEYS[sample.pad],
            sample.duration.as_secs_f64()
        ),
        None => println!("Nothing recorded"),
    }
    Ok(())
}

async fn play_loop(board: &Soundboard, bars: u32) {
    let step = board.tempo().step_interval();
    let length = step * (NUM_STEPS as u32) * bars;
    println!("Playing {} bars at {} BPM (Ctrl+C to stop)...", bars, board.tempo().bpm());

    board.start_sequencer();
    tokio::select! {
        _ = tokio::time::sleep(length) => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    board.stop_sequencer();
    // Let the last step ring out
    tokio::time::sleep(PLAY_TAIL).await;
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("SoundSprite - Nine-pad sampler and step loop");
        println!("Run with --help for usage information");
        return Ok(());
    }

    if matches!(args[1].as_str(), "--help" | "-h") {
        print_usage();
        return Ok(());
    }
    if args[1] == "--list-devices" {
        print_devices();
        return Ok(());
    }

    let config_path = AppConfig::default_path();
    let config = AppConfig::load_or_default(&config_path)?;
    init_logging(&config);

    let board = Soundboard::from_config(&config);
    if let Some(report) = board.restore().await {
        if !report.failed.is_empty() {
            eprintln!("Warning: could not restore pads {:?}", report.failed);
        }
    }

    match args[1].as_str() {
        "--status" => {
            print_status(&board);
        }
        "--play" => {
            let pad = parse_pad(require(&args, 2, "a pad")?)?;
            play_pad(&board, pad).await?;
        }
        "--record" => {
            let pad = parse_pad(require(&args, 2, "a pad")?)?;
            let seconds = match args.get(3) {
                Some(s) => s
                    .parse()
                    .map_err(|_| anyhow!("Invalid number of seconds: {}", s))?,
                None => DEFAULT_RECORD_SECONDS,
            };
            let name = args.get(4).cloned();
            record_pad(&board, pad, seconds, name, config.recording.monitor).await?;
        }
        "--name" => {
            let pad = parse_pad(require(&args, 2, "a pad")?)?;
            let name = args.get(3..).map(|rest| rest.join(" ")).unwrap_or_default();
            board.set_name(pad, &name)?;
            println!("Pad {} is now \"{}\"", PAD_KEYS[pad], board.pad(pad)?.name);
        }
        "--volume" => {
            let pad = parse_pad(require(&args, 2, "a pad")?)?;
            let arg = require(&args, 3, "a percent")?;
            let percent: f64 = arg
                .parse()
                .map_err(|_| anyhow!("Invalid volume: {}", arg))?;
            board.set_volume(pad, percent)?;
        }
        "--clear" => {
            let pad = parse_pad(require(&args, 2, "a pad")?)?;
            board.clear_pad(pad)?;
        }
        "--toggle" => {
            let pad = parse_pad(require(&args, 2, "a pad")?)?;
            let arg = require(&args, 3, "a step")?;
            let step: usize = arg.parse().map_err(|_| anyhow!("Invalid step: {}", arg))?;
            let on = board.toggle_step(pad, step)?;
            println!("Pad {} step {} {}", PAD_KEYS[pad], step, if on { "on" } else { "off" });
        }
        "--tempo" => {
            let arg = require(&args, 2, "a BPM value")?;
            let bpm: u32 = arg.parse().map_err(|_| anyhow!("Invalid BPM: {}", arg))?;
            let tempo = board.set_tempo(bpm);
            println!("Tempo {} BPM", tempo.bpm());
        }
        "--clear-loop" => {
            board.clear_grid();
        }
        "--loop" => {
            let bars = match args.get(2) {
                Some(s) => s.parse().map_err(|_| anyhow!("Invalid bar count: {}", s))?,
                None => DEFAULT_LOOP_BARS,
            };
            play_loop(&board, bars).await;
        }
        "--export" => {
            let dir = Path::new(require(&args, 2, "a directory")?);
            let written = match args.get(3) {
                Some(pad) => vec![board.export_pad(parse_pad(pad)?, dir)?],
                None => board.export_all(dir)?,
            };
            for path in &written {
                println!("Wrote {}", path.display());
            }
            if written.is_empty() {
                println!("No recorded pads to export");
            }
        }
        "--reset" => {
            board.reset_all();
            println!("All pads, the loop, and tempo reset");
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
