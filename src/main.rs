use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;
use waterfall::{MidiFile, PlayerConfig, TerminalRenderer, Waterfall, devices, input_queue};

const USAGE: &str = "usage: waterfall <song.mid> [--config <file.ron>] [--mock] [--dump]";

struct Args {
    song: PathBuf,
    config: Option<PathBuf>,
    mock: bool,
    dump: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut song = None;
    let mut config = None;
    let mut mock = false;
    let mut dump = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(args.next().ok_or("missing value for --config")?.into()),
            "--mock" => mock = true,
            "--dump" => dump = true,
            other if other.starts_with("--") => return Err(format!("unknown option '{other}'")),
            other => song = Some(PathBuf::from(other)),
        }
    }

    Ok(Args {
        song: song.ok_or("missing song file")?,
        config,
        mock,
        dump,
    })
}

fn dump(file: &MidiFile) {
    println!("{:?}", file.header);
    println!("Tempo map:");
    for entry in file.tempo.entries() {
        println!("  {:>7} ticks: {:.2} ticks/s", entry.tick, entry.ticks_per_second);
    }
    for (index, track) in file.tracks.iter().enumerate() {
        println!("Track {index} ({} events):", track.len());
        for event in &track.events {
            println!("  {event}");
        }
    }
}

fn run(args: Args) -> waterfall::Result<()> {
    let config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };
    let file = MidiFile::load(&args.song)?;

    if args.dump {
        dump(&file);
        return Ok(());
    }

    let (producer, mut input) = input_queue(config.input_capacity);
    // Kept alive until playback ends.
    let _connection = if args.mock {
        // Detached: the thread ends with the process.
        let _ = devices::spawn_mock_keyboard(producer);
        None
    } else {
        Some(devices::connect_midi(config.midi_port.as_deref(), producer)?)
    };

    let score = {
        let mut renderer = TerminalRenderer::new(&config).map_err(|source| waterfall::Error::Io {
            path: PathBuf::from("<terminal>"),
            source,
        })?;
        let mut session = Waterfall::new(&file, &config);
        session.play(config.slowdown, &mut input, &mut renderer)
    };

    println!("Score: {score}");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "waterfall failed");
            ExitCode::FAILURE
        }
    }
}
