//! Trace inspector
//!
//! Replays a recorded trace up to a point of the timeline and prints the reconstructed
//! document, cursor and selection.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p code-replay-cli -- <trace.json> <time> [--start <time>] [--initial <file>] [--structured] [--json]
//! ```
//!
//! `<time>` and `--start` take a `[[h:]m:]s[.frac]` timestamp such as `62.5` or `1:02.5`.
//! `--structured` reads a change-set trace instead of a line-operation trace.
//! Set `RUST_LOG=code_replay=debug` to follow the replayer.

use code_replay::{
    CodeReplay, HeadlessEditor, HeadlessView, ReplayConfig, ReplayError, StartTime,
    StructuredReplay, parse_timestamp,
};
use std::path::PathBuf;
use std::{env, fs, process};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
struct Args {
    trace: PathBuf,
    time: f64,
    start: Option<String>,
    initial: Option<PathBuf>,
    structured: bool,
    json: bool,
}

fn parse_time(text: &str) -> Result<f64, CliError> {
    parse_timestamp(text).ok_or_else(|| CliError::Usage(format!("invalid time: {text}")))
}

fn parse_args(raw: &[String]) -> Result<Args, CliError> {
    let mut positional = Vec::new();
    let mut start = None;
    let mut initial = None;
    let mut structured = false;
    let mut json = false;

    let mut iter = raw.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--start" => {
                let value = iter
                    .next()
                    .ok_or_else(|| CliError::Usage("--start needs a value".into()))?;
                start = Some(value.clone());
            }
            "--initial" => {
                let value = iter
                    .next()
                    .ok_or_else(|| CliError::Usage("--initial needs a file".into()))?;
                initial = Some(PathBuf::from(value));
            }
            "--structured" => structured = true,
            "--json" => json = true,
            flag if flag.starts_with("--") => {
                return Err(CliError::Usage(format!("unknown option: {flag}")));
            }
            _ => positional.push(arg.clone()),
        }
    }

    let [trace, time] = positional.as_slice() else {
        return Err(CliError::Usage("expected <trace.json> <time>".into()));
    };

    Ok(Args {
        trace: PathBuf::from(trace),
        time: parse_time(time)?,
        start,
        initial,
        structured,
        json,
    })
}

fn read(path: &PathBuf) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.clone(),
        source,
    })
}

fn run(args: Args) -> Result<(), CliError> {
    let trace = read(&args.trace)?;
    let initial = match &args.initial {
        Some(path) => read(path)?,
        None => String::new(),
    };

    let mut config = ReplayConfig::default();
    if let Some(start) = &args.start {
        config = config.with_start(StartTime::from(start.as_str()));
    }

    if args.structured {
        let mut replay =
            StructuredReplay::from_json(&trace, HeadlessView::new(&initial), config, &())?;
        replay.on_time_update(args.time);
        let selection = replay.view().fake_selection().range();

        if args.json {
            let summary = serde_json::json!({
                "index": replay.index(),
                "entries": replay.trace().len(),
                "text": replay.view().text(),
                "selection": selection.map(|s| [s.anchor, s.head]),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("{}", replay.view().text());
            println!("-- entry {}/{}", replay.index(), replay.trace().len());
            if let Some(s) = selection {
                println!("-- selection {}..{}", s.anchor, s.head);
            }
        }
        return Ok(());
    }

    let mut replay = CodeReplay::<HeadlessEditor>::from_json(&trace, config, &())?;
    replay.mount(HeadlessEditor::new(&initial, Default::default()));
    replay.on_time_update(args.time);
    let state = replay.state();

    if args.json {
        let summary = serde_json::json!({
            "index": replay.index(),
            "entries": replay.trace().len(),
            "text": state.value.text(),
            "cursor": state.cursor,
            "selection": state.selection,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", state.value.text());
        println!("-- entry {}/{}", replay.index(), replay.trace().len());
        println!("-- cursor {}:{}", state.cursor.line, state.cursor.column);
        if let Some(range) = state.selection {
            let (from, to) = range.ordered();
            println!(
                "-- selection {}:{}..{}:{}",
                from.line, from.column, to.line, to.column
            );
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = env::args().collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            eprintln!(
                "\nusage: {} <trace.json> <time> [--start <time>] [--initial <file>] [--structured] [--json]",
                raw.first().map(String::as_str).unwrap_or("trace-inspect")
            );
            process::exit(2);
        }
    };

    tracing::debug!(?args, "inspecting trace");
    if let Err(err) = run(args) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let args = parse_args(&argv(&[
            "trace-inspect",
            "t.json",
            "1:02.5",
            "--start",
            "0:01",
            "--structured",
        ]))
        .unwrap();
        assert_eq!(args.trace, PathBuf::from("t.json"));
        assert_eq!(args.time, 62_500.0);
        assert_eq!(args.start.as_deref(), Some("0:01"));
        assert!(args.structured);
        assert!(!args.json);
    }

    #[test]
    fn test_parse_args_rejects_missing_time() {
        assert!(matches!(
            parse_args(&argv(&["trace-inspect", "t.json"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_args(&argv(&["trace-inspect", "t.json", "10", "--bogus"])),
            Err(CliError::Usage(_))
        ));
    }
}
