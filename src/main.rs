//! The `markpass` binary.

use clap::{Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use markpass::{
    collectors, parse, parse_many, run_isolated, serve_worker, to_canonical_json, Options, Status,
    TimerStrategy, WorkerRequest,
};

#[derive(Debug, Parser)]
#[command(version, about, author)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan Markdown files and print one line of canonical JSON per file
    Scan(ScanArgs),

    /// Read one JSON request from stdin and answer on stdout; used by
    /// --isolate
    Worker,

    /// List the built-in collectors
    Collectors,
}

#[derive(Debug, clap::Args)]
struct ScanArgs {
    /// Files to scan; standard input if none are given
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Collectors to run, in order
    #[arg(short, long, value_name = "NAME", value_delimiter = ',')]
    collectors: Vec<String>,

    /// Wall-clock budget per document, in milliseconds
    #[arg(long, value_name = "MS")]
    budget_ms: Option<u64>,

    /// Timer backend for the budget
    #[arg(long, value_enum, default_value_t = Timer::Auto)]
    timer: Timer,

    /// Run each document in a separate worker process, killed after this many
    /// milliseconds
    #[arg(long, value_name = "MS")]
    isolate: Option<u64>,

    /// Maximum nesting depth
    #[arg(long, value_name = "DEPTH")]
    max_nesting: Option<usize>,

    /// Accept relative link destinations
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    allow_relative: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Timer {
    Auto,
    Signal,
    Cooperative,
}

impl From<Timer> for TimerStrategy {
    fn from(timer: Timer) -> Self {
        match timer {
            Timer::Auto => TimerStrategy::Auto,
            Timer::Signal => TimerStrategy::Signal,
            Timer::Cooperative => TimerStrategy::Cooperative,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Worker => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            serve_worker(stdin.lock(), stdout.lock())?;
        }
        Command::Collectors => {
            for name in collectors::builtin_names() {
                println!("{}", name);
            }
        }
        Command::Scan(args) => {
            if !scan(args)? {
                process::exit(1);
            }
        }
    }

    Ok(())
}

/// Returns whether every document completed.
fn scan(args: ScanArgs) -> Result<bool, Box<dyn Error>> {
    let mut options = Options::default();
    options.deadline.budget = args.budget_ms.map(Duration::from_millis);
    options.deadline.strategy = args.timer.into();
    options.url.allow_relative = args.allow_relative;
    if let Some(max_nesting) = args.max_nesting {
        options.limits.max_nesting = max_nesting;
    }

    let names = if args.collectors.is_empty() {
        collectors::builtin_names().to_vec()
    } else {
        args.collectors.iter().map(String::as_str).collect()
    };
    // Fail on a bad name before reading anything.
    if let Err(unknown) = collectors::by_names(&names, &options) {
        eprintln!("{}", unknown);
        process::exit(1);
    }

    let documents = read_documents(&args.files)?;

    let lines: Vec<(Status, String)> = match args.isolate {
        Some(wall_ms) => {
            let exe = std::env::current_exe()?;
            documents
                .iter()
                .map(|text| {
                    let request = WorkerRequest::new(text.as_str(), &names, &options);
                    let response = run_isolated(&exe, &request, Duration::from_millis(wall_ms));
                    (response.status, response.to_canonical_json())
                })
                .collect()
        }
        None if documents.len() == 1 => {
            let collectors = collectors::by_names(&names, &options)?;
            let outcome = parse(&documents[0], collectors, &options);
            vec![(outcome.status, to_canonical_json(&outcome))]
        }
        None => {
            let factory = || collectors::by_names(&names, &options).unwrap_or_default();
            parse_many(&documents, factory, &options)
                .iter()
                .map(|outcome| (outcome.status, to_canonical_json(outcome)))
                .collect()
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut all_completed = true;
    for (ix, (status, json)) in lines.iter().enumerate() {
        writeln!(out, "{}", json)?;
        if *status != Status::Completed {
            all_completed = false;
            match args.files.get(ix) {
                Some(path) => eprintln!("{}: {}", path.display(), status),
                None => eprintln!("<stdin>: {}", status),
            }
        }
    }
    out.flush()?;

    Ok(all_completed)
}

fn read_documents(files: &[PathBuf]) -> io::Result<Vec<String>> {
    if files.is_empty() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return Ok(vec![buf]);
    }

    files
        .iter()
        .map(|path| {
            fs::read(path).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        })
        .collect()
}
