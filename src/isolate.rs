//! Out-of-process parsing.
//!
//! Only plain data crosses the process boundary: a [`WorkerRequest`] goes in
//! as JSON on the worker's stdin and a [`WorkerResponse`] comes back on its
//! stdout. The worker rebuilds its options and collectors from primitives;
//! nothing live is shared. The binary's `worker` subcommand runs
//! [`serve_worker`].

use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::collectors;
use crate::deadline::TimerStrategy;
use crate::error::Error;
use crate::options::{DeadlineOptions, Limits, Options, TokenizerOptions, UrlPolicy};
use crate::pipeline::{parse, ParseOutcome, Status};

/// How often a waiting parent checks on its worker.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// [`Options`] flattened to primitives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// [`DeadlineOptions::budget`] in milliseconds.
    pub budget_ms: Option<u64>,
    /// [`TimerStrategy`] by name.
    pub timer: String,
    /// See [`Limits`].
    pub max_nesting: usize,
    /// See [`Limits`].
    pub max_input_bytes: usize,
    /// See [`Limits`].
    pub check_interval: usize,
    /// See [`UrlPolicy`].
    pub allowed_schemes: Vec<String>,
    /// See [`UrlPolicy`].
    pub data_image_types: Vec<String>,
    /// See [`UrlPolicy`].
    pub max_data_uri_bytes: usize,
    /// See [`UrlPolicy`].
    pub allow_relative: bool,
    /// See [`TokenizerOptions`].
    pub table: bool,
    /// See [`TokenizerOptions`].
    pub strikethrough: bool,
    /// See [`TokenizerOptions`].
    pub autolink: bool,
    /// See [`TokenizerOptions`].
    pub tasklist: bool,
    /// See [`TokenizerOptions`].
    pub footnotes: bool,
    /// See [`TokenizerOptions`].
    pub front_matter: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig::from(&Options::default())
    }
}

impl From<&Options> for WorkerConfig {
    fn from(options: &Options) -> Self {
        WorkerConfig {
            budget_ms: options
                .deadline
                .budget
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            timer: options.deadline.strategy.as_str().to_string(),
            max_nesting: options.limits.max_nesting,
            max_input_bytes: options.limits.max_input_bytes,
            check_interval: options.limits.check_interval,
            allowed_schemes: options.url.allowed_schemes.clone(),
            data_image_types: options.url.data_image_types.clone(),
            max_data_uri_bytes: options.url.max_data_uri_bytes,
            allow_relative: options.url.allow_relative,
            table: options.tokenizer.table,
            strikethrough: options.tokenizer.strikethrough,
            autolink: options.tokenizer.autolink,
            tasklist: options.tokenizer.tasklist,
            footnotes: options.tokenizer.footnotes,
            front_matter: options.tokenizer.front_matter,
        }
    }
}

impl WorkerConfig {
    /// Rebuild the options.  Fails only on an unknown timer name.
    pub fn to_options(&self) -> Result<Options, Error> {
        let strategy = TimerStrategy::from_name(&self.timer).ok_or_else(|| Error::Isolation {
            message: format!("unknown timer strategy `{}`", self.timer),
        })?;

        Ok(Options {
            limits: Limits {
                max_nesting: self.max_nesting,
                max_input_bytes: self.max_input_bytes,
                check_interval: self.check_interval,
            },
            deadline: DeadlineOptions {
                budget: self.budget_ms.map(Duration::from_millis),
                strategy,
            },
            url: UrlPolicy {
                allowed_schemes: self.allowed_schemes.clone(),
                data_image_types: self.data_image_types.clone(),
                max_data_uri_bytes: self.max_data_uri_bytes,
                allow_relative: self.allow_relative,
            },
            tokenizer: TokenizerOptions {
                table: self.table,
                strikethrough: self.strikethrough,
                autolink: self.autolink,
                tasklist: self.tasklist,
                footnotes: self.footnotes,
                front_matter: self.front_matter,
            },
        })
    }
}

/// One document for a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Raw Markdown.
    pub text: String,
    /// Built-in collector names, in registration order.
    pub collectors: Vec<String>,
    /// Options as primitives.
    #[serde(default)]
    pub config: WorkerConfig,
}

impl WorkerRequest {
    /// A request for `text` with the given collectors and options.
    pub fn new(text: impl Into<String>, collectors: &[&str], options: &Options) -> Self {
        WorkerRequest {
            text: text.into(),
            collectors: collectors.iter().map(|s| s.to_string()).collect(),
            config: WorkerConfig::from(options),
        }
    }
}

/// A worker's answer: the status plus the outcome in plain-data form (see
/// [`outcome_value`](crate::canonical::outcome_value)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// How the run ended.
    pub status: Status,
    /// Sections, results, stats and error.
    pub outcome: serde_json::Value,
}

impl From<&ParseOutcome> for WorkerResponse {
    fn from(outcome: &ParseOutcome) -> Self {
        WorkerResponse {
            status: outcome.status,
            outcome: crate::canonical::outcome_value(outcome),
        }
    }
}

impl WorkerResponse {
    fn stopped(error: Error) -> Self {
        WorkerResponse::from(&ParseOutcome::stopped(error))
    }

    fn isolation_failure(message: impl Into<String>) -> Self {
        WorkerResponse::stopped(Error::Isolation {
            message: message.into(),
        })
    }

    /// Canonical JSON of the outcome.
    pub fn to_canonical_json(&self) -> String {
        crate::canonical::canonical_string(&self.outcome)
    }
}

/// Handle one request in this process.  Self-contained: everything is rebuilt
/// from the request.
pub fn run_worker(request: &WorkerRequest) -> WorkerResponse {
    let options = match request.config.to_options() {
        Ok(options) => options,
        Err(error) => return WorkerResponse::stopped(error),
    };
    let names = request
        .collectors
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>();
    let collectors = match collectors::by_names(&names, &options) {
        Ok(collectors) => collectors,
        Err(unknown) => {
            return WorkerResponse::isolation_failure(unknown.to_string());
        }
    };
    WorkerResponse::from(&parse(&request.text, collectors, &options))
}

/// Read one JSON request from `input`, write one JSON response to `output`.
pub fn serve_worker<R: Read, W: Write>(mut input: R, mut output: W) -> io::Result<()> {
    let mut buffer = Vec::new();
    input.read_to_end(&mut buffer)?;
    let response = match serde_json::from_slice::<WorkerRequest>(&buffer) {
        Ok(request) => run_worker(&request),
        Err(err) => WorkerResponse::isolation_failure(format!("bad request: {}", err)),
    };
    serde_json::to_writer(&mut output, &response)?;
    output.flush()
}

/// Run `request` in a child process `exe worker`, killing it after
/// `wall_timeout`.
///
/// A killed worker yields a `TimedOut` response with no results. Failures to
/// spawn or to understand the worker yield `Failed`.
pub fn run_isolated(exe: &Path, request: &WorkerRequest, wall_timeout: Duration) -> WorkerResponse {
    let payload = match serde_json::to_vec(request) {
        Ok(payload) => payload,
        Err(err) => return WorkerResponse::isolation_failure(err.to_string()),
    };

    let mut child = match Command::new(exe)
        .arg("worker")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            return WorkerResponse::isolation_failure(format!(
                "cannot start {}: {}",
                exe.display(),
                err
            ))
        }
    };
    let started = Instant::now();

    let writer = child.stdin.take().map(|mut stdin| {
        thread::spawn(move || {
            // A worker that dies early closes the pipe; its exit status
            // reports that better than the write error would.
            let _ = stdin.write_all(&payload);
        })
    });
    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            stdout.read_to_end(&mut buffer).map(|_| buffer)
        })
    });

    let exit = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= wall_timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return WorkerResponse::stopped(Error::TimedOut);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                let _ = child.kill();
                return WorkerResponse::isolation_failure(err.to_string());
            }
        }
    };

    if let Some(writer) = writer {
        let _ = writer.join();
    }
    let output = match reader.map(|reader| reader.join()) {
        Some(Ok(Ok(buffer))) => buffer,
        Some(Ok(Err(err))) => return WorkerResponse::isolation_failure(err.to_string()),
        Some(Err(_)) | None => return WorkerResponse::isolation_failure("worker output lost"),
    };

    if !exit.success() {
        return WorkerResponse::isolation_failure(format!("worker exited with {}", exit));
    }
    match serde_json::from_slice(&output) {
        Ok(response) => response,
        Err(err) => WorkerResponse::isolation_failure(format!("bad response: {}", err)),
    }
}
