//! Normalize, tokenize, index, dispatch and finalize one document under a
//! deadline.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::deadline::Deadline;
use crate::dispatch::{Collector, CollectorResult, DispatchStats, Dispatcher};
use crate::error::Error;
use crate::index::{IndexBuilder, Section};
use crate::normalize::Source;
use crate::options::Options;
use crate::tokenizer::{CommonMark, Tokenizer};

/// Terminal status of a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Everything ran; results are complete.
    Completed,
    /// The deadline expired; there are no results.
    TimedOut,
    /// The input was malformed or tripped a limit; there are no results.
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Completed => "completed",
            Status::TimedOut => "timed_out",
            Status::Failed => "failed",
        })
    }
}

/// Where a [`Pipeline`] is in its life.
///
/// `Idle -> Running -> {Completed, TimedOut, Failed}`; the last three are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Collectors may still be registered.
    Idle,
    /// A run is in progress under a live deadline.
    Running,
    /// Finished with full results.
    Completed,
    /// Stopped by the deadline.
    TimedOut,
    /// Stopped by an error.
    Failed,
}

impl RunState {
    /// Whether the pipeline has finished, one way or the other.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::TimedOut | RunState::Failed)
    }
}

impl From<Status> for RunState {
    fn from(status: Status) -> Self {
        match status {
            Status::Completed => RunState::Completed,
            Status::TimedOut => RunState::TimedOut,
            Status::Failed => RunState::Failed,
        }
    }
}

/// What a caller gets back.
///
/// Only a `Completed` outcome carries sections and results; the others carry
/// the error and nothing that could be mistaken for output.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// How the run ended.
    pub status: Status,
    /// Document sections, in `start_line` order.
    pub sections: Vec<Section>,
    /// Collector results, in registration order.
    pub results: Vec<CollectorResult>,
    /// Dispatch counters.  Zero unless dispatch completed.
    pub stats: DispatchStats,
    /// Why the run did not complete.
    pub error: Option<Error>,
}

impl ParseOutcome {
    fn completed(sections: Vec<Section>, results: Vec<CollectorResult>, stats: DispatchStats) -> Self {
        ParseOutcome {
            status: Status::Completed,
            sections,
            results,
            stats,
            error: None,
        }
    }

    pub(crate) fn stopped(error: Error) -> Self {
        let status = if error == Error::TimedOut {
            Status::TimedOut
        } else {
            Status::Failed
        };
        ParseOutcome {
            status,
            sections: Vec::new(),
            results: Vec::new(),
            stats: DispatchStats::default(),
            error: Some(error),
        }
    }

    /// The result of the collector called `name`.
    pub fn result(&self, name: &str) -> Option<&serde_json::Value> {
        self.results
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.result)
    }
}

/// One document's run.  Collectors are registered while idle and consumed by
/// [`Pipeline::run`].
pub struct Pipeline<'c, T: Tokenizer = CommonMark> {
    tokenizer: T,
    options: Options,
    dispatcher: Option<Dispatcher<'c>>,
    state: RunState,
}

impl<'c> Pipeline<'c, CommonMark> {
    /// A pipeline using the CommonMark tokenizer configured by `options`.
    pub fn new(options: Options) -> Self {
        let tokenizer = CommonMark::new(options.tokenizer);
        Pipeline::with_tokenizer(tokenizer, options)
    }
}

impl<'c, T: Tokenizer> Pipeline<'c, T> {
    /// A pipeline using `tokenizer`.
    pub fn with_tokenizer(tokenizer: T, options: Options) -> Self {
        let dispatcher = Dispatcher::new().check_interval(options.limits.check_interval);
        Pipeline {
            tokenizer,
            options,
            dispatcher: Some(dispatcher),
            state: RunState::Idle,
        }
    }

    /// Register a collector; `false` if its name is taken or the pipeline is
    /// no longer idle.
    pub fn register<C: Collector + 'c>(&mut self, collector: C) -> bool {
        self.register_boxed(Box::new(collector))
    }

    /// Register an already boxed collector.
    pub fn register_boxed(&mut self, collector: Box<dyn Collector + 'c>) -> bool {
        match (&mut self.dispatcher, self.state) {
            (Some(dispatcher), RunState::Idle) => dispatcher.register_boxed(collector),
            _ => false,
        }
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The options in effect.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Run over `raw`.
    ///
    /// # Panics
    ///
    /// If called more than once; collectors are single-use.
    pub fn run(&mut self, raw: &str) -> ParseOutcome {
        let dispatcher = match (self.state, self.dispatcher.take()) {
            (RunState::Idle, Some(dispatcher)) => dispatcher,
            (state, _) => panic!("a pipeline runs once; this one is {:?}", state),
        };

        self.state = RunState::Running;
        let deadline = Deadline::start(self.options.deadline.budget, self.options.deadline.strategy);
        let outcome = match self.execute(raw, dispatcher, &deadline) {
            Ok(outcome) => outcome,
            Err(error) => ParseOutcome::stopped(error),
        };
        drop(deadline);

        self.state = outcome.status.into();
        outcome
    }

    fn execute(
        &self,
        raw: &str,
        mut dispatcher: Dispatcher<'c>,
        deadline: &Deadline,
    ) -> Result<ParseOutcome, Error> {
        let limits = self.options.limits;
        if raw.len() > limits.max_input_bytes {
            return Err(Error::InputTooLarge {
                size: raw.len(),
                limit: limits.max_input_bytes,
            });
        }

        deadline.check()?;
        let source = Source::new(raw);
        deadline.check()?;

        if let Some(bound) = self.tokenizer.depth_bound(source.text()) {
            if bound.depth > limits.max_nesting {
                return Err(Error::SourceTooDeep {
                    line: bound.line,
                    limit: limits.max_nesting,
                });
            }
        }

        let tokens = self.tokenizer.tokenize(source.text());
        deadline.check()?;

        let indexes = IndexBuilder::new(&tokens)
            .limits(limits)
            .line_count(source.line_count())
            .deadline(deadline)
            .build()?;
        let locator = indexes.locator();

        let stats = dispatcher.dispatch_all(&tokens, &indexes, &locator, deadline)?;
        deadline.check()?;

        let results = dispatcher.finalize();
        // Results finished after the deadline are discarded, not reported.
        deadline.check()?;

        Ok(ParseOutcome::completed(
            indexes.sections().to_vec(),
            results,
            stats,
        ))
    }
}

impl<'c, T: Tokenizer> fmt::Debug for Pipeline<'c, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .field("dispatcher", &self.dispatcher)
            .field("state", &self.state)
            .finish()
    }
}

/// Parse `raw` with the CommonMark tokenizer, dispatching to `collectors` in
/// order.
///
/// ```
/// # use markpass::{collectors, parse, Options, Status};
/// let options = Options::default();
/// let outcome = parse(
///     "# Title\n\nSee [docs](https://example.com).\n",
///     collectors::by_names(&["links"], &options).unwrap(),
///     &options,
/// );
/// assert_eq!(outcome.status, Status::Completed);
/// assert_eq!(outcome.sections[0].title, "Title");
/// ```
pub fn parse(raw: &str, collectors: Vec<Box<dyn Collector + '_>>, options: &Options) -> ParseOutcome {
    let mut pipeline = Pipeline::new(options.clone());
    for collector in collectors {
        pipeline.register_boxed(collector);
    }
    pipeline.run(raw)
}

/// Parse independent documents in parallel.  `factory` supplies a fresh set
/// of collectors per document; outcomes are in input order.
pub fn parse_many<S, F>(documents: &[S], factory: F, options: &Options) -> Vec<ParseOutcome>
where
    S: AsRef<str> + Sync,
    F: Fn() -> Vec<Box<dyn Collector>> + Sync,
{
    documents
        .par_iter()
        .map(|document| parse(document.as_ref(), factory(), options))
        .collect()
}
