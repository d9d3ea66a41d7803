// Retry controller for extraction calls.
//
// Each call to the extraction service ends in one of five outcomes. The
// controller turns the sequence of outcomes into a state machine with a
// bounded attempt counter, so the caller's loop only has to ask "what
// now?" after every attempt:
//
//   Attempting ──Success──────────────► Succeeded
//       │  ──Empty (attempts left)────► SoftFailRetry ──resume──► Attempting
//       │  ──Parse/Transport (left)───► HardFailRetry ──resume──► Attempting
//       │  ──TokenLimit (top level)───► Reroute
//       └──any failure, none left─────► Exhausted
//
// Inside chunked mode a token-limit error cannot reroute again, so it is
// handled like any other transport failure.

use std::time::Duration;

/// What a single attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Parsed reply with at least one text segment.
    Success,
    /// Parsed reply with no text segments.
    Empty,
    /// Reply was not a JSON object of the expected shape.
    ParseFailure,
    /// The service rejected the prompt as too long.
    TokenLimit,
    /// Any other service or network error.
    Transport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting,
    SoftFailRetry,
    HardFailRetry,
    Reroute,
    Succeeded,
    Exhausted,
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded | RetryState::Exhausted | RetryState::Reroute
        )
    }
}

/// Attempt bound and backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_retries: u32,
    /// Fixed wait after an empty or unparseable reply.
    pub soft_delay: Duration,
    /// Transport failures wait `transport_base * 2^attempt`.
    pub transport_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            soft_delay: Duration::from_secs(2),
            transport_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// A policy that never sleeps. Used by tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            soft_delay: Duration::ZERO,
            transport_base: Duration::ZERO,
        }
    }
}

pub struct RetryController {
    policy: RetryPolicy,
    allow_reroute: bool,
    attempts: u32,
    state: RetryState,
    last_outcome: Option<AttemptOutcome>,
}

impl RetryController {
    /// `allow_reroute` is true for a whole-document call and false for a
    /// call on one chunk of an already-chunked document.
    pub fn new(policy: RetryPolicy, allow_reroute: bool) -> Self {
        Self {
            policy,
            allow_reroute,
            attempts: 0,
            state: RetryState::Attempting,
            last_outcome: None,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_retries(&self) -> u32 {
        self.policy.max_retries
    }

    pub fn last_outcome(&self) -> Option<AttemptOutcome> {
        self.last_outcome
    }

    /// Record the outcome of the attempt that just finished and advance.
    ///
    /// Recording while not in `Attempting` is a no-op that returns the
    /// current state.
    pub fn record(&mut self, outcome: AttemptOutcome) -> RetryState {
        if self.state != RetryState::Attempting {
            return self.state;
        }

        self.attempts += 1;
        self.last_outcome = Some(outcome);
        let attempts_left = self.attempts < self.policy.max_retries;

        self.state = match outcome {
            AttemptOutcome::Success => RetryState::Succeeded,
            AttemptOutcome::TokenLimit if self.allow_reroute => RetryState::Reroute,
            _ if !attempts_left => RetryState::Exhausted,
            AttemptOutcome::Empty => RetryState::SoftFailRetry,
            AttemptOutcome::ParseFailure
            | AttemptOutcome::TokenLimit
            | AttemptOutcome::Transport => RetryState::HardFailRetry,
        };
        self.state
    }

    /// How long to wait before the next attempt. Zero outside retry states.
    pub fn delay(&self) -> Duration {
        match (self.state, self.last_outcome) {
            (RetryState::SoftFailRetry, _)
            | (RetryState::HardFailRetry, Some(AttemptOutcome::ParseFailure)) => {
                self.policy.soft_delay
            }
            (RetryState::HardFailRetry, _) => {
                // attempts >= 1 here; the first retry waits the base delay
                let exponent = self.attempts.saturating_sub(1).min(16);
                self.policy.transport_base * 2u32.pow(exponent)
            }
            _ => Duration::ZERO,
        }
    }

    /// Leave a retry state and go back to `Attempting`.
    pub fn resume(&mut self) {
        if matches!(
            self.state,
            RetryState::SoftFailRetry | RetryState::HardFailRetry
        ) {
            self.state = RetryState::Attempting;
        }
    }
}

/// Does this error text mean the prompt exceeded the model's context?
/// Rate limits quoted in tokens ("tokens per min") are not context errors.
pub fn is_token_limit_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("maximum context length") || lower.contains("context_length")
}
