//! Validation & retry state machine shared by every driver.
//!
//! ```text
//! PENDING -> REQUESTING -> VALIDATING -> ACCEPTED
//!                 |             |
//!                 +--> RETRY <--+   (while attempts < max)
//!                        |
//!                        +--> ABANDONED
//! ```
//!
//! A unit is one oracle request scope (a window, a chunk or a node). Its
//! failure never aborts the file: the caller records it and moves on.

use std::path::Path;

use fix_oracle::{CodeBlock, Conversation, FixOracle, require_code_block};
use serde::Serialize;
use tracing::{debug, warn};

use crate::artifacts::ArtifactSink;
use crate::errors::UnitError;
use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Pending,
    Requesting,
    Validating,
    Accepted,
    Retry,
    Abandoned,
}

/// Replacement produced by an accepted attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    pub replacement_text: String,
    pub accepted: bool,
    pub attempt: u32,
}

#[derive(Debug)]
pub enum UnitOutcome<T> {
    Accepted { value: T, patch: PatchResult },
    Abandoned { attempts: u32, error: UnitError },
}

impl<T> UnitOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            UnitOutcome::Accepted { patch, .. } => patch.attempt,
            UnitOutcome::Abandoned { attempts, .. } => *attempts,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, UnitOutcome::Accepted { .. })
    }
}

/// Everything a driver needs to run units against the oracle for one file.
pub struct UnitRunner<'a, O> {
    pub oracle: &'a O,
    pub policy: RetryPolicy,
    pub artifacts: &'a ArtifactSink,
    pub file: &'a Path,
}

impl<'a, O: FixOracle> UnitRunner<'a, O> {
    /// Drives one unit to ACCEPTED or ABANDONED.
    ///
    /// `validate` receives the extracted code block and either produces the
    /// value to apply or the reason to retry.
    pub async fn run<T>(
        &self,
        conversation: &mut Conversation,
        unit: &str,
        prompt: &str,
        mut validate: impl FnMut(&CodeBlock) -> Result<T, UnitError>,
    ) -> UnitOutcome<T> {
        let file = self.file.display();
        let mut state = UnitState::Pending;
        let mut last_error: Option<UnitError> = None;

        for attempt in 1..=self.policy.max_attempts {
            state = transition(&file, unit, attempt, state, UnitState::Requesting);

            let request = match &last_error {
                Some(e) => prompts::with_retry_hint(prompt, e),
                None => prompt.to_string(),
            };
            self.artifacts.unit_prompt(self.file, unit, attempt, &request);

            let block = match conversation.ask(self.oracle, &request).await {
                Ok(text) => {
                    self.artifacts.unit_response(self.file, unit, attempt, &text);
                    require_code_block(&text).map_err(UnitError::from)
                }
                Err(e) => Err(UnitError::from(e)),
            };

            let result = block.and_then(|b| {
                state = transition(&file, unit, attempt, state, UnitState::Validating);
                validate(&b).map(|value| (value, b))
            });

            match result {
                Ok((value, block)) => {
                    transition(&file, unit, attempt, state, UnitState::Accepted);
                    return UnitOutcome::Accepted {
                        value,
                        patch: PatchResult {
                            replacement_text: block.code,
                            accepted: true,
                            attempt,
                        },
                    };
                }
                Err(e) if !e.is_retryable() => {
                    transition(&file, unit, attempt, state, UnitState::Abandoned);
                    warn!(
                        %file,
                        unit,
                        attempt,
                        error = %e,
                        "unit abandoned: non-retryable failure"
                    );
                    return UnitOutcome::Abandoned {
                        attempts: attempt,
                        error: e,
                    };
                }
                Err(e) => {
                    debug!(%file, unit, attempt, error = %e, "attempt rejected");
                    state = transition(&file, unit, attempt, state, UnitState::Retry);
                    last_error = Some(e);
                }
            }
        }

        transition(
            &file,
            unit,
            self.policy.max_attempts,
            state,
            UnitState::Abandoned,
        );
        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        warn!(
            %file,
            unit,
            attempts = self.policy.max_attempts,
            %last,
            "unit abandoned: retry limit reached"
        );
        UnitOutcome::Abandoned {
            attempts: self.policy.max_attempts,
            error: UnitError::RetryExhausted {
                attempts: self.policy.max_attempts,
                last,
            },
        }
    }
}

fn transition(
    file: &impl std::fmt::Display,
    unit: &str,
    attempt: u32,
    from: UnitState,
    to: UnitState,
) -> UnitState {
    debug!(%file, unit, attempt, ?from, ?to, "unit transition");
    to
}

#[cfg(test)]
mod tests {
    use super::*;
    use fix_oracle::{OracleError, Turn};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Canned {
        replies: Mutex<VecDeque<Result<String, OracleError>>>,
        calls: AtomicU32,
    }

    impl Canned {
        fn new(replies: Vec<Result<String, OracleError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl FixOracle for Canned {
        async fn complete(&self, _turns: &[Turn]) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("no code here".to_string()))
        }
    }

    fn runner<'a>(oracle: &'a Canned, sink: &'a ArtifactSink, max: u32) -> UnitRunner<'a, Canned> {
        UnitRunner {
            oracle,
            policy: RetryPolicy::new(max),
            artifacts: sink,
            file: Path::new("src/a.js"),
        }
    }

    #[tokio::test]
    async fn always_malformed_hits_the_ceiling() {
        let oracle = Canned::new(Vec::new());
        let sink = ArtifactSink::disabled();
        let mut conv = Conversation::new();
        let out = runner(&oracle, &sink, 3)
            .run(&mut conv, "u", "fix", |_| Ok(()))
            .await;
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
        match out {
            UnitOutcome::Abandoned { attempts, error } => {
                assert_eq!(attempts, 3);
                assert!(matches!(error, UnitError::RetryExhausted { attempts: 3, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(conv.is_empty());
    }

    #[tokio::test]
    async fn validation_failure_retries_then_accepts() {
        let oracle = Canned::new(vec![
            Ok("```js\nbad\n```".into()),
            Err(OracleError::Timeout(std::time::Duration::from_secs(1))),
            Ok("```js\ngood\n```".into()),
        ]);
        let sink = ArtifactSink::disabled();
        let mut conv = Conversation::new();
        let out = runner(&oracle, &sink, 5)
            .run(&mut conv, "u", "fix", |b| {
                if b.code == "good" {
                    Ok(b.code.len())
                } else {
                    Err(UnitError::StructuralMismatch("not good".into()))
                }
            })
            .await;
        match out {
            UnitOutcome::Accepted { value, patch } => {
                assert_eq!(value, 4);
                assert_eq!(patch.attempt, 3);
                assert!(patch.accepted);
                assert_eq!(patch.replacement_text, "good");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_failure_stops_early() {
        let oracle = Canned::new(vec![Err(OracleError::from(
            fix_oracle::ConfigError::EmptyModel,
        ))]);
        let sink = ArtifactSink::disabled();
        let mut conv = Conversation::new();
        let out = runner(&oracle, &sink, 5)
            .run(&mut conv, "u", "fix", |_| Ok(()))
            .await;
        assert_eq!(out.attempts(), 1);
        assert!(!out.is_accepted());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }
}
