use crate::config::FailurePolicy;
use crate::error::BatchError;
use crate::submission::SequenceNumber;
use crate::traits::OperatorPrompt;
use async_trait::async_trait;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Whether a run goes on after a failed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Continue,
    Halt,
}

/// What the operator (or the log) is told about a failed batch
#[derive(Debug, Clone)]
pub struct FailureNotice {
    pub batch_number: usize,
    pub batch_size: usize,
    pub sequence_number: SequenceNumber,
    pub error: BatchError,
}

impl FailureNotice {
    pub fn summary(&self) -> String {
        format!(
            "Batch #{} ({} items, seq {}) failed: {}",
            self.batch_number, self.batch_size, self.sequence_number, self.error
        )
    }
}

/// Maps the configured policy to a decision for one failure
pub async fn resolve(
    policy: FailurePolicy,
    prompt: Option<&dyn OperatorPrompt>,
    notice: &FailureNotice,
) -> PolicyDecision {
    match policy {
        FailurePolicy::Halt => PolicyDecision::Halt,
        FailurePolicy::ResyncAndContinue => PolicyDecision::Continue,
        FailurePolicy::PromptOperator => match prompt {
            Some(prompt) => prompt.decide(notice).await,
            None => {
                warn!("prompt-operator policy without a prompt attached, halting");
                PolicyDecision::Halt
            }
        },
    }
}

/// Interactive yes/no on the terminal
///
/// A cancelled run halts without waiting for the answer.
#[derive(Debug, Default, Clone)]
pub struct ConsolePrompt {
    cancel: Option<CancellationToken>,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[async_trait]
impl OperatorPrompt for ConsolePrompt {
    async fn decide(&self, notice: &FailureNotice) -> PolicyDecision {
        let question = format!("{} - continue with the next batch?", notice.summary());

        let answer = async move {
            let answer = tokio::task::spawn_blocking(move || {
                Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt(question)
                    .default(false)
                    .interact()
            })
            .await;
            interpret(answer)
        };

        unless_cancelled(self.cancel.as_ref(), answer).await
    }
}

/// Races an operator answer against cancellation, which halts
///
/// The blocking terminal read keeps running until it returns; only its
/// answer is dropped.
pub(crate) async fn unless_cancelled(
    cancel: Option<&CancellationToken>,
    answer: impl Future<Output = PolicyDecision>,
) -> PolicyDecision {
    let Some(cancel) = cancel else {
        return answer.await;
    };

    tokio::select! {
        decision = answer => decision,
        _ = cancel.cancelled() => {
            warn!("Run cancelled while waiting for the operator, halting");
            PolicyDecision::Halt
        }
    }
}

fn interpret(
    answer: Result<Result<bool, dialoguer::Error>, tokio::task::JoinError>,
) -> PolicyDecision {
    match answer {
        Ok(Ok(true)) => PolicyDecision::Continue,
        Ok(Ok(false)) => PolicyDecision::Halt,
        Ok(Err(e)) => {
            error!("Operator prompt failed: {}. Halting.", e);
            PolicyDecision::Halt
        }
        Err(e) => {
            error!("Operator prompt task panicked: {}. Halting.", e);
            PolicyDecision::Halt
        }
    }
}

/// Answers from a fixed list, then falls back to halting
///
/// Useful for unattended runs and tests.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<PolicyDecision>>,
    asked: Mutex<Vec<usize>>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = PolicyDecision>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Batch numbers the prompt was consulted for, in order
    pub fn asked(&self) -> Vec<usize> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OperatorPrompt for ScriptedPrompt {
    async fn decide(&self, notice: &FailureNotice) -> PolicyDecision {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(notice.batch_number);
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or(PolicyDecision::Halt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::TxHandle;

    fn notice() -> FailureNotice {
        FailureNotice {
            batch_number: 2,
            batch_size: 40,
            sequence_number: 17,
            error: BatchError::TransactionRejected {
                handle: TxHandle::new("abc"),
                reason: "out of storage".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_fixed_policies_ignore_prompt() {
        let prompt = ScriptedPrompt::new([PolicyDecision::Continue]);
        assert_eq!(
            resolve(FailurePolicy::Halt, Some(&prompt), &notice()).await,
            PolicyDecision::Halt
        );
        assert_eq!(
            resolve(FailurePolicy::ResyncAndContinue, None, &notice()).await,
            PolicyDecision::Continue
        );
        assert!(prompt.asked().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_policy_consults_prompt() {
        let prompt = ScriptedPrompt::new([PolicyDecision::Continue]);
        let first = resolve(FailurePolicy::PromptOperator, Some(&prompt), &notice()).await;
        let second = resolve(FailurePolicy::PromptOperator, Some(&prompt), &notice()).await;

        assert_eq!(first, PolicyDecision::Continue);
        assert_eq!(second, PolicyDecision::Halt);
        assert_eq!(prompt.asked(), vec![2, 2]);
    }

    #[tokio::test]
    async fn test_prompt_policy_without_prompt_halts() {
        assert_eq!(
            resolve(FailurePolicy::PromptOperator, None, &notice()).await,
            PolicyDecision::Halt
        );
    }

    #[test]
    fn test_notice_summary() {
        let text = notice().summary();
        assert!(text.contains("Batch #2"));
        assert!(text.contains("seq 17"));
        assert!(text.contains("out of storage"));
    }

    #[tokio::test]
    async fn test_cancellation_halts_a_pending_answer() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        // an operator who never answers
        let decision = unless_cancelled(Some(&token), std::future::pending()).await;
        assert_eq!(decision, PolicyDecision::Halt);
    }

    #[tokio::test]
    async fn test_answer_wins_without_cancellation() {
        let token = CancellationToken::new();
        let decision = unless_cancelled(Some(&token), async { PolicyDecision::Continue }).await;
        assert_eq!(decision, PolicyDecision::Continue);

        let decision = unless_cancelled(None, async { PolicyDecision::Continue }).await;
        assert_eq!(decision, PolicyDecision::Continue);
    }

    #[test]
    fn test_prompt_errors_halt() {
        assert_eq!(interpret(Ok(Ok(true))), PolicyDecision::Continue);
        assert_eq!(interpret(Ok(Ok(false))), PolicyDecision::Halt);
        let io = std::io::Error::new(std::io::ErrorKind::NotConnected, "not a terminal");
        assert_eq!(interpret(Ok(Err(dialoguer::Error::IO(io)))), PolicyDecision::Halt);
    }
}
