use core_logic::{is_transient_error, with_retry, LedgerError, RetryConfig, SubmissionError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_retry_success_first_try() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = RetryConfig::new(3, 10).without_jitter();

    let result: Result<String, anyhow::Error> = with_retry(&config, "test_op", || async {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("success".to_string())
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_success_after_failures() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = RetryConfig::new(3, 10).without_jitter();

    let result: Result<String, anyhow::Error> = with_retry(&config, "test_op", || async {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if count < 3 {
            Err(anyhow::anyhow!("temporary error"))
        } else {
            Ok("success".to_string())
        }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_all_failures_keep_typed_error() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = RetryConfig::new(3, 10).without_jitter();

    let result: Result<u64, LedgerError> = with_retry(&config, "sequence lookup", || async {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(LedgerError::Unreachable {
            reason: "connection refused".to_string(),
        })
    })
    .await;

    assert!(matches!(result, Err(LedgerError::Unreachable { .. })));
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_retry_with_delay() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = RetryConfig::new(2, 50).without_jitter();

    let start = tokio::time::Instant::now();
    let _: Result<String, anyhow::Error> = with_retry(&config, "test_op", || async {
        counter.fetch_add(1, Ordering::SeqCst);
        if counter.load(Ordering::SeqCst) < 3 {
            Err(anyhow::anyhow!("temp"))
        } else {
            Ok("done".to_string())
        }
    })
    .await;

    // 50ms + 100ms of backoff
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(150));
}

#[test]
fn test_delay_is_capped() {
    let config = RetryConfig::new(10, 100).with_max_delay(400).without_jitter();
    assert_eq!(config.delay_for(0), Duration::from_millis(100));
    assert_eq!(config.delay_for(1), Duration::from_millis(200));
    assert_eq!(config.delay_for(5), Duration::from_millis(400));
}

#[test]
fn test_transient_error_detection() {
    let timeout_error = anyhow::anyhow!("Request timeout");
    let rate_limit_error = anyhow::anyhow!("429 Too Many Requests");
    let reset_error = anyhow::anyhow!("error sending request: connection reset by peer");
    let permanent_error = anyhow::anyhow!("[Error Code: 1006] invalid proposal key");

    assert!(is_transient_error(&timeout_error));
    assert!(is_transient_error(&rate_limit_error));
    assert!(is_transient_error(&reset_error));
    assert!(!is_transient_error(&permanent_error));
}

#[test]
fn test_transient_error_case_insensitive() {
    let timeout_upper = anyhow::anyhow!("TIMEOUT");
    let timeout_mixed = anyhow::anyhow!("TiMeOuT");

    assert!(is_transient_error(&timeout_upper));
    assert!(is_transient_error(&timeout_mixed));
}

#[test]
fn test_submission_error_transience() {
    assert!(SubmissionError::Timeout { timeout_ms: 1000 }.is_transient());
    assert!(SubmissionError::Transport {
        reason: "Service Unavailable".to_string()
    }
    .is_transient());
    assert!(!SubmissionError::Transport {
        reason: "flow: command not found".to_string()
    }
    .is_transient());
    assert!(!SubmissionError::Rejected {
        reason: "timeout in cadence".to_string()
    }
    .is_transient());
}
