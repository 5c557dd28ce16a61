//! Helpers for driving functions in tests.

use std::time::Duration;

use tandem_bridge::{Bridge, BridgeBuilder, BridgeError, BridgeResult, Func, HostValue};
use tokio::sync::oneshot;

use crate::script::ScriptCompiler;

/// Upper bound on how long [`call_and_wait`] waits for a completion.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Honors `RUST_LOG`; output goes through the test harness capture.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A builder around [`ScriptCompiler`].
#[must_use]
pub fn script_builder() -> BridgeBuilder {
    Bridge::builder(ScriptCompiler::new())
}

/// A bridge around [`ScriptCompiler`] with default configuration.
///
/// # Errors
///
/// Returns [`BridgeError::Worker`] if no worker runtime can be started.
pub fn script_bridge() -> BridgeResult<Bridge> {
    script_builder().build()
}

/// Invoke `func` through its completion callback and wait for the single
/// completion.
///
/// # Errors
///
/// Returns whatever the completion carried, or a runtime error if nothing
/// arrives within [`COMPLETION_TIMEOUT`].
pub async fn call_and_wait(func: &Func, input: impl Into<HostValue>) -> BridgeResult<HostValue> {
    let (tx, rx) = oneshot::channel();
    func.call(input, move |result| {
        let _ = tx.send(result);
    });
    match tokio::time::timeout(COMPLETION_TIMEOUT, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(BridgeError::runtime("completion callback never fired")),
        Err(_) => Err(BridgeError::runtime("timed out waiting for completion")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ASYNC_LAMBDA, THROWING_CLASS};

    #[tokio::test]
    async fn test_call_and_wait_delivers_result() {
        init_test_logging();
        let bridge = script_bridge().unwrap();
        let func = bridge.func(ASYNC_LAMBDA).unwrap();
        let result = call_and_wait(&func, "JavaScript").await.unwrap();
        assert_eq!(result.as_str(), Some("Hello, JavaScript"));
    }

    #[tokio::test]
    async fn test_call_and_wait_delivers_error() {
        let bridge = script_bridge().unwrap();
        let func = bridge.func(THROWING_CLASS).unwrap();
        let err = call_and_wait(&func, HostValue::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "Test error");
    }
}
