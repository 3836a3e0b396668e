//! Generator invocation wrapper: deadline, single retry, context budget.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use tariffbot_core::config::GeneratorConfig;
use tariffbot_core::types::RetrievedPassage;

use crate::error::GeneratorError;
use crate::generator::AnswerGenerator;

/// Calls beyond the first for a transient failure.
const MAX_RETRIES: usize = 1;

/// Wraps an [`AnswerGenerator`] with the per-request call policy.
#[derive(Clone)]
pub struct GuardedGenerator {
    inner: Arc<dyn AnswerGenerator>,
    timeout: Duration,
    max_context_chars: usize,
}

impl GuardedGenerator {
    pub fn new(inner: Arc<dyn AnswerGenerator>, config: &GeneratorConfig) -> Self {
        Self {
            inner,
            timeout: Duration::from_secs(config.timeout_secs),
            max_context_chars: config.max_context_chars,
        }
    }

    /// Call the generator with passages joined into a bounded context.
    ///
    /// Each attempt is bounded by the timeout. A transient failure is retried
    /// once; any other failure is returned immediately.
    pub async fn generate(
        &self,
        query: &str,
        passages: &[RetrievedPassage],
    ) -> Result<String, GeneratorError> {
        let context = build_context(passages, self.max_context_chars);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.timeout, self.inner.generate(query, &context)).await {
                Ok(result) => result,
                Err(_) => Err(GeneratorError::Timeout(self.timeout.as_secs())),
            };

            match result {
                Ok(text) => {
                    debug!(attempt, "Generator call succeeded");
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt <= MAX_RETRIES => {
                    warn!(attempt, error = %e, "Transient generator failure, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for GuardedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedGenerator")
            .field("timeout", &self.timeout)
            .field("max_context_chars", &self.max_context_chars)
            .finish()
    }
}

/// Join passages in rank order, never exceeding `max_chars` characters.
///
/// The first passage that would overflow is cut at a character boundary and
/// everything after it is dropped.
pub fn build_context(passages: &[RetrievedPassage], max_chars: usize) -> String {
    const SEPARATOR: &str = "\n\n";

    let mut context = String::new();
    let mut used = 0;
    for passage in passages {
        let sep = if context.is_empty() { 0 } else { SEPARATOR.len() };
        let remaining = max_chars.saturating_sub(used + sep);
        if remaining == 0 {
            break;
        }
        if sep > 0 {
            context.push_str(SEPARATOR);
            used += sep;
        }

        let len = passage.text.chars().count();
        if len <= remaining {
            context.push_str(&passage.text);
            used += len;
        } else {
            context.extend(passage.text.chars().take(remaining));
            break;
        }
    }
    context
}
