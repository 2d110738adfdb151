//! Per-request deadline propagation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Deadline carried by one inbound feed, publish or search call.
///
/// Every collaborator call made on behalf of the request is bounded by the
/// smaller of the remaining deadline and that call's own budget. Background
/// propagation jobs never inherit a request context.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context without a deadline; only per-call budgets apply.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Checks whether the deadline already passed.
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Child context limited to `1 / parts` of the remaining time.
    ///
    /// Calls made through the child leave the rest of the deadline to later
    /// calls on this context. Without a deadline the child has none either.
    pub fn portion(&self, parts: u32) -> Self {
        match self.remaining() {
            Some(left) => Self::with_timeout(left / parts.max(1)),
            None => Self::background(),
        }
    }

    /// Budget for one collaborator call.
    pub fn budget(&self, per_call: Duration) -> Duration {
        match self.remaining() {
            Some(left) => left.min(per_call),
            None => per_call,
        }
    }

    /// Runs `call` within this context's budget.
    ///
    /// # Errors
    ///
    /// Returns the call's own error, or `on_timeout()` once the budget is spent.
    pub async fn run<T, E, F>(
        &self,
        per_call: Duration,
        call: F,
        on_timeout: impl FnOnce() -> E,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let budget = self.budget(per_call);
        if budget.is_zero() {
            return Err(on_timeout());
        }

        match tokio::time::timeout(budget, call).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_without_deadline_is_per_call() {
        let ctx = RequestContext::background();
        assert_eq!(
            ctx.budget(Duration::from_millis(250)),
            Duration::from_millis(250)
        );
        assert!(!ctx.is_expired());
    }

    #[tokio::test]
    async fn test_budget_is_capped_by_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        assert!(ctx.budget(Duration::from_secs(10)) <= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_portion_leaves_rest_of_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(200));
        let half = ctx.portion(2);

        assert!(half.remaining().unwrap() <= Duration::from_millis(100));
        let result: Result<(), &str> = half
            .run(Duration::from_secs(5), std::future::pending(), || "timed out")
            .await;

        assert_eq!(result, Err("timed out"));
        assert!(ctx.remaining().unwrap() >= Duration::from_millis(50));
    }

    #[test]
    fn test_portion_without_deadline_is_unbounded() {
        let ctx = RequestContext::background().portion(2);
        assert!(ctx.deadline().is_none());
        assert!(RequestContext::background().portion(0).deadline().is_none());
    }

    #[tokio::test]
    async fn test_run_times_out_hanging_call() {
        let ctx = RequestContext::background();

        let result: Result<(), &str> = ctx
            .run(
                Duration::from_millis(20),
                std::future::pending(),
                || "timed out",
            )
            .await;

        assert_eq!(result, Err("timed out"));
    }

    #[tokio::test]
    async fn test_expired_context_fails_fast() {
        let ctx = RequestContext::with_deadline(Instant::now());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(ctx.is_expired());

        let result: Result<u32, &str> = ctx
            .run(Duration::from_secs(1), async { Ok(1) }, || "expired")
            .await;
        assert_eq!(result, Err("expired"));
    }

    #[tokio::test]
    async fn test_run_passes_through_result() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(5));
        let result: Result<u32, &str> = ctx
            .run(Duration::from_secs(1), async { Err("boom") }, || "timed out")
            .await;
        assert_eq!(result, Err("boom"));
    }
}
