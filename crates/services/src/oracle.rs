//! Recognition oracle contract and a scripted stand-in.
//!
//! The session owns all mutable lesson state; an oracle only answers
//! "did this attempt at `item` pass?".

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lesson_core::model::ItemName;
use lesson_core::session::Verdict;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Judges one attempt. `attempt` is 0 for the first try at `item` in a session.
#[async_trait]
pub trait RecognitionOracle: Send + Sync {
    async fn judge(&self, item: &ItemName, attempt: u32) -> Verdict;
}

/// Pass/fail rule used by [`ScriptedOracle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OraclePolicy {
    AlwaysPass,
    /// Fail the first `n` attempts at each listed item, pass everything else.
    FailFirst(HashMap<ItemName, u32>),
    /// Replay outcomes in call order, then pass.
    Sequence(Vec<bool>),
}

impl OraclePolicy {
    #[must_use]
    pub fn fail_once(item: ItemName) -> Self {
        Self::FailFirst(HashMap::from([(item, 1)]))
    }
}

/// Reference oracle with a configurable policy and random display confidence.
pub struct ScriptedOracle {
    policy: OraclePolicy,
    latency: Duration,
    calls: AtomicUsize,
    rng: Mutex<StdRng>,
}

impl ScriptedOracle {
    #[must_use]
    pub fn new(policy: OraclePolicy) -> Self {
        Self {
            policy,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Fix the confidence sequence for reproducible runs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Simulated processing time before each verdict.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn decide(&self, item: &ItemName, attempt: u32, call: usize) -> bool {
        match &self.policy {
            OraclePolicy::AlwaysPass => true,
            OraclePolicy::FailFirst(failures) => {
                failures.get(item).is_none_or(|&fail_count| attempt >= fail_count)
            }
            OraclePolicy::Sequence(script) => script.get(call).copied().unwrap_or(true),
        }
    }

    fn confidence(&self, passed: bool) -> u8 {
        let range: RangeInclusive<u8> = if passed { 80..=100 } else { 20..=49 };
        match self.rng.lock() {
            Ok(mut rng) => rng.random_range(range),
            // A poisoned RNG only affects display; fall back to the low bound.
            Err(_) => *range.start(),
        }
    }
}

#[async_trait]
impl RecognitionOracle for ScriptedOracle {
    async fn judge(&self, item: &ItemName, attempt: u32) -> Verdict {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let passed = self.decide(item, attempt, call);
        let confidence = self.confidence(passed);
        tracing::debug!(item = %item, attempt, passed, confidence, "scripted verdict");
        if passed {
            Verdict::pass(confidence)
        } else {
            Verdict::fail(confidence)
        }
    }
}

/// Adapts a plain decision function into an oracle.
pub struct DecisionOracle<F> {
    decide: F,
}

impl<F> DecisionOracle<F>
where
    F: Fn(&ItemName, u32) -> Verdict + Send + Sync,
{
    #[must_use]
    pub fn new(decide: F) -> Self {
        Self { decide }
    }
}

#[async_trait]
impl<F> RecognitionOracle for DecisionOracle<F>
where
    F: Fn(&ItemName, u32) -> Verdict + Send + Sync,
{
    async fn judge(&self, item: &ItemName, attempt: u32) -> Verdict {
        (self.decide)(item, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> ItemName {
        ItemName::new(name).unwrap()
    }

    #[tokio::test]
    async fn fail_first_fails_only_listed_item_once() {
        let oracle = ScriptedOracle::new(OraclePolicy::fail_once(item("Help"))).with_seed(7);

        let first = oracle.judge(&item("Help"), 0).await;
        assert!(!first.passed);
        assert!((20..=49).contains(&first.confidence));

        let retry = oracle.judge(&item("Help"), 1).await;
        assert!(retry.passed);
        assert!((80..=100).contains(&retry.confidence));

        assert!(oracle.judge(&item("Yes"), 0).await.passed);
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn sequence_replays_then_passes() {
        let oracle = ScriptedOracle::new(OraclePolicy::Sequence(vec![false, true, false]));
        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(oracle.judge(&item("No"), 0).await.passed);
        }
        assert_eq!(outcomes, [false, true, false, true, true]);
    }

    #[tokio::test]
    async fn seeded_confidence_is_reproducible() {
        let a = ScriptedOracle::new(OraclePolicy::AlwaysPass).with_seed(42);
        let b = ScriptedOracle::new(OraclePolicy::AlwaysPass).with_seed(42);
        for n in 0..4 {
            assert_eq!(
                a.judge(&item("Yes"), n).await,
                b.judge(&item("Yes"), n).await
            );
        }
    }

    #[tokio::test]
    async fn decision_function_is_injectable() {
        let oracle = DecisionOracle::new(|item: &ItemName, attempt| {
            if item.as_str() == "No" && attempt == 0 {
                Verdict::fail(10)
            } else {
                Verdict::pass(95)
            }
        });
        assert_eq!(oracle.judge(&item("No"), 0).await, Verdict::fail(10));
        assert_eq!(oracle.judge(&item("No"), 1).await, Verdict::pass(95));
    }
}
