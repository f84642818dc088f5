use super::runner::Tally;
use super::test_case::TestCase;
use crate::handlers::Verdict;

/// Receives progress from a running test plan.
pub trait RunnerObserver {
    /// A test case became active; `index` is zero-based.
    fn test_started(&mut self, index: usize, case: &TestCase);

    /// A test case received its verdict.
    fn test_finished(&mut self, index: usize, case: &TestCase, verdict: &Verdict);

    /// The fill scenario stored another password.
    fn storage_progress(&mut self, stored: usize, capacity: usize);

    /// Every test case has a verdict.
    fn finished(&mut self, tally: &Tally);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl RunnerObserver for SilentObserver {
    fn test_started(&mut self, _index: usize, _case: &TestCase) {}

    fn test_finished(&mut self, _index: usize, _case: &TestCase, _verdict: &Verdict) {}

    fn storage_progress(&mut self, _stored: usize, _capacity: usize) {}

    fn finished(&mut self, _tally: &Tally) {}
}
