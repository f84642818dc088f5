use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use strum_macros::Display as StrumDisplay;
use tracing::{debug, info, instrument};

use super::observer::RunnerObserver;
use super::test_case::{TestAction, TestCase};
use crate::error::SessionError;
use crate::handlers::{
    CodecError, DefaultInterpreter, FillStoreInterpreter, Interpretation, PacketCodec, Request,
    ResponseInterpreter, Verdict,
};
use crate::protocol::MAX_STORABLE_PWD;

/// Counters shared between the runner and the active interpreter.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RunnerState {
    test_index: usize,
    pass_count: usize,
    stored_count: usize,
    max_storable: usize,
}

impl Default for RunnerState {
    fn default() -> Self {
        Self {
            test_index: 0,
            pass_count: 0,
            stored_count: 0,
            max_storable: MAX_STORABLE_PWD,
        }
    }
}

impl RunnerState {
    #[must_use]
    pub fn test_index(&self) -> usize {
        self.test_index
    }

    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    /// Passwords the device acknowledged storing during this run.
    #[must_use]
    pub fn stored_count(&self) -> usize {
        self.stored_count
    }

    #[must_use]
    pub fn max_storable(&self) -> usize {
        self.max_storable
    }

    /// Records one acknowledged store.
    pub fn record_stored(&mut self) {
        self.stored_count += 1;
    }
}

/// Lifecycle of a [`TestRunner`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, StrumDisplay)]
pub enum RunnerPhase {
    #[strum(to_string = "idle")]
    Idle,
    #[strum(to_string = "awaiting device response")]
    AwaitingDeviceResponse,
    #[strum(to_string = "advancing")]
    Advancing,
    #[strum(to_string = "finished")]
    Finished,
}

/// Final pass count over the whole plan.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct Tally {
    passed: usize,
    total: usize,
}

impl Tally {
    #[must_use]
    pub fn passed(&self) -> usize {
        self.passed
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

impl Display for Tally {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.passed, self.total)
    }
}

/// I/O the caller must perform next.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NextAction {
    /// Connect to the device and subscribe to notifications.
    Connect,
    /// Write this request, then wait for a notification.
    Send(Request),
    /// Nothing to do until the next notification arrives.
    Wait,
    /// The plan is complete; disconnect.
    Finished(Tally),
}

/// Sans-IO state machine that walks a test plan.
///
/// The runner never performs I/O. Each input method returns the
/// [`NextAction`] the driver must carry out.
#[derive(Debug)]
pub struct TestRunner {
    plan: Vec<TestCase>,
    state: RunnerState,
    phase: RunnerPhase,
    interpreter: Option<Box<dyn ResponseInterpreter>>,
    verdicts: Vec<Verdict>,
}

impl TestRunner {
    /// Creates a runner for a non-empty plan.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptyPlan`] when `plan` has no test cases.
    pub fn new(plan: Vec<TestCase>) -> Result<Self, SessionError> {
        if plan.is_empty() {
            return Err(SessionError::EmptyPlan);
        }

        Ok(Self {
            verdicts: Vec::with_capacity(plan.len()),
            plan,
            state: RunnerState::default(),
            phase: RunnerPhase::Idle,
            interpreter: None,
        })
    }

    #[must_use]
    pub fn phase(&self) -> RunnerPhase {
        self.phase
    }

    #[must_use]
    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    #[must_use]
    pub fn plan(&self) -> &[TestCase] {
        &self.plan
    }

    /// Verdicts recorded so far, in plan order.
    #[must_use]
    pub fn verdicts(&self) -> &[Verdict] {
        &self.verdicts
    }

    /// Activates the first test case.
    pub fn start(&mut self, observer: &mut dyn RunnerObserver) -> NextAction {
        if self.phase != RunnerPhase::Idle {
            debug!(phase = %self.phase, "ignoring start outside idle phase");
            return NextAction::Wait;
        }
        self.begin_current(observer)
    }

    /// Reports that the connect step succeeded.
    pub fn on_connected(&mut self, observer: &mut dyn RunnerObserver) -> NextAction {
        if self.phase != RunnerPhase::AwaitingDeviceResponse
            || !matches!(self.current_action(), Some(TestAction::Connect))
        {
            debug!(phase = %self.phase, "ignoring unexpected connection event");
            return NextAction::Wait;
        }
        self.finish_current(Verdict::Match, observer)
    }

    /// Feeds one inbound notification payload to the active interpreter.
    #[instrument(skip_all, level = "debug", fields(test_index = self.state.test_index, payload_len = payload.len()))]
    pub fn on_notification(
        &mut self,
        payload: &[u8],
        observer: &mut dyn RunnerObserver,
    ) -> NextAction {
        if self.phase != RunnerPhase::AwaitingDeviceResponse {
            debug!(phase = %self.phase, "ignoring notification");
            return NextAction::Wait;
        }
        let Some(interpreter) = self.interpreter.as_mut() else {
            debug!("ignoring notification without an active interpreter");
            return NextAction::Wait;
        };

        let decoded = PacketCodec::decode_response(payload);
        match interpreter.interpret(decoded, &mut self.state) {
            Interpretation::Verdict(verdict) => self.finish_current(verdict, observer),
            Interpretation::Continue(request) => {
                observer.storage_progress(self.state.stored_count, self.state.max_storable);
                NextAction::Send(request)
            }
        }
    }

    /// Reports that a request could not be encoded; the active test fails.
    pub fn on_request_unencodable(
        &mut self,
        error: &CodecError,
        observer: &mut dyn RunnerObserver,
    ) -> NextAction {
        if self.phase != RunnerPhase::AwaitingDeviceResponse {
            return NextAction::Wait;
        }
        self.finish_current(
            Verdict::ProtocolError {
                reason: error.to_string(),
            },
            observer,
        )
    }

    /// Reports a failed packet write. The active test stalls.
    pub fn on_send_failed(&mut self) -> NextAction {
        debug!(test_index = self.state.test_index, "test stalled after send failure");
        NextAction::Wait
    }

    fn current_action(&self) -> Option<&TestAction> {
        self.plan.get(self.state.test_index).map(TestCase::action)
    }

    fn begin_current(&mut self, observer: &mut dyn RunnerObserver) -> NextAction {
        let index = self.state.test_index;
        let Some(case) = self.plan.get(index) else {
            return self.finish_plan(observer);
        };
        observer.test_started(index, case);
        self.phase = RunnerPhase::AwaitingDeviceResponse;

        match case.action().clone() {
            TestAction::Connect => {
                self.interpreter = None;
                NextAction::Connect
            }
            TestAction::Exchange { request, expected } => {
                self.interpreter = Some(Box::new(DefaultInterpreter::new(expected)));
                NextAction::Send(request)
            }
            TestAction::FillStorage => {
                let mut interpreter = FillStoreInterpreter::default();
                match interpreter.next_request(&self.state) {
                    Ok(request) => {
                        self.interpreter = Some(Box::new(interpreter));
                        NextAction::Send(request)
                    }
                    Err(error) => self.on_request_unencodable(&error, observer),
                }
            }
        }
    }

    fn finish_current(&mut self, verdict: Verdict, observer: &mut dyn RunnerObserver) -> NextAction {
        self.phase = RunnerPhase::Advancing;
        self.interpreter = None;

        let index = self.state.test_index;
        if verdict.is_pass() {
            self.state.pass_count += 1;
        }
        info!(test_index = index, %verdict, "test finished");
        if let Some(case) = self.plan.get(index) {
            observer.test_finished(index, case, &verdict);
        }
        self.verdicts.push(verdict);

        self.state.test_index += 1;
        self.begin_current(observer)
    }

    fn finish_plan(&mut self, observer: &mut dyn RunnerObserver) -> NextAction {
        self.phase = RunnerPhase::Finished;
        let tally = Tally {
            passed: self.state.pass_count,
            total: self.plan.len(),
        };
        info!(%tally, "test plan finished");
        observer.finished(&tally);
        NextAction::Finished(tally)
    }
}
