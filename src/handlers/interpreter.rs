use std::fmt::{self, Debug, Display, Formatter};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::harness::{RunnerState, fill_request};
use crate::protocol::MAX_STORABLE_PWD;

use super::packet_codec::{CodecError, Request};
use super::response::{DeviceStatus, ExpectedTemplate, Response};

/// Store requests the fill scenario may issue without seeing "storage is full".
pub const FILL_REQUEST_GUARD: usize = 2 * MAX_STORABLE_PWD;

/// Terminal judgement for one test case.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verdict {
    /// The response matched the expected template.
    Match,
    /// A well-formed response carried a different key or value.
    Mismatch {
        expected: ExpectedTemplate,
        actual: Response,
    },
    /// The response could not be decoded.
    ProtocolError { reason: String },
    /// The device reported full storage before every slot was filled.
    StorageNotExhausted { stored: usize, capacity: usize },
    /// The device answered the fill scenario with neither "ok" nor "storage is full".
    UnexpectedFillResponse { actual: Response },
    /// The fill scenario hit the client-side request cap.
    FillGuardExceeded { requests: usize },
}

impl Verdict {
    /// Returns whether this verdict counts as a pass.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Match)
    }

    fn protocol_error(error: &CodecError) -> Self {
        Self::ProtocolError {
            reason: error.to_string(),
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match => f.write_str("passed"),
            Self::Mismatch { expected, actual } => write!(f, "expected {expected}, got {actual}"),
            Self::ProtocolError { reason } => write!(f, "protocol error: {reason}"),
            Self::StorageNotExhausted { stored, capacity } => write!(
                f,
                "storage reported full after {stored}/{capacity} stored passwords"
            ),
            Self::UnexpectedFillResponse { actual } => {
                write!(f, "unexpected response while filling storage: {actual}")
            }
            Self::FillGuardExceeded { requests } => {
                write!(f, "no \"storage is full\" after {requests} store requests")
            }
        }
    }
}

/// What the runner should do after one notification.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Interpretation {
    /// The active test case is decided.
    Verdict(Verdict),
    /// The active test case needs another exchange with this request.
    Continue(Request),
}

/// Maps one decoded notification onto the active test case.
pub trait ResponseInterpreter: Debug + Send {
    /// Interprets a decoded response, or the error that prevented decoding.
    fn interpret(
        &mut self,
        decoded: Result<Response, CodecError>,
        state: &mut RunnerState,
    ) -> Interpretation;
}

/// Compares each response against a single expected template.
#[derive(Debug, Clone)]
pub struct DefaultInterpreter {
    expected: ExpectedTemplate,
}

impl DefaultInterpreter {
    #[must_use]
    pub fn new(expected: ExpectedTemplate) -> Self {
        Self { expected }
    }
}

impl ResponseInterpreter for DefaultInterpreter {
    #[instrument(skip_all, level = "debug", fields(expected = %self.expected))]
    fn interpret(
        &mut self,
        decoded: Result<Response, CodecError>,
        state: &mut RunnerState,
    ) -> Interpretation {
        let response = match decoded {
            Ok(response) => response,
            Err(error) => {
                debug!(%error, "undecodable response");
                return Interpretation::Verdict(Verdict::protocol_error(&error));
            }
        };

        if !self.expected.matches(&response) {
            return Interpretation::Verdict(Verdict::Mismatch {
                expected: self.expected.clone(),
                actual: response,
            });
        }

        if response.is_status(&DeviceStatus::Ok) {
            state.record_stored();
        }
        Interpretation::Verdict(Verdict::Match)
    }
}

/// Stores passwords until the device reports full storage.
#[derive(Debug, Clone)]
pub struct FillStoreInterpreter {
    requests_issued: usize,
    request_guard: usize,
}

impl Default for FillStoreInterpreter {
    fn default() -> Self {
        Self::with_request_guard(FILL_REQUEST_GUARD)
    }
}

impl FillStoreInterpreter {
    #[must_use]
    pub fn with_request_guard(request_guard: usize) -> Self {
        Self {
            requests_issued: 0,
            request_guard,
        }
    }

    /// Builds the next fill request, parameterised by the stored count.
    ///
    /// # Errors
    ///
    /// Returns an error when the generated fields exceed the protocol limits.
    pub fn next_request(&mut self, state: &RunnerState) -> Result<Request, CodecError> {
        self.requests_issued += 1;
        fill_request(state.stored_count())
    }

    #[must_use]
    pub fn requests_issued(&self) -> usize {
        self.requests_issued
    }
}

impl ResponseInterpreter for FillStoreInterpreter {
    #[instrument(skip_all, level = "debug", fields(requests_issued = self.requests_issued))]
    fn interpret(
        &mut self,
        decoded: Result<Response, CodecError>,
        state: &mut RunnerState,
    ) -> Interpretation {
        let response = match decoded {
            Ok(response) => response,
            Err(error) => return Interpretation::Verdict(Verdict::protocol_error(&error)),
        };

        match response {
            Response::Status(DeviceStatus::Ok) => {
                state.record_stored();
                if self.requests_issued >= self.request_guard {
                    return Interpretation::Verdict(Verdict::FillGuardExceeded {
                        requests: self.requests_issued,
                    });
                }
                match self.next_request(state) {
                    Ok(request) => Interpretation::Continue(request),
                    Err(error) => Interpretation::Verdict(Verdict::protocol_error(&error)),
                }
            }
            Response::Status(DeviceStatus::StorageFull) => {
                let stored = state.stored_count();
                let capacity = state.max_storable();
                info!(stored, capacity, "device reported full storage");
                if stored == capacity {
                    Interpretation::Verdict(Verdict::Match)
                } else {
                    Interpretation::Verdict(Verdict::StorageNotExhausted { stored, capacity })
                }
            }
            actual => Interpretation::Verdict(Verdict::UnexpectedFillResponse { actual }),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::handlers::PacketCodec;

    fn decode(payload: &str) -> Result<Response, CodecError> {
        PacketCodec::decode_response(payload.as_bytes())
    }

    #[rstest]
    #[case(
        ExpectedTemplate::status(DeviceStatus::OperationRejected),
        r#"{"err":"operation rejected"}"#,
        0
    )]
    #[case(ExpectedTemplate::status(DeviceStatus::Ok), r#"{"err":"ok"}"#, 1)]
    #[case(ExpectedTemplate::status(DeviceStatus::Ok), r#"{"err":"ok","extra":1}"#, 1)]
    #[case(ExpectedTemplate::password("1234567890A"), r#"{"pwd":"1234567890A"}"#, 0)]
    fn default_interpreter_matches_and_counts_successful_stores(
        #[case] expected: ExpectedTemplate,
        #[case] payload: &str,
        #[case] stored: usize,
    ) {
        let mut state = RunnerState::default();
        let mut interpreter = DefaultInterpreter::new(expected);

        let interpretation = interpreter.interpret(decode(payload), &mut state);

        assert_eq!(Interpretation::Verdict(Verdict::Match), interpretation);
        assert_eq!(stored, state.stored_count());
    }

    #[rstest]
    #[case(ExpectedTemplate::status(DeviceStatus::Ok), r#"{"err":"operation rejected"}"#)]
    #[case(ExpectedTemplate::status(DeviceStatus::Ok), r#"{"pwd":"ok"}"#)]
    #[case(ExpectedTemplate::password("1234567890A"), r#"{"pwd":"1234567890"}"#)]
    fn default_interpreter_reports_mismatch_without_counting(
        #[case] expected: ExpectedTemplate,
        #[case] payload: &str,
    ) {
        let mut state = RunnerState::default();
        let mut interpreter = DefaultInterpreter::new(expected);

        let interpretation = interpreter.interpret(decode(payload), &mut state);

        assert_matches!(
            interpretation,
            Interpretation::Verdict(Verdict::Mismatch { .. })
        );
        assert_eq!(0, state.stored_count());
    }

    #[test]
    fn default_interpreter_reports_protocol_error_for_garbage() {
        let mut state = RunnerState::default();
        let mut interpreter = DefaultInterpreter::new(ExpectedTemplate::status(DeviceStatus::Ok));

        let interpretation = interpreter.interpret(decode("not json"), &mut state);

        assert_matches!(
            interpretation,
            Interpretation::Verdict(Verdict::ProtocolError { .. })
        );
        assert_eq!(0, state.stored_count());
    }

    #[test]
    fn fill_interpreter_continues_with_request_for_next_slot() {
        let mut state = RunnerState::default();
        state.record_stored();
        let mut interpreter = FillStoreInterpreter::default();
        let first = interpreter
            .next_request(&state)
            .expect("fill request should be valid");
        assert_eq!("1username@bhpmtest.com", first.user());

        let interpretation = interpreter.interpret(decode(r#"{"err":"ok"}"#), &mut state);

        assert_eq!(2, state.stored_count());
        assert_matches!(
            interpretation,
            Interpretation::Continue(request)
            if request.user() == "2username@bhpmtest.com"
                && request.pwd() == Some("extremelylongpassword2")
        );
    }

    #[rstest]
    #[case(MAX_STORABLE_PWD, Verdict::Match)]
    #[case(
        MAX_STORABLE_PWD - 1,
        Verdict::StorageNotExhausted { stored: MAX_STORABLE_PWD - 1, capacity: MAX_STORABLE_PWD }
    )]
    fn fill_interpreter_judges_full_storage_by_stored_count(
        #[case] stored: usize,
        #[case] expected: Verdict,
    ) {
        let mut state = RunnerState::default();
        for _ in 0..stored {
            state.record_stored();
        }
        let mut interpreter = FillStoreInterpreter::default();

        let interpretation =
            interpreter.interpret(decode(r#"{"err":"storage is full"}"#), &mut state);

        assert_eq!(Interpretation::Verdict(expected), interpretation);
    }

    #[rstest]
    #[case(r#"{"err":"operation rejected"}"#)]
    #[case(r#"{"pwd":"extremelylongpassword1"}"#)]
    fn fill_interpreter_fails_on_other_responses(#[case] payload: &str) {
        let mut state = RunnerState::default();
        let mut interpreter = FillStoreInterpreter::default();

        let interpretation = interpreter.interpret(decode(payload), &mut state);

        assert_matches!(
            interpretation,
            Interpretation::Verdict(Verdict::UnexpectedFillResponse { .. })
        );
        assert_eq!(0, state.stored_count());
    }

    #[test]
    fn fill_interpreter_stops_at_request_guard() {
        let mut state = RunnerState::default();
        let mut interpreter = FillStoreInterpreter::with_request_guard(2);
        interpreter
            .next_request(&state)
            .expect("fill request should be valid");

        let first = interpreter.interpret(decode(r#"{"err":"ok"}"#), &mut state);
        let second = interpreter.interpret(decode(r#"{"err":"ok"}"#), &mut state);

        assert_matches!(first, Interpretation::Continue(_));
        assert_eq!(
            Interpretation::Verdict(Verdict::FillGuardExceeded { requests: 2 }),
            second
        );
    }

    #[test]
    fn verdict_display_describes_mismatch() {
        let verdict = Verdict::Mismatch {
            expected: ExpectedTemplate::status(DeviceStatus::Ok),
            actual: Response::Status(DeviceStatus::OperationRejected),
        };

        insta::assert_snapshot!(
            verdict.to_string(),
            @r#"expected err "ok", got err "operation rejected""#
        );
    }
}
