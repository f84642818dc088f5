use serde::Serialize;

use crate::handlers::{CodecError, DeviceStatus, ExpectedTemplate, Request};

const FILL_URL: &str = "https://bluetooth_hardware_password_manager.com";
const FILL_USER_SUFFIX: &str = "username@bhpmtest.com";
const FILL_PWD_PREFIX: &str = "extremelylongpassword";

const TEST_URL: &str = "https://test.com";
const TEST_USER: &str = "user@test.com";

/// What a test case does when it becomes active.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestAction {
    /// Connect to the device and enable notifications.
    Connect,
    /// Send one request and compare the reply with `expected`.
    Exchange {
        request: Request,
        expected: ExpectedTemplate,
    },
    /// Store passwords until the device reports full storage.
    FillStorage,
}

/// One row of the test plan.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TestCase {
    action: TestAction,
    steps: String,
    description: String,
}

impl TestCase {
    #[must_use]
    pub fn new(action: TestAction, steps: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            action,
            steps: steps.into(),
            description: description.into(),
        }
    }

    #[must_use]
    pub fn action(&self) -> &TestAction {
        &self.action
    }

    /// Instructions for the operator standing at the device.
    #[must_use]
    pub fn steps(&self) -> &str {
        &self.steps
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Builds the fill-scenario store request for slot `stored`.
///
/// ```
/// let request = bhpm::fill_request(3)?;
/// assert_eq!("3username@bhpmtest.com", request.user());
/// assert_eq!(Some("extremelylongpassword3"), request.pwd());
/// # Ok::<(), bhpm::CodecError>(())
/// ```
///
/// # Errors
///
/// Returns an error once `stored` is large enough to push the user or
/// password past the protocol limits.
pub fn fill_request(stored: usize) -> Result<Request, CodecError> {
    Request::store(
        FILL_URL,
        format!("{stored}{FILL_USER_SUFFIX}"),
        format!("{FILL_PWD_PREFIX}{stored}"),
    )
}

/// The seven-step plan run against a freshly erased device.
///
/// # Errors
///
/// Returns an error if a built-in request violates the protocol limits.
pub fn standard_plan() -> Result<Vec<TestCase>, CodecError> {
    let rejected = || ExpectedTemplate::status(DeviceStatus::OperationRejected);

    Ok(vec![
        TestCase::new(
            TestAction::Connect,
            "Choose BHPM module to connect to (matched by --device-name)",
            "Connection and obtaining characteristics",
        ),
        TestCase::new(
            TestAction::Exchange {
                request: Request::retrieve(TEST_URL, TEST_USER)?,
                expected: rejected(),
            },
            "",
            "Response to a GET password request must be an error if storage is empty",
        ),
        TestCase::new(
            TestAction::Exchange {
                request: Request::store(TEST_URL, TEST_USER, "1231424")?,
                expected: rejected(),
            },
            "Type 'n' in the UART input",
            "STORE password request rejected by user",
        ),
        TestCase::new(
            TestAction::Exchange {
                request: Request::store(TEST_URL, TEST_USER, "1234567890A")?,
                expected: ExpectedTemplate::status(DeviceStatus::Ok),
            },
            "Type 'Y' in the UART input",
            "STORE password request success",
        ),
        TestCase::new(
            TestAction::Exchange {
                request: Request::retrieve(TEST_URL, TEST_USER)?,
                expected: rejected(),
            },
            "Type 'n' in the UART input",
            "GET password request rejected by user",
        ),
        TestCase::new(
            TestAction::Exchange {
                request: Request::retrieve(TEST_URL, TEST_USER)?,
                expected: ExpectedTemplate::password("1234567890A"),
            },
            "Type 'Y' in the UART input",
            "GET password request success",
        ),
        TestCase::new(
            TestAction::FillStorage,
            "Type 'Y' in the UART input until test finishes",
            format!(
                "Exactly {} passwords can be stored. Performed with maximum size passwords",
                crate::protocol::MAX_STORABLE_PWD
            ),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::handlers::RequestField;
    use crate::protocol::{MAX_STORABLE_PWD, PWD_SIZE, URL_SIZE, USERNAME_SIZE};

    #[test]
    fn standard_plan_has_seven_cases_starting_with_connect() {
        let plan = standard_plan().expect("built-in plan should be valid");

        assert_eq!(7, plan.len());
        assert_matches!(plan[0].action(), TestAction::Connect);
        assert!(plan[0].steps().starts_with("Choose BHPM module to connect to"));
        assert_eq!("Connection and obtaining characteristics", plan[0].description());
        assert_matches!(plan[6].action(), TestAction::FillStorage);
    }

    #[rstest]
    #[case(0)]
    #[case(9)]
    #[case(MAX_STORABLE_PWD)]
    fn fill_requests_use_maximum_size_fields(#[case] stored: usize) {
        let request = fill_request(stored).expect("fill request should be valid");

        assert_eq!(URL_SIZE, request.url().chars().count());
        assert!(request.user().chars().count() <= USERNAME_SIZE);
        assert!(request.pwd().is_some_and(|pwd| pwd.chars().count() <= PWD_SIZE));
    }

    #[test]
    fn fill_request_two_digit_slots_reach_the_field_limits() {
        let request = fill_request(10).expect("fill request should be valid");

        assert_eq!(USERNAME_SIZE, request.user().chars().count());
        assert_eq!(Some(PWD_SIZE), request.pwd().map(|pwd| pwd.chars().count()));
    }

    #[test]
    fn fill_request_rejects_three_digit_slots() {
        assert_matches!(
            fill_request(100),
            Err(CodecError::FieldTooLong {
                field: RequestField::User,
                ..
            })
        );
    }
}
