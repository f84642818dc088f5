mod driver;
mod observer;
mod runner;
mod test_case;

pub use self::driver::HarnessDriver;
pub use self::observer::{RunnerObserver, SilentObserver};
pub use self::runner::{NextAction, RunnerPhase, RunnerState, Tally, TestRunner};
pub use self::test_case::{TestAction, TestCase, fill_request, standard_plan};
