pub(crate) mod command;
pub(crate) mod inspect;
pub(crate) mod plan;
pub(crate) mod request;
pub(crate) mod run;
pub(crate) mod ui;

pub use self::command::{Args, Command, FakeArgs, LogLevel, OutputFormat};
pub use self::request::RequestArgs;
