use std::fmt::{self, Display, Formatter};

use crate::harness::{TestAction, TestCase};

use super::painter::Painter;
use super::table::Table;

/// Renders the test plan as a numbered table.
pub(crate) struct PlanView<'a> {
    plan: &'a [TestCase],
    painter: &'a Painter,
}

impl<'a> PlanView<'a> {
    pub(crate) fn new(plan: &'a [TestCase], painter: &'a Painter) -> Self {
        Self { plan, painter }
    }

    fn expectation(&self, action: &TestAction) -> String {
        match action {
            TestAction::Connect => self.painter.muted("connected and subscribed"),
            TestAction::Exchange { expected, .. } => self.painter.value(expected.to_string()),
            TestAction::FillStorage => self.painter.value("err \"storage is full\""),
        }
    }
}

impl Display for PlanView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rows = self
            .plan
            .iter()
            .enumerate()
            .map(|(index, case)| {
                let steps = if case.steps().is_empty() {
                    self.painter.muted("-")
                } else {
                    self.painter.value(case.steps())
                };
                vec![
                    self.painter.value((index + 1).to_string()),
                    case.description().to_string(),
                    steps,
                    self.expectation(case.action()),
                ]
            })
            .collect();

        write!(f, "{}", self.painter.heading("Test plan:"))?;
        write!(
            f,
            "\n{}",
            Table::grid(["#", "description", "steps", "expects"], rows)
        )
    }
}
