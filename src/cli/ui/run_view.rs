use std::io;

use crate::handlers::Verdict;
use crate::harness::{RunnerObserver, Tally, TestCase};

use super::painter::Painter;

/// Streams test progress to the terminal as the runner reports it.
///
/// Write failures are held until [`RunView::finish`] so the runner is never
/// interrupted by a closed stdout.
pub(crate) struct RunView<'a, W> {
    out: &'a mut W,
    painter: &'a Painter,
    total: usize,
    write_error: Option<io::Error>,
}

impl<'a, W> RunView<'a, W>
where
    W: io::Write,
{
    pub(crate) fn new(out: &'a mut W, painter: &'a Painter, total: usize) -> Self {
        Self {
            out,
            painter,
            total,
            write_error: None,
        }
    }

    /// Returns the first write error, if any.
    pub(crate) fn finish(self) -> io::Result<()> {
        match self.write_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn line(&mut self, text: &str) {
        if self.write_error.is_some() {
            return;
        }
        if let Err(error) = writeln!(self.out, "{text}") {
            self.write_error = Some(error);
        }
    }
}

impl<W> RunnerObserver for RunView<'_, W>
where
    W: io::Write,
{
    fn test_started(&mut self, index: usize, case: &TestCase) {
        let heading = self
            .painter
            .heading(format!("Test {}/{}:", index + 1, self.total));
        self.line(&format!("{heading} {}", case.description()));
        if !case.steps().is_empty() {
            let steps = format!(
                "  {} {}",
                self.painter.muted("Step:"),
                self.painter.value(case.steps())
            );
            self.line(&steps);
        }
    }

    fn test_finished(&mut self, _index: usize, _case: &TestCase, verdict: &Verdict) {
        let glyph = self.painter.outcome_glyph(verdict.is_pass());
        let detail = if verdict.is_pass() {
            self.painter.success(verdict.to_string())
        } else {
            self.painter.failure(verdict.to_string())
        };
        self.line(&format!("  {glyph} {detail}"));
    }

    fn storage_progress(&mut self, stored: usize, capacity: usize) {
        let progress = format!(
            "  {} {}",
            self.painter.muted("Stored passwords:"),
            self.painter.value(format!("{stored}/{capacity}"))
        );
        self.line(&progress);
    }

    fn finished(&mut self, tally: &Tally) {
        let count = if tally.all_passed() {
            self.painter.success(tally.to_string())
        } else {
            self.painter.warning(tally.to_string())
        };
        let summary = format!(
            "\n{} {count}",
            self.painter.heading("Successfully passed tests:")
        );
        self.line(&summary);
    }
}
