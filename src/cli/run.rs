use std::io;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, instrument};

use crate::app::RunSettings;
use crate::cli::OutputFormat;
use crate::handlers::Verdict;
use crate::harness::{HarnessDriver, SilentObserver, Tally, TestRunner, standard_plan};
use crate::hw::HardwareClient;
use crate::terminal::TerminalClient;

use super::ui::{Painter, RunView};

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    device_name: &'a str,
    tally: Tally,
    results: Vec<CaseResult<'a>>,
}

#[derive(Debug, Serialize)]
struct CaseResult<'a> {
    test: usize,
    description: &'a str,
    verdict: &'a Verdict,
}

impl<'a> RunReport<'a> {
    fn new(device_name: &'a str, tally: Tally, runner: &'a TestRunner) -> Self {
        let results = runner
            .plan()
            .iter()
            .zip(runner.verdicts())
            .enumerate()
            .map(|(index, (case, verdict))| CaseResult {
                test: index + 1,
                description: case.description(),
                verdict,
            })
            .collect();

        Self {
            device_name,
            tally,
            results,
        }
    }
}

/// Executes the `run` command.
#[instrument(skip(client, out, terminal_client, settings), level = "info", fields(?output_format))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    settings: &RunSettings,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let mut runner = TestRunner::new(standard_plan()?)?;
    let driver = HarnessDriver::builder()
        .device_name(settings.device_name())
        .maybe_response_timeout(settings.response_timeout())
        .cancellation(settings.cancellation().clone())
        .build();

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            let total = runner.plan().len();
            let mut view = RunView::new(out, &painter, total);
            let result = driver.run(client, &mut runner, &mut view).await;
            view.finish()?;
            let tally = result?;
            info!(%tally, "run complete");
        }
        OutputFormat::Json => {
            let tally = driver.run(client, &mut runner, &mut SilentObserver).await?;
            let report = RunReport::new(driver.device_name(), tally, &runner);
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }

    Ok(())
}
