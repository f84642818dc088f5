use std::io;

use anyhow::Result;

use crate::cli::OutputFormat;
use crate::harness::standard_plan;
use crate::terminal::TerminalClient;

use super::ui::{Painter, PlanView};

/// Executes the `plan` command. Never touches the BLE stack.
pub(crate) fn run<W>(
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let plan = standard_plan()?;

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", PlanView::new(&plan, &painter))?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &plan)?;
            writeln!(out)?;
        }
    }

    Ok(())
}
