use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use bhpm::{Args, RunSettings, fake_hardware_client, real_hardware_client, run_with_settings};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let mut stdout = std::io::stdout();

    let cancellation = CancellationToken::new();
    let interrupt = cancellation.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => interrupt.cancel(),
            Err(error) => tracing::warn!(%error, "failed to listen for Ctrl+C"),
        }
    });

    let run_result = async {
        let settings = RunSettings::builder()
            .device_name(args.device_name())
            .maybe_response_timeout(args.response_timeout())
            .maybe_output_format(args.output_format())
            .maybe_log_level(args.log_level())
            .cancellation(cancellation)
            .build();
        let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
        let hardware_client = match maybe_fake_args {
            Some(fake_args) => fake_hardware_client(fake_args),
            None => real_hardware_client(),
        };

        run_with_settings(command, &mut stdout, hardware_client, &settings).await
    }
    .await;

    match run_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
