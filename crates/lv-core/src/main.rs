use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use lv_common::Error;
use lv_config::{resolve_config, DateRange, HistogramRegistry, SourcesManifest};
use lv_core::cli::Cli;
use lv_core::logging::init_logging;
use lv_core::{run_longitudinal, ExitCode, JobInputs, JobStats, LocalStore, STREAM_NAME};
use tracing::{error, info};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(_) => usage_exit(),
    };
    let Ok(range) = cli.date_range() else {
        usage_exit()
    };
    init_logging(cli.log_format);

    let code = match run(&cli, range) {
        Ok(stats) => {
            match serde_json::to_string(&stats) {
                Ok(summary) => println!("{summary}"),
                Err(e) => error!(error = %e, "cannot serialize job summary"),
            }
            ExitCode::Clean
        }
        Err(e) => {
            let code = ExitCode::from_error(&e);
            error!(error = %e, code = e.code(), "longitudinal job failed");
            code
        }
    };
    std::process::exit(code.as_i32());
}

/// Bad arguments get the usage line only, no error detail.
fn usage_exit() -> ! {
    eprintln!("{}", Cli::command().render_usage());
    std::process::exit(ExitCode::Usage.as_i32());
}

fn run(cli: &Cli, range: DateRange) -> Result<JobStats, Error> {
    if cli.stream != STREAM_NAME {
        return Err(Error::UnknownStream(cli.stream.clone()));
    }
    let config = resolve_config(&cli.to_overrides())?;
    let registry = HistogramRegistry::load(&config.histograms_path)?;
    let sources = SourcesManifest::load(&config.sources_path)?;
    let source = sources.stream(&config.input_stream)?;
    info!(
        from = %range.from,
        to = %range.to,
        histograms = registry.len(),
        input_stream = %config.input_stream,
        "starting longitudinal job"
    );

    let input = LocalStore::new(&config.input_root);
    let output = LocalStore::new(&config.output_root);
    run_longitudinal(&JobInputs {
        config: &config,
        registry: &registry,
        source,
        range,
        input: &input,
        output: &output,
    })
}
