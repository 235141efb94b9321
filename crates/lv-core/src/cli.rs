//! Command-line surface.

use crate::logging::LogFormat;
use chrono::NaiveDate;
use clap::Parser;
use lv_config::{parse_date, ConfigError, ConfigOverrides, DateRange};
use std::path::PathBuf;

/// Build the longitudinal view for a range of submission dates.
#[derive(Debug, Parser)]
#[command(name = "lv-core", version)]
pub struct Cli {
    /// First submission date, YYYYMMDD
    #[arg(long = "from-date", value_name = "YYYYMMDD", value_parser = parse_date)]
    pub from_date: NaiveDate,

    /// Last submission date, YYYYMMDD
    #[arg(long = "to-date", value_name = "YYYYMMDD", value_parser = parse_date)]
    pub to_date: NaiveDate,

    /// Output stream to build
    pub stream: String,

    /// Job config file
    #[arg(long, env = "LV_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "LV_INPUT_ROOT")]
    pub input_root: Option<PathBuf>,

    #[arg(long, env = "LV_OUTPUT_ROOT")]
    pub output_root: Option<PathBuf>,

    /// Histogram registry (Histograms.json)
    #[arg(long = "histograms", env = "LV_HISTOGRAMS")]
    pub histograms_path: Option<PathBuf>,

    /// Sources manifest
    #[arg(long = "sources", env = "LV_SOURCES")]
    pub sources_path: Option<PathBuf>,

    /// Input stream name in the sources manifest
    #[arg(long, env = "LV_INPUT_STREAM")]
    pub input_stream: Option<String>,

    #[arg(long, env = "LV_MAX_FILE_BYTES")]
    pub max_file_bytes: Option<u64>,

    #[arg(long, env = "LV_BATCH_ROWS")]
    pub batch_rows: Option<usize>,

    /// Worker threads (0 = one per core)
    #[arg(long, env = "LV_WORKERS")]
    pub workers: Option<usize>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "LV_LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Cli {
    /// The requested range; empty when `--from-date` is after `--to-date`.
    pub fn date_range(&self) -> Result<DateRange, ConfigError> {
        DateRange::new(self.from_date, self.to_date)
    }

    pub fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            input_root: self.input_root.clone(),
            output_root: self.output_root.clone(),
            histograms_path: self.histograms_path.clone(),
            sources_path: self.sources_path.clone(),
            input_stream: self.input_stream.clone(),
            max_file_bytes: self.max_file_bytes,
            batch_rows: self.batch_rows,
            workers: self.workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_required_arguments() {
        let cli = Cli::try_parse_from([
            "lv-core",
            "--from-date",
            "20160101",
            "--to-date",
            "20160107",
            "longitudinal",
            "--workers",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.stream, "longitudinal");
        assert_eq!(cli.to_overrides().workers, Some(4));
        let range = cli.date_range().unwrap();
        assert_eq!(range.version_label(), "v20160107");
    }

    #[test]
    fn malformed_date_is_rejected_by_parser() {
        for date in ["2016-01-01", "201601", "20161301"] {
            let args = ["lv-core", "--from-date", date, "--to-date", "20160107", "longitudinal"];
            assert!(Cli::try_parse_from(args).is_err(), "{date}");
        }
    }

    #[test]
    fn reversed_range_is_empty() {
        let args = ["lv-core", "--from-date", "20160107", "--to-date", "20160101", "longitudinal"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.date_range(),
            Err(ConfigError::EmptyDateRange { .. })
        ));
    }

    #[test]
    fn missing_stream_is_rejected() {
        let args = ["lv-core", "--from-date", "20160101", "--to-date", "20160107"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
