// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, fs, io::Write as _, path::Path};

use chrono::{DateTime, Local};
use log::Level;

use crate::error::Result;

pub const LOG_ENV: &str = "SCRIBBLE_LOG";
pub const LOG_STYLE_ENV: &str = "SCRIBBLE_LOG_STYLE";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const fn severity(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Renders a single line of the log file format.
pub fn format_line(
    at: &DateTime<Local>,
    level: Level,
    target: &str,
    message: &fmt::Arguments<'_>,
) -> String {
    format!(
        "{} [{}] [{}] {}",
        at.format(TIMESTAMP_FORMAT),
        severity(level),
        target,
        message
    )
}

fn builder() -> env_logger::Builder {
    let env = env_logger::Env::new()
        .filter_or(LOG_ENV, "warn")
        .write_style(LOG_STYLE_ENV);
    env_logger::Builder::from_env(env)
}

/// Sends records to the end of the file at `path` in the log file format.
fn log_to_file(builder: &mut env_logger::Builder, path: &Path) -> Result<()> {
    let sink = fs::OpenOptions::new().create(true).append(true).open(path)?;
    _ = builder
        .target(env_logger::Target::Pipe(Box::new(sink)))
        .write_style(env_logger::WriteStyle::Never)
        .format(|buf, record| {
            writeln!(
                buf,
                "{}",
                format_line(&Local::now(), record.level(), record.target(), record.args())
            )
        });
    Ok(())
}

/// Installs the global logger. When `file` is given, records are appended to
/// it instead of going to standard error.
pub fn init(file: Option<&Path>) -> Result<()> {
    let mut builder = builder();
    if let Some(path) = file {
        log_to_file(&mut builder, path)?;
    }
    builder.init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn file_lines_carry_timestamp_severity_and_target() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).single();
        let line = at.map(|at| {
            format_line(
                &at,
                Level::Warn,
                "scribble_fm::archive",
                &format_args!("{} entries", 3),
            )
        });
        assert_eq!(
            line.as_deref(),
            Some("2024-03-09 07:05:01 [WARNING] [scribble_fm::archive] 3 entries")
        );
    }

    #[test]
    fn file_target_appends_formatted_records() -> Result<()> {
        use log::Log as _;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scribble.log");
        fs::write(&path, "earlier line\n")?;

        let mut builder = builder();
        log_to_file(&mut builder, &path)?;
        let logger = builder.build();
        logger.log(
            &log::Record::builder()
                .args(format_args!("disk is full"))
                .level(Level::Error)
                .target("scribble_fm::archive")
                .build(),
        );
        logger.flush();

        let content = fs::read_to_string(&path)?;
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("earlier line"));
        let line = lines.next().unwrap_or_default();
        assert!(line.ends_with(" [ERROR] [scribble_fm::archive] disk is full"), "{line}");
        assert_eq!(line.len(), "2024-03-09 07:05:01".len() + 44);
        Ok(())
    }

    #[test]
    fn unopenable_log_file_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing").join("scribble.log");
        let result = init(Some(&path));
        assert!(result.is_err_and(|e| e.code() == crate::error::code::FILE_NOT_FOUND));
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn every_level_has_a_severity() {
        assert_eq!(severity(Level::Error), "ERROR");
        assert_eq!(severity(Level::Info), "INFO");
        assert_eq!(severity(Level::Debug), "DEBUG");
        assert_eq!(severity(Level::Trace), "TRACE");
    }
}
