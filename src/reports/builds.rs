use std::fmt::Display;
use std::path::PathBuf;

use chrono::{DateTime, Local, TimeZone, Utc};
use log::{info, warn};

use crate::error::Result;
use crate::models::{Build, BuildResult, BuildStatus};
use crate::providers::BuildService;

pub const DEFAULT_PROJECT: &str = "DART";
pub const DEFAULT_DEFINITION_FILTER: &str = "NG-DART-VS2012";
pub const DEFAULT_OUTPUT_FILE: &str = "BuildResults.csv";

const HEADER: &str = "Name, Date, Passed, Build Time, Queue Time";

#[derive(Debug, Clone)]
pub struct BuildReportOptions {
    pub project: String,
    /// Case-sensitive substring the build definition name must contain.
    pub definition_filter: String,
    pub output: PathBuf,
}

impl Default for BuildReportOptions {
    fn default() -> Self {
        Self {
            project: DEFAULT_PROJECT.to_string(),
            definition_filter: DEFAULT_DEFINITION_FILTER.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
        }
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub path: PathBuf,
    pub rows: usize,
    pub skipped: usize,
}

impl BuildReport {
    pub fn confirmation(&self) -> String {
        format!("Results written to {}", self.path.display())
    }
}

/// A completed build whose queue, start and finish times are all known.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildInfo {
    pub name: String,
    pub passed: bool,
    pub queued: DateTime<Utc>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

impl BuildInfo {
    /// Returns `None` when any of the three timestamps is missing.
    pub fn from_build(build: &Build) -> Option<Self> {
        Some(Self {
            name: build.build_number.clone(),
            passed: build.result == Some(BuildResult::Succeeded),
            queued: build.queue_time?,
            started: build.start_time?,
            finished: build.finish_time?,
        })
    }

    pub fn minutes_ran(&self) -> f64 {
        minutes_between(self.started, self.finished)
    }

    pub fn minutes_queued(&self) -> f64 {
        minutes_between(self.queued, self.started)
    }

    pub fn to_row<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        format!(
            "{}, {}, {}, {:.2}, {:.2}",
            self.name,
            self.started.with_timezone(tz).format("%Y-%m-%d %H:%M"),
            if self.passed { "True" } else { "False" },
            self.minutes_ran(),
            self.minutes_queued()
        )
    }
}

pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let minutes = (to - from).num_milliseconds() as f64 / 60_000.0;
    minutes
}

#[derive(Debug)]
pub struct RenderedReport {
    pub csv: String,
    pub rows: usize,
    pub skipped: usize,
}

/// Filters builds by definition name, orders them by finish time and renders
/// the CSV body. Builds with missing timestamps are skipped.
pub fn render_build_report<Tz>(
    builds: &[Build],
    definition_filter: &str,
    tz: &Tz,
) -> RenderedReport
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut skipped = 0;

    let mut infos: Vec<BuildInfo> = builds
        .iter()
        .filter(|b| b.definition_name.contains(definition_filter))
        .filter_map(|b| {
            let info = BuildInfo::from_build(b);
            if info.is_none() {
                warn!(
                    "Skipping build {}: queue, start or finish time is missing",
                    b.build_number
                );
                skipped += 1;
            }
            info
        })
        .collect();

    infos.sort_by_key(|b| b.finished);

    let mut csv = String::with_capacity(HEADER.len() + 1 + infos.len() * 64);
    csv.push_str(HEADER);
    csv.push('\n');
    for info in &infos {
        csv.push_str(&info.to_row(tz));
        csv.push('\n');
    }

    RenderedReport {
        csv,
        rows: infos.len(),
        skipped,
    }
}

pub async fn generate_build_report<S>(
    service: &S,
    options: &BuildReportOptions,
) -> Result<BuildReport>
where
    S: BuildService + ?Sized,
{
    let builds = service
        .list_builds(&options.project, BuildStatus::Completed)
        .await?;

    let rendered = render_build_report(&builds, &options.definition_filter, &Local);
    std::fs::write(&options.output, &rendered.csv)?;

    let path = std::path::absolute(&options.output)?;
    info!(
        "Wrote {} builds matching '{}' ({} skipped)",
        rendered.rows, options.definition_filter, rendered.skipped
    );

    Ok(BuildReport {
        path,
        rows: rendered.rows,
        skipped: rendered.skipped,
    })
}
