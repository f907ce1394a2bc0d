use std::fmt::{self, Display};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, FixedOffset, Local, NaiveTime, Offset, TimeZone, Utc};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use log::info;

use crate::error::Result;
use crate::models::{Changeset, HistoryQuery, RecursionType, TeamProject, VersionSpec};
use crate::prompt::Prompt;
use crate::providers::VersionControl;

pub const MAX_CHANGESETS: usize = 10_000;
pub const DEFAULT_DAYS: i64 = 30;

const HEADER: &str = "Changeset,User,Date,Comment";
const DAYS_QUESTION: &str = "Number of days past";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Only changesets owned by this user; `None` exports every author.
    pub author: Option<String>,
    pub sort_ascending: bool,
    pub output_folder: PathBuf,
    /// Anchors the look-back window and the output file name.
    pub now: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    NoProject,
    NoDayCount,
    NonPositiveDays(i64),
}

impl Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProject => write!(f, "no team project selected"),
            Self::NoDayCount => write!(f, "no valid number of days entered"),
            Self::NonPositiveDays(days) => {
                write!(f, "number of days must be positive, got {days}")
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    Written { rows: usize, path: PathBuf },
    Aborted(AbortReason),
}

impl Display for ExportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written { rows, path } => write!(
                f,
                "{} rows written to {}",
                format_count(*rows),
                path.display()
            ),
            Self::Aborted(reason) => write!(f, "Export aborted: {reason}"),
        }
    }
}

/// Formats a count with comma thousands separators.
pub fn format_count(count: usize) -> String {
    let digits = count.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(ch);
    }

    formatted
}

/// Swaps double quotes for single quotes so the field can be wrapped in quotes.
pub fn escape_quotes(text: &str) -> String {
    text.replace('"', "'")
}

pub fn changeset_row<Tz>(changeset: &Changeset, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{},\"{}\",{},\"{}\"",
        changeset.id,
        escape_quotes(&changeset.owner_display_name),
        changeset
            .creation_date
            .with_timezone(tz)
            .format("%Y-%m-%d %H:%M:%S"),
        escape_quotes(&changeset.comment)
    )
}

pub fn output_file_name(project: &str, now: &DateTime<Local>) -> String {
    format!(
        "{project} Changesets with full comments {}.csv",
        now.format("%Y-%m-%d %I%M %p")
    )
}

/// Local midnight `days` days before `now`, keeping the local offset.
///
/// A midnight skipped by a DST change takes the offset of `now`. Windows
/// reaching past the calendar fall back to the Unix epoch.
pub fn history_start<Tz: TimeZone>(now: &DateTime<Tz>, days: u64) -> DateTime<FixedOffset> {
    let tz = now.timezone();
    let offset_now = now.offset().fix();

    now.date_naive()
        .checked_sub_days(Days::new(days))
        .and_then(|day| {
            let midnight = day.and_time(NaiveTime::MIN);
            tz.from_local_datetime(&midnight)
                .earliest()
                .map(|start| start.fixed_offset())
                .or_else(|| offset_now.from_local_datetime(&midnight).single())
        })
        .unwrap_or_else(|| DateTime::<Utc>::default().fixed_offset())
}

pub fn history_query(project: &TeamProject, options: &ExportOptions, days: u64) -> HistoryQuery {
    HistoryQuery {
        path: project.server_item.clone(),
        recursion: RecursionType::Full,
        item_version: VersionSpec::Latest,
        deletion_id: 0,
        author: options.author.clone(),
        from_date: history_start(&options.now, days),
        to_date: None,
        max_results: MAX_CHANGESETS,
        include_changes: false,
        include_download_info: false,
        slot_mode: true,
        sort_ascending: options.sort_ascending,
    }
}

pub async fn export_changesets<V, P>(
    vcs: &V,
    prompt: &mut P,
    options: &ExportOptions,
) -> Result<ExportOutcome>
where
    V: VersionControl + ?Sized,
    P: Prompt + ?Sized,
{
    let projects = vcs.list_projects().await?;

    let Some(picked) = prompt.pick_project(&projects) else {
        info!("Project selection cancelled");
        return Ok(ExportOutcome::Aborted(AbortReason::NoProject));
    };

    let Some(days) = prompt.ask_positive_integer(DAYS_QUESTION, DEFAULT_DAYS) else {
        info!("Day count entry cancelled");
        return Ok(ExportOutcome::Aborted(AbortReason::NoDayCount));
    };
    let Ok(days) = u64::try_from(days) else {
        return Ok(ExportOutcome::Aborted(AbortReason::NonPositiveDays(days)));
    };
    if days == 0 {
        return Ok(ExportOutcome::Aborted(AbortReason::NonPositiveDays(0)));
    }

    let project = vcs.team_project(&picked.name).await?;
    let query = history_query(&project, options, days);

    let path = options
        .output_folder
        .join(output_file_name(&project.name, &options.now));
    let tz = options.now.timezone();
    let rows = write_changesets(vcs.query_history(&query), &path, &tz).await?;

    info!("Exported {rows} changesets of {}", project.name);
    Ok(ExportOutcome::Written { rows, path })
}

async fn write_changesets<Tz>(
    mut changesets: BoxStream<'_, Result<Changeset>>,
    path: &Path,
    tz: &Tz,
) -> Result<usize>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{HEADER}")?;

    let mut rows = 0;
    while let Some(changeset) = changesets.try_next().await? {
        writeln!(writer, "{}", changeset_row(&changeset, tz))?;
        rows += 1;
    }

    writer.flush()?;
    Ok(rows)
}
