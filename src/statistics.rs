//! How long each group has been actively conditioned today.
//!
//! Every run appends the current state of each group to a per-group activity log. The daily
//! duration is the sum of the time between each `On` entry and the `Off` entry that follows it.
//! The logs are cleared in the last minute of the day.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jiff::{Timestamp, Zoned};
use tokio::io::AsyncWriteExt as _;
use tracing::{debug, info};

use crate::protocol::{AcMode, AcStatus, GroupStatus, PowerState};

const LOG_PREFIX: &str = "airtouch_";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not list the activity logs in {1:?}")]
    ListLogs(#[source] std::io::Error, PathBuf),
    #[error("could not remove the activity log {1:?}")]
    RemoveLog(#[source] std::io::Error, PathBuf),
    #[error("could not append to the activity log {1:?}")]
    AppendLog(#[source] std::io::Error, PathBuf),
    #[error("could not read the activity log {1:?}")]
    ReadLog(#[source] std::io::Error, PathBuf),
    #[error("activity log entry `{0}` is not of the form `state,timestamp`")]
    MalformedEntry(String),
    #[error("activity log entry has an invalid timestamp `{1}`")]
    MalformedTimestamp(#[source] jiff::Error, String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::IntoStaticStr, strum::EnumString)]
pub enum Activity {
    On,
    Off,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct GroupActivity {
    pub name: String,
    pub minutes: f64,
}

pub fn log_file_name(group_name: &str) -> String {
    format!("{LOG_PREFIX}{group_name}_activity")
}

/// Whether `group` is being heated or cooled.
///
/// Zones are opened to 50% when the AC moves from Fan to Heat or Cool, and the minimum vent
/// setting keeps some zones slightly open, so only zones open wider than that count.
pub fn activity(ac: &AcStatus, group: &GroupStatus) -> Activity {
    let conditioning = ac.mode.known() != Some(AcMode::Fan);
    if conditioning && group.power_state == PowerState::On && group.open_percentage > 50 {
        Activity::On
    } else {
        Activity::Off
    }
}

/// Whether `now` is within `report_period` of the start of the last minute of the day.
pub fn is_end_of_day(now: &Zoned, report_period: Duration) -> bool {
    now.hour() == 23
        && now.minute() == 59
        && u64::try_from(now.second()).is_ok_and(|s| s <= report_period.as_secs())
}

pub fn log_entry(activity: Activity, now: &Zoned) -> String {
    let state: &'static str = activity.into();
    format!("{state},{}\n", now.strftime("%Y-%m-%dT%H:%M:%S%:z"))
}

/// Total minutes spent `On` according to the log `contents`.
///
/// A trailing `On` entry without a matching `Off` counts until `now`.
pub fn on_minutes(contents: &str, now: Timestamp) -> Result<f64, Error> {
    let mut total = 0.0;
    let mut on_since: Option<Timestamp> = None;
    for line in contents.lines().filter(|l| !l.is_empty()) {
        let Some((state, timestamp)) = line.split_once(',') else {
            return Err(Error::MalformedEntry(line.to_string()));
        };
        let activity = state
            .parse::<Activity>()
            .map_err(|_| Error::MalformedEntry(line.to_string()))?;
        let parse = || {
            timestamp
                .parse::<Timestamp>()
                .map_err(|e| Error::MalformedTimestamp(e, timestamp.to_string()))
        };
        match (activity, on_since) {
            (Activity::On, None) => on_since = Some(parse()?),
            (Activity::Off, Some(start)) => {
                total += parse()?.duration_since(start).as_secs_f64() / 60.0;
                on_since = None;
            }
            _ => {}
        }
    }
    if let Some(start) = on_since {
        total += now.duration_since(start).as_secs_f64() / 60.0;
    }
    Ok(total)
}

/// Remove all activity logs in `dir`.
pub async fn clear_logs(dir: &Path) -> Result<(), Error> {
    let mut entries =
        tokio::fs::read_dir(dir).await.map_err(|e| Error::ListLogs(e, dir.to_path_buf()))?;
    while let Some(entry) =
        entries.next_entry().await.map_err(|e| Error::ListLogs(e, dir.to_path_buf()))?
    {
        if !entry.file_name().to_string_lossy().starts_with(LOG_PREFIX) {
            continue;
        }
        let path = entry.path();
        info!(message = "removing activity log", ?path);
        tokio::fs::remove_file(&path).await.map_err(|e| Error::RemoveLog(e, path))?;
    }
    Ok(())
}

async fn append(path: &Path, entry: &str) -> Result<(), Error> {
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await
        .map_err(|e| Error::AppendLog(e, path.to_path_buf()))?;
    file.write_all(entry.as_bytes()).await.map_err(|e| Error::AppendLog(e, path.to_path_buf()))?;
    file.flush().await.map_err(|e| Error::AppendLog(e, path.to_path_buf()))
}

/// Log the current activity of every group in `dir` and report today's totals.
pub async fn record(
    dir: &Path,
    ac: &AcStatus,
    groups: &[GroupStatus],
    now: &Zoned,
    report_period: Duration,
) -> Result<Vec<GroupActivity>, Error> {
    if is_end_of_day(now, report_period) {
        clear_logs(dir).await?;
    }
    let mut result = Vec::with_capacity(groups.len());
    for group in groups {
        let path = dir.join(log_file_name(&group.name));
        append(&path, &log_entry(activity(ac, group), now)).await?;
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::ReadLog(e, path.clone()))?;
        let minutes = on_minutes(&contents, now.timestamp())?;
        debug!(message = "group activity", group = %group.name, minutes);
        result.push(GroupActivity { name: group.name.clone(), minutes });
    }
    Ok(result)
}
