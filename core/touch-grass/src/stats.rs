//! `touch-grass stats`: longest and total online/offline time for one user.

use std::fmt::Write as _;
use std::path::Path;

use grass_core::{
    format_duration, load_file_config, AppPaths, KindStats, Result, SessionHistory, SqliteHistory,
    TrackerError, UsageStats,
};
use serde::Serialize;

#[derive(Serialize)]
struct StatsReport<'a> {
    username: &'a str,
    #[serde(flatten)]
    stats: &'a UsageStats,
}

pub fn run(
    config_path: Option<&Path>,
    username: Option<String>,
    json: bool,
    paths: &AppPaths,
) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => load_file_config(config_path)?
            .username
            .ok_or_else(|| TrackerError::InvalidConfig("a username is required".to_string()))?,
    };

    let history = SqliteHistory::new(paths.history_db())?;
    let stats = history.stats(&username)?;

    if json {
        let report = StatsReport {
            username: &username,
            stats: &stats,
        };
        let out = serde_json::to_string_pretty(&report).map_err(|source| TrackerError::Json {
            context: "Failed to serialize stats".to_string(),
            source,
        })?;
        println!("{}", out);
    } else {
        print!("{}", render(&username, &stats));
    }
    Ok(())
}

fn render(username: &str, stats: &UsageStats) -> String {
    let mut out = format!("Stats for {}\n", username);
    render_kind(&mut out, "Online", &stats.online);
    render_kind(&mut out, "Touching grass", &stats.offline);
    out
}

fn render_kind(out: &mut String, label: &str, stats: &KindStats) {
    let _ = writeln!(out, "{}:", label);
    match &stats.longest {
        Some(record) => {
            let _ = writeln!(out, "  Longest: {}", format_duration(record.duration));
        }
        None => out.push_str("  Longest: none yet\n"),
    }
    let _ = writeln!(
        out,
        "  Total: {} over {} session{}",
        format_duration(stats.total),
        stats.count,
        if stats.count == 1 { "" } else { "s" }
    );
}
