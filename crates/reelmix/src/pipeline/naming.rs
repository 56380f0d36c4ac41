//! Deterministic names of everything a job writes.

use chrono::NaiveDate;

use crate::config::OutputFormat;

/// Role tags embedded in output names, in role order.
pub const ROLE_TAGS: [&str; 3] = ["G", "C", "CTA"];

/// `{project}_G{n}xC{n}xCTA{n}_{YYYYMMDD}.{ext}` for the zero-based `index`.
///
/// `project` must already be sanitized.
pub fn output_name(project: &str, index: usize, date: NaiveDate, format: OutputFormat) -> String {
    let position = index + 1;
    let composition = ROLE_TAGS
        .iter()
        .map(|tag| format!("{}{}", tag, position))
        .collect::<Vec<_>>()
        .join("x");
    format!(
        "{}_{}_{}.{}",
        project,
        composition,
        date.format("%Y%m%d"),
        format.extension()
    )
}

pub fn archive_name(project: &str) -> String {
    format!("{}_all.zip", project)
}

pub fn download_ref(job_id: &str, file_name: &str) -> String {
    format!("/download/{}/{}", job_id, file_name)
}
