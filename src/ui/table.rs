use crate::loader::{LoadFailure, LoadReport};
use crate::storage::DbStats;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Object")]
    label: &'static str,
    #[tabled(rename = "Loaded")]
    loaded: usize,
    #[tabled(rename = "In store")]
    stored: usize,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Line")]
    line: usize,
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// Loaded counts next to the store totals
pub fn report_table(report: &LoadReport, stats: &DbStats) -> String {
    let rows = vec![
        CountRow { label: "Images", loaded: report.images, stored: stats.images },
        CountRow { label: "Volume systems", loaded: report.volume_systems, stored: stats.volume_systems },
        CountRow { label: "Volumes", loaded: report.volumes, stored: stats.volumes },
        CountRow { label: "File systems", loaded: report.file_systems, stored: stats.file_systems },
        CountRow { label: "Files", loaded: report.files + report.carved, stored: stats.files },
        CountRow { label: "Carved", loaded: report.carved, stored: stats.carved },
        CountRow { label: "Layout runs", loaded: report.runs, stored: stats.runs },
    ];
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn failures_table(failures: &[LoadFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let rows: Vec<FailureRow> = failures
        .iter()
        .map(|f| FailureRow { line: f.line, entity: f.entity.clone(), error: f.error.clone() })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}
