//! Output formatting for CLI

use console::style;
use offcast_core::{DownloadInfo, DownloadRecord};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "VIDEO ID")]
    video_id: String,
    #[tabled(rename = "TITLE")]
    title: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "PROGRESS")]
    progress: String,
    #[tabled(rename = "SIZE")]
    size: String,
}

impl Row {
    fn from_record(record: &DownloadRecord) -> Self {
        Self {
            video_id: record.video_id.to_string(),
            title: record.display_title().to_string(),
            state: record.state.to_string(),
            progress: format!("{:.0}%", record.progress()),
            size: if record.total_bytes > 0 {
                format!("{:.1} MB / {:.1} MB", mb(record.downloaded_bytes), mb(record.total_bytes))
            } else {
                "-".to_string()
            },
        }
    }
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Render the downloads list as a table or JSON
pub fn print_records(records: &[DownloadRecord], format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", style("No downloads available").bold());
        println!("Videos you download will appear here");
        return Ok(());
    }

    let rows: Vec<Row> = records.iter().map(Row::from_record).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

/// Render a point-query result
pub fn print_info(info: &DownloadInfo, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }

    println!("Video:       {}", info.video_id);
    println!("State:       {}", info.state);
    println!("Downloaded:  {}", info.is_downloaded);
    println!("Downloading: {}", info.is_downloading);
    Ok(())
}
