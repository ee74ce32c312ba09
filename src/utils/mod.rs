/// Utility functions and helpers
use std::path::Path;
use tracing::info;

/// Create a directory and its parents if missing
pub async fn ensure_dir<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        tokio::fs::create_dir_all(path).await?;
        info!("Created directory: {}", path.display());
    }
    Ok(())
}

/// Timestamp used in export file names, local time `YYYYmmdd_HHMMSS`
pub fn file_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Generate unique identifier
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Make a string safe to use as part of a file name.
///
/// Path separators, characters rejected by common filesystems and control characters
/// become `-`; everything else, including spaces and non-ASCII letters, is kept.
pub fn sanitize_file_component(part: &str) -> String {
    const INVALID: [char; 9] = ['/', '\\', '<', '>', ':', '"', '|', '?', '*'];
    part.trim()
        .chars()
        .map(|c| if INVALID.contains(&c) || c.is_control() { '-' } else { c })
        .collect()
}

/// Format file size in human readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    const THRESHOLD: u64 = 1024;

    if bytes < THRESHOLD {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    format!("{:.1} {}", size, UNITS[unit_index])
}

/// Format duration in human readable format
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();

    if total_seconds < 60 {
        format!("{}s", total_seconds)
    } else if total_seconds < 3600 {
        format!("{}m {}s", total_seconds / 60, total_seconds % 60)
    } else {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        format!("{}h {}m {}s", hours, minutes, total_seconds % 60)
    }
}
