//! Utility functions and helpers

use std::fs::File;
use std::path::Path;
use std::time::SystemTime;

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Check whether `output` must be regenerated from a source with `source_mtime`
///
/// Stale means: output missing, or source strictly newer than the output.
/// Outputs get their source's mtime after a transform, so equal times mean
/// the output is current.
pub fn is_stale(output: &Path, source_mtime: SystemTime) -> bool {
    match get_mtime(output) {
        Some(output_mtime) => source_mtime > output_mtime,
        None => true,
    }
}

/// Set the modification time of an existing file
pub fn set_mtime(path: &Path, mtime: SystemTime) -> std::io::Result<()> {
    File::options().write(true).open(path)?.set_modified(mtime)
}

/// Path of `to` relative to `from`, for display
pub fn relative_path(from: &Path, to: &Path) -> String {
    pathdiff::diff_paths(to, from)
        .unwrap_or_else(|| to.to_path_buf())
        .display()
        .to_string()
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_staleness() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("a.css");
        let t100 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);

        assert!(is_stale(&output, t100));

        std::fs::write(&output, "").unwrap();
        set_mtime(&output, t100).unwrap();
        assert!(!is_stale(&output, t100), "synced mtimes are current");

        set_mtime(&output, t100 - Duration::from_secs(1)).unwrap();
        assert!(is_stale(&output, t100));
    }

    #[test]
    fn test_set_mtime_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, "x").unwrap();

        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_234_567);
        set_mtime(&path, when).unwrap();
        assert_eq!(get_mtime(&path), Some(when));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/srv/app"), Path::new("/srv/app/public/debug")),
            "public/debug"
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs_f64(1.5)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5.00s");
    }
}
