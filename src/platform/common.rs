//! Common platform utilities

use crate::error::{MetricsError, Result};
use std::fs;
use std::path::Path;

/// Read file contents as string, trimming whitespace
pub fn read_file_string<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

/// Read file and parse as u64
pub fn read_file_u64<P: AsRef<Path>>(path: P) -> Result<u64> {
    let content = read_file_string(path)?;
    content
        .parse()
        .map_err(|e| MetricsError::Parse(format!("Failed to parse u64: {}", e)))
}

/// Read file and parse as i64
pub fn read_file_i64<P: AsRef<Path>>(path: P) -> Result<i64> {
    let content = read_file_string(path)?;
    content
        .parse()
        .map_err(|e| MetricsError::Parse(format!("Failed to parse i64: {}", e)))
}

/// Read an optional sysfs attribute; missing or unparsable files are `None`
pub fn read_optional_i64<P: AsRef<Path>>(path: P) -> Option<i64> {
    read_file_i64(path).ok()
}

/// Parse a kernel CPU list such as `0-3,8,10-11` into CPU ids
pub fn parse_cpu_list(list: &str) -> Option<Vec<usize>> {
    let list = list.trim();
    if list.is_empty() {
        return Some(Vec::new());
    }

    let mut cpus = Vec::new();
    for part in list.split(',') {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: usize = start.trim().parse().ok()?;
                let end: usize = end.trim().parse().ok()?;
                if end < start {
                    return None;
                }
                cpus.extend(start..=end);
            }
            None => cpus.push(part.trim().parse().ok()?),
        }
    }

    Some(cpus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_list() {
        assert_eq!(parse_cpu_list("0-3"), Some(vec![0, 1, 2, 3]));
        assert_eq!(parse_cpu_list("0-1,4,6-7\n"), Some(vec![0, 1, 4, 6, 7]));
        assert_eq!(parse_cpu_list(""), Some(vec![]));
        assert_eq!(parse_cpu_list("3-1"), None);
        assert_eq!(parse_cpu_list("a-b"), None);
    }

    #[test]
    fn test_read_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good");
        let bad = dir.path().join("bad");
        std::fs::write(&good, "-42\n").unwrap();
        std::fs::write(&bad, "forty-two").unwrap();

        assert_eq!(read_file_i64(&good).unwrap(), -42);
        assert!(matches!(read_file_u64(&bad), Err(MetricsError::Parse(_))));
        assert!(matches!(
            read_file_u64(dir.path().join("missing")),
            Err(MetricsError::Io(_))
        ));
        assert_eq!(read_optional_i64(&bad), None);
    }
}
