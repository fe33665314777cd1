//! Concatenate ordered part files into one file.
//!
//! Parts are the files in a directory whose names start with a prefix and
//! end with a suffix (`EstimatesList.part1.vue`, `EstimatesList.part2.vue`,
//! ...). They are joined in lexical name order and deleted afterwards
//! unless asked to keep them.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{MigrateError, Result};

/// What a merge did.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    /// File written.
    pub output: PathBuf,

    /// Parts in the order they were concatenated.
    pub parts: Vec<PathBuf>,

    /// Bytes written to the output.
    pub bytes_written: u64,

    /// Whether the parts were deleted.
    pub parts_removed: bool,
}

/// Part files in `dir`, sorted by name. The output file is never a part.
pub fn find_parts(dir: &Path, prefix: &str, suffix: &str, output: &Path) -> Result<Vec<PathBuf>> {
    let output_name = output.file_name();
    let output_in_dir = output.parent().map_or(true, |p| same_dir(p, dir));

    let mut parts = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name_str) = name.to_str() else {
            continue;
        };
        if name_str.len() < prefix.len() + suffix.len()
            || !name_str.starts_with(prefix)
            || !name_str.ends_with(suffix)
        {
            continue;
        }
        if output_in_dir && output_name == Some(name.as_os_str()) {
            continue;
        }
        parts.push(entry.path());
    }

    parts.sort();
    Ok(parts)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a.as_os_str().is_empty() {
        return b == Path::new(".");
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Concatenate the parts into `output`, then delete them unless `keep_parts`.
///
/// Fails with a configuration error when no part matches.
pub fn merge_parts(
    dir: &Path,
    prefix: &str,
    suffix: &str,
    output: &Path,
    keep_parts: bool,
) -> Result<MergeReport> {
    let parts = find_parts(dir, prefix, suffix, output)?;
    if parts.is_empty() {
        return Err(MigrateError::Config(format!(
            "no files matching '{}*{}' in {}",
            prefix,
            suffix,
            dir.display()
        )));
    }

    let mut writer = BufWriter::new(File::create(output)?);
    let mut bytes_written = 0;
    for part in &parts {
        let mut reader = File::open(part)?;
        let copied = io::copy(&mut reader, &mut writer)?;
        debug!("Appended {} ({} bytes)", part.display(), copied);
        bytes_written += copied;
    }
    writer.flush()?;

    if !keep_parts {
        for part in &parts {
            fs::remove_file(part)?;
        }
    }

    info!(
        "Merged {} parts into {} ({} bytes)",
        parts.len(),
        output.display(),
        bytes_written
    );

    Ok(MergeReport {
        output: output.to_path_buf(),
        parts,
        bytes_written,
        parts_removed: !keep_parts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_merge_in_lexical_order_and_remove_parts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "List.part2.vue", "<script/>\n");
        write(dir.path(), "List.part1.vue", "<template/>\n");
        write(dir.path(), "List.part3.vue", "<style/>\n");
        write(dir.path(), "Other.vue", "untouched");

        let output = dir.path().join("List.updated.vue");
        let report = merge_parts(dir.path(), "List.part", ".vue", &output, false).unwrap();

        assert_eq!(report.parts.len(), 3);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "<template/>\n<script/>\n<style/>\n"
        );
        assert_eq!(report.bytes_written, 31);
        assert!(!dir.path().join("List.part1.vue").exists());
        assert!(dir.path().join("Other.vue").exists());
    }

    #[test]
    fn test_keep_parts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.part1.txt", "one");
        write(dir.path(), "a.part2.txt", "two");

        let output = dir.path().join("a.txt");
        let report = merge_parts(dir.path(), "a.part", ".txt", &output, true).unwrap();

        assert!(!report.parts_removed);
        assert_eq!(fs::read_to_string(&output).unwrap(), "onetwo");
        assert!(dir.path().join("a.part1.txt").exists());
    }

    #[test]
    fn test_output_matching_pattern_is_not_a_part() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "x.part1.md", "1");
        write(dir.path(), "x.part9.md", "stale output");

        let output = dir.path().join("x.part9.md");
        let parts = find_parts(dir.path(), "x.part", ".md", &output).unwrap();
        assert_eq!(parts, vec![dir.path().join("x.part1.md")]);
    }

    #[test]
    fn test_no_parts_is_an_error() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.vue");
        let err = merge_parts(dir.path(), "List.part", ".vue", &output, false).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
        assert!(!output.exists());
    }
}
