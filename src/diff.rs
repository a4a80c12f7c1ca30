//! Changed-file detection from `git diff`, for matching uploaded diff
//! images back to their source files.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

/// LabVIEW artifacts we render diff images for.
const LABVIEW_EXTENSIONS: [&str; 3] = [".vi", ".vit", ".vim"];

/// Map of changed file path to its diff status letter ("A" or "M"),
/// restricted to LabVIEW artifacts. Paths are the repository-relative names
/// printed by `git diff --name-status`.
pub type ChangedFiles = BTreeMap<String, String>;

/// Added and modified files between `target_ref` and the working branch.
pub fn changed_labview_files(target_ref: &str) -> Result<ChangedFiles> {
    let range = format!("{target_ref}...");
    let output = Command::new("git")
        .args(["diff", "--name-status", "--diff-filter=AM", &range])
        .output()
        .context("failed to run git diff")?;

    if !output.status.success() {
        anyhow::bail!(
            "git diff against '{}' failed: {}",
            target_ref,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8(output.stdout).context("git diff output was not UTF-8")?;
    Ok(parse_name_status(&stdout))
}

/// Parse `git diff --name-status` output, keeping LabVIEW artifacts only.
pub fn parse_name_status(diff_output: &str) -> ChangedFiles {
    // https://regex101.com/r/EFVDVV/2
    let status_line = Regex::new(r"(?m)^([AM])\s+(.*)$").expect("static regex");
    let mut changes = ChangedFiles::new();
    for capture in status_line.captures_iter(diff_output) {
        let path = &capture[2];
        if LABVIEW_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            changes.insert(path.to_string(), capture[1].to_string());
        }
    }
    debug!(files = changes.len(), "changed LabVIEW files");
    changes
}

/// Diff status for an uploaded image, matched by file stem: the image
/// `sub/dir Top Level.vi.png` belongs to the changed file whose basename
/// ends the image's stem. Unmatched images report "?".
pub fn status_for_image(changes: &ChangedFiles, image_name: &str) -> String {
    let stem = image_name.strip_suffix(".png").unwrap_or(image_name);
    for (path, status) in changes {
        let basename = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if stem.ends_with(basename.as_ref()) {
            return status.clone();
        }
    }
    "?".to_string()
}
