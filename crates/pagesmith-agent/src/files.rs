//! Writes generated files and attachments into a working directory

use pagesmith_core::{GeneratedFile, PagesmithError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::attachments::DecodedAttachment;

/// Names that must never be written by generated content
const PROTECTED_FILES: &[&str] = &[".git", ".env"];

/// Files written by one materialization pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    pub files_created: Vec<String>,
    pub files_modified: Vec<String>,
}

impl MaterializeReport {
    pub fn summary(&self) -> String {
        format!(
            "{} created, {} modified",
            self.files_created.len(),
            self.files_modified.len()
        )
    }

    fn record(&mut self, path: &str, created: bool) {
        if created {
            self.files_created.push(path.to_string());
        } else {
            self.files_modified.push(path.to_string());
        }
    }
}

/// Validate a path relative to the working directory
///
/// Rejects absolute paths, `..` components and anything inside `.git`.
pub fn validate_path(path: &str) -> Result<PathBuf> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(PagesmithError::PathValidation("Empty path".to_string()));
    }
    let path = Path::new(trimmed);

    if path.is_absolute() {
        return Err(PagesmithError::PathValidation(format!(
            "Absolute paths not allowed: {}",
            path.display()
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(PagesmithError::PathValidation(format!(
                    "Path traversal not allowed: {}",
                    path.display()
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(PagesmithError::PathValidation(format!(
                    "Absolute paths not allowed: {}",
                    path.display()
                )));
            }
            Component::Normal(name) => {
                if PROTECTED_FILES.iter().any(|p| name == *p) {
                    return Err(PagesmithError::PathValidation(format!(
                        "Cannot write to protected path: {}",
                        path.display()
                    )));
                }
            }
            Component::CurDir => {}
        }
    }

    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        return Err(PagesmithError::PathValidation(format!(
            "Path names no file: {}",
            path.display()
        )));
    }
    Ok(normalized)
}

/// Write one file under `root`; returns whether it was newly created
fn write_file(root: &Path, path: &str, content: &[u8]) -> Result<bool> {
    let relative = validate_path(path)?;
    let target = root.join(relative);
    let created = !target.exists();

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, content)?;
    debug!("Wrote {} ({} bytes)", target.display(), content.len());

    Ok(created)
}

/// Write generated files into `root`
///
/// Every path is validated before anything is written, so an invalid entry
/// leaves the directory untouched.
pub fn materialize(root: &Path, files: &[GeneratedFile]) -> Result<MaterializeReport> {
    for file in files {
        validate_path(&file.path)?;
    }

    let mut report = MaterializeReport::default();
    for file in files {
        let created = write_file(root, &file.path, file.content.as_bytes())?;
        report.record(&file.path, created);
    }

    info!("Materialized generated files: {}", report.summary());
    Ok(report)
}

/// Write decoded attachments into `root` under their own names
pub fn write_attachments(root: &Path, attachments: &[DecodedAttachment]) -> Result<MaterializeReport> {
    for attachment in attachments {
        validate_path(&attachment.name)?;
    }

    let mut report = MaterializeReport::default();
    for attachment in attachments {
        let created = write_file(root, &attachment.name, &attachment.bytes)?;
        report.record(&attachment.name, created);
    }

    if !attachments.is_empty() {
        info!("Saved attachments: {}", report.summary());
    }
    Ok(report)
}
