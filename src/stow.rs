use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::multipart::{Boundary, MultipartBody};

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: io::Error,
}

#[derive(Debug)]
pub enum AttachmentOutcome {
    Attached { path: PathBuf, bytes: usize },
    Skipped(SkippedFile),
}

/// A STOW-RS request body together with what happened to every input path.
#[derive(Debug)]
pub struct StowBatch {
    pub boundary: Boundary,
    pub content_type: String,
    pub body: Vec<u8>,
    pub outcomes: Vec<AttachmentOutcome>,
}

impl StowBatch {
    pub fn attached(&self) -> impl Iterator<Item = (&Path, usize)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            AttachmentOutcome::Attached { path, bytes } => Some((path.as_path(), *bytes)),
            AttachmentOutcome::Skipped(_) => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SkippedFile> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            AttachmentOutcome::Skipped(skipped) => Some(skipped),
            AttachmentOutcome::Attached { .. } => None,
        })
    }
}

/// Replaces every directory in `paths` by the files beneath it, sorted by name.
///
/// Entries that cannot be walked are kept as-is so that reading them reports the failure.
pub fn expand_directories(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut expanded = Vec::new();

    for path in paths {
        if !path.is_dir() {
            expanded.push(path.clone());
            continue;
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => expanded.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => {
                    if let Some(unreadable) = e.path() {
                        expanded.push(unreadable.to_path_buf());
                    }
                }
            }
        }
    }

    expanded
}

pub fn build_batch(paths: &[PathBuf]) -> StowBatch {
    build_batch_with_boundary(paths, Boundary::random())
}

pub fn build_batch_with_boundary(paths: &[PathBuf], boundary: Boundary) -> StowBatch {
    let mut body = MultipartBody::new(boundary);
    let mut outcomes = Vec::with_capacity(paths.len());

    for path in paths {
        match fs::read(path) {
            Ok(content) => {
                if body.collides(&content) {
                    warn!(
                        path = %path.display(),
                        boundary = %body.boundary(),
                        "file contains the multipart boundary, the request body will be malformed"
                    );
                }
                debug!(path = %path.display(), bytes = content.len(), "attaching DICOM file");
                body.add_dicom(&content);
                outcomes.push(AttachmentOutcome::Attached {
                    path: path.clone(),
                    bytes: content.len(),
                });
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable file");
                outcomes.push(AttachmentOutcome::Skipped(SkippedFile {
                    path: path.clone(),
                    error,
                }));
            }
        }
    }

    debug!(parts = body.parts(), boundary = body.boundary().as_str(), "built STOW-RS request body");
    let boundary = body.boundary().clone();
    let content_type = body.content_type();
    StowBatch {
        boundary,
        content_type,
        body: body.finish(),
        outcomes,
    }
}
