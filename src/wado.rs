use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};

use crate::client::WadoResponse;
use crate::multipart::{self, Part, RELATED_MEDIA_TYPE};

pub fn instance_file_name(index: usize) -> String {
    format!("wado-{index:06}.dcm")
}

/// Parts of a WADO-RS answer, which must be a `multipart/related` body.
pub fn related_parts(response: &WadoResponse) -> Result<Vec<Part>> {
    let media_type = multipart::media_type(&response.content_type);
    if media_type != RELATED_MEDIA_TYPE {
        bail!(
            "Expected a {} response, got '{}'",
            RELATED_MEDIA_TYPE,
            response.content_type
        );
    }

    let boundary = multipart::boundary_from_content_type(&response.content_type)
        .ok_or_else(|| anyhow!("No boundary in Content-Type '{}'", response.content_type))?;

    multipart::parse_related(&response.body, &boundary)
}

/// Writes every non-empty part to `<output_dir>/wado-NNNNNN.dcm`, numbered by
/// position in the response starting at 1.
pub fn store_parts(parts: &[Part], output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut stored = Vec::new();
    for (index, part) in parts.iter().enumerate() {
        if part.body.is_empty() {
            continue;
        }

        let path = output_dir.join(instance_file_name(index + 1));
        fs::write(&path, &part.body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        stored.push(path);
    }

    Ok(stored)
}
