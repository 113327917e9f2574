//! Object locations and `gs://` URLs

use crate::{CloudError, Result};
use object_store::path::Path;
use std::fmt;
use url::Url;

/// Identity of an object: the project, the bucket and the object path inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    project: String,
    bucket: String,
    path: Path,
}

impl ObjectLocation {
    /// Build a location from its parts
    pub fn new(project: &str, bucket: &str, path: &str) -> Result<Self> {
        if bucket.is_empty() {
            return Err(CloudError::InvalidPath("Missing bucket name".to_string()));
        }
        Ok(ObjectLocation {
            project: project.to_string(),
            bucket: bucket.to_string(),
            path: parse_object_path(path)?,
        })
    }

    /// Parse a URL like "gs://bucket/path/to/object"
    pub fn parse(project: &str, url: &str) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| CloudError::InvalidPath(format!("Invalid URL: {}", e)))?;

        if parsed.scheme() != "gs" {
            return Err(CloudError::InvalidPath(format!(
                "Unsupported scheme: {}. Use gs://",
                parsed.scheme()
            )));
        }

        let bucket = parsed
            .host_str()
            .ok_or_else(|| CloudError::InvalidPath("Missing bucket name".to_string()))?;

        Self::new(project, bucket, parsed.path().trim_start_matches('/'))
    }

    /// The same project and bucket, different object
    pub fn sibling(&self, path: &str) -> Result<Self> {
        Ok(ObjectLocation {
            project: self.project.clone(),
            bucket: self.bucket.clone(),
            path: parse_object_path(path)?,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.path)
    }
}

pub(crate) fn parse_object_path(path: &str) -> Result<Path> {
    let parsed = Path::parse(path)
        .map_err(|e| CloudError::InvalidPath(format!("Invalid object path {:?}: {}", path, e)))?;
    if parsed.as_ref().is_empty() {
        return Err(CloudError::InvalidPath("Missing object path".to_string()));
    }
    Ok(parsed)
}
