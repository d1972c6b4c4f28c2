//! Photo records and the ordered collection they come from.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One photograph to place in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoItem {
    /// Image file on disk.
    pub path: PathBuf,
    /// Caption written above the photo; empty for none.
    #[serde(default)]
    pub caption: String,
    /// Native pixel width, 0 when unknown.
    #[serde(default)]
    pub width: u32,
    /// Native pixel height, 0 when unknown.
    #[serde(default)]
    pub height: u32,
    /// When the photo was taken.
    #[serde(default, with = "capture_time", skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<NaiveDateTime>,
}

impl PhotoItem {
    /// Create a photo item with no caption or metadata.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            caption: String::new(),
            width: 0,
            height: 0,
            captured_at: None,
        }
    }

    /// Set the caption.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Set the capture time.
    pub fn with_captured_at(mut self, captured_at: NaiveDateTime) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    /// Fill in native dimensions from the image header if unknown.
    ///
    /// Returns false when the header could not be read.
    pub fn probe_dimensions(&mut self) -> bool {
        if self.width > 0 && self.height > 0 {
            return true;
        }
        match image::image_dimensions(&self.path) {
            Ok((width, height)) => {
                self.width = width;
                self.height = height;
                true
            }
            Err(_) => false,
        }
    }

    /// File name for display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// An ordered photo collection.
///
/// A job takes one snapshot at start and never reads the source again.
pub trait PhotoSource {
    /// The photos in placement order.
    fn snapshot(&self) -> Vec<PhotoItem>;
}

impl PhotoSource for [PhotoItem] {
    fn snapshot(&self) -> Vec<PhotoItem> {
        self.to_vec()
    }
}

impl PhotoSource for Vec<PhotoItem> {
    fn snapshot(&self) -> Vec<PhotoItem> {
        self.clone()
    }
}

/// Errors that can occur while loading a photo manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read photo manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse photo manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Photo #{index} in manifest has an empty path")]
    EmptyPath { index: usize },
}

/// A TOML list of photos:
///
/// ```toml
/// [[photo]]
/// path = "scene/front_door.jpg"
/// caption = "Front door, forced entry"
/// captured_at = "2024-03-09 14:05:07"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoManifest {
    #[serde(default, rename = "photo")]
    pub photos: Vec<PhotoItem>,
}

impl PhotoManifest {
    /// Load a manifest file.
    ///
    /// Relative photo paths resolve against the manifest's directory and
    /// missing dimensions are read from the image headers when possible.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&content, base).map_err(|e| match e {
            ManifestError::Parse { source, .. } => ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse manifest text, resolving relative paths against `base`.
    pub fn parse(content: &str, base: &Path) -> Result<Self, ManifestError> {
        let mut manifest: PhotoManifest =
            toml::from_str(content).map_err(|source| ManifestError::Parse {
                path: PathBuf::new(),
                source,
            })?;

        for (index, photo) in manifest.photos.iter_mut().enumerate() {
            if photo.path.as_os_str().is_empty() {
                return Err(ManifestError::EmptyPath { index: index + 1 });
            }
            if photo.path.is_relative() {
                photo.path = base.join(&photo.path);
            }
            if !photo.probe_dimensions() {
                tracing::debug!(path = %photo.path.display(), "Could not read photo dimensions");
            }
        }

        Ok(manifest)
    }

    /// Number of photos.
    pub fn len(&self) -> usize {
        self.photos.len()
    }

    /// Whether the manifest lists no photos.
    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}

impl PhotoSource for PhotoManifest {
    fn snapshot(&self) -> Vec<PhotoItem> {
        self.photos.clone()
    }
}

/// `captured_at` as `YYYY-MM-DD HH:MM:SS`.
mod capture_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.serialize_str(&time.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| NaiveDateTime::parse_from_str(s.trim(), FORMAT))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
