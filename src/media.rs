//! Image-backed [`DerivativeCreator`].
//!
//! Renders reference display copies and thumbnails from the master's binary
//! with the image crate. Real deployments with video/audio masters or
//! OCR-driven transcripts substitute their own collaborator; the engine only
//! sees the trait.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use image::imageops::FilterType;
use tracing::{debug, info};

use crate::contract::{
    DerivativeCreator, DerivativeError, DigitalObject, UsageClass,
};
use crate::store::{NewDigitalObject, SqliteStore};

/// Longest edge of a reference display rendition, in pixels.
const REFERENCE_MAX_PX: u32 = 480;
/// Longest edge of a thumbnail rendition, in pixels.
const THUMBNAIL_MAX_PX: u32 = 100;

pub struct ImageDerivativeCreator {
    store: Arc<SqliteStore>,
    /// Root under which master and derivative paths are resolved.
    media_root: PathBuf,
}

impl ImageDerivativeCreator {
    pub fn new(store: Arc<SqliteStore>, media_root: PathBuf) -> Self {
        Self { store, media_root }
    }

    fn render_one(
        &self,
        master: &DigitalObject,
        usage: UsageClass,
    ) -> Result<DigitalObject, DerivativeError> {
        let max_px = match usage {
            UsageClass::Reference => REFERENCE_MAX_PX,
            UsageClass::Thumbnail => THUMBNAIL_MAX_PX,
            other => {
                return Err(format!(
                    "no rendition defined for usage classification {}",
                    other.as_str()
                )
                .into())
            }
        };

        let source = self.media_root.join(&master.path);
        debug!(source = %source.display(), usage = usage.as_str(), "Rendering derivative");
        let img = image::open(&source)
            .map_err(|e| format!("cannot decode master {}: {e}", source.display()))?;
        let rendition = img.resize(max_px, max_px, FilterType::Lanczos3);

        let stem = master
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| master.id.to_string());
        let name = format!("{stem}_{}.jpg", usage.as_str());
        let rel_path = PathBuf::from("derivatives").join(&name);
        let target = self.media_root.join(&rel_path);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
        }
        rendition
            .to_rgb8()
            .save(&target)
            .map_err(|e| format!("cannot write {}: {e}", target.display()))?;

        let record = self.store.create_object(NewDigitalObject {
            information_object_id: master.information_object_id,
            usage,
            parent_id: Some(master.id),
            name,
            path: rel_path,
        })?;
        info!(
            master_id = master.id,
            derivative_id = record.id,
            usage = usage.as_str(),
            path = %record.path.display(),
            "Wrote derivative"
        );
        Ok(record)
    }
}

#[async_trait]
impl DerivativeCreator for ImageDerivativeCreator {
    async fn create_derivatives(
        &self,
        master: DigitalObject,
        usage: UsageClass,
    ) -> Result<Vec<DigitalObject>, DerivativeError> {
        // The master sentinel fans out to the standard rendition set.
        let usages: &[UsageClass] = match usage {
            UsageClass::Master => &[UsageClass::Reference, UsageClass::Thumbnail],
            _ => std::slice::from_ref(&usage),
        };

        let mut created = Vec::with_capacity(usages.len());
        for u in usages {
            created.push(self.render_one(&master, *u)?);
        }
        Ok(created)
    }
}
