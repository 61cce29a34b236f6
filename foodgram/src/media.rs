//! Recipe image storage.
//!
//! Images arrive inline in JSON as `data:image/<type>;base64,<payload>` or as bare base64.
//! They are decoded, fully parsed with the `image` crate, and written below `media.root`. The
//! database keeps the relative path; responses expose it under `media.url_prefix`.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    config::MediaConfig,
    errors::{Error, Result},
};

const IMAGE_DIR: &str = "recipes/images";

/// Image formats accepted for recipes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Detect the format from the leading bytes of the file
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Gif => Some(ImageFormat::Gif),
            image::ImageFormat::WebP => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Webp => image::ImageFormat::WebP,
        }
    }
}

/// A decoded, validated image ready to be written
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// Decode an inline image payload and check it against the size cap.
pub fn decode_image(payload: &str, max_bytes: usize) -> Result<DecodedImage> {
    let encoded = match payload.trim().strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| Error::invalid("image", "malformed data URI"))?;
            if !meta.ends_with(";base64") {
                return Err(Error::invalid("image", "data URI must be base64 encoded"));
            }
            data
        }
        None => payload.trim(),
    };

    if encoded.is_empty() {
        return Err(Error::invalid("image", "image is required"));
    }

    // Reject before decoding: base64 inflates by 4/3
    if encoded.len() / 4 * 3 > max_bytes + 3 {
        return Err(Error::invalid("image", format!("must not exceed {max_bytes} bytes")));
    }

    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| Error::invalid("image", format!("invalid base64: {e}")))?;

    if bytes.len() > max_bytes {
        return Err(Error::invalid("image", format!("must not exceed {max_bytes} bytes")));
    }

    let format = ImageFormat::sniff(&bytes).ok_or_else(|| Error::invalid("image", "unsupported image format"))?;

    // A matching signature is not enough: the whole file has to decode
    let decoded = image::load_from_memory_with_format(&bytes, format.into())
        .map_err(|e| Error::invalid("image", format!("not a valid {} image: {e}", format.extension())))?;
    debug!("Decoded {}x{} {:?} image", decoded.width(), decoded.height(), format);

    Ok(DecodedImage { format, bytes })
}

/// Filesystem-backed media store
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    url_prefix: String,
    max_image_bytes: usize,
}

impl MediaStorage {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: config.root.clone(),
            url_prefix: config.url_prefix.trim_end_matches('/').to_string(),
            max_image_bytes: config.max_image_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decode and persist a recipe image, returning the path relative to the media root
    #[instrument(skip(self, payload), err)]
    pub async fn save_recipe_image(&self, payload: &str) -> Result<String> {
        let payload = payload.to_owned();
        let max_bytes = self.max_image_bytes;
        let image = tokio::task::spawn_blocking(move || decode_image(&payload, max_bytes))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("decode image: {e}"),
            })??;

        let dir = self.root.join(IMAGE_DIR);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| Error::Internal {
            operation: format!("create media directory {}: {e}", dir.display()),
        })?;

        let id = Uuid::new_v4().simple().to_string();
        let file_name = format!("{}.{}", &id[..12], image.format.extension());
        let path = dir.join(&file_name);
        tokio::fs::write(&path, &image.bytes).await.map_err(|e| Error::Internal {
            operation: format!("write image {}: {e}", path.display()),
        })?;

        debug!("Stored recipe image {} ({} bytes)", file_name, image.bytes.len());
        Ok(format!("{IMAGE_DIR}/{file_name}"))
    }

    /// Remove a stored file. Failures are logged, never returned.
    pub async fn remove(&self, relative: &str) {
        if relative.is_empty() || relative.contains("..") {
            return;
        }
        let path = self.root.join(relative);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove media file {}: {e}", path.display());
        }
    }

    /// Public URL for a stored path
    pub fn url_for(&self, relative: &str) -> String {
        format!("{}/{}", self.url_prefix, relative.trim_start_matches('/'))
    }
}
