//! # Credential Renderer
//!
//! Composes the visual gift-card artifact.
//!
//! ## Render Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Artifact Composition                              │
//! │                                                                         │
//! │  CredentialRenderer::new(template)                                     │
//! │       └── reads the background PNG exactly ONCE and caches it          │
//! │                                                                         │
//! │  render(card_number, amount, sealed_token)                             │
//! │       │                                                                 │
//! │       ├── QrCode::new(sealed_token)      ← external collaborator;      │
//! │       │       (module matrix only)         DataTooLong → RenderFailed  │
//! │       ├── scale modules + quiet zone     ← layout, owned here          │
//! │       ├── clone background, stamp QR     ← layout, owned here          │
//! │       ├── denomination accent band       ← pure function of amount     │
//! │       └── encode PNG → Vec<u8>                                         │
//! │                                                                         │
//! │  ArtifactStore::save(card_number, bytes)                               │
//! │       └── giftcard-<cardNumber>.png under the artifact directory       │
//! │                                                                         │
//! │  Everything here happens BEFORE persistence: a failed render aborts    │
//! │  the issuance attempt with no durable side effect.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rendering is a pure function of its inputs apart from that one cached
//! template read, so identical credentials produce identical artifacts.

use image::{imageops, ImageFormat, Rgba, RgbaImage};
use qrcode::types::QrError;
use qrcode::QrCode;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use giftwise_core::{Amount, CardNumber};

// =============================================================================
// Errors
// =============================================================================

/// Rendering and artifact storage errors. All of them abort the issuance
/// attempt before anything is persisted.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The background template could not be read or decoded.
    #[error("background template unavailable: {0}")]
    Template(String),

    /// The sealed token does not fit the code format's capacity.
    #[error("sealed token payload too long for the code format")]
    PayloadTooLong,

    /// The code collaborator rejected the payload for another reason.
    #[error("code encoding failed: {0}")]
    Encoding(String),

    /// PNG encoding of the composed artifact failed.
    #[error("artifact encoding failed: {0}")]
    ArtifactEncoding(String),

    /// Writing the artifact file failed.
    #[error("artifact write failed: {0}")]
    ArtifactWrite(String),
}

impl From<QrError> for RenderError {
    fn from(err: QrError) -> Self {
        match err {
            QrError::DataTooLong => RenderError::PayloadTooLong,
            other => RenderError::Encoding(other.to_string()),
        }
    }
}

// =============================================================================
// Template
// =============================================================================

/// Layout configuration for the rendered card.
///
/// Geometry lives here, not in the drawing code, so a different card face is
/// a config change.
#[derive(Debug, Clone)]
pub struct CardTemplate {
    /// Path to the static background PNG (the one external resource).
    pub background_path: PathBuf,

    /// Top-left corner of the QR stamp, in background pixels.
    pub qr_origin: (u32, u32),

    /// Approximate edge length of the QR stamp in pixels; the actual size
    /// rounds to a whole number of pixels per module.
    pub qr_target_px: u32,

    /// Height of the denomination accent band drawn across the top edge.
    pub band_height: u32,
}

impl CardTemplate {
    /// Template with the stock card-face geometry (300x550 portrait card,
    /// 150px code in the lower half).
    pub fn new(background_path: impl Into<PathBuf>) -> Self {
        CardTemplate {
            background_path: background_path.into(),
            qr_origin: (75, 270),
            qr_target_px: 150,
            band_height: 8,
        }
    }
}

/// Accent band color for a denomination. Pure function: same amount, same
/// pixels.
fn band_color(amount: Amount) -> Rgba<u8> {
    match amount.value() {
        1000 => Rgba([176, 141, 87, 255]),  // bronze
        2000 => Rgba([192, 192, 192, 255]), // silver
        5000 => Rgba([212, 175, 55, 255]),  // gold
        _ => Rgba([128, 128, 128, 255]),
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// Fields the artifact is composed from.
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub card_number: CardNumber,
    pub amount: Amount,
    /// Wire-encoded sealed token; this exact string ends up in the QR.
    pub sealed_token: &'a str,
}

/// Composes gift-card artifacts over a cached background template.
#[derive(Debug, Clone)]
pub struct CredentialRenderer {
    template: CardTemplate,
    background: RgbaImage,
}

impl CredentialRenderer {
    /// Creates a renderer, performing the single background template read.
    ///
    /// A missing or undecodable template fails construction, not render
    /// calls, so issuance never gets halfway before noticing.
    pub fn new(template: CardTemplate) -> Result<Self, RenderError> {
        let background = image::open(&template.background_path)
            .map_err(|e| {
                RenderError::Template(format!(
                    "{}: {e}",
                    template.background_path.display()
                ))
            })?
            .to_rgba8();

        debug!(
            path = %template.background_path.display(),
            width = background.width(),
            height = background.height(),
            "Background template loaded"
        );

        Ok(CredentialRenderer {
            template,
            background,
        })
    }

    /// Composes one card artifact and returns it as PNG bytes.
    pub fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<u8>, RenderError> {
        let qr = self.qr_image(request.sealed_token)?;

        let mut canvas = self.background.clone();

        self.draw_band(&mut canvas, band_color(request.amount));

        let (x, y) = self.template.qr_origin;
        imageops::overlay(&mut canvas, &qr, x as i64, y as i64);

        let mut bytes = Cursor::new(Vec::new());
        canvas
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| RenderError::ArtifactEncoding(e.to_string()))?;

        debug!(
            card_number = %request.card_number,
            size = bytes.get_ref().len(),
            "Card artifact rendered"
        );

        Ok(bytes.into_inner())
    }

    /// Builds the QR stamp: the code collaborator supplies the module
    /// matrix, this function owns scaling, quiet zone and pixels.
    fn qr_image(&self, payload: &str) -> Result<RgbaImage, RenderError> {
        let code = QrCode::new(payload.as_bytes())?;

        let modules = code.width(); // modules per side
        let colors = code.to_colors(); // row-major module colors

        let module_px = (self.template.qr_target_px / modules as u32).max(1);
        // Standard QR quiet zone is 4 modules on every side
        let quiet_px = 4 * module_px;
        let edge_px = modules as u32 * module_px + 2 * quiet_px;

        let white = Rgba([255, 255, 255, 255]);
        let black = Rgba([0, 0, 0, 255]);
        let mut qr_img = RgbaImage::from_pixel(edge_px, edge_px, white);

        for (i, color) in colors.iter().enumerate() {
            if *color == qrcode::Color::Dark {
                let module_x = (i % modules) as u32;
                let module_y = (i / modules) as u32;
                let base_x = quiet_px + module_x * module_px;
                let base_y = quiet_px + module_y * module_px;

                for dy in 0..module_px {
                    for dx in 0..module_px {
                        qr_img.put_pixel(base_x + dx, base_y + dy, black);
                    }
                }
            }
        }

        Ok(qr_img)
    }

    /// Draws the denomination band across the top edge of the canvas.
    fn draw_band(&self, canvas: &mut RgbaImage, color: Rgba<u8>) {
        let height = self.template.band_height.min(canvas.height());
        for y in 0..height {
            for x in 0..canvas.width() {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

// =============================================================================
// Artifact Store
// =============================================================================

/// Stores rendered artifacts under a directory, one file per credential.
///
/// The returned artifact reference is the bare file name
/// (`giftcard-<cardNumber>.png`), kept opaque to everything but this store.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `dir` (created on first save).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ArtifactStore { dir: dir.into() }
    }

    /// Saves artifact bytes and returns the artifact reference.
    pub async fn save(&self, card_number: CardNumber, bytes: &[u8]) -> Result<String, RenderError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RenderError::ArtifactWrite(e.to_string()))?;

        let artifact_ref = format!("giftcard-{card_number}.png");
        let path = self.dir.join(&artifact_ref);

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| RenderError::ArtifactWrite(e.to_string()))?;

        debug!(path = %path.display(), "Card artifact stored");

        Ok(artifact_ref)
    }

    /// Absolute path of a stored artifact.
    pub fn path_for(&self, artifact_ref: &str) -> PathBuf {
        self.dir.join(artifact_ref)
    }

    /// The store's root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
