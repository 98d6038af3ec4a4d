//! Stage 1: cheap container and geometry checks

use super::verdict::{EvidenceKind, ScanContext};
use crate::bitmap::{decode_container, ImageSource, PixelBuffer};
use crate::error::StegoResult;
use tracing::debug;

/// Validate the request and produce a decoded bitmap
pub(crate) fn inspect(source: ImageSource, ctx: &mut ScanContext) -> StegoResult<PixelBuffer> {
    let image = match source {
        ImageSource::Raw(buffer) => {
            ctx.record(
                EvidenceKind::Passed,
                format!(
                    "raw bitmap {}x{}x{}",
                    buffer.width(),
                    buffer.height(),
                    buffer.channels()
                ),
            );
            buffer
        }
        ImageSource::Encoded(bytes) => decode(&bytes, ctx)?,
        ImageSource::File(path) => {
            let bytes = std::fs::read(&path)?;
            decode(&bytes, ctx)?
        }
    };

    debug!(
        label = ctx.label(),
        width = image.width(),
        height = image.height(),
        channels = image.channels(),
        "static scan passed"
    );
    Ok(image)
}

fn decode(bytes: &[u8], ctx: &mut ScanContext) -> StegoResult<PixelBuffer> {
    let (image, info) = decode_container(bytes)?;

    ctx.record(
        EvidenceKind::Passed,
        format!(
            "{} {}x{}x{}, {} bytes",
            info.format,
            info.width,
            info.height,
            info.channels,
            bytes.len()
        ),
    );
    if info.trailing_bytes > 0 {
        ctx.record(
            EvidenceKind::Note,
            format!("{} bytes hidden after PNG end marker", info.trailing_bytes),
        );
    }
    ctx.set_container(info);

    Ok(image)
}
