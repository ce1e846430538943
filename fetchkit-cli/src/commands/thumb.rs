//! Thumbnail CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Subcommand;
use fetchkit::thumbnail::{
    ThumbnailCodec, ThumbnailPacket, ThumbnailRequest, DEFAULT_PIXEL_BUDGET,
};

use crate::error::CliError;

/// Thumbnail subcommands.
#[derive(Debug, Subcommand)]
pub enum ThumbAction {
    /// Encode an image file into a thumbnail packet
    Encode {
        /// Source image
        input: PathBuf,

        /// Packet output file
        output: PathBuf,

        /// Data-type tag stored in the packet
        #[arg(long, default_value_t = 1)]
        data_type: u8,

        /// JPEG quality in [0, 1]
        #[arg(long, default_value_t = 0.6)]
        quality: f32,

        /// Target pixel count of the thumbnail
        #[arg(long, default_value_t = DEFAULT_PIXEL_BUDGET)]
        budget: u32,
    },

    /// Decode a thumbnail packet into an image file
    Decode {
        /// Packet file
        input: PathBuf,

        /// Image output file; the extension selects the format
        output: PathBuf,

        /// JPEG quality the packet was encoded with
        #[arg(long, default_value_t = 0.6)]
        quality: f32,

        /// Maximum output width in points
        #[arg(long, default_value_t = 256)]
        width: u32,

        /// Maximum output height in points
        #[arg(long, default_value_t = 256)]
        height: u32,

        /// Blur radius in points
        #[arg(long, default_value_t = 0.0)]
        blur: f32,

        /// Pixels per point
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
    },
}

/// Run a thumbnail subcommand.
pub fn run(action: ThumbAction) -> Result<(), CliError> {
    match action {
        ThumbAction::Encode {
            input,
            output,
            data_type,
            quality,
            budget,
        } => run_encode(&input, &output, data_type, quality, budget),
        ThumbAction::Decode {
            input,
            output,
            quality,
            width,
            height,
            blur,
            scale,
        } => {
            let request = ThumbnailRequest::new(width, height)
                .with_blur(blur)
                .with_scale(scale);
            run_decode(&input, &output, quality, request)
        }
    }
}

fn check_quality(quality: f32) -> Result<(), CliError> {
    if (0.0..=1.0).contains(&quality) {
        Ok(())
    } else {
        Err(CliError::InvalidArgument(format!(
            "quality {} is outside [0, 1]",
            quality
        )))
    }
}

fn run_encode(
    input: &Path,
    output: &Path,
    data_type: u8,
    quality: f32,
    budget: u32,
) -> Result<(), CliError> {
    check_quality(quality)?;
    let image =
        image::open(input).map_err(|e| CliError::Image(format!("{}: {}", input.display(), e)))?;

    let packet = ThumbnailCodec::new().try_encode(&image, data_type, quality, budget)?;
    let bytes = packet.to_bytes();
    fs::write(output, &bytes).map_err(|e| CliError::io(output, e))?;

    println!(
        "{}x{} -> {}x{} thumbnail, {} bytes",
        image.width(),
        image.height(),
        packet.width,
        packet.height,
        bytes.len()
    );
    Ok(())
}

fn run_decode(
    input: &Path,
    output: &Path,
    quality: f32,
    request: ThumbnailRequest,
) -> Result<(), CliError> {
    check_quality(quality)?;
    let bytes = fs::read(input).map_err(|e| CliError::io(input, e))?;
    let packet = ThumbnailPacket::parse(&bytes)?;

    let codec = ThumbnailCodec::new();
    codec.register_header(packet.data_type, ThumbnailCodec::donor_header(quality)?);
    let image = codec.try_decode(&bytes, &request)?;

    image
        .save(output)
        .map_err(|e| CliError::Image(format!("{}: {}", output.display(), e)))?;
    println!(
        "{}x{} thumbnail -> {}x{} image at {}",
        packet.width,
        packet.height,
        image.width(),
        image.height(),
        output.display()
    );
    Ok(())
}
