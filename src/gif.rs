//! Animated GIFs from sequences of rendered PNG frames.

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};
use log::{debug, info};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{invalid, DiagError, Result};

#[derive(Debug, Clone)]
pub struct GifOptions {
    pub fps: u32,
    pub gifdir: PathBuf,
    pub head_name: String,
    /// Output stem; the GIF is written to `{gifdir}/{name}.gif`.
    pub name: String,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            fps: 2,
            gifdir: PathBuf::from("figures/frame_dir"),
            head_name: "median_residual_and_smoothed_band".to_string(),
            name: "multiz".to_string(),
        }
    }
}

impl GifOptions {
    pub fn output_path(&self) -> PathBuf {
        self.gifdir.join(format!("{}.gif", self.name))
    }

    /// Frames `{gifdir}/{head_name}{i}.png` for `i` in `0..n_image`.
    pub fn numbered(&self, n_image: usize) -> FrameSource {
        FrameSource::Numbered {
            dir: self.gifdir.clone(),
            head: self.head_name.clone(),
            count: n_image,
        }
    }
}

/// Where the frames come from. Frames are used in the order given, never
/// re-sorted.
#[derive(Debug, Clone)]
pub enum FrameSource {
    Files(Vec<PathBuf>),
    Numbered { dir: PathBuf, head: String, count: usize },
}

impl FrameSource {
    pub fn paths(&self) -> Vec<PathBuf> {
        match self {
            FrameSource::Files(files) => files.clone(),
            FrameSource::Numbered { dir, head, count } => (0..*count)
                .map(|i| dir.join(format!("{}{}.png", head, i)))
                .collect(),
        }
    }
}

/// Writes the frames of `source` to an animated GIF at `output`, showing
/// each for `1000 / fps` ms. Returns the number of frames written.
pub fn convert_png_to_gif(source: &FrameSource, output: &Path, fps: u32) -> Result<usize> {
    if fps == 0 {
        return invalid("frame rate must be positive");
    }
    let paths = source.paths();
    if paths.is_empty() {
        return invalid("no frames to assemble");
    }

    let mut frames = Vec::with_capacity(paths.len());
    let mut expected = None;
    for (index, path) in paths.iter().enumerate() {
        let image = image::open(path)?.to_rgba8();
        let found = image.dimensions();
        let first = *expected.get_or_insert(found);
        if first != found {
            return Err(DiagError::FrameSizeMismatch {
                index,
                expected: first,
                found,
            });
        }
        debug!("frame {} <- {}", index, path.display());
        frames.push(image);
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let delay = Delay::from_numer_denom_ms(1000, fps);
    let n_frames = frames.len();
    {
        let mut encoder = GifEncoder::new(File::create(output)?);
        encoder.set_repeat(Repeat::Infinite)?;
        for image in frames {
            encoder.encode_frame(Frame::from_parts(image, 0, 0, delay))?;
        }
    }
    info!("wrote {} frames at {} fps to {}", n_frames, fps, output.display());
    Ok(n_frames)
}

/// Builds `{gifdir}/{name}.gif` from an explicit list of files if given,
/// otherwise from the numbered frames `{gifdir}/{head_name}{i}.png`.
pub fn make_gif(n_image: usize, filename_list: Option<&[PathBuf]>, options: &GifOptions) -> Result<PathBuf> {
    let source = match filename_list {
        Some(files) => FrameSource::Files(files.to_vec()),
        None => options.numbered(n_image),
    };
    let output = options.output_path();
    convert_png_to_gif(&source, &output, options.fps)?;
    Ok(output)
}
