use std::path::Path;

use anyhow::Context;
use image::{ImageBuffer, Rgb, RgbImage};

use crate::util::{Color, BLACK};

/// Image, holding its width, height and private flat array(vec) of pixel colors.
/// (0, 0) is the bottom left coord, same as in the screen space produced by the pipeline.
pub struct Image {
    pub width: u32,
    pub height: u32,
    pixel_data: Vec<Color>, // Storing flat array.
}

impl Image {
    /// Generates new image struct with specified width and height, filled with black.
    pub fn new(width: u32, height: u32) -> Image {
        let capacity = (width * height) as usize;
        return Image {
            width,
            height,
            pixel_data: vec![BLACK; capacity],
        };
    }

    fn index(&self, x: u32, y: u32) -> usize {
        return x as usize + y as usize * self.width as usize;
    }

    /// Sets image pixel to a color at specified coordinate.
    /// Writes outside of the image are ignored.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = self.index(x, y);
        self.pixel_data[index] = color;
    }

    pub fn get(&self, x: u32, y: u32) -> Color {
        return self.pixel_data[self.index(x, y)];
    }

    /// Flat rgb8 data, top row first, as expected by image viewers and encoders.
    pub fn as_rgb8_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(3 * self.pixel_data.len());
        // Forcing (0, 0) to be in the bottom left here by iterating rows in reverse.
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                data.extend_from_slice(&self.get(x, y).to_rgb8());
            }
        }
        return data;
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        return ImageBuffer::from_fn(self.width, self.height, |x, row| {
            Rgb(self.get(x, self.height - 1 - row).to_rgb8())
        });
    }

    /// Encodes the image, format is picked by the file extension.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        self.to_rgb_image()
            .save(path)
            .with_context(|| format!("failed to write image to {}", path.display()))?;
        return Ok(());
    }
}

/// Per-pixel depth storage.
/// The initial "no surface yet" value is passed explicitly and has to lose against any real
/// depth under the comparison used by the depth resolver.
pub struct DepthBuffer {
    pub width: u32,
    pub height: u32,
    depth_data: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32, sentinel: f32) -> DepthBuffer {
        return DepthBuffer {
            width,
            height,
            depth_data: vec![sentinel; (width * height) as usize],
        };
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        return self.depth_data[x as usize + y as usize * self.width as usize];
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let index = x as usize + y as usize * self.width as usize;
        self.depth_data[index] = value;
    }

    /// Grayscale picture of the buffer: the closest surface is white, the furthest one is dim
    /// and pixels without a surface stay black.
    /// Lazy in a sense, that it's calculated only if this call is made.
    pub fn to_image(&self) -> Image {
        let finite = self.depth_data.iter().copied().filter(|z| z.is_finite());
        let z_max = finite.clone().fold(f32::MIN, f32::max);
        let z_min = finite.fold(f32::MAX, f32::min);
        let scale = (z_max - z_min).max(f32::EPSILON);

        let mut image = Image::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let z = self.get(x, y);
                if !z.is_finite() {
                    continue;
                }
                let value = 0.2 + 0.8 * (z - z_min) / scale;
                image.set(x, y, Color::new(value, value, value));
            }
        }
        return image;
    }
}

/// Buffers produced by rendering one frame.
pub struct Frame {
    pub image: Image,
    pub depth: DepthBuffer,
}
