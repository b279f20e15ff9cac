use std::ops;

use serde::{Deserialize, Serialize};

/// Linear float rgb color.
/// Values are unrestricted while shading and only clamped to [0.0, 1.0] on export.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

impl Color {
    pub fn new(r: f32, g: f32, b: f32) -> Color {
        return Color { r, g, b };
    }

    /// Get convex combination of two colors: t * c_1 + (1 - t) * c_2.
    /// t is unrestricted.
    pub fn blend(color_1: Color, color_2: Color, t: f32) -> Color {
        return color_1 * t + color_2 * (1.0 - t);
    }

    /// Quantization to rgb8, clamping every channel to [0.0, 1.0] first.
    pub fn to_rgb8(&self) -> [u8; 3] {
        fn to_u8(channel: f32) -> u8 {
            return (channel.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        return [to_u8(self.r), to_u8(self.g), to_u8(self.b)];
    }
}

impl From<[f32; 3]> for Color {
    fn from(value: [f32; 3]) -> Color {
        return Color::new(value[0], value[1], value[2]);
    }
}

impl From<Color> for [f32; 3] {
    fn from(color: Color) -> [f32; 3] {
        return [color.r, color.g, color.b];
    }
}

impl ops::Add<Color> for Color {
    type Output = Color;

    fn add(self, _rhs: Color) -> Color {
        return Color {
            r: self.r + _rhs.r,
            g: self.g + _rhs.g,
            b: self.b + _rhs.b,
        };
    }
}

impl ops::AddAssign<Color> for Color {
    fn add_assign(&mut self, _rhs: Color) {
        *self = *self + _rhs;
    }
}

impl ops::Mul<f32> for Color {
    type Output = Color;

    fn mul(self, _rhs: f32) -> Color {
        return Color {
            r: self.r * _rhs,
            g: self.g * _rhs,
            b: self.b * _rhs,
        };
    }
}

/// Component-wise product, used for modulating light color by surface albedo.
impl ops::Mul<Color> for Color {
    type Output = Color;

    fn mul(self, _rhs: Color) -> Color {
        return Color {
            r: self.r * _rhs.r,
            g: self.g * _rhs.g,
            b: self.b * _rhs.b,
        };
    }
}
