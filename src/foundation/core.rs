use crate::foundation::error::{InkstepError, InkstepResult};

pub use kurbo::Point;

/// Backing raster resolution in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> InkstepResult<Self> {
        if width == 0 || height == 0 {
            return Err(InkstepError::validation("canvas width/height must be > 0"));
        }
        Ok(Self { width, height })
    }

    pub fn square(side: u32) -> InkstepResult<Self> {
        Self::new(side, side)
    }

    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// The size used for the uniform replay scale rule.
    pub fn min_side(self) -> u32 {
        self.width.min(self.height)
    }
}

/// The on-screen rectangle a canvas occupies, in display pixels. Display size can
/// differ from the backing raster resolution (device pixel scaling, CSS sizing).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> InkstepResult<Self> {
        if !(width > 0.0) || !(height > 0.0) {
            return Err(InkstepError::validation(
                "display rect width/height must be > 0",
            ));
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }
}

/// Straight (non-premultiplied) opaque RGB8. The drawing surface has no alpha:
/// every pixel is either background or ink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` (the form strokes are persisted with).
    pub fn from_hex(s: &str) -> InkstepResult<Self> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| InkstepError::validation(format!("color '{s}' must start with '#'")))?;
        if hex.len() != 6 {
            return Err(InkstepError::validation(format!(
                "color '{s}' must be #RRGGBB"
            )));
        }
        let parse = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|e| InkstepError::validation(format!("color '{s}': {e}")))
        };
        Ok(Self {
            r: parse(0..2)?,
            g: parse(2..4)?,
            b: parse(4..6)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl serde::Serialize for Rgb8 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Rgb8 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgb8::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The fixed five-color palette offered during a drawing session.
pub const DEFAULT_PALETTE: [Rgb8; 5] = [
    Rgb8::new(0x00, 0x00, 0x00), // black
    Rgb8::new(0x00, 0x66, 0xFF), // blue
    Rgb8::new(0xFF, 0x00, 0x00), // red
    Rgb8::new(0x00, 0xCC, 0x00), // green
    Rgb8::new(0xFF, 0xCC, 0x00), // yellow
];

/// The paper-beige background every surface is cleared to.
pub const DEFAULT_BACKGROUND: Rgb8 = Rgb8::new(0xF5, 0xF5, 0xDC);
