//! The device-context state a drawing order executes against.

use crate::surface::Rect;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackgroundMode {
    Transparent,
    Opaque,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pen {
    pub style: u8,
    pub width: u8,
    pub color: u32,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            style: 0,
            width: 1,
            color: 0,
        }
    }
}

/// Per-session drawing state shared by the raster primitives.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    clip: Option<Rect>,
    pub text_color: u32,
    pub background_color: u32,
    pub background_mode: BackgroundMode,
    pub pen: Pen,
    /// Pattern origin from the server's brush (`nXOrg`, `nYOrg`).
    pub brush_origin: (i32, i32),
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self {
            clip: None,
            text_color: 0,
            background_color: 0x00FF_FFFF,
            background_mode: BackgroundMode::Opaque,
            pen: Pen::default(),
            brush_origin: (0, 0),
        }
    }
}

impl DeviceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_clip(&mut self, clip: Option<Rect>) {
        self.clip = clip;
    }

    pub fn clip(&self) -> Option<Rect> {
        self.clip
    }

    /// Intersects a destination rectangle with the clip region and the
    /// surface extents. Clipping happens before drawing; the caller shifts
    /// source coordinates by the same delta.
    pub fn clip_rect(&self, dest: Rect, extents: Rect) -> Rect {
        let clipped = dest.intersect(&extents);
        match self.clip {
            Some(clip) => clipped.intersect(&clip),
            None => clipped,
        }
    }
}
