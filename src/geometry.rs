//! Source-frame to display-surface geometry.
//!
//! The camera frame is aspect-fitted into the display surface and centered.
//! Every overlay element (boxes, labels, panels) must be positioned through the
//! same [`DisplayTransform`] as the video so they line up pixel-exactly.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle stored as min/max corners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Rect {
    pub fn from_corners(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_origin_size(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::from_corners(x, y, x + w, y + h)
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn origin(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    /// Grow by `margin` on every side.
    pub fn expand(self, margin: f32) -> Self {
        Self::from_corners(
            self.min_x - margin,
            self.min_y - margin,
            self.max_x + margin,
            self.max_y + margin,
        )
    }

    /// Clamp both corners into `[0, width] x [0, height]`.
    pub fn clamp_to(self, width: f32, height: f32) -> Self {
        Self::from_corners(
            self.min_x.clamp(0.0, width),
            self.min_y.clamp(0.0, height),
            self.max_x.clamp(0.0, width),
            self.max_y.clamp(0.0, height),
        )
    }

    /// Strict containment, matching pointer hit-testing on button edges.
    pub fn contains_strict(&self, p: Point) -> bool {
        p.x > self.min_x && p.x < self.max_x && p.y > self.min_y && p.y < self.max_y
    }
}

/// Scale and offset that fit a frame into a surface, recomputed every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl DisplayTransform {
    /// Aspect-preserving, centered fit.
    ///
    /// Degenerate (zero) dimensions yield a zero scale; callers treat that as
    /// "nothing renders this tick".
    pub fn fit(frame_width: u32, frame_height: u32, surface_width: u32, surface_height: u32) -> Self {
        if frame_width == 0 || frame_height == 0 || surface_width == 0 || surface_height == 0 {
            return Self::default();
        }
        let (fw, fh) = (frame_width as f32, frame_height as f32);
        let (sw, sh) = (surface_width as f32, surface_height as f32);
        let scale = (sw / fw).min(sh / fh);
        Self {
            scale,
            offset_x: (sw - fw * scale) / 2.0,
            offset_y: (sh - fh * scale) / 2.0,
        }
    }

    pub fn is_renderable(&self) -> bool {
        self.scale > 0.0 && self.scale.is_finite()
    }

    pub fn map_point(&self, p: Point) -> Point {
        Point::new(
            self.offset_x + p.x * self.scale,
            self.offset_y + p.y * self.scale,
        )
    }

    pub fn map_rect(&self, r: Rect) -> Rect {
        let min = self.map_point(Point::new(r.min_x, r.min_y));
        let max = self.map_point(Point::new(r.max_x, r.max_y));
        Rect::from_corners(min.x, min.y, max.x, max.y)
    }

    /// Inverse of [`map_point`](Self::map_point). `None` when nothing renders.
    pub fn unmap_point(&self, p: Point) -> Option<Point> {
        if !self.is_renderable() {
            return None;
        }
        Some(Point::new(
            (p.x - self.offset_x) / self.scale,
            (p.y - self.offset_y) / self.scale,
        ))
    }

    /// Display-space region covered by a frame of the given size.
    pub fn frame_rect(&self, frame_width: u32, frame_height: u32) -> Rect {
        self.map_rect(Rect::from_corners(
            0.0,
            0.0,
            frame_width as f32,
            frame_height as f32,
        ))
    }
}
