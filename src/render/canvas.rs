//! Drawing capability used by the render pipeline.
//!
//! `Canvas` is the seam to whatever actually puts pixels on a display. The
//! bundled `RasterCanvas` composites into an `image::RgbaImage` so headless
//! runs can still export what was drawn. It records text runs instead of
//! rasterizing glyphs.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use crate::geometry::{Point, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    fn to_pixel(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub color: Color,
    pub align: TextAlign,
    pub bold: bool,
}

impl TextStyle {
    pub fn new(size: f32, color: Color) -> Self {
        Self {
            size,
            color,
            align: TextAlign::Left,
            bold: false,
        }
    }

    pub fn align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

pub trait Canvas {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn clear(&mut self, color: Color);

    /// Draw `image` scaled into `dest`.
    fn draw_image(&mut self, image: &RgbaImage, dest: Rect);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn stroke_rect(&mut self, rect: Rect, color: Color, weight: f32);

    fn line(&mut self, from: Point, to: Point, color: Color, weight: f32);

    fn text(&mut self, text: &str, at: Point, style: TextStyle);

    /// Composited pixels drawn so far this tick. Capture reads from here.
    fn surface(&self) -> &RgbaImage;
}

/// A text draw call, kept for inspection by hosts and tests.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub at: Point,
    pub style: TextStyle,
}

/// Software canvas over an RGBA buffer with source-over blending.
pub struct RasterCanvas {
    image: RgbaImage,
    texts: Vec<TextRun>,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            texts: Vec::new(),
        }
    }

    /// Reallocate for a new surface size, like a window resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbaImage::new(width, height);
        }
        self.texts.clear();
    }

    pub fn texts(&self) -> &[TextRun] {
        &self.texts
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Pixel span covered by `rect`, clipped to the surface.
    fn span(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let (w, h) = self.image.dimensions();
        let x0 = rect.min_x.max(0.0).round();
        let y0 = rect.min_y.max(0.0).round();
        let x1 = rect.max_x.min(w as f32).round();
        let y1 = rect.max_y.min(h as f32).round();
        if !(x0 < x1 && y0 < y1) {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    fn blend_span(&mut self, rect: Rect, color: Color) {
        if color.a == 0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.span(rect) else {
            return;
        };
        let px = color.to_pixel();
        for y in y0..y1 {
            for x in x0..x1 {
                source_over(self.image.get_pixel_mut(x, y), px);
            }
        }
    }
}

/// Porter-Duff source-over on straight-alpha pixels. An opaque destination
/// stays opaque.
fn source_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src[3] as u32;
    if sa == 0 {
        return;
    }
    if sa == 255 {
        *dst = src;
        return;
    }
    let da = dst[3] as u32;
    // Both sides scaled by 255 * 255.
    let src_w = sa * 255;
    let dst_w = da * (255 - sa);
    let out = src_w + dst_w;
    for c in 0..3 {
        let v = (src[c] as u32 * src_w + dst[c] as u32 * dst_w + out / 2) / out;
        dst[c] = v as u8;
    }
    dst[3] = ((out + 127) / 255) as u8;
}

impl Canvas for RasterCanvas {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn clear(&mut self, color: Color) {
        let px = color.to_pixel();
        for p in self.image.pixels_mut() {
            *p = px;
        }
        self.texts.clear();
    }

    fn draw_image(&mut self, image: &RgbaImage, dest: Rect) {
        let w = dest.width().round();
        let h = dest.height().round();
        if w < 1.0 || h < 1.0 || image.width() == 0 || image.height() == 0 {
            return;
        }
        let scaled;
        let src = if image.dimensions() == (w as u32, h as u32) {
            image
        } else {
            scaled = image::imageops::resize(image, w as u32, h as u32, FilterType::Nearest);
            &scaled
        };
        let (ox, oy) = (dest.min_x.round() as i64, dest.min_y.round() as i64);
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        for (sx, sy, px) in src.enumerate_pixels() {
            let (x, y) = (ox + sx as i64, oy + sy as i64);
            if (0..w).contains(&x) && (0..h).contains(&y) {
                source_over(self.image.get_pixel_mut(x as u32, y as u32), *px);
            }
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.blend_span(rect, color);
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, weight: f32) {
        let t = weight.max(1.0);
        let half = t / 2.0;
        let outer = rect.expand(half);
        let (l, r) = (outer.min_x, outer.max_x);
        let (top, bottom) = (outer.min_y, outer.max_y);
        self.blend_span(Rect::from_corners(l, top, r, top + t), color);
        self.blend_span(Rect::from_corners(l, bottom - t, r, bottom), color);
        self.blend_span(Rect::from_corners(l, top + t, l + t, bottom - t), color);
        self.blend_span(Rect::from_corners(r - t, top + t, r, bottom - t), color);
    }

    fn line(&mut self, from: Point, to: Point, color: Color, weight: f32) {
        let half = weight.max(1.0) / 2.0;
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let (x, y) = (from.x + dx * t, from.y + dy * t);
            self.blend_span(Rect::from_corners(x - half, y - half, x + half, y + half), color);
        }
    }

    fn text(&mut self, text: &str, at: Point, style: TextStyle) {
        self.texts.push(TextRun {
            text: text.to_string(),
            at,
            style,
        });
    }

    fn surface(&self) -> &RgbaImage {
        &self.image
    }
}
