//! Individual drawing layers composed by the pipeline, bottom to top.

use chrono::NaiveDateTime;
use rand::Rng;

use super::canvas::{Canvas, Color, TextAlign, TextStyle};
use super::classify::Classification;
use super::ui::{Button, ButtonLayout};
use crate::capture::{CaptureSession, CaptureState};
use crate::detect::PersonDetection;
use crate::geometry::{Point, Rect};

pub const BOX_STROKE: f32 = 3.0;
pub const LABEL_WIDTH: f32 = 140.0;
pub const LABEL_HEIGHT: f32 = 22.0;
/// Label box sits this far above the detection box.
pub const LABEL_RISE: f32 = 28.0;

pub const PANEL_WIDTH: f32 = 200.0;
pub const PANEL_HEIGHT: f32 = 110.0;
pub const PANEL_SPACING: f32 = PANEL_HEIGHT + 18.0;
/// Panel inset from the surface edges, as a fraction of the surface size.
pub const PANEL_INSET: f32 = 0.05;

const PANEL_FILL: Color = Color::rgba(0, 0, 0, 160);
const LOADING_FILL: Color = Color::rgba(0, 0, 0, 220);

pub fn draw_tint(canvas: &mut dyn Canvas, frame_rect: Rect, alpha: u8) {
    canvas.fill_rect(frame_rect, Color::GREEN.with_alpha(alpha));
}

/// `PERSON_001 85%`
pub fn label_text(index: usize, confidence: f32) -> String {
    format!("PERSON_{:03} {:02.0}%", index + 1, confidence * 100.0)
}

/// Outline plus label box for one detection already mapped to display space.
pub fn draw_detection(
    canvas: &mut dyn Canvas,
    index: usize,
    detection: &PersonDetection,
    display_box: Rect,
    class: Classification,
) {
    let color = class.color();
    canvas.stroke_rect(display_box, color, BOX_STROKE);

    let label = Rect::from_origin_size(
        display_box.min_x,
        display_box.min_y - LABEL_RISE,
        LABEL_WIDTH,
        LABEL_HEIGHT,
    );
    canvas.fill_rect(label, color);
    canvas.text(
        &label_text(index, detection.confidence),
        Point::new(label.min_x + 6.0, label.min_y + LABEL_HEIGHT / 2.0),
        TextStyle::new(12.0, Color::BLACK),
    );
}

/// Where the `index`th info panel goes. Panels stack down the left edge and the
/// overflow piles up at the lowest slot that still fits the surface.
pub fn panel_rect(index: usize, surface_width: u32, surface_height: u32) -> Rect {
    let inset_x = surface_width as f32 * PANEL_INSET;
    let inset_y = surface_height as f32 * PANEL_INSET;
    let height = surface_height as f32;
    let mut y = inset_y + index as f32 * PANEL_SPACING;
    if y + PANEL_HEIGHT + inset_y > height {
        y = height - PANEL_HEIGHT - inset_y;
    }
    Rect::from_origin_size(inset_x, y, PANEL_WIDTH, PANEL_HEIGHT)
}

pub fn draw_info_panel(
    canvas: &mut dyn Canvas,
    index: usize,
    detection: &PersonDetection,
    class: Classification,
) -> Rect {
    let panel = panel_rect(index, canvas.width(), canvas.height());
    let color = class.color();
    let (x, y) = (panel.min_x + 10.0, panel.min_y);

    canvas.fill_rect(panel, PANEL_FILL);
    canvas.stroke_rect(panel, color, 1.0);
    canvas.text(
        &format!("PERSON_{:03}", index + 1),
        Point::new(x, y + 20.0),
        TextStyle::new(12.0, color).bold(),
    );
    canvas.text(
        &format!("CLASS: {}", class.label()),
        Point::new(x, y + 42.0),
        TextStyle::new(11.0, color),
    );
    canvas.text(
        &format!("CONFIDENCE: {:04.1}%", detection.confidence * 100.0),
        Point::new(x, y + 62.0),
        TextStyle::new(11.0, color),
    );
    canvas.line(
        Point::new(x, y + 76.0),
        Point::new(panel.max_x - 10.0, y + 76.0),
        color.with_alpha(100),
        1.0,
    );
    canvas.text(
        "STATUS: TRACKING",
        Point::new(x, y + 92.0),
        TextStyle::new(11.0, Color::GREEN),
    );
    panel
}

/// Uncorrelated per-cell darkening, redrawn from scratch every tick.
pub fn draw_noise<R: Rng>(
    canvas: &mut dyn Canvas,
    rng: &mut R,
    step: u32,
    alpha_min: u8,
    alpha_max: u8,
) {
    let step = step.max(1);
    let (lo, hi) = (alpha_min.min(alpha_max), alpha_min.max(alpha_max));
    let (w, h) = (canvas.width(), canvas.height());
    let size = step as f32;
    for x in (0..w).step_by(step as usize) {
        for y in (0..h).step_by(step as usize) {
            let alpha = rng.gen_range(lo..=hi);
            canvas.fill_rect(
                Rect::from_origin_size(x as f32, y as f32, size, size),
                Color::BLACK.with_alpha(alpha),
            );
        }
    }
}

pub fn draw_hud(canvas: &mut dyn Canvas, now: NaiveDateTime) {
    let style = TextStyle::new(12.0, Color::GREEN);
    canvas.text(
        &now.format("%Y-%m-%d").to_string(),
        Point::new(20.0, 30.0),
        style,
    );
    canvas.text(
        "SURVEILLANCE SYSTEM",
        Point::new(20.0, 50.0),
        TextStyle::new(12.0, Color::GREEN.with_alpha(200)),
    );
    canvas.text(
        &now.format("%H:%M:%S").to_string(),
        Point::new(canvas.width() as f32 - 20.0, 50.0),
        style.align(TextAlign::Right),
    );
}

/// Capture buttons plus the recording indicator. The GIF button is dimmed
/// when recording is unavailable.
pub fn draw_capture_controls(
    canvas: &mut dyn Canvas,
    layout: &ButtonLayout,
    state: CaptureState,
    session: Option<CaptureSession>,
) {
    for (button, rect) in layout.buttons() {
        let color = match (button, state) {
            (Button::Gif, CaptureState::Unavailable) => Color::GREEN.with_alpha(80),
            _ => Color::GREEN,
        };
        canvas.stroke_rect(rect, color, 1.0);
        canvas.text(
            button.label(),
            Point::new(
                (rect.min_x + rect.max_x) / 2.0,
                (rect.min_y + rect.max_y) / 2.0,
            ),
            TextStyle::new(12.0, color).align(TextAlign::Center),
        );
    }
    if let Some(session) = session {
        let at = Point::new(
            layout.gif.max_x + 12.0,
            (layout.gif.min_y + layout.gif.max_y) / 2.0,
        );
        canvas.text(
            &format!("REC {}/{}", session.frames_captured, session.frame_budget),
            at,
            TextStyle::new(12.0, Color::rgb(255, 0, 0)).bold(),
        );
    }
}

pub fn loading_dots(tick: u64) -> usize {
    ((tick / 30) % 4) as usize
}

pub fn draw_loading(canvas: &mut dyn Canvas, tick: u64) {
    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    canvas.fill_rect(Rect::from_corners(0.0, 0.0, w, h), LOADING_FILL);
    canvas.text(
        "INITIALIZING SYSTEM",
        Point::new(w / 2.0, h / 2.0 - 20.0),
        TextStyle::new(24.0, Color::GREEN)
            .align(TextAlign::Center)
            .bold(),
    );
    canvas.text(
        &format!("Loading detection model{}", ".".repeat(loading_dots(tick))),
        Point::new(w / 2.0, h / 2.0 + 20.0),
        TextStyle::new(14.0, Color::GREEN).align(TextAlign::Center),
    );
}
