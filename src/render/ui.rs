//! Capture buttons: fixed size, anchored bottom-left, recomputed from the
//! surface size every tick so they follow resizes.

use crate::geometry::{Point, Rect};

pub const BUTTON_WIDTH: f32 = 60.0;
pub const BUTTON_HEIGHT: f32 = 30.0;
/// Gap between the two buttons.
pub const BUTTON_SPACING: f32 = 12.0;
/// Distance from the left and bottom edges.
pub const BUTTON_MARGIN: f32 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Png,
    Gif,
}

impl Button {
    pub fn label(&self) -> &'static str {
        match self {
            Button::Png => "PNG",
            Button::Gif => "GIF",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ButtonLayout {
    pub png: Rect,
    pub gif: Rect,
}

impl ButtonLayout {
    /// Only the height matters for a bottom-left anchor.
    pub fn for_surface(_width: u32, height: u32) -> Self {
        let x = BUTTON_MARGIN;
        let y = height as f32 - BUTTON_HEIGHT - BUTTON_MARGIN;
        let png = Rect::from_origin_size(x, y, BUTTON_WIDTH, BUTTON_HEIGHT);
        let gif = Rect::from_origin_size(
            x + BUTTON_WIDTH + BUTTON_SPACING,
            y,
            BUTTON_WIDTH,
            BUTTON_HEIGHT,
        );
        Self { png, gif }
    }

    pub fn buttons(&self) -> [(Button, Rect); 2] {
        [(Button::Png, self.png), (Button::Gif, self.gif)]
    }

    /// Button strictly containing the pointer; edges do not count.
    pub fn hit(&self, x: f32, y: f32) -> Option<Button> {
        let p = Point::new(x, y);
        self.buttons()
            .into_iter()
            .find(|(_, rect)| rect.contains_strict(p))
            .map(|(button, _)| button)
    }
}
