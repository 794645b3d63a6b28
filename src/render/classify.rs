use crate::detect::PersonDetection;

use super::canvas::Color;

/// Per-person class driving the colour-coding of boxes and panels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Classification {
    #[default]
    Unknown,
    Female,
    Male,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Unknown => "UNKNOWN",
            Classification::Female => "FEMALE",
            Classification::Male => "MALE",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Classification::Unknown => Color::GREEN,
            Classification::Female => Color::rgb(255, 107, 53),
            Classification::Male => Color::rgb(74, 144, 226),
        }
    }
}

/// Source of per-person classes. `index` is the detection's position in the
/// current snapshot.
pub trait PersonClassifier: Send {
    fn classify(&self, index: usize, detection: &PersonDetection) -> Classification;
}

/// Used when no real classifier is plugged in.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnknownClassifier;

impl PersonClassifier for UnknownClassifier {
    fn classify(&self, _index: usize, _detection: &PersonDetection) -> Classification {
        Classification::Unknown
    }
}
