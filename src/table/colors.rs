//! Badge colors for select and switch cells.

use crate::config::{BadgeColor, FieldDescriptor};

/// Common status words colored the same in every module unless the field says otherwise.
const STATUS_COLORS: [(&str, BadgeColor); 4] = [
    ("active", BadgeColor::Green),
    ("inactive", BadgeColor::Red),
    ("pending", BadgeColor::Yellow),
    ("completed", BadgeColor::Blue),
];

/// Field `colorMap` first, then the shared status table, then gray.
pub fn badge_color(field: &FieldDescriptor, value: &str) -> BadgeColor {
    if let Some(color) = field.color_map.get(value) {
        return *color;
    }
    status_color(value).unwrap_or(BadgeColor::Gray)
}

pub fn status_color(value: &str) -> Option<BadgeColor> {
    let lower = value.to_lowercase();
    STATUS_COLORS
        .iter()
        .find(|(word, _)| *word == lower)
        .map(|(_, color)| *color)
}

impl BadgeColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeColor::Green => "green",
            BadgeColor::Red => "red",
            BadgeColor::Yellow => "yellow",
            BadgeColor::Blue => "blue",
            BadgeColor::Purple => "purple",
            BadgeColor::Orange => "orange",
            BadgeColor::Indigo => "indigo",
            BadgeColor::Gray => "gray",
        }
    }
}
