//! The fixed sixteen-color palette.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// A color from the fixed palette.
///
/// On the wire a color is its palette index (`0..16`). Decoding an index
/// outside the palette fails, so an invalid color can never be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlaceColor {
    #[default]
    White,
    Silver,
    Gray,
    Black,
    Maroon,
    Red,
    Olive,
    Yellow,
    Green,
    Lime,
    Teal,
    Aqua,
    Navy,
    Blue,
    Purple,
    Fuchsia,
}

impl PlaceColor {
    /// Number of colors in the palette.
    pub const TOTAL_COLORS: u8 = 16;

    /// Every color, ordered by palette index.
    pub const ALL: [PlaceColor; 16] = [
        Self::White,
        Self::Silver,
        Self::Gray,
        Self::Black,
        Self::Maroon,
        Self::Red,
        Self::Olive,
        Self::Yellow,
        Self::Green,
        Self::Lime,
        Self::Teal,
        Self::Aqua,
        Self::Navy,
        Self::Blue,
        Self::Purple,
        Self::Fuchsia,
    ];

    /// Returns the palette index.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Looks up a color by palette index.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// Returns the display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::White => "WHITE",
            Self::Silver => "SILVER",
            Self::Gray => "GRAY",
            Self::Black => "BLACK",
            Self::Maroon => "MAROON",
            Self::Red => "RED",
            Self::Olive => "OLIVE",
            Self::Yellow => "YELLOW",
            Self::Green => "GREEN",
            Self::Lime => "LIME",
            Self::Teal => "TEAL",
            Self::Aqua => "AQUA",
            Self::Navy => "NAVY",
            Self::Blue => "BLUE",
            Self::Purple => "PURPLE",
            Self::Fuchsia => "FUCHSIA",
        }
    }

    /// Returns the `(red, green, blue)` components for rendering.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::White => (255, 255, 255),
            Self::Silver => (192, 192, 192),
            Self::Gray => (128, 128, 128),
            Self::Black => (0, 0, 0),
            Self::Maroon => (128, 0, 0),
            Self::Red => (255, 0, 0),
            Self::Olive => (128, 128, 0),
            Self::Yellow => (255, 255, 0),
            Self::Green => (0, 128, 0),
            Self::Lime => (0, 255, 0),
            Self::Teal => (0, 128, 128),
            Self::Aqua => (0, 255, 255),
            Self::Navy => (0, 0, 128),
            Self::Blue => (0, 0, 255),
            Self::Purple => (128, 0, 128),
            Self::Fuchsia => (255, 0, 255),
        }
    }
}

impl TryFrom<u8> for PlaceColor {
    type Error = DomainError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::from_index(index).ok_or(DomainError::InvalidColor(index))
    }
}

impl From<PlaceColor> for u8 {
    fn from(color: PlaceColor) -> Self {
        color.index()
    }
}

/// Parses a palette index (`"5"`) or a case-insensitive name (`"red"`).
impl FromStr for PlaceColor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(index) = s.parse::<u8>() {
            return Self::try_from(index);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|color| color.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::UnknownColor(s.to_string()))
    }
}

impl fmt::Display for PlaceColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_indices_are_dense() {
        for (i, color) in PlaceColor::ALL.iter().enumerate() {
            assert_eq!(usize::from(color.index()), i);
            assert_eq!(PlaceColor::from_index(color.index()), Some(*color));
        }
        assert_eq!(PlaceColor::ALL.len(), usize::from(PlaceColor::TOTAL_COLORS));
    }

    #[test]
    fn test_default_is_index_zero() {
        assert_eq!(PlaceColor::default().index(), 0);
        assert_eq!(PlaceColor::default(), PlaceColor::White);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        assert!(PlaceColor::from_index(16).is_none());
        assert_eq!(
            PlaceColor::try_from(200),
            Err(DomainError::InvalidColor(200))
        );
    }

    #[test]
    fn test_serializes_as_index() {
        let json = serde_json::to_string(&PlaceColor::Red).unwrap();
        assert_eq!(json, "5");

        let parsed: PlaceColor = serde_json::from_str("13").unwrap();
        assert_eq!(parsed, PlaceColor::Blue);

        assert!(serde_json::from_str::<PlaceColor>("16").is_err());
        assert!(serde_json::from_str::<PlaceColor>("-1").is_err());
    }

    #[test]
    fn test_parse_index_or_name() {
        assert_eq!("5".parse::<PlaceColor>(), Ok(PlaceColor::Red));
        assert_eq!("fuchsia".parse::<PlaceColor>(), Ok(PlaceColor::Fuchsia));
        assert_eq!(" Navy ".parse::<PlaceColor>(), Ok(PlaceColor::Navy));
        assert_eq!("16".parse::<PlaceColor>(), Err(DomainError::InvalidColor(16)));
        assert!(matches!(
            "mauve".parse::<PlaceColor>(),
            Err(DomainError::UnknownColor(_))
        ));
    }
}
