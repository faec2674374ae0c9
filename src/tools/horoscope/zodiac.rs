/// Zodiac lookup tables: signs, elements, styles, palettes and the pools
/// lucky values are drawn from.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ZodiacSign::Aries => "aries",
            ZodiacSign::Taurus => "taurus",
            ZodiacSign::Gemini => "gemini",
            ZodiacSign::Cancer => "cancer",
            ZodiacSign::Leo => "leo",
            ZodiacSign::Virgo => "virgo",
            ZodiacSign::Libra => "libra",
            ZodiacSign::Scorpio => "scorpio",
            ZodiacSign::Sagittarius => "sagittarius",
            ZodiacSign::Capricorn => "capricorn",
            ZodiacSign::Aquarius => "aquarius",
            ZodiacSign::Pisces => "pisces",
        }
    }

    pub fn symbol(self) -> char {
        match self {
            ZodiacSign::Aries => '♈',
            ZodiacSign::Taurus => '♉',
            ZodiacSign::Gemini => '♊',
            ZodiacSign::Cancer => '♋',
            ZodiacSign::Leo => '♌',
            ZodiacSign::Virgo => '♍',
            ZodiacSign::Libra => '♎',
            ZodiacSign::Scorpio => '♏',
            ZodiacSign::Sagittarius => '♐',
            ZodiacSign::Capricorn => '♑',
            ZodiacSign::Aquarius => '♒',
            ZodiacSign::Pisces => '♓',
        }
    }

    pub fn element(self) -> Element {
        match self {
            ZodiacSign::Aries | ZodiacSign::Leo | ZodiacSign::Sagittarius => Element::Fire,
            ZodiacSign::Taurus | ZodiacSign::Virgo | ZodiacSign::Capricorn => Element::Earth,
            ZodiacSign::Gemini | ZodiacSign::Libra | ZodiacSign::Aquarius => Element::Air,
            ZodiacSign::Cancer | ZodiacSign::Scorpio | ZodiacSign::Pisces => Element::Water,
        }
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Fire,
    Earth,
    Air,
    Water,
}

impl Element {
    pub fn lucky_colors(self) -> &'static [&'static str] {
        match self {
            Element::Fire => &[
                "Sunset Orange",
                "Crimson Flame",
                "Golden Ember",
                "Radiant Amber",
                "Scarlet Spark",
            ],
            Element::Earth => &[
                "Forest Green",
                "Olive Moss",
                "Cedar Brown",
                "Golden Wheat",
                "Sage Leaf",
            ],
            Element::Air => &[
                "Sky Blue",
                "Sunlit Yellow",
                "Lavender Breeze",
                "Pale Aqua",
                "Silver Mist",
            ],
            Element::Water => &[
                "Deep Sea Blue",
                "Indigo Tide",
                "Aqua Wave",
                "Moonlit Teal",
                "Royal Plum",
            ],
        }
    }

    pub fn theme(self) -> ElementTheme {
        match self {
            Element::Fire => ElementTheme {
                accent: "#FF7A2F",
                gradient_background: ("#FFB347", "#FF2D55"),
                gradient_secondary: "#FFE5C1",
                gradient_primary: None,
            },
            Element::Earth => ElementTheme {
                accent: "#6E9A5B",
                gradient_background: ("#7BC67B", "#2D5A27"),
                gradient_secondary: "#E4F2DB",
                gradient_primary: Some("#F9FFF4"),
            },
            Element::Air => ElementTheme {
                accent: "#4AB3FF",
                gradient_background: ("#74EBD5", "#5A62FF"),
                gradient_secondary: "#E7F6FF",
                gradient_primary: None,
            },
            Element::Water => ElementTheme {
                accent: "#5C6BF2",
                gradient_background: ("#1F3B73", "#2D87FF"),
                gradient_secondary: "#D7E6FF",
                gradient_primary: None,
            },
        }
    }
}

/// Per-element colour overrides, as hex strings.
#[derive(Debug, Clone, Copy)]
pub struct ElementTheme {
    pub accent: &'static str,
    pub gradient_background: (&'static str, &'static str),
    pub gradient_secondary: &'static str,
    pub gradient_primary: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Minimalist,
    Mystical,
    Gradient,
}

impl Style {
    pub const ALL: [Style; 3] = [Style::Minimalist, Style::Mystical, Style::Gradient];

    pub fn as_str(self) -> &'static str {
        match self {
            Style::Minimalist => "minimalist",
            Style::Mystical => "mystical",
            Style::Gradient => "gradient",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Solid(&'static str),
    Gradient(&'static str, &'static str),
}

/// Resolved card colours, as hex strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Background,
    pub primary: &'static str,
    pub secondary: &'static str,
    pub accent: &'static str,
}

/// Card palette for a style, tinted by the sign's element.
///
/// Minimalist and mystical keep their base colours and take the element
/// accent; gradient swaps in the element's gradient and secondary tones.
pub fn palette_for(style: Style, element: Element) -> Palette {
    let theme = element.theme();
    match style {
        Style::Minimalist => Palette {
            background: Background::Solid("#F5F5F5"),
            primary: "#2C3E50",
            secondary: "#95A5A6",
            accent: theme.accent,
        },
        Style::Mystical => Palette {
            background: Background::Solid("#1A0B2E"),
            primary: "#E6D5FF",
            secondary: "#9D84B7",
            accent: theme.accent,
        },
        Style::Gradient => Palette {
            background: Background::Gradient(
                theme.gradient_background.0,
                theme.gradient_background.1,
            ),
            primary: theme.gradient_primary.unwrap_or("#FFFFFF"),
            secondary: theme.gradient_secondary,
            accent: "#FFD700",
        },
    }
}

pub const DAILY_VIBES: [&str; 8] = [
    "Energetic & Bold",
    "Calm & Reflective",
    "Creative & Inspired",
    "Focused & Determined",
    "Playful & Light",
    "Mysterious & Introspective",
    "Optimistic & Bright",
    "Grounded & Stable",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_round_trip_through_their_wire_names() {
        for sign in ZodiacSign::ALL {
            let parsed: ZodiacSign =
                serde_json::from_value(serde_json::json!(sign.as_str())).unwrap();
            assert_eq!(parsed, sign);
        }
    }

    #[test]
    fn each_element_has_three_signs() {
        for element in [Element::Fire, Element::Earth, Element::Air, Element::Water] {
            let count = ZodiacSign::ALL
                .iter()
                .filter(|s| s.element() == element)
                .count();
            assert_eq!(count, 3, "{element:?}");
        }
    }

    #[test]
    fn gradient_style_uses_element_gradient() {
        let palette = palette_for(Style::Gradient, Element::Earth);
        assert_eq!(palette.background, Background::Gradient("#7BC67B", "#2D5A27"));
        assert_eq!(palette.primary, "#F9FFF4");
        assert_eq!(palette_for(Style::Gradient, Element::Fire).primary, "#FFFFFF");
    }

    #[test]
    fn wheel_order_and_symbols() {
        assert_eq!(ZodiacSign::ALL[0], ZodiacSign::Aries);
        assert_eq!(ZodiacSign::ALL[11], ZodiacSign::Pisces);
        assert_eq!(ZodiacSign::Scorpio.symbol(), '♏');
    }
}
