use std::collections::HashMap;

use ratatui::style::Color;

use super::ThemeName;

/// Colors the viewer draws its chrome with. Item colors come from the
/// timeline itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub axis: Color,
    pub accent: Color,
    pub selection: Color,
    pub status_bg: Color,
    pub status_fg: Color,
}

#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    palettes: HashMap<ThemeName, Palette>,
}

impl ThemeRegistry {
    pub fn contains(&self, theme: &ThemeName) -> bool {
        self.palettes.contains_key(theme)
    }

    pub fn palette(&self, theme: ThemeName) -> Palette {
        self.palettes
            .get(&theme)
            .or_else(|| self.palettes.get(&ThemeName::Dark))
            .copied()
            .unwrap_or(DARK)
    }
}

const DARK: Palette = Palette {
    text: Color::White,
    muted: Color::Gray,
    axis: Color::DarkGray,
    accent: Color::Cyan,
    selection: Color::Yellow,
    status_bg: Color::Blue,
    status_fg: Color::Black,
};

impl Default for ThemeRegistry {
    fn default() -> Self {
        let palettes = [
            (ThemeName::Dark, DARK),
            (
                ThemeName::Light,
                Palette {
                    text: Color::Black,
                    muted: Color::DarkGray,
                    axis: Color::Gray,
                    accent: Color::Blue,
                    selection: Color::Magenta,
                    status_bg: Color::Gray,
                    status_fg: Color::Black,
                },
            ),
            (
                ThemeName::HighContrast,
                Palette {
                    text: Color::White,
                    muted: Color::White,
                    axis: Color::White,
                    accent: Color::LightYellow,
                    selection: Color::LightGreen,
                    status_bg: Color::White,
                    status_fg: Color::Black,
                },
            ),
            (
                ThemeName::Solarized,
                Palette {
                    text: Color::Rgb(0x83, 0x94, 0x96),
                    muted: Color::Rgb(0x58, 0x6e, 0x75),
                    axis: Color::Rgb(0x07, 0x36, 0x42),
                    accent: Color::Rgb(0x26, 0x8b, 0xd2),
                    selection: Color::Rgb(0xb5, 0x89, 0x00),
                    status_bg: Color::Rgb(0x07, 0x36, 0x42),
                    status_fg: Color::Rgb(0x93, 0xa1, 0xa1),
                },
            ),
        ]
        .into_iter()
        .collect();
        Self { palettes }
    }
}
