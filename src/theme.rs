//! Theme loading: btop-style `theme[key]="value"` files and hex → ratatui Color.

use crate::grid::TileKind;
use crate::rules::TILE_KINDS;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// One colour per tile kind.
pub type TilePalette = [Color; TILE_KINDS as usize];

/// Glyph drawn in the middle of each tile so kinds stay tellable apart without colour.
const TILE_GLYPHS: [char; TILE_KINDS as usize] =
    ['●', '▲', '■', '◆', '★', '♥', '♣', '♠', '✚', '◐', '☾', '✿'];

/// Tile colours and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    pub tiles: TilePalette,
    /// Board background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, status).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text and the pending row.
    pub inactive_fg: Color,
    /// Danger line and game-over accents.
    pub danger: Color,
    /// Selected-tile border.
    pub selected: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

const ONEDARK_TILES: TilePalette = [
    rgb(0x98C379), // green
    rgb(0xE5C07B), // yellow
    rgb(0xE06C75), // red
    rgb(0x61AFEF), // blue
    rgb(0xC678DD), // magenta
    rgb(0x56B6C2), // cyan
    rgb(0xD19A66), // orange
    rgb(0xBE5046), // dark red
    rgb(0xABB2BF), // grey
    rgb(0x7EC699), // mint
    rgb(0xF0A6CA), // pink
    rgb(0x8A9BF5), // lavender
];

const HIGH_CONTRAST_TILES: TilePalette = [
    rgb(0x00FF00),
    rgb(0xFFFF00),
    rgb(0xFF0000),
    rgb(0x0088FF),
    rgb(0xFF00FF),
    rgb(0x00FFFF),
    rgb(0xFF8800),
    rgb(0xFFFFFF),
    rgb(0x88FF88),
    rgb(0xFF88FF),
    rgb(0x8888FF),
    rgb(0xAAAAAA),
];

/// Paul Tol's bright and vibrant sets; glyphs carry the rest.
const COLORBLIND_TILES: TilePalette = [
    rgb(0x0077BB),
    rgb(0xEE7733),
    rgb(0x009988),
    rgb(0xCC3311),
    rgb(0xEE3377),
    rgb(0xBBBB00),
    rgb(0x33BBEE),
    rgb(0x4477AA),
    rgb(0x66CCEE),
    rgb(0x228833),
    rgb(0xCCBB44),
    rgb(0xAA3377),
];

/// btop keys tried for each tile kind after the explicit `tileN` key.
const TILE_FALLBACK_KEYS: [&[&str]; TILE_KINDS as usize] = [
    &["mem_box", "cpu_start"],
    &["title", "cpu_mid"],
    &["cpu_end", "temp_end"],
    &["cpu_box"],
    &["net_box"],
    &["hi_fg", "proc_misc"],
    &["temp_mid"],
    &["used_end"],
    &["main_fg"],
    &["free_mid"],
    &["cached_mid"],
    &["proc_box"],
];

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    /// One Dark defaults.
    pub fn onedark_default() -> Self {
        Self {
            tiles: ONEDARK_TILES,
            bg: rgb(0x31353F),
            div_line: rgb(0x3F444F),
            main_fg: rgb(0xABB2BF),
            title: rgb(0xE5C07B),
            inactive_fg: rgb(0x5C6370),
            danger: rgb(0xE06C75),
            selected: rgb(0xFFFFFF),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    /// `palette` then overrides the tile colours.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            Some(p) => {
                log::warn!("theme file {} not found, using defaults", p.display());
                return Ok(Self::default_for_palette(palette));
            }
            None => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        log::debug!("loaded {} theme keys from {}", map.len(), path.display());
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.tiles = HIGH_CONTRAST_TILES;
                self.selected = rgb(0xFFFFFF);
            }
            crate::Palette::Colorblind => {
                self.tiles = COLORBLIND_TILES;
                self.danger = rgb(0xEE7733);
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let base = Self::onedark_default();
        let mut tiles = base.tiles;
        for (i, slot) in tiles.iter_mut().enumerate() {
            let explicit = get(&format!("tile{i}"));
            if let Some(c) = explicit.or_else(|| TILE_FALLBACK_KEYS[i].iter().find_map(|k| get(*k))) {
                *slot = c;
            }
        }
        Self {
            tiles,
            bg: get("meter_bg").unwrap_or(base.bg),
            div_line: get("div_line").unwrap_or(base.div_line),
            main_fg: get("main_fg").unwrap_or(base.main_fg),
            title: get("title").unwrap_or(base.title),
            inactive_fg: get("inactive_fg").unwrap_or(base.inactive_fg),
            danger: get("temp_end").or_else(|| get("cpu_end")).unwrap_or(base.danger),
            selected: get("selected_fg").or_else(|| get("hi_fg")).unwrap_or(base.selected),
        }
    }

    #[inline]
    pub fn tile_color(&self, kind: TileKind) -> Color {
        self.tiles[kind.0 as usize % self.tiles.len()]
    }

    #[inline]
    pub fn tile_glyph(kind: TileKind) -> char {
        TILE_GLYPHS[kind.0 as usize % TILE_GLYPHS.len()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let bad = || ThemeError::InvalidHex(s.to_string());
    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| bad());
    match s.len() {
        6 => Ok(Color::Rgb(channel(&s[0..2])?, channel(&s[2..4])?, channel(&s[4..6])?)),
        3 => Ok(Color::Rgb(
            channel(&s[0..1])? * 17,
            channel(&s[1..2])? * 17,
            channel(&s[2..3])? * 17,
        )),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GGGGGG").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn test_explicit_tile_key_beats_btop_fallback() {
        let map = parse_theme_file("theme[tile0]=\"#010203\"\ntheme[mem_box]=\"#FFFFFF\"\ntheme[cpu_box]='#0A0B0C'");
        let theme = Theme::from_map(&map);
        assert_eq!(theme.tile_color(TileKind(0)), Color::Rgb(1, 2, 3));
        assert_eq!(theme.tile_color(TileKind(3)), Color::Rgb(10, 11, 12));
        assert_eq!(theme.tile_color(TileKind(5)), ONEDARK_TILES[5]);
    }

    #[test]
    fn test_every_kind_has_distinct_colour_and_glyph() {
        for palette in [ONEDARK_TILES, HIGH_CONTRAST_TILES, COLORBLIND_TILES] {
            for (i, a) in palette.iter().enumerate() {
                assert!(palette[i + 1..].iter().all(|b| b != a));
            }
        }
        for (i, g) in TILE_GLYPHS.iter().enumerate() {
            assert!(!TILE_GLYPHS[i + 1..].contains(g));
        }
    }
}
