use ratatui::style::Color;

/// Neutral gray used for notes whose tag no longer exists.
pub const FALLBACK_COLOR: &str = "#9ca3af";

/// Colors offered when cycling the tag color field.
pub const SWATCHES: [&str; 8] = [
    "#3b82f6", "#10b981", "#ef4444", "#f97316", "#8b5cf6", "#eab308", "#ec4899", "#14b8a6",
];

pub fn is_hex_color(value: &str) -> bool {
    parse_hex(value).is_some()
}

fn parse_hex(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Lowercases a valid color so equal colors compare equal.
pub fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    is_hex_color(trimmed).then(|| trimmed.to_ascii_lowercase())
}

pub fn to_color(value: &str) -> Color {
    match parse_hex(value) {
        Some((r, g, b)) => Color::Rgb(r, g, b),
        None => Color::Gray,
    }
}

/// Next swatch after `current`, wrapping; unknown colors start at the first.
pub fn next_swatch(current: &str, step: isize) -> &'static str {
    let len = SWATCHES.len() as isize;
    let position = SWATCHES
        .iter()
        .position(|swatch| swatch.eq_ignore_ascii_case(current));
    let next = match position {
        Some(index) => (index as isize + step).rem_euclid(len),
        None => 0,
    };
    SWATCHES[next as usize]
}
