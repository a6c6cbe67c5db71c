use crate::error::{CompositorError, CompositorResult};

/// Parse a CSS-style hex color (`#rgb`, `#rrggbb` or `#rrggbbaa`, leading `#`
/// optional) into straight RGBA.
pub fn parse_hex_color(value: &str) -> CompositorResult<[u8; 4]> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !digits.is_ascii() {
        return Err(CompositorError::invalid_color(value));
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    let parsed = match digits.len() {
        3 => {
            let mut rgba = [0u8, 0, 0, 255];
            let mut valid = true;
            for (i, c) in digits.chars().enumerate() {
                match c.to_digit(16) {
                    Some(d) => rgba[i] = d as u8 * 17,
                    None => valid = false,
                }
            }
            valid.then_some(rgba)
        }
        6 | 8 => {
            let r = channel(&digits[0..2]);
            let g = channel(&digits[2..4]);
            let b = channel(&digits[4..6]);
            let a = if digits.len() == 8 { channel(&digits[6..8]) } else { Some(255) };
            match (r, g, b, a) {
                (Some(r), Some(g), Some(b), Some(a)) => Some([r, g, b, a]),
                _ => None,
            }
        }
        _ => None,
    };

    parsed.ok_or_else(|| CompositorError::invalid_color(value))
}

/// Format RGBA back to `#rrggbb`, appending alpha only when not opaque.
pub fn to_hex(rgba: [u8; 4]) -> String {
    if rgba[3] == 255 {
        format!("#{:02x}{:02x}{:02x}", rgba[0], rgba[1], rgba[2])
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", rgba[0], rgba[1], rgba[2], rgba[3])
    }
}
