//! Colour string literals.
//!
//! `"#rgb"`, `"#rgba"`, `"#rrggbb"`, `"#rrggbbaa"` or one of the CSS basic
//! colour keywords, case-insensitive.

/// CSS level 1 keywords plus `transparent`.
const NAMED: &[(&str, [u8; 4])] = &[
    ("black", [0x00, 0x00, 0x00, 0xff]),
    ("silver", [0xc0, 0xc0, 0xc0, 0xff]),
    ("gray", [0x80, 0x80, 0x80, 0xff]),
    ("grey", [0x80, 0x80, 0x80, 0xff]),
    ("white", [0xff, 0xff, 0xff, 0xff]),
    ("maroon", [0x80, 0x00, 0x00, 0xff]),
    ("red", [0xff, 0x00, 0x00, 0xff]),
    ("purple", [0x80, 0x00, 0x80, 0xff]),
    ("fuchsia", [0xff, 0x00, 0xff, 0xff]),
    ("magenta", [0xff, 0x00, 0xff, 0xff]),
    ("green", [0x00, 0x80, 0x00, 0xff]),
    ("lime", [0x00, 0xff, 0x00, 0xff]),
    ("olive", [0x80, 0x80, 0x00, 0xff]),
    ("yellow", [0xff, 0xff, 0x00, 0xff]),
    ("navy", [0x00, 0x00, 0x80, 0xff]),
    ("blue", [0x00, 0x00, 0xff, 0xff]),
    ("teal", [0x00, 0x80, 0x80, 0xff]),
    ("aqua", [0x00, 0xff, 0xff, 0xff]),
    ("cyan", [0x00, 0xff, 0xff, 0xff]),
    ("orange", [0xff, 0xa5, 0x00, 0xff]),
    ("transparent", [0x00, 0x00, 0x00, 0x00]),
];

/// Parse a colour literal into RGBA bytes.
pub fn parse_color(text: &str) -> Option<[u8; 4]> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = text.to_ascii_lowercase();
    NAMED
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, rgba)| *rgba)
}

fn parse_hex(hex: &str) -> Option<[u8; 4]> {
    if !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok();
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 | 4 => {
            let mut out = [0xff; 4];
            for (i, slot) in out.iter_mut().enumerate().take(hex.len()) {
                *slot = digit(i)? * 0x11;
            }
            Some(out)
        }
        6 | 8 => {
            let mut out = [0xff; 4];
            for (i, slot) in out.iter_mut().enumerate().take(hex.len() / 2) {
                *slot = pair(i * 2)?;
            }
            Some(out)
        }
        _ => None,
    }
}

/// Format a channel byte as a GLSL float literal in `[0, 1]`.
pub fn channel_literal(byte: u8) -> String {
    match byte {
        0 => "0.0".to_string(),
        255 => "1.0".to_string(),
        _ => {
            let text = format!("{:.4}", f64::from(byte) / 255.0);
            let trimmed = text.trim_end_matches('0');
            if trimmed.ends_with('.') {
                format!("{trimmed}0")
            } else {
                trimmed.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(parse_color("#f00"), Some([255, 0, 0, 255]));
        assert_eq!(parse_color("#f008"), Some([255, 0, 0, 0x88]));
        assert_eq!(parse_color("#00ff80"), Some([0, 255, 0x80, 255]));
        assert_eq!(parse_color("#00ff8040"), Some([0, 255, 0x80, 0x40]));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#ggg"), None);
    }

    #[test]
    fn parses_names() {
        assert_eq!(parse_color("Red"), Some([255, 0, 0, 255]));
        assert_eq!(parse_color("transparent"), Some([0, 0, 0, 0]));
        assert_eq!(parse_color("rebeccapurple"), None);
    }

    #[test]
    fn formats_channels() {
        assert_eq!(channel_literal(0), "0.0");
        assert_eq!(channel_literal(255), "1.0");
        assert_eq!(channel_literal(128), "0.502");
        assert_eq!(channel_literal(51), "0.2");
    }
}
