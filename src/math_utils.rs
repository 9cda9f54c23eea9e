use glam::{Vec2, Vec3};
use thiserror::Error;

/// Calculates the (x, y) position that results from orbiting around `pivot` at
/// a distance of `radius`.
pub fn rotate_around_pivot(pivot: Vec2, radius: f32, angle_radian: f32) -> Vec2 {
    Vec2 {
        x: pivot.x + radius * f32::cos(angle_radian),
        y: pivot.y + radius * f32::sin(angle_radian),
    }
}

/// Parses a CSS style hex color (`#rrggbb` or `#rgb`, the leading `#` is
/// optional) into linear RGB values in the range [0, 1].
///
/// Hex colors are authored in sRGB so each channel is converted to linear
/// space before being returned.
pub fn color_from_hex(hex: &str) -> Result<Vec3, ColorParseError> {
    let digits = hex.trim().trim_start_matches('#');

    if !digits.is_ascii() {
        return Err(ColorParseError(hex.to_string()));
    }

    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return Err(ColorParseError(hex.to_string())),
    };

    let channel = |i: usize| -> Result<f32, ColorParseError> {
        u8::from_str_radix(&expanded[i..i + 2], 16)
            .map(|v| srgb_to_linear(v as f32 / 255.0))
            .map_err(|_| ColorParseError(hex.to_string()))
    };

    Ok(Vec3::new(channel(0)?, channel(2)?, channel(4)?))
}

/// Converts a single sRGB encoded channel value to linear space.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Converts a single linear channel value back to sRGB encoding.
pub(crate) fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("'{}' is not a valid hex color, expected #rrggbb or #rgb", .0)]
pub struct ColorParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_stays_on_circle() {
        for i in 0..32 {
            let p = rotate_around_pivot(Vec2::ZERO, 4.0, i as f32 * 0.37);
            assert!((p.length() - 4.0).abs() < 1e-5);
        }
    }

    #[test]
    fn parse_primary_colors() {
        assert_eq!(Vec3::new(1.0, 1.0, 1.0), color_from_hex("#ffffff").unwrap());
        assert_eq!(Vec3::new(0.0, 0.0, 0.0), color_from_hex("000000").unwrap());
        assert_eq!(Vec3::new(1.0, 0.0, 0.0), color_from_hex("#f00").unwrap());
    }

    #[test]
    fn parse_mid_tone_is_linearized() {
        let c = color_from_hex("#808080").unwrap();
        assert!(c.x > 0.2 && c.x < 0.23);
        assert_eq!(c.x, c.y);
        assert_eq!(c.y, c.z);
    }

    #[test]
    fn srgb_encoding_inverts_linearization() {
        for v in [0.0, 0.002, 0.2, 0.5, 1.0] {
            assert!((linear_to_srgb(srgb_to_linear(v)) - v).abs() < 1e-5);
        }
    }

    #[test]
    fn reject_malformed_colors() {
        assert!(color_from_hex("#12345").is_err());
        assert!(color_from_hex("#gg0000").is_err());
        assert_eq!(
            ColorParseError("nope".to_string()),
            color_from_hex("nope").unwrap_err()
        );
    }
}
