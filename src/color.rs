use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Series colors
// ---------------------------------------------------------------------------

/// Brand green, used for the first series.
pub const BRAND_PRIMARY: Color32 = Color32::from_rgb(0x32, 0xc8, 0x00);
/// Brand red, used for the second series.
pub const BRAND_SECONDARY: Color32 = Color32::from_rgb(0xff, 0x00, 0x00);

/// Colour for series `index` out of `total`: the first two series use the
/// fixed brand colours, the rest fall back to a generated qualitative
/// palette.
pub fn series_color(index: usize, total: usize) -> Color32 {
    match index {
        0 => BRAND_PRIMARY,
        1 => BRAND_SECONDARY,
        _ => {
            let fallback = generate_palette(total.saturating_sub(2).max(1));
            fallback
                .get(index - 2)
                .copied()
                .unwrap_or(Color32::GRAY)
        }
    }
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Correlation heat-map scale
// ---------------------------------------------------------------------------

/// Map a Pearson r in [-1, 1] onto a blue → white → red scale. NaN renders
/// as gray.
pub fn heat_color(r: f64) -> Color32 {
    if !r.is_finite() {
        return Color32::GRAY;
    }
    let r = r.clamp(-1.0, 1.0);
    if r >= 0.0 {
        let t = r as f32;
        Color32::from_rgb(255, (255.0 * (1.0 - t)) as u8, (255.0 * (1.0 - t)) as u8)
    } else {
        let t = (-r) as f32;
        Color32::from_rgb((255.0 * (1.0 - t)) as u8, (255.0 * (1.0 - t)) as u8, 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_two_series_use_brand_colors() {
        assert_eq!(series_color(0, 5), BRAND_PRIMARY);
        assert_eq!(series_color(1, 5), BRAND_SECONDARY);
        assert_ne!(series_color(2, 5), BRAND_PRIMARY);
    }

    #[test]
    fn palette_has_requested_size() {
        assert_eq!(generate_palette(7).len(), 7);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn heat_scale_endpoints() {
        assert_eq!(heat_color(1.0), Color32::from_rgb(255, 0, 0));
        assert_eq!(heat_color(-1.0), Color32::from_rgb(0, 0, 255));
        assert_eq!(heat_color(0.0), Color32::from_rgb(255, 255, 255));
        assert_eq!(heat_color(f64::NAN), Color32::GRAY);
    }
}
