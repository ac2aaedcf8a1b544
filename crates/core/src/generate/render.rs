//! SVG -> PNG rasterization with the plugin's corner-border decoration.

use once_cell::sync::Lazy;
use regex::Regex;
use resvg::{
    tiny_skia::{Color, LineCap, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform},
    usvg,
};

use crate::{
    config::IconSettings,
    error::{ConfigError, ConfigIssue, EntryError},
};

// Cubic bezier factor for a quarter circle.
const ARC_K: f32 = 0.5523;

static RE_PATH_ELEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<path\s[^>]*?\bd\s*=\s*["']([^"']+)["'][^>]*?(?:/>|>\s*</path>)"#)
        .expect("static regex")
});
static RE_CORNER_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^M[\s,]*[0-9]{1,2}[\s,]*(?:1[12][0-9]|[0-9]{1,2})[\s,]*V")
        .expect("static regex")
});
static RE_TRIANGLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)V[\s,]*-?\d+[\s,]*L[\s,]*-?\d+[\s,]*-?\d+[\s,]*H[\s,]*-?\d+[\s,]*Z")
        .expect("static regex")
});
static RE_STYLE_FILL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)fill\s*:\s*([^;\s]+)").expect("static regex"));
static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("static regex"));

/// `#rgb` / `#rrggbb` -> RGB.
pub fn parse_hex(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().strip_prefix('#')?;
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Lowercase `#rrggbb`, or `None` if `s` isn't a hex colour.
pub fn normalize_hex(s: &str) -> Option<String> {
    parse_hex(s).map(|[r, g, b]| format!("#{r:02x}{g:02x}{b:02x}"))
}

fn is_white(color: &str) -> bool {
    if color.trim().eq_ignore_ascii_case("white") {
        return true;
    }
    matches!(parse_hex(color), Some([r, g, b]) if r > 240 && g > 240 && b > 240)
}

/// Resolved render settings.
#[derive(Debug, Clone, PartialEq)]
pub struct IconStyle {
    pub size: u32,
    pub scale: f32,
    background: [u8; 3],
    default_accent: String,
    color_map: Vec<(String, String)>,
}

impl IconStyle {
    pub fn from_settings(settings: &IconSettings) -> Result<Self, ConfigError> {
        let origin = "icon settings";
        let hex = |field: &'static str, value: &str| {
            normalize_hex(value).ok_or_else(|| {
                ConfigError::single(
                    origin,
                    ConfigIssue::InvalidSetting {
                        field,
                        reason: format!("`{value}` is not a #rrggbb colour"),
                    },
                )
            })
        };

        let background = parse_hex(&hex("icons.background", &settings.background)?)
            .unwrap_or([0x1a, 0x1a, 0x1a]);
        let default_accent = hex("icons.default_accent", &settings.default_accent)?;
        let mut color_map = Vec::with_capacity(settings.color_map.len());
        for (from, to) in &settings.color_map {
            color_map.push((hex("icons.color_map", from)?, hex("icons.color_map", to)?));
        }

        Ok(Self {
            size: settings.size,
            scale: settings.scale,
            background,
            default_accent,
            color_map,
        })
    }

    fn mapped(&self, accent: &str) -> Option<&str> {
        self.color_map
            .iter()
            .find(|(from, _)| from == accent)
            .map(|(_, to)| to.as_str())
    }
}

impl Default for IconStyle {
    fn default() -> Self {
        // Defaults are valid colours.
        Self::from_settings(&IconSettings::default()).unwrap_or(Self {
            size: 144,
            scale: 0.70,
            background: [0x1a, 0x1a, 0x1a],
            default_accent: "#c9b269".into(),
            color_map: Vec::new(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RenderedIcon {
    pub png: Vec<u8>,
    /// Accent found in the source SVG.
    pub source_accent: String,
    /// Accent actually used (after the colour map).
    pub accent: String,
    pub stripped_corners: bool,
}

pub fn render_icon(svg: &[u8], style: &IconStyle) -> Result<RenderedIcon, EntryError> {
    let text = std::str::from_utf8(svg)
        .map_err(|e| EntryError::RenderFailed(format!("svg is not utf-8: {e}")))?;

    let source_accent = extract_accent(text)?.unwrap_or_else(|| style.default_accent.clone());
    let accent = style
        .mapped(&source_accent)
        .unwrap_or(&source_accent)
        .to_string();

    let (mut text, stripped_corners) = strip_corner_paths(text);
    if accent != source_accent {
        text = replace_color(&text, &source_accent, &accent);
    }

    let tree = usvg::Tree::from_data(text.as_bytes(), &usvg::Options::default())
        .map_err(|e| EntryError::RenderFailed(format!("parse svg: {e}")))?;

    let size = style.size;
    let mut pixmap = Pixmap::new(size, size)
        .ok_or_else(|| EntryError::RenderFailed(format!("cannot allocate {size}x{size} canvas")))?;
    let [r, g, b] = style.background;
    pixmap.fill(Color::from_rgba8(r, g, b, 255));

    let icon_px = ((size as f32 * style.scale) as u32).max(1) as f32;
    let svg_size = tree.size();
    let s = icon_px / svg_size.width().max(svg_size.height());
    let offset = ((size as f32 - icon_px) / 2.0).floor();
    let tx = offset + (icon_px - svg_size.width() * s) / 2.0;
    let ty = offset + (icon_px - svg_size.height() * s) / 2.0;
    resvg::render(
        &tree,
        Transform::from_scale(s, s).post_translate(tx, ty),
        &mut pixmap.as_mut(),
    );

    let rgb = parse_hex(&accent).unwrap_or([0xc9, 0xb2, 0x69]);
    draw_corner_borders(&mut pixmap, rgb);

    let png = pixmap
        .encode_png()
        .map_err(|e| EntryError::RenderFailed(format!("encode png: {e}")))?;

    Ok(RenderedIcon {
        png,
        source_accent,
        accent,
        stripped_corners,
    })
}

/// First non-white hex fill, from a `fill` attribute or an inline `style`.
fn extract_accent(svg: &str) -> Result<Option<String>, EntryError> {
    let opts = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = roxmltree::Document::parse_with_options(svg, opts)
        .map_err(|e| EntryError::RenderFailed(format!("parse svg: {e}")))?;

    for node in doc.descendants().filter(|n| n.is_element()) {
        let from_style = node
            .attribute("style")
            .and_then(|s| RE_STYLE_FILL.captures(s))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        for candidate in [node.attribute("fill"), from_style].into_iter().flatten() {
            if is_white(candidate) {
                continue;
            }
            if let Some(hex) = normalize_hex(candidate) {
                return Ok(Some(hex));
            }
        }
    }
    Ok(None)
}

fn is_corner_path(d: &str) -> bool {
    if d.len() > 200 || !RE_CORNER_START.is_match(d) {
        return false;
    }
    let closes = d.chars().filter(|c| matches!(c, 'Z' | 'z')).count();
    let moves = d.chars().filter(|c| matches!(c, 'M' | 'm')).count();
    closes == 4 && (3..=5).contains(&moves) && RE_TRIANGLE.find_iter(d).count() >= 2
}

/// Remove upstream corner-triangle paths. Returns whether anything was removed.
pub(crate) fn strip_corner_paths(svg: &str) -> (String, bool) {
    let mut removed = false;
    let out = RE_PATH_ELEM.replace_all(svg, |caps: &regex::Captures| {
        if caps.get(1).is_some_and(|d| is_corner_path(d.as_str())) {
            removed = true;
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    if removed {
        (RE_BLANK_LINES.replace_all(&out, "\n").into_owned(), true)
    } else {
        (out.into_owned(), false)
    }
}

fn replace_color(svg: &str, from: &str, to: &str) -> String {
    match Regex::new(&format!("(?i){}", regex::escape(from))) {
        Ok(re) => re.replace_all(svg, regex::NoExpand(to)).into_owned(),
        Err(_) => svg.to_string(),
    }
}

struct BorderGeometry {
    pad: f32,
    len: u32,
    width: f32,
    radius: f32,
}

impl BorderGeometry {
    fn for_size(size: u32) -> Self {
        let pct = |p: f32, min: u32| ((size as f32 * p) as u32).max(min);
        Self {
            pad: pct(0.07, 5) as f32,
            len: pct(0.50, 35),
            width: pct(0.014, 2) as f32,
            radius: pct(0.06, 6) as f32,
        }
    }
}

/// Top-left and bottom-right L shapes. Solid rounded corner, arms fading out.
fn draw_corner_borders(pixmap: &mut Pixmap, [r, g, b]: [u8; 3]) {
    let size = pixmap.width() as f32;
    let geo = BorderGeometry::for_size(pixmap.width());

    let top_left = Transform::identity();
    let bottom_right = Transform::from_row(-1.0, 0.0, 0.0, -1.0, size, size);

    for transform in [top_left, bottom_right] {
        let mut paint = Paint::default();
        paint.anti_alias = true;

        for i in 0..geo.len {
            let along = geo.pad + geo.radius + i as f32;
            if along >= size - geo.pad {
                break;
            }
            let alpha = 255.0 * (1.0 - (i as f32 / geo.len as f32).powf(0.7));
            paint.set_color_rgba8(r, g, b, alpha as u8);
            // Vertical arm, then horizontal arm.
            for rect in [
                Rect::from_xywh(geo.pad, along, geo.width, 1.0),
                Rect::from_xywh(along, geo.pad, 1.0, geo.width),
            ]
            .into_iter()
            .flatten()
            {
                pixmap.fill_rect(rect, &paint, transform, None);
            }
        }

        let rc = geo.radius - geo.width / 2.0;
        let c = geo.pad + geo.radius;
        let mut pb = PathBuilder::new();
        pb.move_to(c - rc, c);
        pb.cubic_to(c - rc, c - ARC_K * rc, c - ARC_K * rc, c - rc, c, c - rc);
        if let Some(arc) = pb.finish() {
            paint.set_color_rgba8(r, g, b, 255);
            let stroke = Stroke {
                width: geo.width,
                line_cap: LineCap::Butt,
                ..Stroke::default()
            };
            pixmap.stroke_path(&arc, &paint, &stroke, transform, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100" viewBox="0 0 100 100"><rect width="100" height="100" fill="#C9B269"/></svg>"##;

    const WITH_CORNERS: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 128 128">
<path fill="#de7b6c" d="M0 0V20L20 0H0ZM128 0V20L108 0H128ZM0 128V108L20 128H0ZM128 128V108L108 128H128Z"/>
<path fill="#ffffff" d="M40 40H88V88H40Z"/>
</svg>"##;

    fn pixel(png: &[u8], x: u32, y: u32) -> [u8; 3] {
        let pixmap = Pixmap::decode_png(png).unwrap();
        let p = pixmap.pixel(x, y).unwrap();
        [p.red(), p.green(), p.blue()]
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex("#1a1a1a"), Some([26, 26, 26]));
        assert_eq!(parse_hex("#FFF"), Some([255, 255, 255]));
        assert_eq!(parse_hex("1a1a1a"), None);
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("#gg0000"), None);
        assert_eq!(normalize_hex("#AbC").as_deref(), Some("#aabbcc"));
    }

    #[test]
    fn accent_skips_white_and_reads_styles() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg"><g fill="#FEFEFE"><path style="stroke:none;fill:#679552" d="M0 0H1V1Z"/></g></svg>"##;
        assert_eq!(extract_accent(svg).unwrap().as_deref(), Some("#679552"));

        let plain = r##"<svg xmlns="http://www.w3.org/2000/svg"><path fill="white" d="M0 0H1V1Z"/></svg>"##;
        assert_eq!(extract_accent(plain).unwrap(), None);
    }

    #[test]
    fn renders_mapped_accent_on_background() {
        let icon = render_icon(SQUARE.as_bytes(), &IconStyle::default()).unwrap();
        assert_eq!(icon.source_accent, "#c9b269");
        assert_eq!(icon.accent, "#f0c628");
        assert!(!icon.stripped_corners);

        let pixmap = Pixmap::decode_png(&icon.png).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (144, 144));
        // Icon body picks up the saturated colour.
        assert_eq!(pixel(&icon.png, 72, 72), [0xf0, 0xc6, 0x28]);
        // Outside the icon and the borders.
        assert_eq!(pixel(&icon.png, 2, 72), [26, 26, 26]);
        // Start of the top-left vertical arm is close to full accent.
        let [r, _, _] = pixel(&icon.png, 10, 19);
        assert!(r > 150, "border pixel red = {r}");
    }

    #[test]
    fn honours_size_override() {
        let style = IconStyle {
            size: 72,
            ..IconStyle::default()
        };
        let icon = render_icon(SQUARE.as_bytes(), &style).unwrap();
        let pixmap = Pixmap::decode_png(&icon.png).unwrap();
        assert_eq!(pixmap.width(), 72);
    }

    #[test]
    fn corner_triangles_are_removed() {
        let (out, removed) = strip_corner_paths(WITH_CORNERS);
        assert!(removed);
        assert!(!out.contains("#de7b6c"));
        assert!(out.contains("M40 40H88V88H40Z"));
        assert!(roxmltree::Document::parse(&out).is_ok());

        let icon = render_icon(WITH_CORNERS.as_bytes(), &IconStyle::default()).unwrap();
        assert!(icon.stripped_corners);
        // The accent is read before stripping, and mapped.
        assert_eq!(icon.accent, "#d11a38");
    }

    #[test]
    fn ordinary_paths_are_kept() {
        let svg = r#"<svg><path d="M10 10 L 50 50 Z"></path></svg>"#;
        let (out, removed) = strip_corner_paths(svg);
        assert!(!removed);
        assert_eq!(out, svg);
    }

    #[test]
    fn broken_svg_is_an_entry_error() {
        let err = render_icon(b"<svg><path", &IconStyle::default()).unwrap_err();
        assert!(matches!(err, EntryError::RenderFailed(_)));
    }

    #[test]
    fn border_geometry_has_minimums() {
        let small = BorderGeometry::for_size(40);
        assert_eq!(small.pad, 5.0);
        assert_eq!(small.len, 35);
        assert_eq!(small.width, 2.0);
        assert_eq!(small.radius, 6.0);

        let std = BorderGeometry::for_size(144);
        assert_eq!(std.pad, 10.0);
        assert_eq!(std.len, 72);
        assert_eq!(std.width, 2.0);
        assert_eq!(std.radius, 8.0);
    }
}
