//! Style policy: per-field visual rules for placing resolved fields.
//!
//! Every field gets the base rule (absolute, centre-anchored, scaled,
//! non-interactive). Card designs are then defined by a small override
//! table keyed by field id; to support a new field look add an entry to
//! [`OVERRIDES`] rather than branching on kind.

use crate::field::{RenderContext, TemplateField};
use std::fmt;

/// Base font size in template-intrinsic pixels.
pub const BASE_FONT_SIZE: f64 = 32.0;
/// Font size of the large numeral field, intrinsic pixels.
pub const NUMERAL_FONT_SIZE: f64 = 96.0;

/// Resolved inline style for one field
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDescriptor {
    pub left: f64,
    pub top: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub max_width: Option<f64>,
    pub transform: &'static str,
    pub text_align: Option<&'static str>,
    pub font_size: f64,
    pub font_weight: u16,
    pub text_transform: Option<&'static str>,
    pub letter_spacing: Option<&'static str>,
    pub line_height: Option<f64>,
    pub text_shadow: Option<&'static str>,
    pub white_space: Option<&'static str>,
    pub pointer_events_none: bool,
}

/// A style transform applied after the base rule.
pub type StyleOverride = fn(&mut StyleDescriptor, &TemplateField, f64);

/// Per-field-id overrides. Ids may share a transform.
pub static OVERRIDES: &[(&str, StyleOverride)] = &[
    ("years", large_numeral),
    ("name", headline_name),
    ("message", message_body),
    ("congratsMessage", message_body),
];

/// Look up the override registered for `id`, if any.
pub fn override_for(id: &str) -> Option<StyleOverride> {
    OVERRIDES
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, f)| *f)
}

/// Compute the style of `field` at the given scale factor.
pub fn style_for(field: &TemplateField, scale: f64) -> StyleDescriptor {
    let g = &field.geometry;
    let mut style = StyleDescriptor {
        left: g.x / scale,
        top: g.y / scale,
        width: (!g.is_auto_width()).then(|| g.width / scale),
        height: (!g.is_auto_height()).then(|| g.height / scale),
        max_width: None,
        transform: "translate(-50%, -50%)",
        text_align: None,
        font_size: BASE_FONT_SIZE / scale,
        font_weight: 400,
        text_transform: None,
        letter_spacing: None,
        line_height: None,
        text_shadow: None,
        white_space: None,
        pointer_events_none: true,
    };
    if let Some(apply) = override_for(&field.id) {
        apply(&mut style, field, scale);
    }
    style
}

/// [`style_for`] using the scale factor of a loaded template.
pub fn style_in(field: &TemplateField, ctx: &RenderContext) -> StyleDescriptor {
    style_for(field, ctx.scale_factor())
}

fn large_numeral(style: &mut StyleDescriptor, _field: &TemplateField, scale: f64) {
    style.font_size = NUMERAL_FONT_SIZE / scale;
    style.font_weight = 700;
    style.text_align = Some("center");
    style.line_height = Some(1.0);
    style.text_shadow = Some("2px 2px 4px rgba(0, 0, 0, 0.3)");
    style.white_space = Some("nowrap");
}

fn headline_name(style: &mut StyleDescriptor, field: &TemplateField, scale: f64) {
    style.font_weight = 700;
    style.text_transform = Some("uppercase");
    style.letter_spacing = Some("0.08em");
    style.text_align = Some("center");
    style.white_space = Some("nowrap");
    if !field.geometry.is_auto_width() {
        style.max_width = Some(field.geometry.width / scale);
    }
}

// The stated x is the box's horizontal centre, so the left edge moves back by
// half the width and only the vertical anchor stays centred.
fn message_body(style: &mut StyleDescriptor, field: &TemplateField, scale: f64) {
    let g = &field.geometry;
    style.left = (g.x - g.width / 2.0).max(0.0) / scale;
    style.transform = "translateY(-50%)";
    style.text_align = Some("left");
    style.font_weight = 400;
    style.line_height = Some(1.5);
    style.white_space = Some("normal");
}

fn px(v: f64) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    format!("{}px", rounded)
}

impl StyleDescriptor {
    /// Inline CSS declaration list
    pub fn to_css(&self) -> String {
        let mut decls: Vec<String> = vec![
            "position: absolute".to_string(),
            format!("left: {}", px(self.left)),
            format!("top: {}", px(self.top)),
        ];
        decls.push(format!(
            "width: {}",
            self.width.map(px).unwrap_or_else(|| "auto".into())
        ));
        decls.push(format!(
            "height: {}",
            self.height.map(px).unwrap_or_else(|| "auto".into())
        ));
        if let Some(w) = self.max_width {
            decls.push(format!("max-width: {}", px(w)));
            decls.push("overflow: hidden".to_string());
            decls.push("text-overflow: ellipsis".to_string());
        }
        decls.push(format!("transform: {}", self.transform));
        if let Some(a) = self.text_align {
            decls.push(format!("text-align: {}", a));
        }
        decls.push(format!("font-size: {}", px(self.font_size)));
        decls.push(format!("font-weight: {}", self.font_weight));
        if let Some(t) = self.text_transform {
            decls.push(format!("text-transform: {}", t));
        }
        if let Some(l) = self.letter_spacing {
            decls.push(format!("letter-spacing: {}", l));
        }
        if let Some(lh) = self.line_height {
            decls.push(format!("line-height: {}", lh));
        }
        if let Some(s) = self.text_shadow {
            decls.push(format!("text-shadow: {}", s));
        }
        if let Some(ws) = self.white_space {
            decls.push(format!("white-space: {}", ws));
        }
        if self.pointer_events_none {
            decls.push("pointer-events: none".to_string());
        }
        decls.join("; ")
    }
}

impl fmt::Display for StyleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// English ordinal suffix for `n` ("st", "nd", "rd" or "th").
pub fn ordinal_suffix(n: u64) -> &'static str {
    let last = n % 10;
    let last_two = n % 100;
    match (last, last_two) {
        (1, l) if l != 11 => "st",
        (2, l) if l != 12 => "nd",
        (3, l) if l != 13 => "rd",
        _ => "th",
    }
}

/// Headline text of the anniversary numeral, e.g. `"5"` -> `"5th WORK"`.
///
/// The digits are kept as typed, so `"05"` reads `"05th WORK"`. Input that
/// is not a non-negative integer is shown as typed.
pub fn years_headline(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<u64>() {
        Ok(n) => format!("{}{} WORK", trimmed, ordinal_suffix(n)),
        Err(_) => trimmed.to_string(),
    }
}
