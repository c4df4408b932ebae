//! HTML overlay preview of a resolved template.
//!
//! Produces the same composition the editor shows: the template background
//! with every field absolutely positioned through the style policy. The
//! container is marked as the capture target so the fragment can be
//! screenshotted directly.

use crate::card::CardData;
use crate::field::{FieldKind, RenderContext, TemplateField};
use crate::resolver::resolve;
use crate::style::{style_in, years_headline};
use crate::Result;

/// Minimal HTML escaping for text and attribute values
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Text shown for a field; the numeral field gets its ordinal headline.
pub fn display_text(field: &TemplateField) -> String {
    match field.id.as_str() {
        "years" => years_headline(&field.value),
        _ => field.value.clone(),
    }
}

/// Render resolved `fields` over the template described by `ctx`.
pub fn render_html(ctx: &RenderContext, fields: &[TemplateField]) -> String {
    let screen = ctx.screen_size();
    let mut html = format!(
        "<div data-preview=\"true\" style=\"position: relative; overflow: hidden; width: {}px; height: {}px\">\n",
        screen.width.round(),
        screen.height.round()
    );
    html.push_str(&format!(
        "  <img src=\"{}\" alt=\"\" style=\"position: absolute; left: 0; top: 0; width: 100%; height: 100%; object-fit: cover\">\n",
        escape_html(&ctx.template_url)
    ));

    for field in fields {
        let style = style_in(field, ctx);
        let id = escape_html(&field.id);
        match field.kind {
            FieldKind::Image => {
                if field.value.is_empty() {
                    continue;
                }
                html.push_str(&format!(
                    "  <div data-field=\"{}\" style=\"{}\"><img src=\"{}\" alt=\"\" style=\"width: 100%; height: 100%; object-fit: cover\"></div>\n",
                    id,
                    style.to_css(),
                    escape_html(&field.value)
                ));
            }
            FieldKind::Text | FieldKind::Date => {
                html.push_str(&format!(
                    "  <div data-field=\"{}\" style=\"{}\">{}</div>\n",
                    id,
                    style.to_css(),
                    escape_html(&display_text(field))
                ));
            }
        }
    }
    html.push_str("</div>\n");
    html
}

/// Preview of a card request using the card type's own template.
pub fn render_card(data: &CardData) -> Result<String> {
    let layout = data.layout();
    let ctx = RenderContext::new(layout.template_url, layout.natural_size)?;
    let fields = resolve(&layout.template_fields(), data);
    Ok(render_html(&ctx, &fields))
}
