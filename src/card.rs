//! Card types, their templates and request data.
//!
//! Each card type owns a fixed template: background image, natural size and
//! the field layout in template-intrinsic pixels. Fields also carry the DOM
//! conventions of the card's page (which input drives them and which preview
//! element displays them), which is what the capture bridge injects into.

use crate::field::{FieldKind, Geometry, Size, TemplateField};
use crate::resolver::FieldValues;
use crate::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Selector of the element flagged for screenshotting on every card page
pub const CAPTURE_TARGET: &str = "[data-preview=\"true\"]";

/// The supported card designs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardType {
    Birthday,
    WorkAnniversary,
    Onboarding,
}

impl CardType {
    pub const ALL: [CardType; 3] = [
        CardType::Birthday,
        CardType::WorkAnniversary,
        CardType::Onboarding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Birthday => "birthday",
            CardType::WorkAnniversary => "work-anniversary",
            CardType::Onboarding => "onboarding",
        }
    }

    /// Path of the card's page relative to the pages origin
    pub fn page_path(&self) -> &'static str {
        match self {
            CardType::Birthday => "/birthday",
            CardType::WorkAnniversary => "/work-anniversary",
            CardType::Onboarding => "/onboarding",
        }
    }

    pub fn layout(&self) -> &'static CardLayout {
        match self {
            CardType::Birthday => &BIRTHDAY,
            CardType::WorkAnniversary => &WORK_ANNIVERSARY,
            CardType::Onboarding => &ONBOARDING,
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::validation("type", format!("unknown card type '{}'", s)))
    }
}

/// Element on the page that displays a field, relative to the capture target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewTarget {
    pub selector: &'static str,
    /// Which match of `selector` to use
    pub index: usize,
}

const fn preview(selector: &'static str, index: usize) -> Option<PreviewTarget> {
    Some(PreviewTarget { selector, index })
}

/// Static description of one template field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub id: &'static str,
    pub kind: FieldKind,
    pub label: &'static str,
    pub geometry: Geometry,
    pub default: &'static str,
    pub editable: bool,
    /// Form control that owns the value on the card page
    pub input: Option<&'static str>,
    pub preview: Option<PreviewTarget>,
}

impl FieldSpec {
    pub fn to_field(&self) -> TemplateField {
        TemplateField {
            id: self.id.to_string(),
            kind: self.kind,
            label: self.label.to_string(),
            geometry: self.geometry,
            value: self.default.to_string(),
            editable: self.editable,
        }
    }
}

/// Template of one card type
#[derive(Debug)]
pub struct CardLayout {
    pub card_type: CardType,
    pub template_url: &'static str,
    pub natural_size: Size,
    pub fields: &'static [FieldSpec],
}

impl CardLayout {
    /// Fresh template field list with default values
    pub fn template_fields(&self) -> Vec<TemplateField> {
        self.fields.iter().map(FieldSpec::to_field).collect()
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }
}

const fn geom(x: f64, y: f64, width: f64, height: f64) -> Geometry {
    Geometry {
        x,
        y,
        width,
        height,
    }
}

const fn text(id: &'static str, label: &'static str, geometry: Geometry) -> FieldSpec {
    FieldSpec {
        id,
        kind: FieldKind::Text,
        label,
        geometry,
        default: "",
        editable: true,
        input: None,
        preview: None,
    }
}

const fn image(id: &'static str, label: &'static str, geometry: Geometry) -> FieldSpec {
    FieldSpec {
        kind: FieldKind::Image,
        ..text(id, label, geometry)
    }
}

pub static BIRTHDAY: CardLayout = CardLayout {
    card_type: CardType::Birthday,
    template_url: "/birthday-template.jpg",
    natural_size: Size::new(1600.0, 1200.0),
    fields: &[
        FieldSpec {
            input: Some("#name"),
            preview: preview("h2", 0),
            ..text("name", "Employee Name", geom(976.0, 528.0, 560.0, 0.0))
        },
        FieldSpec {
            default: "Happy Birthday",
            editable: false,
            ..text("greeting", "Greeting", geom(800.0, 240.0, 0.0, 0.0))
        },
    ],
};

pub static WORK_ANNIVERSARY: CardLayout = CardLayout {
    card_type: CardType::WorkAnniversary,
    template_url: "/work-anniversary-template.png",
    natural_size: Size::new(1080.0, 1080.0),
    fields: &[
        FieldSpec {
            input: Some("#name"),
            preview: preview(".text-white.text-3xl", 0),
            ..text("name", "Employee Name", geom(540.0, 600.0, 620.0, 0.0))
        },
        FieldSpec {
            input: Some("#designation"),
            preview: preview(".text-white.text-lg", 0),
            ..text("designation", "Designation", geom(540.0, 650.0, 620.0, 0.0))
        },
        FieldSpec {
            input: Some("#years"),
            preview: preview(".text-4xl", 0),
            ..text("years", "Years of Service", geom(540.0, 330.0, 0.0, 0.0))
        },
        FieldSpec {
            default: "Wishing you continued success and many more great years ahead!",
            editable: false,
            ..text("message", "Message", geom(540.0, 950.0, 860.0, 0.0))
        },
    ],
};

pub static ONBOARDING: CardLayout = CardLayout {
    card_type: CardType::Onboarding,
    template_url: "/onboarding-template.png",
    natural_size: Size::new(1080.0, 1512.0),
    fields: &[
        FieldSpec {
            input: Some("#name"),
            preview: preview(r".text-3xl.font-bold.text-\[\#2F7B75\]", 0),
            ..text("name", "Employee Name", geom(640.0, 420.0, 560.0, 0.0))
        },
        FieldSpec {
            input: Some("#designation"),
            preview: preview(".line-clamp-2", 0),
            ..text("designation", "Designation", geom(300.0, 860.0, 380.0, 0.0))
        },
        FieldSpec {
            input: Some("#education"),
            preview: preview(".line-clamp-2", 1),
            ..text("education", "Education", geom(300.0, 940.0, 380.0, 0.0))
        },
        FieldSpec {
            input: Some("#location"),
            preview: preview(".line-clamp-2", 2),
            ..text("location", "Location", geom(300.0, 1020.0, 380.0, 0.0))
        },
        FieldSpec {
            input: Some("#email"),
            preview: preview(".text-white .text-sm", 0),
            ..text("email", "Email", geom(540.0, 1400.0, 0.0, 0.0))
        },
        FieldSpec {
            input: Some("#phone"),
            preview: preview(".text-white .text-sm", 1),
            ..text("phone", "Phone", geom(540.0, 1450.0, 0.0, 0.0))
        },
        FieldSpec {
            input: Some("#description"),
            preview: preview(".text-gray-600.text-sm.leading-relaxed", 0),
            ..text("description", "Description", geom(640.0, 520.0, 560.0, 120.0))
        },
        FieldSpec {
            default: "Congratulations and welcome aboard! We're so glad you chose us to help us rise to the next level.",
            input: Some("#congrats-message"),
            preview: preview(".text-gray-600.italic.text-sm", 0),
            ..text("congratsMessage", "Welcome Message", geom(780.0, 1180.0, 480.0, 160.0))
        },
        text("reportingManager", "Reporting Manager", geom(780.0, 1300.0, 0.0, 0.0)),
        FieldSpec {
            preview: preview(".w-48.h-48", 0),
            ..image("profileImageUrl", "Profile Photo", geom(220.0, 440.0, 288.0, 288.0))
        },
        FieldSpec {
            preview: preview(".w-12.h-12", 0),
            ..image("smallProfileImageUrl", "Manager Photo", geom(640.0, 1300.0, 72.0, 72.0))
        },
    ],
};

/// Raw generation request as received over the wire.
///
/// `type` selects the card; every other key is a field value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardRequest {
    #[serde(rename = "type", default)]
    pub card_type: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// Validated per-request card data
#[derive(Debug, Clone, PartialEq)]
pub struct CardData {
    pub card_type: CardType,
    values: BTreeMap<String, String>,
}

impl CardData {
    pub fn new(card_type: CardType) -> Self {
        Self {
            card_type,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style value setter (no validation)
    pub fn with(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(id.into(), value.into());
        self
    }

    /// Value for `id`; absent fields read as the empty string.
    pub fn value(&self, id: &str) -> &str {
        self.values.get(id).map(String::as_str).unwrap_or("")
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn layout(&self) -> &'static CardLayout {
        self.card_type.layout()
    }

    /// Validate a wire request before any expensive work is started.
    pub fn from_request(req: CardRequest) -> Result<Self> {
        let raw_type = req
            .card_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::validation("type", "card type is required"))?;
        let card_type: CardType = raw_type.parse()?;
        let layout = card_type.layout();

        let mut data = CardData::new(card_type);
        for (key, raw) in req.fields {
            let Some(spec) = layout.field(&key) else {
                debug!("ignoring unknown field '{}' for {} card", key, card_type);
                continue;
            };
            let value = match raw {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Null => String::new(),
                other => {
                    return Err(Error::validation(
                        key,
                        format!("expected a string, got {}", json_kind(&other)),
                    ))
                }
            };
            validate_value(spec, &value)?;
            data.values.insert(key, value);
        }
        Ok(data)
    }
}

impl FieldValues for CardData {
    fn get_value(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
        _ => "a scalar",
    }
}

fn validate_value(spec: &FieldSpec, value: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    if spec.id == "years" && value.trim().parse::<u64>().is_err() {
        return Err(Error::validation(
            spec.id,
            "expected a non-negative whole number",
        ));
    }
    if spec.kind == FieldKind::Image && !is_image_source(value) {
        return Err(Error::validation(
            spec.id,
            "expected an http(s) URL or a data:image URI",
        ));
    }
    Ok(())
}

fn is_image_source(value: &str) -> bool {
    if value.starts_with("data:image/") {
        return true;
    }
    match url::Url::parse(value) {
        Ok(u) => matches!(u.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(v: serde_json::Value) -> CardRequest {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn parses_card_types() {
        assert_eq!("birthday".parse::<CardType>().unwrap(), CardType::Birthday);
        assert_eq!(
            "work-anniversary".parse::<CardType>().unwrap(),
            CardType::WorkAnniversary
        );
        assert!("wedding".parse::<CardType>().is_err());
    }

    #[test]
    fn field_ids_are_unique_per_layout() {
        for t in CardType::ALL {
            let layout = t.layout();
            assert_eq!(layout.card_type, t);
            let mut ids: Vec<_> = layout.fields.iter().map(|f| f.id).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), layout.fields.len(), "{}", t);
            for f in layout.fields {
                f.geometry.validate().unwrap();
            }
        }
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = CardData::from_request(request(json!({"name": "Asha"}))).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "type"));
    }

    #[test]
    fn numbers_are_stringified_and_unknown_keys_dropped() {
        let data = CardData::from_request(request(json!({
            "type": "work-anniversary",
            "name": "Asha Rao",
            "years": 5,
            "favouriteColour": "teal"
        })))
        .unwrap();
        assert_eq!(data.value("years"), "5");
        assert_eq!(data.value("favouriteColour"), "");
        assert_eq!(data.value("designation"), "");
    }

    #[test]
    fn bad_years_names_the_field() {
        let err = CardData::from_request(request(json!({
            "type": "work-anniversary",
            "years": "five"
        })))
        .unwrap_err();
        assert!(err.to_string().contains("'years'"));
    }

    #[test]
    fn image_fields_accept_urls_and_data_uris_only() {
        let ok = CardData::from_request(request(json!({
            "type": "onboarding",
            "profileImageUrl": "https://dl.airtable.com/a.png",
            "smallProfileImageUrl": "data:image/png;base64,iVBORw0KGgo="
        })));
        assert!(ok.is_ok());

        let err = CardData::from_request(request(json!({
            "type": "onboarding",
            "profileImageUrl": "file:///etc/passwd"
        })))
        .unwrap_err();
        assert!(err.to_string().contains("profileImageUrl"));
    }

    #[test]
    fn null_reads_as_empty() {
        let data = CardData::from_request(request(json!({"type": "birthday", "name": null}))).unwrap();
        assert_eq!(data.value("name"), "");
    }
}
