//! Field model: typed template fields and the intrinsic-to-screen mapping.
//!
//! All geometry is stored in template-intrinsic pixels, i.e. relative to the
//! natural resolution of the template background image. Screen coordinates
//! only exist transiently, derived through a [`RenderContext`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Fixed design width the scale factor is computed against.
pub const DEFAULT_REFERENCE_WIDTH: f64 = 1080.0;

/// The kind of payload a field carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Image,
    Date,
}

/// Width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Point in either coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Field box. A `width`/`height` of 0 means "auto" (content-sized).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Geometry {
    /// Build a geometry, rejecting negative or non-finite components.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        let g = Self {
            x,
            y,
            width,
            height,
        };
        g.validate()?;
        Ok(g)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::InvalidGeometry(format!("{} = {}", name, v)));
            }
        }
        Ok(())
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_auto_width(&self) -> bool {
        self.width == 0.0
    }

    pub fn is_auto_height(&self) -> bool {
        self.height == 0.0
    }
}

fn default_editable() -> bool {
    true
}

/// A named placeholder on a card template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    /// Stable identifier, unique within a template
    pub id: String,
    pub kind: FieldKind,
    /// Display name shown in the editor
    #[serde(default)]
    pub label: String,
    /// Intrinsic-space box
    pub geometry: Geometry,
    /// Free text, image URL / data URI, or date string
    #[serde(default)]
    pub value: String,
    /// When false, user data never overwrites `value`
    #[serde(default = "default_editable")]
    pub editable: bool,
}

impl TemplateField {
    /// Editable field with an empty value; the label defaults to the id.
    pub fn new(id: impl Into<String>, kind: FieldKind, geometry: Geometry) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            kind,
            geometry,
            value: String::new(),
            editable: true,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn locked(mut self) -> Self {
        self.editable = false;
        self
    }
}

/// Scale information for one loaded template image.
///
/// Created once the background image reports its natural size and discarded
/// whenever the template URL changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub template_url: String,
    pub natural_size: Size,
    pub reference_width: f64,
}

impl RenderContext {
    pub fn new(template_url: impl Into<String>, natural_size: Size) -> Result<Self> {
        Self::with_reference_width(template_url, natural_size, DEFAULT_REFERENCE_WIDTH)
    }

    pub fn with_reference_width(
        template_url: impl Into<String>,
        natural_size: Size,
        reference_width: f64,
    ) -> Result<Self> {
        if !natural_size.width.is_finite() || natural_size.width <= 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "template natural width = {}",
                natural_size.width
            )));
        }
        if !natural_size.height.is_finite() || natural_size.height < 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "template natural height = {}",
                natural_size.height
            )));
        }
        if !reference_width.is_finite() || reference_width <= 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "reference width = {}",
                reference_width
            )));
        }
        Ok(Self {
            template_url: template_url.into(),
            natural_size,
            reference_width,
        })
    }

    /// `reference_width / natural width`
    pub fn scale_factor(&self) -> f64 {
        self.reference_width / self.natural_size.width
    }

    /// On-screen size of the whole template
    pub fn screen_size(&self) -> Size {
        let s = self.scale_factor();
        Size::new(self.natural_size.width / s, self.natural_size.height / s)
    }

    /// Map an intrinsic box to the viewport. Auto (0) extents stay 0.
    pub fn to_screen(&self, g: &Geometry) -> Geometry {
        let s = self.scale_factor();
        Geometry {
            x: g.x / s,
            y: g.y / s,
            width: g.width / s,
            height: g.height / s,
        }
    }

    pub fn point_to_intrinsic(&self, p: Point) -> Point {
        let s = self.scale_factor();
        Point::new(p.x * s, p.y * s)
    }

    pub fn point_to_screen(&self, p: Point) -> Point {
        let s = self.scale_factor();
        Point::new(p.x / s, p.y / s)
    }
}
