//! Interactive template editor.
//!
//! The session owns the field list and a small state machine:
//!
//! ```text
//! Idle --select--> Selected(id) --pointer_down--> Dragging(id, offset)
//!   ^                  ^  |                           |   ^
//!   +----deselect------+  +--------pointer_up---------+   +--pointer_move
//! ```
//!
//! Field geometry is kept in template-intrinsic pixels. Pointer positions
//! arrive in screen (container) pixels and are converted through the
//! current [`RenderContext`].

use crate::field::{Point, RenderContext, Size, TemplateField, DEFAULT_REFERENCE_WIDTH};
use crate::{Error, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

/// Smallest on-screen box a field occupies while dragging
pub const DEFAULT_MIN_FIELD_SIZE: Size = Size::new(50.0, 20.0);

#[derive(Debug, Clone, PartialEq)]
pub enum EditorState {
    Idle,
    Selected(String),
    Dragging {
        id: String,
        /// Pointer minus field origin, screen pixels, captured at drag start
        offset: Point,
    },
}

impl EditorState {
    pub fn selected_id(&self) -> Option<&str> {
        match self {
            EditorState::Idle => None,
            EditorState::Selected(id) | EditorState::Dragging { id, .. } => Some(id),
        }
    }
}

/// Serializable layout emitted by [`EditorSession::save`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    pub template_url: String,
    pub fields: Vec<TemplateField>,
}

impl TemplateConfig {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("Failed to serialize template: {}", e)))
    }

    /// Parse and validate a saved layout
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: TemplateConfig = serde_json::from_str(s)
            .map_err(|e| Error::ConfigError(format!("Invalid template configuration: {}", e)))?;
        for f in &cfg.fields {
            f.geometry.validate()?;
        }
        Ok(cfg)
    }
}

fn check_finite(p: Point) -> Result<()> {
    if p.x.is_finite() && p.y.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidGeometry(format!("pointer ({}, {})", p.x, p.y)))
    }
}

/// One editing session over a template's fields
#[derive(Debug, Clone)]
pub struct EditorSession {
    template_url: String,
    reference_width: f64,
    context: Option<RenderContext>,
    container: Size,
    min_field_size: Size,
    fields: Vec<TemplateField>,
    state: EditorState,
}

impl EditorSession {
    pub fn new(template_url: impl Into<String>, fields: Vec<TemplateField>) -> Self {
        Self {
            template_url: template_url.into(),
            reference_width: DEFAULT_REFERENCE_WIDTH,
            context: None,
            container: Size::new(0.0, 0.0),
            min_field_size: DEFAULT_MIN_FIELD_SIZE,
            fields,
            state: EditorState::Idle,
        }
    }

    pub fn from_config(config: TemplateConfig) -> Self {
        Self::new(config.template_url, config.fields)
    }

    pub fn with_reference_width(mut self, reference_width: f64) -> Self {
        self.reference_width = reference_width;
        self
    }

    pub fn with_min_field_size(mut self, size: Size) -> Self {
        self.min_field_size = size;
        self
    }

    pub fn template_url(&self) -> &str {
        &self.template_url
    }

    pub fn fields(&self) -> &[TemplateField] {
        &self.fields
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn context(&self) -> Option<&RenderContext> {
        self.context.as_ref()
    }

    /// Switch to a new background; the render context must be rebuilt.
    pub fn set_template(&mut self, url: impl Into<String>) {
        self.template_url = url.into();
        self.context = None;
        self.state = EditorState::Idle;
        debug!("template changed to {}", self.template_url);
    }

    /// Background image `url` finished loading with `natural` size, displayed
    /// in a container of `container` screen pixels.
    ///
    /// A load for any image other than the current template is stale and is
    /// ignored; returns whether the render context was updated.
    pub fn template_loaded(&mut self, url: &str, natural: Size, container: Size) -> Result<bool> {
        if url != self.template_url {
            debug!("ignoring stale load of {} (current template {})", url, self.template_url);
            return Ok(false);
        }
        let ctx = RenderContext::with_reference_width(
            self.template_url.clone(),
            natural,
            self.reference_width,
        )?;
        debug!(
            "template {} loaded at {}x{} (scale {:.3})",
            self.template_url,
            natural.width,
            natural.height,
            ctx.scale_factor()
        );
        self.context = Some(ctx);
        self.container = container;
        Ok(true)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| Error::UnknownField(id.to_string()))
    }

    fn require_context(&self) -> Result<&RenderContext> {
        self.context.as_ref().ok_or(Error::TemplateNotLoaded)
    }

    /// Select a field. Re-selecting the current field changes nothing.
    pub fn select(&mut self, id: &str) -> Result<()> {
        self.index_of(id)?;
        if self.state.selected_id() == Some(id) {
            return Ok(());
        }
        self.state = EditorState::Selected(id.to_string());
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.state = EditorState::Idle;
    }

    /// Begin dragging `id`; any drag in progress ends first.
    pub fn pointer_down(&mut self, id: &str, pointer: Point) -> Result<()> {
        check_finite(pointer)?;
        let idx = self.index_of(id)?;
        let ctx = self.require_context()?;
        let origin = ctx.point_to_screen(self.fields[idx].geometry.origin());
        let offset = Point::new(pointer.x - origin.x, pointer.y - origin.y);
        trace!("drag start {} offset ({}, {})", id, offset.x, offset.y);
        self.state = EditorState::Dragging {
            id: id.to_string(),
            offset,
        };
        Ok(())
    }

    /// Move the dragged field. Ignored when no drag is active.
    pub fn pointer_move(&mut self, pointer: Point) -> Result<()> {
        check_finite(pointer)?;
        let EditorState::Dragging { id, offset } = &self.state else {
            return Ok(());
        };
        let idx = self.index_of(id)?;
        let ctx = self.require_context()?;

        let size = self.drag_size(ctx, &self.fields[idx]);
        let max_x = (self.container.width - size.width).max(0.0);
        let max_y = (self.container.height - size.height).max(0.0);
        let screen = Point::new(
            (pointer.x - offset.x).clamp(0.0, max_x),
            (pointer.y - offset.y).clamp(0.0, max_y),
        );
        let intrinsic = ctx.point_to_intrinsic(screen);

        let field = &mut self.fields[idx];
        field.geometry.x = intrinsic.x;
        field.geometry.y = intrinsic.y;
        Ok(())
    }

    /// Finish a drag; the last applied position is the committed geometry.
    pub fn pointer_up(&mut self) {
        if let EditorState::Dragging { id, .. } = &self.state {
            let id = id.clone();
            trace!("drag end {}", id);
            self.state = EditorState::Selected(id);
        }
    }

    // On-screen extent used for clamping: the scaled box, but never smaller
    // than the minimum field size.
    fn drag_size(&self, ctx: &RenderContext, field: &TemplateField) -> Size {
        let screen = ctx.to_screen(&field.geometry);
        Size::new(
            screen.width.max(self.min_field_size.width),
            screen.height.max(self.min_field_size.height),
        )
    }

    pub fn set_value(&mut self, id: &str, value: impl Into<String>) -> Result<()> {
        let idx = self.index_of(id)?;
        self.fields[idx].value = value.into();
        Ok(())
    }

    /// Numeric position entry, intrinsic pixels. Negative input clamps to 0.
    pub fn set_position(&mut self, id: &str, x: f64, y: f64) -> Result<()> {
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::InvalidGeometry(format!("position ({}, {})", x, y)));
        }
        let idx = self.index_of(id)?;
        let g = &mut self.fields[idx].geometry;
        g.x = x.max(0.0);
        g.y = y.max(0.0);
        Ok(())
    }

    /// Current on-screen box of a field
    pub fn screen_geometry(&self, id: &str) -> Result<crate::field::Geometry> {
        let idx = self.index_of(id)?;
        let ctx = self.require_context()?;
        Ok(ctx.to_screen(&self.fields[idx].geometry))
    }

    /// Snapshot of the complete layout for the owner to persist.
    pub fn save(&self) -> TemplateConfig {
        TemplateConfig {
            template_url: self.template_url.clone(),
            fields: self.fields.clone(),
        }
    }
}
