//! The value a handler returns: the next application state plus an
//! ordered sequence of content.

use anyhow::Result;

use crate::content::{Content, RenderContext};
use crate::error::TargetError;
use crate::router::RouteTable;
use crate::state::StateValue;

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub state: StateValue,
    pub content: Vec<Content>,
}

impl Page {
    pub fn new(state: StateValue, content: Vec<Content>) -> Self {
        Page { state, content }
    }

    /// Render all content, form-wrapped inside the framework's
    /// container div so that inputs and submit controls compose into
    /// one GET form.
    pub fn render_content(&self, ctx: &RenderContext) -> Result<String> {
        let mut chunks = Vec::with_capacity(self.content.len());
        for item in &self.content {
            chunks.push(item.render(ctx)?);
        }
        Ok(format!(
            "<div class=\"container pageloom-container\"><form>{}</form></div>",
            chunks.join("\n")
        ))
    }

    /// Check every link-like element's target against the registered
    /// routes.
    pub fn verify_content(&self, routes: &RouteTable) -> Result<(), TargetError> {
        for item in &self.content {
            item.verify(routes)?;
        }
        Ok(())
    }
}
