//! The renderable content model.
//!
//! A page is an ordered sequence of [`Content`] values. Each variant
//! struct carries its core fields plus an [`AttributeBag`] of extra
//! settings, and renders itself to markup. Variants with a navigable
//! target additionally implement [`Linkable`], which checks the target
//! against the registered routes at verification time.

use anyhow::{bail, Result};

use crate::attrs::AttributeBag;
use crate::codec::dehydrate;
use crate::error::TargetError;
use crate::escape::html_escape;
use crate::formproto::{JSON_DECODE_PREFIX, LABEL_SEPARATOR, SUBMIT_BUTTON_KEY};
use crate::router::RouteTable;
use crate::state::StateValue;
use crate::urls::{classify_external, merge_query_params, normalize_target, ExternalCheck};

/// What a variant sees while rendering.
pub struct RenderContext<'a> {
    pub state: &'a StateValue,
    /// Prefix under which internal image paths are served.
    pub deploy_image_path: &'a str,
}

/// Render a content variant to markup.
pub trait Render {
    fn render(&self, ctx: &RenderContext) -> Result<String>;
}

/// Content variants that carry a navigable target.
pub trait Linkable {
    fn label(&self) -> &str;
    fn target_url(&self) -> &str;
    fn is_external(&self) -> bool;

    /// Check the target: internal URLs must be registered routes,
    /// external ones must look like absolute URLs, `file://` never
    /// passes.
    fn verify(&self, routes: &RouteTable) -> Result<(), TargetError> {
        let label = self.label();
        let url = self.target_url();
        if routes.contains_url(url) {
            return Ok(());
        }
        match classify_external(url) {
            ExternalCheck::ValidExternal => Ok(()),
            ExternalCheck::LocalFile => Err(TargetError::LocalFile {
                label: label.to_string(),
                url: url.to_string(),
            }),
            ExternalCheck::NotAUrl => Err(TargetError::NotRegistered {
                label: label.to_string(),
                url: url.to_string(),
            }),
        }
    }
}

/// Hidden inputs carrying a control's attached arguments, namespaced
/// under the control's label and JSON-marked so reconciliation can
/// restore the typed values.
fn argument_fields(label: &str, arguments: &[Argument]) -> Result<String> {
    let mut out = String::new();
    for arg in arguments {
        let json = serde_json::to_string(&dehydrate(&arg.value)?)?;
        out.push_str(&format!(
            "<input type=\"hidden\" name=\"{}{}{}{}\" value=\"{}\" />",
            html_escape(label),
            LABEL_SEPARATOR,
            JSON_DECODE_PREFIX,
            html_escape(&arg.name),
            html_escape(&json)
        ));
    }
    Ok(out)
}

macro_rules! with_settings {
    ($($ty:ident),* $(,)?) => {
        $(
            impl $ty {
                /// Set an extra attribute, chaining.
                pub fn attr(mut self, key: &str, value: &str) -> Self {
                    self.settings.set(key, value);
                    self
                }

                /// Set an inline style, chaining.
                pub fn style(mut self, property: &str, value: &str) -> Self {
                    self.settings.set_style(property, value);
                    self
                }
            }
        )*
    }
}

// ------------------------------------------------------------------
// Text

/// Raw text content, rendered without a paragraph wrapper and without
/// escaping (the author may embed markup). Bare strings in page
/// content render as escaped paragraphs instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub body: String,
}

impl Text {
    pub fn new(body: impl Into<String>) -> Self {
        Text { body: body.into() }
    }
}

impl Render for Text {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        Ok(self.body.clone())
    }
}

// ------------------------------------------------------------------
// Link

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub text: String,
    pub url: String,
    pub external: bool,
    pub arguments: Vec<Argument>,
    settings: AttributeBag,
}

impl Link {
    pub fn new(text: impl Into<String>, target: &str) -> Self {
        let (url, external) = normalize_target(target);
        Link {
            text: text.into(),
            url,
            external,
            arguments: Vec::new(),
            settings: AttributeBag::new(),
        }
    }

    /// Attach an argument submitted when this link is activated.
    pub fn argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn arguments(mut self, arguments: Vec<Argument>) -> Self {
        self.arguments.extend(arguments);
        self
    }
}

impl Linkable for Link {
    fn label(&self) -> &str {
        &self.text
    }
    fn target_url(&self) -> &str {
        &self.url
    }
    fn is_external(&self) -> bool {
        self.external
    }
}

impl Render for Link {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        let precode = argument_fields(&self.text, &self.arguments)?;
        let url = merge_query_params(&self.url, &[(SUBMIT_BUTTON_KEY, &self.text)]);
        Ok(format!(
            "{}<a href=\"{}\"{}>{}</a>",
            precode,
            html_escape(&url),
            self.settings.render(&[], &[]),
            html_escape(&self.text)
        ))
    }
}

// ------------------------------------------------------------------
// Button

/// A submit control. Activating it submits the form to the button's
/// target, marking which control was pressed.
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub text: String,
    pub url: String,
    pub external: bool,
    pub arguments: Vec<Argument>,
    settings: AttributeBag,
}

impl Button {
    pub fn new(text: impl Into<String>, target: &str) -> Self {
        let (url, external) = normalize_target(target);
        Button {
            text: text.into(),
            url,
            external,
            arguments: Vec::new(),
            settings: AttributeBag::new(),
        }
    }

    pub fn argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn arguments(mut self, arguments: Vec<Argument>) -> Self {
        self.arguments.extend(arguments);
        self
    }
}

impl Linkable for Button {
    fn label(&self) -> &str {
        &self.text
    }
    fn target_url(&self) -> &str {
        &self.url
    }
    fn is_external(&self) -> bool {
        self.external
    }
}

impl Render for Button {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        let precode = argument_fields(&self.text, &self.arguments)?;
        let url = merge_query_params(&self.url, &[(SUBMIT_BUTTON_KEY, &self.text)]);
        Ok(format!(
            "{}<input type=\"submit\" name=\"{}\" value=\"{}\" formaction=\"{}\"{} />",
            precode,
            SUBMIT_BUTTON_KEY,
            html_escape(&self.text),
            html_escape(&url),
            self.settings.render(&[], &[])
        ))
    }
}

// ------------------------------------------------------------------
// Image

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    settings: AttributeBag,
}

impl Image {
    pub fn new(url: impl Into<String>) -> Self {
        Image {
            url: url.into(),
            width: None,
            height: None,
            settings: AttributeBag::new(),
        }
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

impl Render for Image {
    /// Internal image paths are resolved against the configured
    /// deployed-image prefix; external URLs pass through.
    fn render(&self, ctx: &RenderContext) -> Result<String> {
        let width = self.width.map(|w| w.to_string());
        let height = self.height.map(|h| h.to_string());
        let mut overrides: Vec<(&str, &str)> = Vec::new();
        if let Some(w) = &width {
            overrides.push(("width", w));
        }
        if let Some(h) = &height {
            overrides.push(("height", h));
        }
        let (url, external) = normalize_target(&self.url);
        let src = if external {
            url
        } else {
            format!("{}{}", ctx.deploy_image_path, url)
        };
        Ok(format!(
            "<img src=\"{}\"{} />",
            html_escape(&src),
            self.settings.render(&overrides, &["width", "height", "src", "alt"])
        ))
    }
}

// ------------------------------------------------------------------
// Form inputs

#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub name: String,
    pub kind: String,
    pub default_value: Option<String>,
    settings: AttributeBag,
}

impl TextBox {
    pub fn new(name: impl Into<String>) -> Self {
        TextBox {
            name: name.into(),
            kind: "text".into(),
            default_value: None,
            settings: AttributeBag::new(),
        }
    }

    /// The input type (`text`, `number`, `password`, ...).
    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

impl Render for TextBox {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        let mut overrides: Vec<(&str, &str)> = Vec::new();
        if let Some(v) = &self.default_value {
            overrides.push(("value", v));
        }
        Ok(format!(
            "<input type=\"{}\" name=\"{}\"{} />",
            html_escape(&self.kind),
            html_escape(&self.name),
            self.settings.render(&overrides, &[])
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextArea {
    pub name: String,
    pub default_value: Option<String>,
    settings: AttributeBag,
}

impl TextArea {
    const EXTRA_ATTRS: &'static [&'static str] = &[
        "rows", "cols", "autocomplete", "autofocus", "disabled",
        "placeholder", "readonly", "required",
    ];

    pub fn new(name: impl Into<String>) -> Self {
        TextArea {
            name: name.into(),
            default_value: None,
            settings: AttributeBag::new(),
        }
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

impl Render for TextArea {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        Ok(format!(
            "<textarea name=\"{}\"{}>{}</textarea>",
            html_escape(&self.name),
            self.settings.render(&[], Self::EXTRA_ATTRS),
            html_escape(self.default_value.as_deref().unwrap_or(""))
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectBox {
    pub name: String,
    pub options: Vec<String>,
    pub default_value: Option<String>,
    settings: AttributeBag,
}

impl SelectBox {
    pub fn new(name: impl Into<String>, options: Vec<String>) -> Self {
        SelectBox {
            name: name.into(),
            options,
            default_value: None,
            settings: AttributeBag::new(),
        }
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

impl Render for SelectBox {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        let options = self
            .options
            .iter()
            .map(|option| {
                let selected = if Some(option.as_str())
                    == self.default_value.as_deref()
                {
                    " selected"
                } else {
                    ""
                };
                format!(
                    "<option{} value=\"{}\">{}</option>",
                    selected,
                    html_escape(option),
                    html_escape(option)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!(
            "<select name=\"{}\"{}>{}</select>",
            html_escape(&self.name),
            self.settings.render(&[], &[]),
            options
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckBox {
    pub name: String,
    pub default_value: bool,
    settings: AttributeBag,
}

impl CheckBox {
    const EXTRA_ATTRS: &'static [&'static str] = &["checked"];

    pub fn new(name: impl Into<String>, default_value: bool) -> Self {
        CheckBox {
            name: name.into(),
            default_value,
            settings: AttributeBag::new(),
        }
    }
}

impl Render for CheckBox {
    /// The hidden empty-value field in front makes an unchecked box
    /// still submit a defined (empty) value rather than omit the key.
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        let settings = self.settings.render(&[], Self::EXTRA_ATTRS);
        let checked = if self.default_value { " checked" } else { "" };
        Ok(format!(
            "<input type=\"hidden\" name=\"{name}\" value=\"\"{settings} />\
             <input type=\"checkbox\" name=\"{name}\"{checked} value=\"checked\"{settings} />",
            name = html_escape(&self.name),
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub name: String,
    settings: AttributeBag,
}

impl FileUpload {
    const EXTRA_ATTRS: &'static [&'static str] =
        &["accept", "capture", "multiple", "required"];

    pub fn new(name: impl Into<String>) -> Self {
        FileUpload {
            name: name.into(),
            settings: AttributeBag::new(),
        }
    }

    /// Restrict accepted files. Entries may be MIME types or
    /// extensions; bare extensions get a dot prefixed.
    pub fn accept(mut self, kinds: &[&str]) -> Self {
        let normalized = kinds
            .iter()
            .map(|kind| {
                if !kind.contains('/') && !kind.starts_with('.') {
                    format!(".{kind}")
                } else {
                    kind.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        self.settings.set("accept", &normalized);
        self
    }
}

impl Render for FileUpload {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        Ok(format!(
            "<input type=\"file\" name=\"{}\"{} />",
            html_escape(&self.name),
            self.settings.render(&[], Self::EXTRA_ATTRS)
        ))
    }
}

// ------------------------------------------------------------------
// Structure

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineBreak;

impl LineBreak {
    pub fn new() -> Self {
        LineBreak
    }
}

impl Render for LineBreak {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        Ok("<br />".into())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HorizontalRule;

impl HorizontalRule {
    pub fn new() -> Self {
        HorizontalRule
    }
}

impl Render for HorizontalRule {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        Ok("<hr />".into())
    }
}

fn render_children(children: &[Content], ctx: &RenderContext) -> Result<String> {
    let mut out = String::new();
    for child in children {
        out.push_str(&child.render(ctx)?);
    }
    Ok(out)
}

fn verify_children(children: &[Content], routes: &RouteTable)
                   -> Result<(), TargetError>
{
    for child in children {
        child.verify(routes)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub content: Vec<Content>,
    settings: AttributeBag,
}

impl Span {
    pub fn new(content: Vec<Content>) -> Self {
        Span {
            content,
            settings: AttributeBag::new(),
        }
    }
}

impl Render for Span {
    fn render(&self, ctx: &RenderContext) -> Result<String> {
        Ok(format!(
            "<span{}>{}</span>",
            self.settings.render(&[], &[]),
            render_children(&self.content, ctx)?
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Div {
    pub content: Vec<Content>,
    settings: AttributeBag,
}

pub type Division = Div;

impl Div {
    pub fn new(content: Vec<Content>) -> Self {
        Div {
            content,
            settings: AttributeBag::new(),
        }
    }
}

impl Render for Div {
    fn render(&self, ctx: &RenderContext) -> Result<String> {
        Ok(format!(
            "<div{}>{}</div>",
            self.settings.render(&[], &[]),
            render_children(&self.content, ctx)?
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pre {
    pub content: Vec<Content>,
    settings: AttributeBag,
}

pub type PreformattedText = Pre;

impl Pre {
    pub fn new(content: Vec<Content>) -> Self {
        Pre {
            content,
            settings: AttributeBag::new(),
        }
    }
}

impl Render for Pre {
    fn render(&self, ctx: &RenderContext) -> Result<String> {
        Ok(format!(
            "<pre{}>{}</pre>",
            self.settings.render(&[], &[]),
            render_children(&self.content, ctx)?
        ))
    }
}

/// A Div preset laying its children out horizontally.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub content: Vec<Content>,
    settings: AttributeBag,
}

impl Row {
    pub fn new(content: Vec<Content>) -> Self {
        let mut settings = AttributeBag::new();
        settings.set_style("display", "flex");
        settings.set_style("flex_direction", "row");
        settings.set_style("align_items", "center");
        Row { content, settings }
    }
}

impl Render for Row {
    fn render(&self, ctx: &RenderContext) -> Result<String> {
        Ok(format!(
            "<div{}>{}</div>",
            self.settings.render(&[], &[]),
            render_children(&self.content, ctx)?
        ))
    }
}

fn render_list(tag: &str, items: &[Content], settings: &AttributeBag,
               ctx: &RenderContext) -> Result<String>
{
    let rendered = items
        .iter()
        .map(|item| Ok(format!("<li>{}</li>", item.render(ctx)?)))
        .collect::<Result<Vec<_>>>()?
        .join("\n");
    Ok(format!("<{tag}{}>{rendered}</{tag}>", settings.render(&[], &[])))
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberedList {
    pub items: Vec<Content>,
    settings: AttributeBag,
}

impl NumberedList {
    pub fn new(items: Vec<Content>) -> Self {
        NumberedList {
            items,
            settings: AttributeBag::new(),
        }
    }
}

impl Render for NumberedList {
    fn render(&self, ctx: &RenderContext) -> Result<String> {
        render_list("ol", &self.items, &self.settings, ctx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulletedList {
    pub items: Vec<Content>,
    settings: AttributeBag,
}

impl BulletedList {
    pub fn new(items: Vec<Content>) -> Self {
        BulletedList {
            items,
            settings: AttributeBag::new(),
        }
    }
}

impl Render for BulletedList {
    fn render(&self, ctx: &RenderContext) -> Result<String> {
        render_list("ul", &self.items, &self.settings, ctx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub body: String,
    pub level: u8,
}

impl Header {
    pub fn new(body: impl Into<String>) -> Self {
        Header {
            body: body.into(),
            level: 1,
        }
    }

    pub fn level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }
}

impl Render for Header {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        let level = self.level.clamp(1, 6);
        Ok(format!("<h{level}>{}</h{level}>", html_escape(&self.body)))
    }
}

// ------------------------------------------------------------------
// Table

/// Input row for [`Table::new`]: a record value (flattened into cells,
/// contributing a synthesized header), a plain cell sequence, or a
/// bare string (a single-cell row).
#[derive(Debug, Clone, PartialEq)]
pub enum TableRow {
    Record(StateValue),
    Cells(Vec<String>),
    Text(String),
}

impl From<StateValue> for TableRow {
    fn from(v: StateValue) -> Self {
        TableRow::Record(v)
    }
}
impl From<&StateValue> for TableRow {
    fn from(v: &StateValue) -> Self {
        TableRow::Record(v.clone())
    }
}
impl From<Vec<String>> for TableRow {
    fn from(cells: Vec<String>) -> Self {
        TableRow::Cells(cells)
    }
}
impl From<Vec<&str>> for TableRow {
    fn from(cells: Vec<&str>) -> Self {
        TableRow::Cells(cells.iter().map(|c| c.to_string()).collect())
    }
}
impl From<&str> for TableRow {
    fn from(s: &str) -> Self {
        TableRow::Text(s.to_string())
    }
}
impl From<String> for TableRow {
    fn from(s: String) -> Self {
        TableRow::Text(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    rows: Vec<Vec<String>>,
    header: Option<Vec<String>>,
    settings: AttributeBag,
}

impl Table {
    /// Build from rows, normalizing at construction time: record rows
    /// are flattened into their field values and synthesize a header
    /// (from the first record seen, when no explicit header is set);
    /// record and plain rows may be mixed.
    pub fn new<R: Into<TableRow>>(rows: impl IntoIterator<Item = R>) -> Self {
        let mut normalized = Vec::new();
        let mut synthesized: Option<Vec<String>> = None;
        for row in rows {
            match row.into() {
                TableRow::Record(value) => match value.as_record() {
                    Some(record) => {
                        if synthesized.is_none() {
                            synthesized = Some(
                                record
                                    .schema
                                    .fields()
                                    .iter()
                                    .map(|f| f.name.to_string())
                                    .collect(),
                            );
                        }
                        normalized.push(
                            record.values.iter().map(|v| v.display_string()).collect(),
                        );
                    }
                    None => normalized.push(vec![value.display_string()]),
                },
                TableRow::Cells(cells) => normalized.push(cells),
                TableRow::Text(s) => normalized.push(vec![s]),
            }
        }
        Table {
            rows: normalized,
            header: synthesized,
            settings: AttributeBag::new(),
        }
    }

    /// Reflection table over a single state value: one row per record
    /// field, showing name, declared type, and current value.
    pub fn reflect(state: &StateValue) -> Self {
        let code = |s: &str| format!("<code>{}</code>", html_escape(s));
        let rows = match state.as_record() {
            Some(record) => record
                .schema
                .fields()
                .iter()
                .zip(&record.values)
                .map(|(f, v)| {
                    vec![code(&f.name), code(&f.ty.label()), code(&v.repr())]
                })
                .collect(),
            None => vec![vec![
                code("value"),
                code(&state.type_label()),
                code(&state.repr()),
            ]],
        };
        Table {
            rows,
            header: Some(vec![
                "Field".into(),
                "Type".into(),
                "Current Value".into(),
            ]),
            settings: AttributeBag::new(),
        }
    }

    /// Explicit header; replaces any synthesized one.
    pub fn header(mut self, header: Vec<String>) -> Self {
        self.header = Some(header);
        self
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn header_row(&self) -> Option<&[String]> {
        self.header.as_deref()
    }
}

impl Render for Table {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        let header = match &self.header {
            Some(cells) => format!(
                "<thead><tr>{}</tr></thead>",
                cells
                    .iter()
                    .map(|c| format!("<th>{c}</th>"))
                    .collect::<String>()
            ),
            None => String::new(),
        };
        let rows = self
            .rows
            .iter()
            .map(|row| {
                format!(
                    "<tr>{}</tr>",
                    row.iter().map(|c| format!("<td>{c}</td>")).collect::<String>()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!(
            "<table{}>{header}{rows}</table>",
            self.settings.render(&[], &[])
        ))
    }
}

// ------------------------------------------------------------------
// Argument

/// A named primitive value attachable to a Link or Button; activating
/// the control submits it as a namespaced hidden field. Standalone, it
/// renders as an unscoped JSON-marked hidden field.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: StateValue,
    settings: AttributeBag,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: impl Into<StateValue>) -> Result<Self> {
        let value = value.into();
        match value {
            StateValue::Str(_)
            | StateValue::Int(_)
            | StateValue::Float(_)
            | StateValue::Bool(_) => (),
            other => bail!(
                "argument values must be strings, integers, floats, or \
                 booleans; found {}",
                other.type_label()
            ),
        }
        Ok(Argument {
            name: name.into(),
            value,
            settings: AttributeBag::new(),
        })
    }
}

impl Render for Argument {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        let json = serde_json::to_string(&dehydrate(&self.value)?)?;
        Ok(format!(
            "<input type=\"hidden\" name=\"{}{}\" value=\"{}\"{} />",
            JSON_DECODE_PREFIX,
            html_escape(&self.name),
            html_escape(&json),
            self.settings.render(&[], &[])
        ))
    }
}

// ------------------------------------------------------------------
// Download and Plot

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadPayload {
    Text(String),
    Binary(Vec<u8>),
}

impl From<&str> for DownloadPayload {
    fn from(s: &str) -> Self {
        DownloadPayload::Text(s.to_string())
    }
}
impl From<String> for DownloadPayload {
    fn from(s: String) -> Self {
        DownloadPayload::Text(s)
    }
}
impl From<Vec<u8>> for DownloadPayload {
    fn from(bytes: Vec<u8>) -> Self {
        DownloadPayload::Binary(bytes)
    }
}

/// A link whose payload is embedded in the page as a data URL and
/// saved under `filename` when activated.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub text: String,
    pub filename: String,
    pub payload: DownloadPayload,
    pub content_type: String,
}

impl Download {
    pub fn new(text: impl Into<String>, filename: impl Into<String>,
               payload: impl Into<DownloadPayload>) -> Self
    {
        let payload = payload.into();
        let content_type = match &payload {
            DownloadPayload::Text(_) => "text/plain",
            DownloadPayload::Binary(_) => "application/octet-stream",
        };
        Download {
            text: text.into(),
            filename: filename.into(),
            payload,
            content_type: content_type.into(),
        }
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl Render for Download {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        let href = match &self.payload {
            DownloadPayload::Text(text) => format!(
                "data:{},{}",
                self.content_type,
                crate::urls::url_encode(text)
            ),
            DownloadPayload::Binary(bytes) => format!(
                "data:{};base64,{}",
                self.content_type,
                base64::encode(bytes)
            ),
        };
        Ok(format!(
            "<a download=\"{}\" href=\"{}\">{}</a>",
            html_escape(&self.filename),
            html_escape(&href),
            html_escape(&self.text)
        ))
    }
}

/// A pre-encoded PNG plot, embedded as a base64 data URL. Producing
/// the PNG bytes is the caller's business.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub png: Vec<u8>,
    settings: AttributeBag,
}

impl Plot {
    pub fn from_png(png: Vec<u8>) -> Self {
        Plot {
            png,
            settings: AttributeBag::new(),
        }
    }
}

impl Render for Plot {
    fn render(&self, _ctx: &RenderContext) -> Result<String> {
        Ok(format!(
            "<img src=\"data:image/png;base64,{}\"{} />",
            base64::encode(&self.png),
            self.settings.render(&[], &[])
        ))
    }
}

with_settings!(
    Link, Button, Image, TextBox, TextArea, SelectBox, CheckBox, FileUpload,
    Span, Div, Pre, Row, NumberedList, BulletedList, Table, Argument, Plot,
);

// ------------------------------------------------------------------
// The closed variant set

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Bare page text; rendered as an escaped paragraph.
    Str(String),
    Text(Text),
    Link(Link),
    Button(Button),
    Image(Image),
    TextBox(TextBox),
    TextArea(TextArea),
    SelectBox(SelectBox),
    CheckBox(CheckBox),
    FileUpload(FileUpload),
    LineBreak(LineBreak),
    HorizontalRule(HorizontalRule),
    Span(Span),
    Div(Div),
    Pre(Pre),
    Row(Row),
    NumberedList(NumberedList),
    BulletedList(BulletedList),
    Header(Header),
    Table(Table),
    Argument(Argument),
    Download(Download),
    Plot(Plot),
}

impl Content {
    pub fn render(&self, ctx: &RenderContext) -> Result<String> {
        match self {
            Content::Str(s) => Ok(format!("<p>{}</p>", html_escape(s))),
            Content::Text(c) => c.render(ctx),
            Content::Link(c) => c.render(ctx),
            Content::Button(c) => c.render(ctx),
            Content::Image(c) => c.render(ctx),
            Content::TextBox(c) => c.render(ctx),
            Content::TextArea(c) => c.render(ctx),
            Content::SelectBox(c) => c.render(ctx),
            Content::CheckBox(c) => c.render(ctx),
            Content::FileUpload(c) => c.render(ctx),
            Content::LineBreak(c) => c.render(ctx),
            Content::HorizontalRule(c) => c.render(ctx),
            Content::Span(c) => c.render(ctx),
            Content::Div(c) => c.render(ctx),
            Content::Pre(c) => c.render(ctx),
            Content::Row(c) => c.render(ctx),
            Content::NumberedList(c) => c.render(ctx),
            Content::BulletedList(c) => c.render(ctx),
            Content::Header(c) => c.render(ctx),
            Content::Table(c) => c.render(ctx),
            Content::Argument(c) => c.render(ctx),
            Content::Download(c) => c.render(ctx),
            Content::Plot(c) => c.render(ctx),
        }
    }

    /// Check link targets, recursing into containers.
    pub fn verify(&self, routes: &RouteTable) -> Result<(), TargetError> {
        match self {
            Content::Link(c) => c.verify(routes),
            Content::Button(c) => c.verify(routes),
            Content::Span(c) => verify_children(&c.content, routes),
            Content::Div(c) => verify_children(&c.content, routes),
            Content::Pre(c) => verify_children(&c.content, routes),
            Content::Row(c) => verify_children(&c.content, routes),
            Content::NumberedList(c) => verify_children(&c.items, routes),
            Content::BulletedList(c) => verify_children(&c.items, routes),
            _ => Ok(()),
        }
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Str(s.to_string())
    }
}
impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Str(s)
    }
}

macro_rules! content_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Content {
                fn from(v: $variant) -> Self {
                    Content::$variant(v)
                }
            }
        )*
    }
}

content_from!(
    Text, Link, Button, Image, TextBox, TextArea, SelectBox, CheckBox,
    FileUpload, LineBreak, HorizontalRule, Span, Div, Pre, Row, NumberedList,
    BulletedList, Header, Table, Argument, Download, Plot,
);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::handler::{FnPageHandler, PageHandler};
    use crate::page::Page;
    use crate::state::testutil::calc;

    fn ctx<'a>(state: &'a StateValue) -> RenderContext<'a> {
        RenderContext {
            state,
            deploy_image_path: "/__images",
        }
    }

    fn routes_with(names: &[&'static str]) -> RouteTable {
        let mut routes = RouteTable::new();
        for &name in names {
            let handler: Arc<dyn PageHandler> =
                Arc::new(FnPageHandler::new(name, &["state"], |_| {
                    Ok(Page::new(StateValue::Null, vec![]))
                }));
            routes.add(name, handler).unwrap();
        }
        routes
    }

    #[test]
    fn t_reflection_table_shape() {
        let table = Table::reflect(&calc(5, 3, "8"));
        assert_eq!(table.header_row().unwrap(),
                   &["Field", "Type", "Current Value"]);
        assert_eq!(table.rows().len(), 3);
        for row in table.rows() {
            assert_eq!(row.len(), 3);
        }
        assert_eq!(table.rows()[0][0], "<code>first_number</code>");
        assert_eq!(table.rows()[0][1], "<code>int</code>");
        assert_eq!(table.rows()[2][2], "<code>&quot;8&quot;</code>");
    }

    #[test]
    fn t_table_synthesizes_header_from_records() {
        let table = Table::new([calc(1, 2, "3"), calc(4, 5, "9")]);
        assert_eq!(table.header_row().unwrap(),
                   &["first_number", "second_number", "result"]);
        assert_eq!(table.rows(),
                   &[vec!["1", "2", "3"], vec!["4", "5", "9"]]);
    }

    #[test]
    fn t_table_mixed_rows() {
        let table = Table::new([
            TableRow::from(calc(1, 2, "3")),
            TableRow::from(vec!["a", "b", "c"]),
            TableRow::from("just text"),
        ]);
        assert_eq!(table.rows().len(), 3);
        assert_eq!(table.rows()[1], vec!["a", "b", "c"]);
        assert_eq!(table.rows()[2], vec!["just text"]);
        // Records still drive the header:
        assert!(table.header_row().is_some());
    }

    #[test]
    fn t_table_explicit_header_wins() {
        let table = Table::new([calc(1, 2, "3")])
            .header(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(table.header_row().unwrap(), &["a", "b", "c"]);
    }

    #[test]
    fn t_table_plain_rows_have_no_header() {
        let table = Table::new([vec!["a", "b"]]);
        assert_eq!(table.header_row(), None);
    }

    #[test]
    fn t_checkbox_submits_defined_empty_value() {
        let state = StateValue::Null;
        let html = CheckBox::new("accept", false).render(&ctx(&state)).unwrap();
        assert!(html.starts_with(
            "<input type=\"hidden\" name=\"accept\" value=\"\" />"));
        assert!(html.contains("type=\"checkbox\""));
        assert!(!html.contains(" checked"));
        let html = CheckBox::new("accept", true).render(&ctx(&state)).unwrap();
        assert!(html.contains(" checked"));
    }

    #[test]
    fn t_fileupload_accept_normalization() {
        let state = StateValue::Null;
        let html = FileUpload::new("photo")
            .accept(&["png", ".jpg", "image/webp"])
            .render(&ctx(&state))
            .unwrap();
        assert!(html.contains("accept=\".png, .jpg, image/webp\""),
                "got: {html}");
    }

    #[test]
    fn t_link_render_marks_pressed_control() {
        let state = StateValue::Null;
        let html = Link::new("Home", "index").render(&ctx(&state)).unwrap();
        assert_eq!(html,
                   "<a href=\"/?-submit-button=Home\">Home</a>");
    }

    #[test]
    fn t_button_formaction_and_arguments() {
        let state = StateValue::Null;
        let html = Button::new("Add", "add_page")
            .argument(Argument::new("amount", 2).unwrap())
            .render(&ctx(&state))
            .unwrap();
        assert!(html.starts_with(
            "<input type=\"hidden\" name=\"Add$~amount\" value=\"2\" />"),
            "got: {html}");
        assert!(html.contains("name=\"-submit-button\" value=\"Add\""));
        assert!(html.contains("formaction=\"/add_page?-submit-button=Add\""));
    }

    #[test]
    fn t_argument_rejects_structures() {
        assert!(Argument::new("xs", StateValue::List(vec![])).is_err());
    }

    #[test]
    fn t_verify_local_file_rejected() {
        let routes = routes_with(&["index"]);
        let err = Link::new("Secrets", "file:///etc/passwd")
            .verify(&routes)
            .unwrap_err();
        assert!(err.to_string().contains("local file"), "got: {err}");
    }

    #[test]
    fn t_verify_unregistered_page_rejected() {
        let routes = routes_with(&["index"]);
        let err = Link::new("Elsewhere", "missing_page")
            .verify(&routes)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "link `Elsewhere` points to non-existent page `/missing_page`");
    }

    #[test]
    fn t_verify_registered_and_external_accepted() {
        let routes = routes_with(&["index", "add_page"]);
        assert!(Link::new("Add", "add_page").verify(&routes).is_ok());
        assert!(Link::new("Docs", "https://example.com/docs")
            .verify(&routes)
            .is_ok());
    }

    #[test]
    fn t_verify_recurses_into_containers() {
        let routes = routes_with(&["index"]);
        let div = Div::new(vec![
            Span::new(vec![Link::new("Bad", "nowhere").into()]).into(),
        ]);
        assert!(Content::from(div).verify(&routes).is_err());
    }

    #[test]
    fn t_row_presets_flex_styles() {
        let state = StateValue::Null;
        let html = Row::new(vec!["a".into()]).render(&ctx(&state)).unwrap();
        assert!(html.contains(
            "style=\"display: flex; flex-direction: row; align-items: center\""),
            "got: {html}");
    }

    #[test]
    fn t_image_internal_vs_external() {
        let state = StateValue::Null;
        let html = Image::new("/logo.png").size(32, 16)
            .render(&ctx(&state)).unwrap();
        assert_eq!(html,
                   "<img src=\"/__images/logo.png\" width=\"32\" height=\"16\" />");
        let html = Image::new("https://example.com/logo.png")
            .render(&ctx(&state)).unwrap();
        assert_eq!(html, "<img src=\"https://example.com/logo.png\" />");
    }

    #[test]
    fn t_str_paragraphs_are_escaped() {
        let state = StateValue::Null;
        let html = Content::from("a < b").render(&ctx(&state)).unwrap();
        assert_eq!(html, "<p>a &lt; b</p>");
        // Text is the raw escape hatch:
        let html = Content::from(Text::new("<em>raw</em>"))
            .render(&ctx(&state)).unwrap();
        assert_eq!(html, "<em>raw</em>");
    }

    #[test]
    fn t_download_data_urls() {
        let state = StateValue::Null;
        let html = Download::new("Save", "out.txt", "hello world")
            .render(&ctx(&state)).unwrap();
        assert!(html.contains("href=\"data:text/plain,hello%20world\""),
                "got: {html}");
        let html = Download::new("Save", "out.bin", vec![0u8, 1, 2])
            .render(&ctx(&state)).unwrap();
        assert!(html.contains("base64,AAEC"), "got: {html}");
    }

    #[test]
    fn t_select_box_marks_default() {
        let state = StateValue::Null;
        let html = SelectBox::new("color",
                                  vec!["red".into(), "green".into()])
            .default_value("green")
            .render(&ctx(&state))
            .unwrap();
        assert!(html.contains("<option value=\"red\">red</option>"));
        assert!(html.contains("<option selected value=\"green\">green</option>"));
    }
}
