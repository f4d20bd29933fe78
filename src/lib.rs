//! A micro web-application framework: page handlers take the carried
//! application state plus reconciled form parameters and return a
//! declarative [`Page`]; the framework renders it to HTML, threads the
//! state across requests, and renders diagnostics.

pub mod attrs;
pub mod codec;
pub mod content;
pub mod debug_panel;
pub mod error;
pub mod escape;
pub mod formproto;
pub mod handler;
pub mod history;
pub mod page;
pub mod reconcile;
pub mod requestlog;
pub mod router;
pub mod server;
pub mod state;
pub mod theme;
pub mod urls;
pub mod warn;

pub use content::{
    Argument, BulletedList, Button, CheckBox, Content, Div, Division,
    Download, FileUpload, Header, HorizontalRule, Image, LineBreak,
    NumberedList, Plot, Pre, PreformattedText, Row, SelectBox, Span, Table,
    TableRow, Text, TextArea, TextBox,
};
pub use handler::{CallArgs, FnPageHandler, PageHandler};
pub use page::Page;
pub use server::{Server, ServerConfig};
pub use state::{FieldType, RecordSchema, StateValue};
pub use theme::Theme;
