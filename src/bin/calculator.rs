//! Two-field calculator demo: one form, two submit buttons, and a
//! record state threaded across requests.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use pageloom::{
    Button, CallArgs, FieldType, FnPageHandler, LineBreak, Page, RecordSchema,
    Server, ServerConfig, StateValue, TextBox,
};

#[derive(Debug, Parser)]
#[clap(name = "calculator", about = "A small calculator web app")]
struct Opts {
    #[clap(long, default_value = "localhost")]
    host: String,
    #[clap(long, default_value_t = 8080)]
    port: u16,
    /// Turn the debug panel off.
    #[clap(long)]
    no_debug: bool,
    #[clap(long, default_value = "skeleton")]
    theme: String,
    #[clap(long)]
    reloader: bool,
}

fn calc_schema() -> Arc<RecordSchema> {
    RecordSchema::new("Calc")
        .field("first_number", FieldType::Int)
        .field("second_number", FieldType::Int)
        .field_with_default("result", FieldType::Str, StateValue::from(""))
        .build()
}

fn index_with(state: StateValue) -> Result<Page> {
    let first = state.field("first_number").map(|v| v.display_string());
    let second = state.field("second_number").map(|v| v.display_string());
    let result = state.field("result").map(|v| v.display_string());
    Ok(Page::new(state, vec![
        "What is the first number?".into(),
        TextBox::new("first")
            .kind("number")
            .default_value(first.unwrap_or_default())
            .into(),
        "What is the second number?".into(),
        TextBox::new("second")
            .kind("number")
            .default_value(second.unwrap_or_default())
            .into(),
        LineBreak::new().into(),
        Button::new("Add", "add_page").into(),
        Button::new("Subtract", "subtract_page").into(),
        "The result is".into(),
        result.unwrap_or_default().into(),
    ]))
}

/// Shared shape of the add/subtract handlers; non-numeric input leaves
/// the state alone.
fn calculate(args: CallArgs, op: fn(i64, i64) -> i64) -> Result<Page> {
    let state = args.state()?;
    let first = args.string("first")?;
    let second = args.string("second")?;
    match (first.parse::<i64>(), second.parse::<i64>()) {
        (Ok(a), Ok(b)) => index_with(
            state
                .with_field("first_number", a.into())?
                .with_field("second_number", b.into())?
                .with_field("result", op(a, b).to_string().into())?,
        ),
        _ => index_with(state),
    }
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    let config = ServerConfig {
        host: opts.host,
        port: opts.port,
        debug: !opts.no_debug,
        theme: opts.theme,
        reloader: opts.reloader,
        ..ServerConfig::default()
    };

    let mut server = Server::new(config);
    server
        .route(FnPageHandler::new("index_page", &["state"], |args| {
            index_with(args.state()?)
        }))?
        .route(FnPageHandler::new(
            "add_page",
            &["state", "first", "second"],
            |args| calculate(args, |a, b| a + b),
        ))?
        .route(FnPageHandler::new(
            "subtract_page",
            &["state", "first", "second"],
            |args| calculate(args, |a, b| a - b),
        ))?;

    let initial = calc_schema().instantiate(vec![0.into(), 0.into(), "".into()])?;
    server.start(initial)
}
