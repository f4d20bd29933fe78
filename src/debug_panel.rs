//! The debug panel appended to every page when debug mode is on:
//! routes, a reflection table of the current state, and the visit
//! history, newest first.

use anyhow::Result;
use itertools::Itertools;

use crate::content::{Render, RenderContext, Table};
use crate::escape::html_escape;
use crate::history::VisitedPage;
use crate::router::RouteTable;
use crate::state::StateValue;

pub fn debug_information(routes: &RouteTable, state: &StateValue,
                         page_history: &[VisitedPage],
                         ctx: &RenderContext) -> Result<String>
{
    let mut page: Vec<String> = Vec::new();

    page.push("<details open><summary>Routes</summary><ul>".into());
    for entry in routes.iter() {
        let parameters = entry.handler.params().iter().join(", ");
        page.push(format!(
            "<li><code>{}</code>: <code>{}({})</code></li>",
            html_escape(&entry.url),
            html_escape(entry.handler.name()),
            html_escape(&parameters)
        ));
    }
    page.push("</ul></details>".into());

    page.push("<details open><summary>State</summary>".into());
    if state.is_null() {
        page.push("<code>None</code>".into());
    } else {
        page.push(Table::reflect(state).render(ctx)?);
    }
    page.push("</details>".into());

    page.push("<details open><summary>Page Load History</summary><ol reversed>".into());
    for visit in page_history.iter().rev() {
        let button_pressed = if visit.button_pressed.is_empty() {
            String::new()
        } else {
            format!("Clicked <code>{}</code> &rarr; ",
                    html_escape(&visit.button_pressed))
        };
        page.push(format!(
            "<li>{}{} <code>{}</code>: <code>{}({})</code></li>",
            button_pressed,
            visit.status,
            html_escape(&visit.url),
            html_escape(&visit.handler_name),
            html_escape(&visit.arguments)
        ));
    }
    page.push("</ol></details>".into());

    Ok(page.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::handler::{FnPageHandler, PageHandler};
    use crate::history::RequestPhase;
    use crate::page::Page;
    use crate::state::testutil::calc;
    use kstring::KString;

    #[test]
    fn t_debug_information_sections() {
        let mut routes = RouteTable::new();
        let handler: Arc<dyn PageHandler> = Arc::new(FnPageHandler::new(
            "index_page",
            &["state"],
            |_| Ok(Page::new(StateValue::Null, vec![])),
        ));
        routes.add("index", handler).unwrap();

        let state = calc(5, 3, "8");
        let mut visit = VisitedPage::new(
            "/add_page?first=5".into(), "add_page",
            "Calc(first_number=0, second_number=0, result=\"\")".into(),
            KString::from_static("Add"), None);
        visit.update(RequestPhase::RenderingContent);
        visit.finish();

        let ctx = RenderContext {
            state: &state,
            deploy_image_path: "/__images",
        };
        let html =
            debug_information(&routes, &state, &[visit], &ctx).unwrap();
        assert!(html.contains("<code>/</code>: <code>index_page(state)</code>"));
        assert!(html.contains("<th>Field</th>"));
        assert!(html.contains("Clicked <code>Add</code> &rarr; "));
        assert!(html.contains("Finished Page Load"));
    }

    #[test]
    fn t_null_state_shown_as_none() {
        let routes = RouteTable::new();
        let state = StateValue::Null;
        let ctx = RenderContext {
            state: &state,
            deploy_image_path: "/__images",
        };
        let html = debug_information(&routes, &state, &[], &ctx).unwrap();
        assert!(html.contains("<code>None</code>"));
    }
}
