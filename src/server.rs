//! The server: route table, carried state, histories, and the
//! per-request pipeline turning a handler's returned page into an
//! HTTP response.
//!
//! Every fatal-per-request failure is caught here and converted into a
//! diagnostic page; a bad request never takes the process down.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{anyhow, Result};
use rouille::{Request, Response};

use crate::content::RenderContext;
use crate::debug_panel::debug_information;
use crate::error::{PageViolation, SetupError};
use crate::escape::html_escape;
use crate::handler::PageHandler;
use crate::history::{RequestPhase, VisitedPage};
use crate::page::Page;
use crate::reconcile::{bind, reconcile};
use crate::requestlog::AccessLog;
use crate::router::RouteTable;
use crate::state::StateValue;
use crate::theme::Theme;
use crate::urls::QueryPairs;

/// The fixed, enumerable configuration surface.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Append the debug panel to every page.
    pub debug: bool,
    /// Theme name; validated at startup.
    pub theme: String,
    /// Accepted for surface compatibility; live reload is not
    /// supported and the flag is reported once at startup.
    pub reloader: bool,
    /// Prefix under which internal image paths are served.
    pub deploy_image_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "localhost".into(),
            port: 8080,
            debug: true,
            theme: "skeleton".into(),
            reloader: false,
            deploy_image_path: "/__images".into(),
        }
    }
}

/// The single process-wide state slot plus the two append-only
/// histories, guarded together: the read-state → run-handler →
/// publish-state sequence of a request executes under one lock, so
/// concurrent requests cannot lose updates.
struct SharedState {
    state: StateValue,
    state_history: Vec<StateValue>,
    page_history: Vec<VisitedPage>,
}

/// An explicit server value: routes are registered on it and it is
/// consumed by [`Server::start`]. There is no process-wide default
/// instance.
#[derive(Debug)]
pub struct Server {
    routes: RouteTable,
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Server {
        Server {
            routes: RouteTable::new(),
            config,
        }
    }

    pub fn with_defaults() -> Server {
        Server::new(ServerConfig::default())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Register a handler under its own name, chaining.
    pub fn route(&mut self, handler: impl PageHandler + 'static)
                 -> Result<&mut Self, SetupError>
    {
        let handler: Arc<dyn PageHandler> = Arc::new(handler);
        let name = handler.name().to_string();
        self.routes.add(&name, handler)?;
        Ok(self)
    }

    /// Register a handler under an explicit path or page name.
    pub fn route_at(&mut self, name: &str, handler: impl PageHandler + 'static)
                    -> Result<&mut Self, SetupError>
    {
        self.routes.add(name, Arc::new(handler))?;
        Ok(self)
    }

    /// Validate the configuration and produce the request-handling
    /// core: at least one route, a known theme, and the first route
    /// bound to `/` when `/` is free.
    pub fn prepare(self, initial_state: StateValue)
                   -> Result<PreparedServer, SetupError>
    {
        if self.routes.is_empty() {
            return Err(SetupError::NoRoutes);
        }
        let theme = Theme::from_name(&self.config.theme)?;
        let mut routes = self.routes;
        routes.bind_root_to_first();
        Ok(PreparedServer {
            routes,
            theme,
            config: self.config,
            shared: Mutex::new(SharedState {
                state: initial_state,
                state_history: Vec::new(),
                page_history: Vec::new(),
            }),
            log: AccessLog::to_stderr(),
        })
    }

    /// Prepare and serve forever. Every route responds to GET.
    pub fn start(self, initial_state: StateValue) -> Result<()> {
        let prepared = Arc::new(self.prepare(initial_state)?);
        if prepared.config.reloader {
            crate::warn!("the reloader option is not supported; continuing \
                          without live reload");
        }
        let addr = format!("{}:{}", prepared.config.host, prepared.config.port);
        let server = rouille::Server::new(addr.clone(), {
            let prepared = prepared.clone();
            move |request| prepared.handle(request)
        })
        .map_err(|e| anyhow!("error starting server on {addr}: {e}"))?;
        server.run();
        Ok(())
    }
}

/// The request-handling core, shared across worker threads.
pub struct PreparedServer {
    routes: RouteTable,
    config: ServerConfig,
    theme: Theme,
    shared: Mutex<SharedState>,
    log: AccessLog,
}

impl PreparedServer {
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Handle one request end to end and log it.
    pub fn handle(&self, request: &Request) -> Response {
        let started = Instant::now();
        let response = self.dispatch(request);
        self.log.log(
            &request.remote_addr().to_string(),
            request.method(),
            request.raw_url(),
            response.status_code,
            started.elapsed(),
        );
        response
    }

    fn dispatch(&self, request: &Request) -> Response {
        if request.method() != "GET" {
            crate::warn!("method {:?} not implemented", request.method());
            return Response::text(
                format!("method {} is not implemented", request.method()))
                .with_status_code(501);
        }
        let path = request.url();
        let handler = match self.routes.get(&path) {
            Some(h) => h.clone(),
            None => return self.not_found_page(&path),
        };
        let fields = match QueryPairs::from_query_string(request.raw_query_string()) {
            Ok(fields) => fields,
            Err(e) => {
                return self.error_page(
                    "Error preparing arguments for page",
                    handler.name(),
                    &anyhow::Error::from(e),
                )
            }
        };
        let mut shared = self.lock_shared();
        self.run_pipeline(&mut shared, &handler,
                          request.raw_url().to_string(), fields)
    }

    fn lock_shared(&self) -> MutexGuard<'_, SharedState> {
        match self.shared.lock() {
            Ok(guard) => guard,
            // A panicking handler cannot happen through our pipeline
            // (errors are values), but a poisoned lock must not wedge
            // the whole server.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn run_pipeline(&self, shared: &mut SharedState,
                    handler: &Arc<dyn PageHandler>, url: String,
                    fields: QueryPairs) -> Response
    {
        // Preparing Arguments
        let call = match reconcile(&**handler, &shared.state, fields) {
            Ok(call) => call,
            Err(e) => {
                return self.error_page("Error preparing arguments for page",
                                       handler.name(), &e)
            }
        };
        let mut visit = VisitedPage::new(
            url,
            handler.name(),
            call.arguments_repr.clone(),
            call.button_pressed.clone(),
            Some(shared.state.clone()),
        );

        // Creating Page
        let page = match bind(&**handler, &call)
            .and_then(|args| handler.call(args))
        {
            Ok(page) => page,
            Err(e) => {
                visit.fail(RequestPhase::CreatingPage);
                shared.page_history.push(visit);
                return self.error_page("Error creating page",
                                       handler.name(), &e);
            }
        };
        visit.record_page(&page);

        // Verifying Page Result
        visit.update(RequestPhase::VerifyingPageResult);
        if let Err(violation) =
            verify_page_result(&page, shared.state_history.last())
        {
            visit.fail(RequestPhase::VerifyingPageResult);
            shared.page_history.push(visit);
            return self.error_page("Error after creating page",
                                   handler.name(),
                                   &anyhow::Error::new(violation));
        }

        // Verifying Content
        visit.update(RequestPhase::VerifyingContent);
        if let Err(e) = page.verify_content(&self.routes) {
            visit.fail(RequestPhase::VerifyingContent);
            shared.page_history.push(visit);
            return self.error_page("Error verifying content",
                                   handler.name(), &anyhow::Error::new(e));
        }

        // Publish: the page's state becomes current, wholesale.
        shared.state_history.push(page.state.clone());
        shared.state = page.state.clone();

        // Rendering Content
        visit.update(RequestPhase::RenderingContent);
        let rendered = {
            let ctx = self.render_context(&shared.state);
            page.render_content(&ctx)
        };
        let content = match rendered {
            Ok(content) => content,
            Err(e) => {
                visit.fail(RequestPhase::RenderingContent);
                shared.page_history.push(visit);
                return self.error_page("Error rendering content",
                                       handler.name(), &e);
            }
        };
        visit.finish();
        shared.page_history.push(visit);

        let content = if self.config.debug {
            let ctx = self.render_context(&shared.state);
            match debug_information(&self.routes, &shared.state,
                                    &shared.page_history, &ctx)
            {
                Ok(panel) => format!("{content}\n{panel}"),
                Err(e) => {
                    crate::warn!("could not render the debug panel: {e}");
                    content
                }
            }
        } else {
            content
        };

        Response::html(self.theme.wrap_page(&content))
    }

    fn render_context<'a>(&'a self, state: &'a StateValue) -> RenderContext<'a> {
        RenderContext {
            state,
            deploy_image_path: &self.config.deploy_image_path,
        }
    }

    fn routes_listing(&self) -> String {
        self.routes
            .iter()
            .map(|entry| {
                format!("<li><code>{}</code>: <code>{}</code></li>",
                        html_escape(&entry.url),
                        html_escape(entry.handler.name()))
            })
            .collect()
    }

    fn error_page(&self, title: &str, handler_name: &str,
                  err: &anyhow::Error) -> Response
    {
        crate::warn!("{title}. Error in {handler_name}: {err:#}");
        let detail = format!("Error in {handler_name}:\n{err}");
        // The alternate Debug form carries the error chain and, when
        // captured, the backtrace.
        let trace = format!("{err:?}");
        let body = format!(
            "<h3>500 Internal Server Error</h3>\n\
             <p>{}.</p>\n\
             <p>Original error message:</p>\n\
             <pre>{}</pre>\n\
             <pre>{}</pre>\n\
             <p>Available routes:</p>\n<ul>{}</ul>",
            html_escape(title),
            html_escape(&detail),
            html_escape(&trace),
            self.routes_listing()
        );
        Response::html(self.theme.wrap_page(&body)).with_status_code(500)
    }

    fn not_found_page(&self, path: &str) -> Response {
        let body = format!(
            "<h3>404 Page not found</h3>\n\
             <p>The requested page was not found.<br>\
             You might want to return to the <a href=\"/\">index</a> page.</p>\n\
             <p>The requested path was <code>{}</code>.</p>\n\
             <p>Available routes:</p>\n<ul>{}</ul>",
            html_escape(path),
            self.routes_listing()
        );
        Response::html(self.theme.wrap_page(&body)).with_status_code(404)
    }
}

/// The page-result validator. The shape violations of the original
/// protocol (no page, a bare string, a bare list) are unrepresentable
/// here; what remains dynamic is state-type drift between requests.
pub fn verify_page_result(page: &Page, previous_state: Option<&StateValue>)
                          -> Result<(), PageViolation>
{
    if let Some(previous) = previous_state {
        if !page.state.same_type_as(previous) {
            return Err(PageViolation::StateTypeChanged {
                new_type: page.state.type_label(),
                previous_type: previous.type_label(),
                new_repr: page.state.repr(),
                previous_repr: previous.repr(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use anyhow::bail;

    use super::*;
    use crate::content::{Button, LineBreak, TextBox};
    use crate::handler::{CallArgs, FnPageHandler};
    use crate::state::testutil::calc;

    fn index_with(state: StateValue) -> Result<Page> {
        let first = state.field("first_number").unwrap().display_string();
        let second = state.field("second_number").unwrap().display_string();
        let result = state.field("result").unwrap().display_string();
        Ok(Page::new(state, vec![
            "What is the first number?".into(),
            TextBox::new("first").kind("number").default_value(first).into(),
            "What is the second number?".into(),
            TextBox::new("second").kind("number").default_value(second).into(),
            LineBreak::new().into(),
            Button::new("Add", "add_page").into(),
            "The result is".into(),
            result.into(),
        ]))
    }

    fn add_page(args: CallArgs) -> Result<Page> {
        let state = args.state()?;
        let first = args.string("first")?;
        let second = args.string("second")?;
        match (first.parse::<i64>(), second.parse::<i64>()) {
            (Ok(a), Ok(b)) => index_with(
                state
                    .with_field("first_number", a.into())?
                    .with_field("second_number", b.into())?
                    .with_field("result", (a + b).to_string().into())?,
            ),
            _ => index_with(state),
        }
    }

    fn calculator_server() -> Server {
        let mut server = Server::with_defaults();
        server
            .route(FnPageHandler::new("index_page", &["state"], |args| {
                index_with(args.state()?)
            }))
            .unwrap()
            .route(FnPageHandler::new(
                "add_page",
                &["state", "first", "second"],
                add_page,
            ))
            .unwrap();
        server
    }

    fn body_string(response: Response) -> String {
        let (mut reader, _) = response.data.into_reader_and_size();
        let mut s = String::new();
        reader.read_to_string(&mut s).unwrap();
        s
    }

    fn get(prepared: &PreparedServer, url: &str) -> (u16, String) {
        let request = Request::fake_http("GET", url, vec![], vec![]);
        let response = prepared.handle(&request);
        (response.status_code, body_string(response))
    }

    #[test]
    fn t_index_bound_to_root_and_renders() {
        let prepared = calculator_server().prepare(calc(0, 0, "")).unwrap();
        let (status, body) = get(&prepared, "/");
        assert_eq!(status, 200);
        assert!(body.contains("pageloom-container"));
        assert!(body.contains("name=\"first\""));
        // Debug panel is on by default:
        assert!(body.contains("<summary>Routes</summary>"));
        assert!(body.contains("<summary>Page Load History</summary>"));
    }

    #[test]
    fn t_add_threads_state_through() {
        let prepared = calculator_server().prepare(calc(0, 0, "")).unwrap();
        let (status, body) =
            get(&prepared,
                "/add_page?first=5&second=3&-submit-button=Add");
        assert_eq!(status, 200);
        assert!(body.contains("<p>8</p>"), "got: {body}");
        // A second request sees the carried state:
        let (_, body) = get(&prepared, "/");
        assert!(body.contains("value=\"5\""), "got: {body}");
        assert!(body.contains("value=\"3\""));
        // History recorded the button press:
        assert!(body.contains("Clicked <code>Add</code>"));
    }

    #[test]
    fn t_unknown_path_is_404_with_navigation() {
        let prepared = calculator_server().prepare(calc(0, 0, "")).unwrap();
        let (status, body) = get(&prepared, "/missing");
        assert_eq!(status, 404);
        assert!(body.contains("404 Page not found"));
        assert!(body.contains("<a href=\"/\">index</a>"));
        assert!(body.contains("<code>/add_page</code>"));
    }

    #[test]
    fn t_handler_error_is_500_naming_phase() {
        let mut server = Server::with_defaults();
        server
            .route(FnPageHandler::new("boom_page", &["state"], |_| {
                bail!("the cupboard is bare")
            }))
            .unwrap();
        let prepared = server.prepare(StateValue::Null).unwrap();
        let (status, body) = get(&prepared, "/boom_page");
        assert_eq!(status, 500);
        assert!(body.contains("Error creating page"));
        assert!(body.contains("the cupboard is bare"));
        assert!(body.contains("Available routes:"));
    }

    #[test]
    fn t_state_type_drift_is_fatal() {
        let mut server = Server::with_defaults();
        server
            .route(FnPageHandler::new("index_page", &["state"], |args| {
                index_with(args.state()?)
            }))
            .unwrap()
            .route(FnPageHandler::new("drift_page", &["state"], |_| {
                Ok(Page::new(StateValue::Int(42), vec![]))
            }))
            .unwrap();
        let prepared = server.prepare(calc(0, 0, "")).unwrap();
        // Establish the Calc state type:
        let (status, _) = get(&prepared, "/index_page");
        assert_eq!(status, 200);
        let (status, body) = get(&prepared, "/drift_page");
        assert_eq!(status, 500);
        assert!(body.contains("type changed from its previous type"),
                "got: {body}");
        assert!(body.contains("`int`"));
        assert!(body.contains("`Calc`"));
    }

    #[test]
    fn t_first_page_establishes_the_type() {
        // With no prior page, the first returned state is
        // unconstrained (the bootstrap value does not pin the type).
        let mut server = Server::with_defaults();
        server
            .route(FnPageHandler::new("start_page", &["state"], |_| {
                Ok(Page::new(StateValue::Int(1), vec![]))
            }))
            .unwrap();
        let prepared = server.prepare(StateValue::Null).unwrap();
        let (status, _) = get(&prepared, "/start_page");
        assert_eq!(status, 200);
    }

    #[test]
    fn t_broken_link_is_caught_at_verification() {
        let mut server = Server::with_defaults();
        server
            .route(FnPageHandler::new("index_page", &["state"], |args| {
                Ok(Page::new(args.state()?, vec![
                    crate::content::Link::new("Off the map", "nowhere_page")
                        .into(),
                ]))
            }))
            .unwrap();
        let prepared = server.prepare(StateValue::Null).unwrap();
        let (status, body) = get(&prepared, "/");
        assert_eq!(status, 500);
        assert!(body.contains("Error verifying content"));
        assert!(body.contains("non-existent page"), "got: {body}");
    }

    #[test]
    fn t_setup_errors() {
        let server = Server::with_defaults();
        assert!(matches!(server.prepare(StateValue::Null),
                         Err(SetupError::NoRoutes)));

        let mut server = Server::new(ServerConfig {
            theme: "brutalist".into(),
            ..ServerConfig::default()
        });
        server
            .route(FnPageHandler::new("index_page", &["state"], |args| {
                Ok(Page::new(args.state()?, vec![]))
            }))
            .unwrap();
        assert!(matches!(server.prepare(StateValue::Null),
                         Err(SetupError::UnknownTheme(_))));
    }

    #[test]
    fn t_duplicate_route_refused() {
        let mut server = Server::with_defaults();
        server
            .route(FnPageHandler::new("add_page", &["state"], |args| {
                Ok(Page::new(args.state()?, vec![]))
            }))
            .unwrap();
        let err = server
            .route(FnPageHandler::new("add_page", &["state"], |args| {
                Ok(Page::new(args.state()?, vec![]))
            }))
            .unwrap_err();
        assert!(err.to_string().contains("`/add_page` already exists"));
    }

    #[test]
    fn t_verify_page_result_reports_both_types() {
        let previous = calc(0, 0, "");
        let page = Page::new(StateValue::Str("oops".into()), vec![]);
        let violation =
            verify_page_result(&page, Some(&previous)).unwrap_err();
        let text = violation.to_string();
        assert!(text.contains("`str`"));
        assert!(text.contains("`Calc`"));
        assert!(verify_page_result(&page, None).is_ok());
    }

    #[test]
    fn t_debug_panel_can_be_disabled() {
        let mut server = Server::new(ServerConfig {
            debug: false,
            ..ServerConfig::default()
        });
        server
            .route(FnPageHandler::new("index_page", &["state"], |args| {
                index_with(args.state()?)
            }))
            .unwrap();
        let prepared = server.prepare(calc(0, 0, "")).unwrap();
        let (_, body) = get(&prepared, "/");
        assert!(!body.contains("<summary>Routes</summary>"));
    }

    #[test]
    fn t_calc_schema_example_binding() {
        // The worked example: (state, first, second) with submitted
        // fields yields [Calc(0,0,""), "5", "3"].
        let handler = FnPageHandler::new(
            "add_page", &["state", "first", "second"], add_page);
        let mut fields = QueryPairs::new();
        fields.push("first", "5");
        fields.push("second", "3");
        fields.push("-submit-button", "Add");
        let carried = calc(0, 0, "");
        let call = reconcile(&handler, &carried, fields).unwrap();
        let bound = bind(&handler, &call).unwrap().into_values();
        assert_eq!(bound, vec![carried, "5".into(), "3".into()]);
    }
}
