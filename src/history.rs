//! Visit records: one per handled request, appended to the server's
//! page history and shown in the debug panel.

use chrono::{DateTime, Utc};
use kstring::KString;

use crate::page::Page;
use crate::state::StateValue;

/// Phases of the per-request pipeline, in order. A request can exit
/// with a fatal error from any phase after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RequestPhase {
    #[strum(serialize = "Receiving Request")]
    ReceivingRequest,
    #[strum(serialize = "Preparing Arguments")]
    PreparingArguments,
    #[strum(serialize = "Creating Page")]
    CreatingPage,
    #[strum(serialize = "Verifying Page Result")]
    VerifyingPageResult,
    #[strum(serialize = "Verifying Content")]
    VerifyingContent,
    #[strum(serialize = "Rendering Content")]
    RenderingContent,
    #[strum(serialize = "Finished Page Load")]
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisitStatus {
    InProgress(RequestPhase),
    Finished,
    Failed(RequestPhase),
}

impl std::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisitStatus::InProgress(phase) => write!(f, "{phase}"),
            VisitStatus::Finished => write!(f, "{}", RequestPhase::Finished),
            VisitStatus::Failed(phase) => write!(f, "Failed while {phase}"),
        }
    }
}

/// History record of one request. Append-only once pushed; the status
/// progresses linearly and is finalized together with the stop
/// timestamp.
#[derive(Debug, Clone)]
pub struct VisitedPage {
    pub url: String,
    pub handler_name: KString,
    /// Human-readable repr of the handler call's arguments.
    pub arguments: String,
    pub status: VisitStatus,
    pub button_pressed: KString,
    /// Debug rendering of the returned page, before HTML conversion.
    pub page_repr: Option<String>,
    pub previous_state: Option<StateValue>,
    pub started: DateTime<Utc>,
    pub stopped: Option<DateTime<Utc>>,
}

const PAGE_REPR_LIMIT: usize = 2000;

impl VisitedPage {
    pub fn new(url: String, handler_name: &str, arguments: String,
               button_pressed: KString, previous_state: Option<StateValue>)
               -> Self
    {
        VisitedPage {
            url,
            handler_name: KString::from_ref(handler_name),
            arguments,
            status: VisitStatus::InProgress(RequestPhase::CreatingPage),
            button_pressed,
            page_repr: None,
            previous_state,
            started: Utc::now(),
            stopped: None,
        }
    }

    pub fn update(&mut self, phase: RequestPhase) {
        self.status = VisitStatus::InProgress(phase);
    }

    /// Remember the page as the handler returned it, truncated so one
    /// huge page cannot bloat the history.
    pub fn record_page(&mut self, page: &Page) {
        let mut repr = format!("{:?}", page.content);
        if repr.len() > PAGE_REPR_LIMIT {
            let cut = (0..=PAGE_REPR_LIMIT)
                .rev()
                .find(|i| repr.is_char_boundary(*i))
                .unwrap_or(0);
            repr.truncate(cut);
            repr.push_str("…");
        }
        self.page_repr = Some(repr);
    }

    pub fn finish(&mut self) {
        self.status = VisitStatus::Finished;
        self.stopped = Some(Utc::now());
    }

    pub fn fail(&mut self, phase: RequestPhase) {
        self.status = VisitStatus::Failed(phase);
        self.stopped = Some(Utc::now());
    }
}
