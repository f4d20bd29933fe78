//! Typed error taxonomy. Setup errors halt startup; target errors and
//! page violations are caught at the server boundary and turned into
//! diagnostic pages.

use thiserror::Error;

/// Fatal configuration errors, raised before the server starts.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("URL `{path}` already exists for an existing routed handler: `{handler}`")]
    DuplicateRoute { path: String, handler: String },

    #[error("no routes have been defined; register at least one page handler \
             before starting the server")]
    NoRoutes,

    #[error("unknown theme `{0}` (expected one of: none, skeleton, bootstrap)")]
    UnknownTheme(String),
}

/// Link/button target errors, found while verifying page content.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("link `{label}`: the URL `{url}` references a local file on this \
             computer, not a file on a server, and is not a valid link target")]
    LocalFile { label: String, url: String },

    #[error("link `{label}` points to non-existent page `{url}`")]
    NotRegistered { label: String, url: String },
}

/// Violations of the page contract, found while verifying a handler's
/// returned page. Consumed by the server to build the diagnostic page.
#[derive(Debug, Error)]
pub enum PageViolation {
    #[error("the state object's type changed from its previous type; the new \
             value is {new_repr} (type `{new_type}`) but the most recent value \
             was {previous_repr} (type `{previous_type}`); return the same \
             state type from every handler")]
    StateTypeChanged {
        new_type: String,
        previous_type: String,
        new_repr: String,
        previous_repr: String,
    },
}
