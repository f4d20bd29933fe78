//! The route table: an insertion-ordered, unique path → handler map.
//!
//! Registration order matters twice: the first-registered route is
//! also bound to the root path when `/` is not registered, and the
//! debug panel lists routes in registration order.

use std::slice;
use std::sync::Arc;

use kstring::KString;

use crate::error::SetupError;
use crate::handler::PageHandler;
use crate::urls::routable_url;

#[derive(Debug)]
pub struct RouteEntry {
    /// The name the route was registered under, before URL
    /// normalization.
    pub name: KString,
    /// The normalized, routable URL.
    pub url: KString,
    pub handler: Arc<dyn PageHandler>,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name` (a path or a bare page name),
    /// chaining. A duplicate normalized URL is fatal.
    pub fn add(&mut self, name: &str, handler: Arc<dyn PageHandler>)
               -> Result<&mut Self, SetupError>
    {
        let url = routable_url(name);
        if self.get(&url).is_some() {
            return Err(SetupError::DuplicateRoute {
                path: url,
                handler: handler.name().to_string(),
            });
        }
        self.entries.push(RouteEntry {
            name: KString::from_ref(name),
            url: KString::from_string(url),
            handler,
        });
        Ok(self)
    }

    pub fn get(&self, url: &str) -> Option<&Arc<dyn PageHandler>> {
        self.entries
            .iter()
            .find(|e| e.url == url)
            .map(|e| &e.handler)
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    pub fn first(&self) -> Option<&RouteEntry> {
        self.entries.first()
    }

    pub fn iter(&self) -> slice::Iter<'_, RouteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind the first-registered route to `/` as well, if `/` is not
    /// taken. Called once at startup.
    pub fn bind_root_to_first(&mut self) {
        if self.contains_url("/") {
            return;
        }
        if let Some(first) = self.entries.first() {
            let entry = RouteEntry {
                name: first.name.clone(),
                url: KString::from_static("/"),
                handler: first.handler.clone(),
            };
            self.entries.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::handler::FnPageHandler;
    use crate::page::Page;
    use crate::state::StateValue;

    fn null_handler(name: &'static str) -> Arc<dyn PageHandler> {
        Arc::new(FnPageHandler::new(name, &["state"], |_| {
            Ok(Page::new(StateValue::Null, vec![]))
        }))
    }

    #[test]
    fn t_add_and_get() -> Result<()> {
        let mut r = RouteTable::new();
        r.add("index", null_handler("index_page"))?
            .add("add_page", null_handler("add_page"))?;
        assert!(r.contains_url("/"));
        assert!(r.contains_url("/add_page"));
        assert!(!r.contains_url("/other"));
        Ok(())
    }

    #[test]
    fn t_duplicate_is_fatal() {
        let mut r = RouteTable::new();
        r.add("add", null_handler("add_page")).unwrap();
        // `add` and `/add` normalize to the same URL:
        let err = r.add("/add", null_handler("other_add")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "URL `/add` already exists for an existing routed handler: \
             `other_add`"
        );
    }

    #[test]
    fn t_bind_root_to_first() {
        let mut r = RouteTable::new();
        r.add("first_page", null_handler("first_page")).unwrap();
        r.add("second_page", null_handler("second_page")).unwrap();
        assert!(!r.contains_url("/"));
        r.bind_root_to_first();
        let root = r.get("/").unwrap();
        assert_eq!(root.name(), "first_page");
        // Idempotent:
        r.bind_root_to_first();
        assert_eq!(r.len(), 3);
    }
}
