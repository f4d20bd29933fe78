//! Page handlers: user-supplied callables bound to URLs.

use std::any::type_name;
use std::fmt::Debug;

use anyhow::{bail, Result};
use kstring::KString;

use crate::page::Page;
use crate::state::StateValue;

/// A user-supplied page function. Receives the carried state plus the
/// reconciled form arguments (bound to its declared parameter order)
/// and returns the next [`Page`].
pub trait PageHandler: Debug + Send + Sync {
    /// Handler identity, used in route listings and diagnostics.
    fn name(&self) -> &str;

    /// Declared parameter names, in order. A first parameter literally
    /// named `state` receives the carried application state.
    fn params(&self) -> &[KString];

    fn call(&self, args: CallArgs) -> Result<Page>;
}

/// Arguments bound to a handler's declared parameter order.
#[derive(Debug, Clone)]
pub struct CallArgs {
    names: Vec<KString>,
    values: Vec<StateValue>,
}

impl CallArgs {
    pub fn new(names: Vec<KString>, values: Vec<StateValue>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        CallArgs { names, values }
    }

    pub fn get(&self, name: &str) -> Option<&StateValue> {
        let i = self.names.iter().position(|n| n == name)?;
        self.values.get(i)
    }

    /// The carried state (the parameter named `state`).
    pub fn state(&self) -> Result<StateValue> {
        match self.get("state") {
            Some(v) => Ok(v.clone()),
            None => bail!("handler has no parameter named `state`"),
        }
    }

    /// A submitted field as text. Form fields arrive as strings unless
    /// they were JSON-marked.
    pub fn string(&self, name: &str) -> Result<String> {
        match self.get(name) {
            Some(v) => Ok(v.display_string()),
            None => bail!("no argument named `{name}`"),
        }
    }

    pub fn value(&self, name: &str) -> Result<StateValue> {
        match self.get(name) {
            Some(v) => Ok(v.clone()),
            None => bail!("no argument named `{name}`"),
        }
    }

    pub fn into_values(self) -> Vec<StateValue> {
        self.values
    }
}

/// Adapter making a closure a [`PageHandler`].
pub struct FnPageHandler<F> {
    name: KString,
    params: Vec<KString>,
    f: F,
}

impl<F> FnPageHandler<F>
where
    F: Fn(CallArgs) -> Result<Page> + Send + Sync,
{
    pub fn new(name: &str, params: &[&str], f: F) -> Self {
        FnPageHandler {
            name: KString::from_ref(name),
            params: params.iter().map(|p| KString::from_ref(p)).collect(),
            f,
        }
    }
}

impl<F> PageHandler for FnPageHandler<F>
where
    F: Fn(CallArgs) -> Result<Page> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &[KString] {
        &self.params
    }

    fn call(&self, args: CallArgs) -> Result<Page> {
        (self.f)(args)
    }
}

impl<F> Debug for FnPageHandler<F>
where
    F: Fn(CallArgs) -> Result<Page> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("FnPageHandler({}, {})",
                                 self.name, type_name::<F>()))
    }
}
