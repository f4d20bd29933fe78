//! Mapping raw submitted fields onto a handler's declared parameters.
//!
//! This is the crux of the framework's ergonomics: handler authors
//! never destructure form data by hand, yet one form can carry several
//! distinct submit controls, each with its own structured payload.

use anyhow::{bail, Result};
use kstring::KString;

use crate::codec::json_to_state;
use crate::formproto::{JSON_DECODE_PREFIX, LABEL_SEPARATOR, SUBMIT_BUTTON_KEY};
use crate::handler::{CallArgs, PageHandler};
use crate::state::StateValue;
use crate::urls::QueryPairs;

/// The reconciled call: what the handler will be invoked with, plus
/// the pieces recorded in the visit history.
#[derive(Debug, Clone)]
pub struct ReconciledCall {
    pub positional: Vec<StateValue>,
    /// Insertion-ordered; overflow drops from the back.
    pub keyword: Vec<(KString, StateValue)>,
    /// Comma-joined repr of the final call, for history/debugging.
    pub arguments_repr: String,
    /// Label of the submit control that was activated, or empty.
    pub button_pressed: KString,
}

/// Reconcile `fields` against `handler`'s declared parameters.
///
/// 1. Extract the reserved pressed-control field.
/// 2. Move the remaining fields into keyword arguments.
/// 3. Re-key fields namespaced under the pressed label; drop fields
///    belonging to a control that was not pressed.
/// 4. JSON-decode marked fields.
/// 5. Inject the carried state if the first declared parameter is
///    literally named `state`.
/// 6. On overflow, warn and truncate deterministically.
pub fn reconcile(handler: &dyn PageHandler, carried_state: &StateValue,
                 mut fields: QueryPairs) -> Result<ReconciledCall>
{
    let button_pressed = fields
        .remove(SUBMIT_BUTTON_KEY)
        .unwrap_or_else(|| KString::from_static(""));

    // Scope resolution: `<label>$<name>` belongs to the control
    // labelled `<label>`; only the pressed control's fields survive.
    let pressed_prefix = format!("{button_pressed}{LABEL_SEPARATOR}");
    let mut scoped: Vec<(KString, KString)> = Vec::new();
    for (key, value) in fields.into_pairs() {
        if !button_pressed.is_empty() && key.starts_with(pressed_prefix.as_str()) {
            scoped.push((
                KString::from_ref(&key.as_str()[pressed_prefix.len()..]),
                value,
            ));
        } else if key.contains(LABEL_SEPARATOR) {
            // Attached to a control that was not pressed.
        } else {
            scoped.push((key, value));
        }
    }

    // A repeated field name keeps its first position but the last
    // value wins (the CheckBox protocol submits the same name twice).
    let mut keyword: Vec<(KString, StateValue)> = Vec::with_capacity(scoped.len());
    let insert = |keyword: &mut Vec<(KString, StateValue)>,
                  key: KString, value: StateValue| {
        match keyword.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => keyword.push((key, value)),
        }
    };
    for (key, value) in scoped {
        if let Some(name) = key.strip_prefix(JSON_DECODE_PREFIX) {
            let json: serde_json::Value =
                serde_json::from_str(&value).map_err(|e| {
                    anyhow::anyhow!(
                        "field `{name}` carries the JSON marker but its value \
                         {:?} is not valid JSON: {e}",
                        value.as_str()
                    )
                })?;
            insert(&mut keyword, KString::from_ref(name), json_to_state(&json)?);
        } else {
            insert(&mut keyword, key, StateValue::Str(value.into_string()));
        }
    }

    let mut positional: Vec<StateValue> = Vec::new();
    if handler.params().first().map(|p| p.as_str()) == Some("state") {
        positional.push(carried_state.clone());
    }

    let declared = handler.params().len();
    if declared < positional.len() + keyword.len() {
        crate::warn!(
            "the {} function expected {} parameters, but {} were provided",
            handler.name(),
            declared,
            positional.len() + keyword.len()
        );
        positional.truncate(declared);
        while declared < positional.len() + keyword.len() && !keyword.is_empty() {
            keyword.pop();
        }
    }

    let arguments_repr = positional
        .iter()
        .map(|v| v.repr())
        .chain(keyword.iter().map(|(k, v)| format!("{}={}", k, v.repr())))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(ReconciledCall {
        positional,
        keyword,
        arguments_repr,
        button_pressed,
    })
}

/// Map the reconciled keyword arguments onto the declared parameter
/// list, producing the ordered values the handler is invoked with.
/// The errors here are the typed analog of calling a function with the
/// wrong arguments.
pub fn bind(handler: &dyn PageHandler, call: &ReconciledCall) -> Result<CallArgs> {
    let params = handler.params();
    let mut slots: Vec<Option<StateValue>> = vec![None; params.len()];
    for (i, value) in call.positional.iter().enumerate() {
        slots[i] = Some(value.clone());
    }
    for (key, value) in &call.keyword {
        match params.iter().position(|p| p == key) {
            Some(i) if slots[i].is_none() => slots[i] = Some(value.clone()),
            Some(_) => bail!("{}() got multiple values for parameter `{key}`",
                             handler.name()),
            None => bail!("{}() got an unexpected argument `{key}`",
                          handler.name()),
        }
    }
    let mut values = Vec::with_capacity(params.len());
    for (param, slot) in params.iter().zip(slots) {
        match slot {
            Some(v) => values.push(v),
            None => bail!("{}() is missing the argument `{param}`",
                          handler.name()),
        }
    }
    Ok(CallArgs::new(params.to_vec(), values))
}
