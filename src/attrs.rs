//! Per-element extra settings, split into HTML attributes and inline
//! CSS declarations.
//!
//! Every content variant carries an open-ended string-keyed settings
//! bag. At render time the keys are partitioned: keys on the variant's
//! recognized-attribute list or on the baseline global-attribute list
//! become `key="value"` attributes, everything else is treated as a CSS
//! property. A `style_` prefix forces style classification regardless
//! of the lists.

use kstring::KString;

use crate::escape::html_escape;

/// Global attributes accepted on any element (identity, events).
pub const BASELINE_ATTRS: &[&str] = &[
    "id", "class", "style", "title", "lang", "dir", "accesskey", "tabindex",
    "value",
    "onclick", "ondblclick", "onmousedown", "onmouseup", "onmouseover",
    "onmousemove", "onmouseout",
    "onkeypress", "onkeydown", "onkeyup",
    "onfocus", "onblur", "onselect", "onchange", "onsubmit", "onreset",
    "onabort", "onerror", "onload", "onunload", "onresize", "onscroll",
];

const STYLE_PREFIX: &str = "style_";

/// Insertion-ordered extra settings attached to a content variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBag(Vec<(KString, KString)>);

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing an earlier setting of the same key.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| k == key) {
            slot.1 = KString::from_ref(value);
        } else {
            self.0.push((KString::from_ref(key), KString::from_ref(value)));
        }
    }

    /// Set a CSS property, bypassing the allow-lists.
    pub fn set_style(&mut self, property: &str, value: &str) {
        self.set(&format!("{STYLE_PREFIX}{property}"), value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the bag plus per-call `overrides` (which replace samely
    /// named bag entries) against `allowed`, the variant's
    /// recognized-attribute list. The result is either empty or starts
    /// with a space: ` a="1" style="k: v; k2: v2"`. Empty buckets
    /// render nothing; there is never an empty `style=""`.
    pub fn render(&self, overrides: &[(&str, &str)], allowed: &[&str]) -> String {
        let mut merged: Vec<(KString, KString)> = self.0.clone();
        for (k, v) in overrides {
            if let Some(slot) = merged.iter_mut().find(|(mk, _)| mk == k) {
                slot.1 = KString::from_ref(v);
            } else {
                merged.push((KString::from_ref(k), KString::from_ref(v)));
            }
        }

        let mut attrs = String::new();
        let mut styles = String::new();
        for (key, value) in &merged {
            if let Some(property) = key.strip_prefix(STYLE_PREFIX) {
                push_style(&mut styles, property, value);
            } else if allowed.contains(&key.as_str())
                || BASELINE_ATTRS.contains(&key.as_str())
            {
                attrs.push_str(&format!(" {}=\"{}\"", key, html_escape(value)));
            } else {
                push_style(&mut styles, key, value);
            }
        }
        if !styles.is_empty() {
            attrs.push_str(&format!(" style=\"{styles}\""));
        }
        attrs
    }
}

fn push_style(styles: &mut String, property: &str, value: &str) {
    if !styles.is_empty() {
        styles.push_str("; ");
    }
    // Settings keys come from identifier-ish sources; CSS wants hyphens.
    let property = property.replace('_', "-");
    styles.push_str(&format!("{}: {}", property, html_escape(value)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_empty_renders_nothing() {
        let bag = AttributeBag::new();
        assert_eq!(bag.render(&[], &[]), "");
    }

    #[test]
    fn t_baseline_vs_styles() {
        let mut bag = AttributeBag::new();
        bag.set("id", "main");
        bag.set("padding", "1em");
        assert_eq!(bag.render(&[], &[]),
                   " id=\"main\" style=\"padding: 1em\"");
    }

    #[test]
    fn t_variant_allow_list() {
        let mut bag = AttributeBag::new();
        bag.set("rows", "4");
        // Not on any list without the variant list:
        assert_eq!(bag.render(&[], &[]), " style=\"rows: 4\"");
        assert_eq!(bag.render(&[], &["rows"]), " rows=\"4\"");
    }

    #[test]
    fn t_style_prefix_forces_style() {
        let mut bag = AttributeBag::new();
        // `id` is a baseline attribute, but the prefix wins:
        bag.set("style_id", "x");
        bag.set_style("flex_direction", "row");
        assert_eq!(bag.render(&[], &[]),
                   " style=\"id: x; flex-direction: row\"");
    }

    #[test]
    fn t_overrides_replace() {
        let mut bag = AttributeBag::new();
        bag.set("value", "old");
        assert_eq!(bag.render(&[("value", "new")], &[]),
                   " value=\"new\"");
    }

    #[test]
    fn t_attribute_values_escaped() {
        let mut bag = AttributeBag::new();
        bag.set("title", "a \"b\" <c>");
        assert_eq!(bag.render(&[], &[]),
                   " title=\"a &quot;b&quot; &lt;c&gt;\"");
    }
}
