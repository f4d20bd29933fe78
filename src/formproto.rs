//! The form submission protocol: reserved field names and markers
//! shared between content rendering and request reconciliation.

/// Reserved field carrying the label of the submit control that was
/// activated.
pub const SUBMIT_BUTTON_KEY: &str = "-submit-button";

/// Separates a control label from the name of an argument attached to
/// that control in hidden-field names (`<label>$<name>`).
pub const LABEL_SEPARATOR: char = '$';

/// Field-name prefix marking the field's value as JSON-encoded rather
/// than a literal string.
pub const JSON_DECODE_PREFIX: char = '~';
