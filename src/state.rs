//! Self-describing application-state values.
//!
//! The framework compares state types at runtime, renders
//! field/type/value reflection tables, and rebuilds values from their
//! JSON form guided by declared field types. Application state is
//! therefore a runtime-typed value: primitives, lists, maps, and
//! records described by a shared [`RecordSchema`].

use std::fmt::Write;
use std::sync::Arc;

use anyhow::{bail, Result};
use itertools::Itertools;
use kstring::KString;

/// Declared type of a record field, used to guide rehydration and to
/// label reflection tables.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Str,
    List(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    Record(Arc<RecordSchema>),
}

impl FieldType {
    /// Short name shown in reflection tables and codec errors.
    pub fn label(&self) -> String {
        match self {
            FieldType::Bool => "bool".into(),
            FieldType::Int => "int".into(),
            FieldType::Float => "float".into(),
            FieldType::Str => "str".into(),
            FieldType::List(elem) => format!("list[{}]", elem.label()),
            FieldType::Map(k, v) => format!("dict[{}, {}]", k.label(), v.label()),
            FieldType::Record(schema) => schema.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: KString,
    pub ty: FieldType,
    pub default: Option<StateValue>,
}

/// Type name plus ordered field declarations of a record state type.
#[derive(Debug, PartialEq)]
pub struct RecordSchema {
    name: KString,
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(name: &str) -> RecordSchemaBuilder {
        RecordSchemaBuilder {
            name: KString::from_ref(name),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Build an instance; `values` must match the declaration arity.
    pub fn instantiate(self: &Arc<Self>, values: Vec<StateValue>) -> Result<StateValue> {
        if values.len() != self.fields.len() {
            bail!("record `{}` declares {} fields, but {} values were given",
                  self.name, self.fields.len(), values.len());
        }
        Ok(StateValue::Record(RecordValue {
            schema: self.clone(),
            values,
        }))
    }
}

pub struct RecordSchemaBuilder {
    name: KString,
    fields: Vec<FieldSpec>,
}

impl RecordSchemaBuilder {
    pub fn field(mut self, name: &str, ty: FieldType) -> Self {
        self.fields.push(FieldSpec {
            name: KString::from_ref(name),
            ty,
            default: None,
        });
        self
    }

    pub fn field_with_default(mut self, name: &str, ty: FieldType,
                              default: StateValue) -> Self {
        self.fields.push(FieldSpec {
            name: KString::from_ref(name),
            ty,
            default: Some(default),
        });
        self
    }

    pub fn build(self) -> Arc<RecordSchema> {
        Arc::new(RecordSchema {
            name: self.name,
            fields: self.fields,
        })
    }
}

/// A record instance: its schema plus one value per declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub schema: Arc<RecordSchema>,
    pub values: Vec<StateValue>,
}

impl RecordValue {
    pub fn get(&self, field: &str) -> Option<&StateValue> {
        let i = self.schema.field_index(field)?;
        self.values.get(i)
    }
}

/// The application-state value threaded across requests (and the value
/// form of submitted arguments).
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<StateValue>),
    /// Insertion-ordered; keys are restricted to primitives when
    /// serialized.
    Map(Vec<(StateValue, StateValue)>),
    Record(RecordValue),
}

impl StateValue {
    /// Name of the concrete type, as shown in drift errors and
    /// reflection tables.
    pub fn type_label(&self) -> String {
        match self {
            StateValue::Null => "None".into(),
            StateValue::Bool(_) => "bool".into(),
            StateValue::Int(_) => "int".into(),
            StateValue::Float(_) => "float".into(),
            StateValue::Str(_) => "str".into(),
            StateValue::List(_) => "list".into(),
            StateValue::Map(_) => "dict".into(),
            StateValue::Record(r) => r.schema.name().to_string(),
        }
    }

    /// Structural type equality: same variant, and for records the
    /// same type name with matching field declarations.
    pub fn same_type_as(&self, other: &StateValue) -> bool {
        match (self, other) {
            (StateValue::Record(a), StateValue::Record(b)) => {
                Arc::ptr_eq(&a.schema, &b.schema) || a.schema == b.schema
            }
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }

    /// Human-readable value text for histories and diagnostics;
    /// strings are quoted, records spell out their fields.
    pub fn repr(&self) -> String {
        match self {
            StateValue::Null => "None".into(),
            StateValue::Bool(b) => b.to_string(),
            StateValue::Int(i) => i.to_string(),
            StateValue::Float(f) => f.to_string(),
            StateValue::Str(s) => format!("{s:?}"),
            StateValue::List(xs) =>
                format!("[{}]", xs.iter().map(|x| x.repr()).join(", ")),
            StateValue::Map(pairs) =>
                format!("{{{}}}",
                        pairs.iter()
                            .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                            .join(", ")),
            StateValue::Record(r) => {
                let mut s = String::new();
                let _ = write!(&mut s, "{}(", r.schema.name());
                for (i, (f, v)) in
                    r.schema.fields().iter().zip(&r.values).enumerate()
                {
                    if i > 0 {
                        s.push_str(", ");
                    }
                    let _ = write!(&mut s, "{}={}", f.name, v.repr());
                }
                s.push(')');
                s
            }
        }
    }

    /// Plain text for table cells and input defaults: strings are
    /// unquoted, everything else falls back to `repr`.
    pub fn display_string(&self) -> String {
        match self {
            StateValue::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            StateValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    /// Field access on a record state.
    pub fn field(&self, name: &str) -> Option<&StateValue> {
        self.as_record()?.get(name)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            StateValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Functional update: a copy of this record with `field` replaced.
    /// State is replaced wholesale across requests, never mutated, so
    /// handlers build their new state this way.
    pub fn with_field(&self, field: &str, value: StateValue) -> Result<StateValue> {
        let record = match self.as_record() {
            Some(r) => r,
            None => bail!("cannot set field `{field}` on non-record state {}",
                          self.repr()),
        };
        let i = match record.schema.field_index(field) {
            Some(i) => i,
            None => bail!("record `{}` has no field `{field}`",
                          record.schema.name()),
        };
        let mut updated = record.clone();
        updated.values[i] = value;
        Ok(StateValue::Record(updated))
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        StateValue::Bool(v)
    }
}
impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        StateValue::Int(v)
    }
}
impl From<i32> for StateValue {
    fn from(v: i32) -> Self {
        StateValue::Int(v as i64)
    }
}
impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        StateValue::Float(v)
    }
}
impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        StateValue::Str(v.to_string())
    }
}
impl From<String> for StateValue {
    fn from(v: String) -> Self {
        StateValue::Str(v)
    }
}
