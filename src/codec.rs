//! Serializing state values to a JSON-safe form (dehydrate) and
//! rebuilding them guided by declared field types (rehydrate).
//!
//! Only value shapes reachable from state field declarations are
//! supported; this is not a general-purpose serializer.

use serde_json::{Map as JsonMap, Number, Value};
use thiserror::Error;

use crate::state::{FieldType, StateValue};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("error while serializing state: {0}")]
    Dehydrate(String),

    #[error("error while restoring state: could not create `{expected}` from {found}")]
    Rehydrate { expected: String, found: String },
}

/// Reduce a state value to plain JSON. Records are expanded into
/// key/value objects, recursively.
pub fn dehydrate(value: &StateValue) -> Result<Value, CodecError> {
    match value {
        StateValue::Null => Ok(Value::Null),
        StateValue::Bool(b) => Ok(Value::Bool(*b)),
        StateValue::Int(i) => Ok(Value::Number((*i).into())),
        StateValue::Float(f) => Number::from_f64(*f).map(Value::Number).ok_or_else(|| {
            CodecError::Dehydrate(format!("the float {f} has no JSON representation"))
        }),
        StateValue::Str(s) => Ok(Value::String(s.clone())),
        StateValue::List(xs) => Ok(Value::Array(
            xs.iter().map(dehydrate).collect::<Result<_, _>>()?,
        )),
        StateValue::Map(pairs) => {
            let mut obj = JsonMap::new();
            for (k, v) in pairs {
                obj.insert(map_key_string(k)?, dehydrate(v)?);
            }
            Ok(Value::Object(obj))
        }
        StateValue::Record(r) => {
            let mut obj = JsonMap::new();
            for (f, v) in r.schema.fields().iter().zip(&r.values) {
                obj.insert(f.name.to_string(), dehydrate(v)?);
            }
            Ok(Value::Object(obj))
        }
    }
}

/// JSON object keys are strings; map keys must therefore be primitive.
fn map_key_string(key: &StateValue) -> Result<String, CodecError> {
    match key {
        StateValue::Str(s) => Ok(s.clone()),
        StateValue::Int(i) => Ok(i.to_string()),
        StateValue::Bool(b) => Ok(b.to_string()),
        StateValue::Float(f) => Ok(f.to_string()),
        other => Err(CodecError::Dehydrate(format!(
            "the map key {} is not a str, int, float, or bool",
            other.repr()
        ))),
    }
}

/// Rebuild a state value from its JSON form, guided by the declared
/// target type. Record fields absent from the payload take their
/// declared default.
pub fn rehydrate(value: &Value, ty: &FieldType) -> Result<StateValue, CodecError> {
    match (value, ty) {
        (Value::Null, _) => Ok(StateValue::Null),
        (Value::Bool(b), FieldType::Bool) => Ok(StateValue::Bool(*b)),
        (Value::Number(n), FieldType::Int) => match n.as_i64() {
            Some(i) => Ok(StateValue::Int(i)),
            None => Err(mismatch(ty, value)),
        },
        (Value::Number(n), FieldType::Float) => match n.as_f64() {
            Some(f) => Ok(StateValue::Float(f)),
            None => Err(mismatch(ty, value)),
        },
        (Value::String(s), FieldType::Str) => Ok(StateValue::Str(s.clone())),
        (Value::Array(xs), FieldType::List(elem)) => Ok(StateValue::List(
            xs.iter()
                .map(|x| rehydrate(x, elem))
                .collect::<Result<_, _>>()?,
        )),
        (Value::Object(obj), FieldType::Map(key_ty, val_ty)) => {
            let mut pairs = Vec::with_capacity(obj.len());
            for (k, v) in obj {
                pairs.push((rehydrate_key(k, key_ty)?, rehydrate(v, val_ty)?));
            }
            Ok(StateValue::Map(pairs))
        }
        (Value::Object(obj), FieldType::Record(schema)) => {
            let mut values = Vec::with_capacity(schema.fields().len());
            for f in schema.fields() {
                match obj.get(f.name.as_str()) {
                    Some(v) => values.push(rehydrate(v, &f.ty)?),
                    None => match &f.default {
                        Some(d) => values.push(d.clone()),
                        None => {
                            return Err(CodecError::Rehydrate {
                                expected: schema.name().to_string(),
                                found: format!(
                                    "a payload missing field `{}` (which has \
                                     no declared default)",
                                    f.name
                                ),
                            })
                        }
                    },
                }
            }
            Ok(StateValue::Record(crate::state::RecordValue {
                schema: schema.clone(),
                values,
            }))
        }
        _ => Err(mismatch(ty, value)),
    }
}

/// Keys arrive as JSON strings even when the declared key type is a
/// number or bool; parse them back.
fn rehydrate_key(key: &str, ty: &FieldType) -> Result<StateValue, CodecError> {
    let not_a = || CodecError::Rehydrate {
        expected: ty.label(),
        found: format!("the map key {key:?}"),
    };
    match ty {
        FieldType::Str => Ok(StateValue::Str(key.to_string())),
        FieldType::Int => key.parse().map(StateValue::Int).map_err(|_| not_a()),
        FieldType::Float => key.parse().map(StateValue::Float).map_err(|_| not_a()),
        FieldType::Bool => key.parse().map(StateValue::Bool).map_err(|_| not_a()),
        _ => Err(not_a()),
    }
}

fn mismatch(ty: &FieldType, value: &Value) -> CodecError {
    CodecError::Rehydrate {
        expected: ty.label(),
        found: value.to_string(),
    }
}

/// Convert parsed JSON with no declared target type; used for
/// JSON-marked form fields, where the author's intent is carried by
/// the JSON itself.
pub fn json_to_state(value: &Value) -> Result<StateValue, CodecError> {
    match value {
        Value::Null => Ok(StateValue::Null),
        Value::Bool(b) => Ok(StateValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(StateValue::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(StateValue::Float(f))
            } else {
                Err(CodecError::Rehydrate {
                    expected: "int or float".into(),
                    found: value.to_string(),
                })
            }
        }
        Value::String(s) => Ok(StateValue::Str(s.clone())),
        Value::Array(xs) => Ok(StateValue::List(
            xs.iter().map(json_to_state).collect::<Result<_, _>>()?,
        )),
        Value::Object(obj) => Ok(StateValue::Map(
            obj.iter()
                .map(|(k, v)| {
                    Ok((StateValue::Str(k.clone()), json_to_state(v)?))
                })
                .collect::<Result<_, CodecError>>()?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testutil::{calc, calc_schema};
    use crate::state::RecordSchema;

    #[test]
    fn t_roundtrip_record() {
        let value = calc(5, 3, "8");
        let json = dehydrate(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"first_number": 5, "second_number": 3,
                               "result": "8"})
        );
        let back = rehydrate(&json, &FieldType::Record(calc_schema())).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn t_roundtrip_nested() {
        let inner = RecordSchema::new("Point")
            .field("x", FieldType::Int)
            .field("y", FieldType::Int)
            .build();
        let outer = RecordSchema::new("Shape")
            .field("origin", FieldType::Record(inner.clone()))
            .field("tags", FieldType::List(Box::new(FieldType::Str)))
            .field(
                "sizes",
                FieldType::Map(Box::new(FieldType::Str), Box::new(FieldType::Int)),
            )
            .build();
        let value = outer
            .instantiate(vec![
                inner.instantiate(vec![1.into(), 2.into()]).unwrap(),
                StateValue::List(vec!["a".into(), "b".into()]),
                StateValue::Map(vec![("w".into(), 3.into())]),
            ])
            .unwrap();
        let json = dehydrate(&value).unwrap();
        let back = rehydrate(&json, &FieldType::Record(outer)).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn t_missing_field_takes_default() {
        let json = serde_json::json!({"first_number": 1, "second_number": 2});
        let back = rehydrate(&json, &FieldType::Record(calc_schema())).unwrap();
        assert_eq!(back.field("result").unwrap().as_str(), Some(""));
    }

    #[test]
    fn t_missing_field_without_default_fails() {
        let json = serde_json::json!({"first_number": 1});
        let err = rehydrate(&json, &FieldType::Record(calc_schema()))
            .unwrap_err()
            .to_string();
        assert!(err.contains("second_number"), "got: {err}");
    }

    #[test]
    fn t_shape_mismatch() {
        let err = rehydrate(&serde_json::json!("five"), &FieldType::Int)
            .unwrap_err()
            .to_string();
        assert!(err.contains("could not create `int`"), "got: {err}");
    }

    #[test]
    fn t_non_finite_float() {
        let err = dehydrate(&StateValue::Float(f64::NAN)).unwrap_err();
        assert!(err.to_string().contains("no JSON representation"));
    }

    #[test]
    fn t_map_key_policy() {
        let bad = StateValue::Map(vec![(
            StateValue::List(vec![]),
            StateValue::Null,
        )]);
        assert!(dehydrate(&bad).is_err());

        let ok = StateValue::Map(vec![(7.into(), "x".into())]);
        assert_eq!(
            dehydrate(&ok).unwrap(),
            serde_json::json!({"7": "x"})
        );
        let ty = FieldType::Map(Box::new(FieldType::Int),
                                Box::new(FieldType::Str));
        assert_eq!(rehydrate(&dehydrate(&ok).unwrap(), &ty).unwrap(), ok);
    }

    #[test]
    fn t_json_to_state() {
        let v = serde_json::json!({"n": 1, "xs": [true, "s"]});
        let s = json_to_state(&v).unwrap();
        assert_eq!(
            s,
            StateValue::Map(vec![
                ("n".into(), 1.into()),
                (
                    "xs".into(),
                    StateValue::List(vec![true.into(), "s".into()])
                ),
            ])
        );
    }
}
