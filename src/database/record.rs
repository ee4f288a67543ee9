use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::api::format::parse_timestamp;
use crate::auth::hash_password;
use crate::database::models::{EntityDescriptor, FieldDescriptor, FieldFormat, FieldType};
use crate::filter::SqlParam;

/// Errors that can occur while reading a record from API input
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("invalid fields: {0:?}")]
    Fields(BTreeMap<String, String>),
}

/// Caller-supplied values for one entity, already typed for binding.
///
/// Only business fields present in the input are kept. Audit fields are dropped
/// silently so clients can send back what they fetched.
#[derive(Debug, Clone)]
pub struct RecordInput {
    pub id: Option<i64>,
    pub values: Vec<(&'static FieldDescriptor, SqlParam)>,
}

impl RecordInput {
    pub fn from_json(descriptor: &'static EntityDescriptor, body: &Value) -> Result<Self, RecordError> {
        let object = body.as_object().ok_or(RecordError::NotAnObject)?;
        let mut errors = BTreeMap::new();

        let id = match object.get("id") {
            None | Some(Value::Null) => None,
            Some(value) => match value.as_i64() {
                Some(0) => None,
                Some(id) if id > 0 => Some(id),
                _ => {
                    errors.insert("id".to_string(), "must be a positive number".to_string());
                    None
                }
            },
        };

        let mut values = Vec::new();
        for field in descriptor.mutable_fields() {
            let Some(raw) = object.get(field.name) else {
                continue;
            };
            match parse_field(field, raw) {
                Ok(param) => values.push((field, param)),
                Err(message) => {
                    errors.insert(field.name.to_string(), message);
                }
            }
        }

        if !errors.is_empty() {
            return Err(RecordError::Fields(errors));
        }
        Ok(Self { id, values })
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SqlParam> {
        self.values.iter().find(|(f, _)| f.name == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Wire form of the stored values (digests stay digests, binaries stay base64).
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(id) = self.id {
            map.insert("id".to_string(), Value::from(id));
        }
        for (field, param) in &self.values {
            let value = match param {
                SqlParam::Text(v) => v.clone().map(Value::String).unwrap_or(Value::Null),
                SqlParam::Int(v) => v.map(Value::from).unwrap_or(Value::Null),
                SqlParam::Bool(v) => v.map(Value::Bool).unwrap_or(Value::Null),
                SqlParam::Timestamp(v) => v
                    .map(|t| Value::String(crate::api::format::format_timestamp(&t)))
                    .unwrap_or(Value::Null),
            };
            map.insert(field.name.to_string(), value);
        }
        map
    }
}

fn parse_field(field: &FieldDescriptor, raw: &Value) -> Result<SqlParam, String> {
    match field.kind {
        FieldType::Text => match raw {
            Value::Null => Ok(SqlParam::Text(None)),
            Value::String(s) => {
                if let Some(max) = field.max_len {
                    if s.chars().count() > max {
                        return Err(format!("maximum {} character(s)", max));
                    }
                }
                if field.format == FieldFormat::Email && !is_email(s) {
                    return Err("must be a valid email".to_string());
                }
                if field.digest {
                    return Ok(SqlParam::text(hash_password(s)));
                }
                Ok(SqlParam::text(s.clone()))
            }
            _ => Err("must be a string".to_string()),
        },
        FieldType::Number => match raw {
            Value::Null => Ok(SqlParam::Int(None)),
            Value::Number(n) => n
                .as_i64()
                .map(|v| SqlParam::Int(Some(v)))
                .ok_or_else(|| "must be an integer".to_string()),
            _ => Err("must be a number".to_string()),
        },
        FieldType::Boolean => match raw {
            Value::Null => Ok(SqlParam::Bool(None)),
            Value::Bool(b) => Ok(SqlParam::Bool(Some(*b))),
            _ => Err("must be a boolean".to_string()),
        },
        FieldType::Timestamp => match raw {
            Value::Null => Ok(SqlParam::Timestamp(None)),
            Value::String(s) => parse_timestamp(s)
                .map(|t| SqlParam::Timestamp(Some(t)))
                .ok_or_else(|| "must use format YYYY-MM-DD HH:MM:SS".to_string()),
            _ => Err("must be a timestamp string".to_string()),
        },
        FieldType::Binary => match raw {
            Value::Null => Ok(SqlParam::Text(None)),
            Value::String(s) if is_base64(s) => Ok(SqlParam::text(s.clone())),
            _ => Err("must be base64 encoded".to_string()),
        },
    }
}

pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn is_base64(value: &str) -> bool {
    STANDARD.decode(value).is_ok()
}
