use serde_json::{Map, Value};

/// Storage/wire type of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Number,
    Text,
    Boolean,
    Timestamp,
    /// Raw bytes, base64 on the wire.
    Binary,
}

impl FieldType {
    /// Tag reported by the header endpoint.
    pub fn tag(&self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::Text => "string",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::Binary => "binary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    Plain,
    Email,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// External (camel-case) name.
    pub name: &'static str,
    /// Storage (snake-case) column.
    pub column: &'static str,
    pub kind: FieldType,
    pub max_len: Option<usize>,
    pub format: FieldFormat,
    /// Stored as a SHA-256 hex digest of the submitted value.
    pub digest: bool,
}

impl FieldDescriptor {
    const fn new(name: &'static str, column: &'static str, kind: FieldType) -> Self {
        Self { name, column, kind, max_len: None, format: FieldFormat::Plain, digest: false }
    }

    pub const fn text(name: &'static str, column: &'static str, max_len: usize) -> Self {
        Self { max_len: Some(max_len), ..Self::new(name, column, FieldType::Text) }
    }

    /// Unbounded text.
    pub const fn long_text(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldType::Text)
    }

    pub const fn number(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldType::Number)
    }

    pub const fn boolean(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldType::Boolean)
    }

    pub const fn timestamp(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldType::Timestamp)
    }

    pub const fn binary(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldType::Binary)
    }

    pub const fn email(self) -> Self {
        Self { format: FieldFormat::Email, ..self }
    }

    pub const fn digest(self) -> Self {
        Self { digest: true, ..self }
    }
}

pub const ID_FIELD: FieldDescriptor = FieldDescriptor::number("id", "id");

/// Audit columns every entity carries. Only the repository writes them.
pub const AUDIT_FIELDS: [FieldDescriptor; 7] = [
    FieldDescriptor::number("createdBy", "created_by"),
    FieldDescriptor::timestamp("createdOn", "created_on"),
    FieldDescriptor::number("modifiedBy", "modified_by"),
    FieldDescriptor::timestamp("modifiedOn", "modified_on"),
    FieldDescriptor::number("deletedBy", "deleted_by"),
    FieldDescriptor::timestamp("deletedOn", "deleted_on"),
    FieldDescriptor::boolean("isDelete", "is_delete"),
];

/// Everything the generic repository and handlers need to know about one entity kind.
#[derive(Debug)]
pub struct EntityDescriptor {
    /// Route segment and cache family, e.g. `m_notes`.
    pub name: &'static str,
    pub table: &'static str,
    /// Business fields; all of them are caller-mutable.
    pub fields: &'static [FieldDescriptor],
    pub required_authority: Option<&'static str>,
}

impl EntityDescriptor {
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        std::iter::once(&ID_FIELD)
            .chain(self.fields.iter())
            .chain(AUDIT_FIELDS.iter())
    }

    pub fn mutable_fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    /// Resolve a caller-supplied field name. Accepts the external name, or any spelling
    /// whose snake-case form is a known column.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        if let Some(field) = self.all_fields().find(|f| f.name == name) {
            return Some(field);
        }
        let column = camel_to_snake(name);
        self.all_fields().find(|f| f.column == column)
    }

    pub fn string_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.all_fields().filter(|f| f.kind == FieldType::Text)
    }

    /// Field name to type tag, as served by the header endpoint.
    pub fn field_types(&self) -> Map<String, Value> {
        self.all_fields()
            .map(|f| (f.name.to_string(), Value::String(f.kind.tag().to_string())))
            .collect()
    }

    /// Cache family prefix shared by every route of this entity.
    pub fn route_prefix(&self) -> String {
        format!("/v1/{}", self.name)
    }
}

/// `mobilePhone` -> `mobile_phone`, `isDelete` -> `is_delete`.
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
