// src/columns.rs
//! Table registry and column descriptors.
//!
//! A column descriptor pairs a value-extraction function with an optional
//! formatting function. Both are picked once, when the registry is loaded,
//! from the `accessor` and `format` strings of the table configuration.

use crate::error::ConfigError;
use crate::models::{ColumnSpec, FilterKind, FilterSpec, Message, SelectOption, TableSpec};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

pub type Extractor = Arc<dyn Fn(&Message) -> Value + Send + Sync>;
pub type Formatter = fn(&Value, &Message) -> String;

const TRUNCATE_AT: usize = 120;

lazy_static::lazy_static! {
    static ref IDENTIFIER: regex::Regex =
        regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// True when `name` can be spliced into SQL as a quoted identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

#[derive(Clone)]
pub struct ColumnDescriptor {
    pub id: String,
    pub header: String,
    pub is_primary: bool,
    pub class_name: Option<String>,
    extract: Extractor,
    format: Option<Formatter>,
}

impl std::fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("id", &self.id)
            .field("header", &self.header)
            .field("is_primary", &self.is_primary)
            .field("formatted", &self.format.is_some())
            .finish()
    }
}

impl ColumnDescriptor {
    pub fn from_spec(spec: &ColumnSpec) -> Result<Self, ConfigError> {
        let accessor = spec.accessor.clone();
        let extract: Extractor = Arc::new(move |msg: &Message| msg.field(&accessor));

        let format = match spec.format.as_deref() {
            None => None,
            Some(name) => Some(formatter_by_name(name)?),
        };

        Ok(Self {
            id: spec.id.clone(),
            header: spec.header.clone(),
            is_primary: spec.is_primary,
            class_name: spec.class_name.clone(),
            extract,
            format,
        })
    }

    pub fn value(&self, msg: &Message) -> Value {
        (self.extract)(msg)
    }

    /// Extract then format; columns without a formatter show the raw value.
    pub fn display(&self, msg: &Message) -> String {
        let value = self.value(msg);
        match self.format {
            Some(format) => format(&value, msg),
            None => plain(&value, msg),
        }
    }
}

pub fn formatter_by_name(name: &str) -> Result<Formatter, ConfigError> {
    let format: Formatter = match name {
        "datetime" => format_datetime,
        "bool_badge" => format_bool,
        "truncate" => format_truncate,
        "json" => format_json,
        "chat_payload" => format_chat_payload,
        other => return Err(ConfigError::UnknownFormat(other.to_string())),
    };
    Ok(format)
}

fn plain(value: &Value, _msg: &Message) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_datetime(value: &Value, msg: &Message) -> String {
    value
        .as_str()
        .and_then(crate::models::message::parse_timestamp)
        .map(|dt| dt.format("%d/%m/%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| plain(value, msg))
}

fn format_bool(value: &Value, _msg: &Message) -> String {
    match value {
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::String(s) if s == "true" => "Yes".to_string(),
        Value::String(s) if s == "false" => "No".to_string(),
        _ => "-".to_string(),
    }
}

fn format_truncate(value: &Value, msg: &Message) -> String {
    let text = plain(value, msg);
    if text.chars().count() <= TRUNCATE_AT {
        return text;
    }
    let mut short: String = text.chars().take(TRUNCATE_AT).collect();
    short.push('…');
    short
}

fn format_json(value: &Value, _msg: &Message) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Renders `{"type": "human", "content": "..."}` payloads as `human: ...`.
fn format_chat_payload(value: &Value, msg: &Message) -> String {
    let object = match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    };

    match object {
        Some(map) => {
            let content = map
                .get("content")
                .map(|c| plain(c, msg))
                .unwrap_or_default();
            match map.get("type").and_then(Value::as_str) {
                Some(kind) => format!("{}: {}", kind, content),
                None => content,
            }
        }
        None => plain(value, msg),
    }
}

/// A table ready to browse: its spec plus resolved column descriptors.
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub spec: TableSpec,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableConfig {
    pub fn from_spec(spec: TableSpec) -> Result<Self, ConfigError> {
        if !is_valid_identifier(&spec.table_name) {
            return Err(ConfigError::InvalidTableName(spec.table_name));
        }
        if spec.columns.is_empty() {
            return Err(ConfigError::NoColumns(spec.table_name));
        }
        let columns = spec
            .columns
            .iter()
            .map(ColumnDescriptor::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { spec, columns })
    }

    pub fn table_name(&self) -> &str {
        &self.spec.table_name
    }

    pub fn filters(&self) -> &[FilterSpec] {
        &self.spec.filters
    }

    /// The column flagged primary, or the first column.
    pub fn primary_column(&self) -> &ColumnDescriptor {
        self.columns
            .iter()
            .find(|c| c.is_primary)
            .unwrap_or(&self.columns[0])
    }

    pub fn other_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        let primary_id = self.primary_column().id.clone();
        self.columns.iter().filter(move |c| c.id != primary_id)
    }
}

#[derive(Debug, Clone)]
pub struct TableRegistry {
    tables: Vec<TableConfig>,
}

impl TableRegistry {
    pub fn from_specs(specs: Vec<TableSpec>) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::NoTables);
        }
        let tables = specs
            .into_iter()
            .map(TableConfig::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tables })
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let specs: Vec<TableSpec> = serde_json::from_str(json)?;
        Self::from_specs(specs)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The chat history table the dashboard ships with.
    pub fn builtin() -> Self {
        let column = |id: &str, header: &str, accessor: &str, format: Option<&str>, is_primary: bool| {
            ColumnSpec {
                id: id.to_string(),
                header: header.to_string(),
                accessor: accessor.to_string(),
                format: format.map(str::to_string),
                is_primary,
                class_name: None,
            }
        };

        let spec = TableSpec {
            table_name: "chat_messages".to_string(),
            label: "Chat history".to_string(),
            columns: vec![
                column("message", "Message", "message", Some("chat_payload"), true),
                column("session_id", "Session", "session_id", None, false),
                column("created_at", "Date", "created_at", Some("datetime"), false),
                column("correo_enviado", "Email sent", "correo_enviado", Some("bool_badge"), false),
            ],
            filters: vec![
                FilterSpec {
                    id: "session_id".to_string(),
                    label: "Session ID".to_string(),
                    kind: FilterKind::Text,
                    options: Vec::new(),
                },
                FilterSpec {
                    id: "correo_enviado".to_string(),
                    label: "Email sent".to_string(),
                    kind: FilterKind::Select,
                    options: vec![
                        SelectOption { value: "true".to_string(), label: "Yes".to_string() },
                        SelectOption { value: "false".to_string(), label: "No".to_string() },
                    ],
                },
            ],
        };

        // The built-in spec is static and always valid.
        let config = TableConfig::from_spec(spec).unwrap_or_else(|e| panic!("built-in table: {}", e));
        Self { tables: vec![config] }
    }

    pub fn get(&self, table_name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|t| t.table_name() == table_name)
    }

    pub fn first(&self) -> &TableConfig {
        &self.tables[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableConfig> {
        self.tables.iter()
    }
}
