//! Value types built from server response payloads.
//!
//! Every type here is a transient projection of a single response: built
//! once, owned by the caller, never cached or mutated in place. Payloads
//! arrive as the `data` object of the server's envelope, with an `id` at the
//! top level, scalar fields under `attributes` and nested resources under
//! `relationships`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Visibility scope of a blob: exactly `user`, `group` or `public`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    User,
    Group,
    Public,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Group => "group",
            Scope::Public => "public",
        }
    }
}

/// Uploads default to the caller's own scope. Listing does not use this
/// default: an absent scope filter spans all three scopes.
impl Default for Scope {
    fn default() -> Self {
        Scope::User
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Scope::User),
            "group" => Ok(Scope::Group),
            "public" => Ok(Scope::Public),
            other => Err(Error::InvalidScope(other.to_string())),
        }
    }
}

/// A named grouping/namespace owning a size quota and a restricted flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
    pub max_size: u64,
    pub restricted: bool,
}

impl Tag {
    /// Builds a tag from a response `data` object. `name` is required;
    /// everything else has a defined default.
    pub fn build(data: &Value) -> Result<Self> {
        let attrs = data.get("attributes");
        let name = attr_str(attrs, "name")
            .ok_or_else(|| Error::MalformedResponse("tag payload has no name".into()))?;
        Ok(Tag {
            name,
            max_size: attr_u64(attrs, "max_size").unwrap_or(0),
            restricted: attr_bool(attrs, "restricted").unwrap_or(false),
        })
    }
}

/// A single stored file object with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blob {
    pub id: i64,
    pub filename: String,
    pub title: Option<String>,
    pub label: Option<String>,
    pub tag_name: Option<String>,
    pub scope: Scope,
    pub protected: bool,
    pub size: u64,
}

impl Blob {
    /// Builds a blob from a response `data` object. Only `id` is required;
    /// the server sends it as a number or a numeric string.
    pub fn build(data: &Value) -> Result<Self> {
        let id = parse_id(data)?;
        let attrs = data.get("attributes");
        let scope = match attr_str(attrs, "scope") {
            Some(s) => s
                .parse()
                .map_err(|_| Error::MalformedResponse(format!("unknown blob scope {s:?}")))?,
            None => Scope::default(),
        };
        Ok(Blob {
            id,
            filename: attr_str(attrs, "filename").unwrap_or_default(),
            title: attr_str(attrs, "title"),
            label: attr_str(attrs, "label"),
            tag_name: attr_str(attrs, "tag_name"),
            scope,
            protected: attr_bool(attrs, "protected").unwrap_or(false),
            size: attr_u64(attrs, "size").unwrap_or(0),
        })
    }
}

/// A server-side grouping construct used as an upload target. Its `blobs`
/// list is a snapshot taken from the response's included relationships, not
/// an ownership relation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Container {
    pub id: i64,
    pub tag: Option<String>,
    pub blobs: Vec<Blob>,
}

impl Container {
    /// Builds a container from a response `data` object. `id` is required;
    /// absent `tag`/`blobs` relationship data yields `None`/empty rather
    /// than an error. Nested blob order is preserved as given.
    pub fn build(data: &Value) -> Result<Self> {
        let id = parse_id(data)?;
        let tag = attr_str(data.get("attributes"), "tag");
        let blobs = match data
            .pointer("/relationships/blobs/data")
            .and_then(Value::as_array)
        {
            Some(entries) => entries.iter().map(Blob::build).collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Container { id, tag, blobs })
    }
}

/// A tri-state optional: distinguishes "leave untouched" from an explicit
/// value, including the explicit empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Sparse<T> {
    #[default]
    Absent,
    Set(T),
}

impl<T> Sparse<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Sparse::Set(_))
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Sparse::Absent => None,
            Sparse::Set(v) => Some(v),
        }
    }
}

impl<T> From<Option<T>> for Sparse<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Sparse::Set(v),
            None => Sparse::Absent,
        }
    }
}

/// Sparse metadata update for a blob: only `Set` fields are sent, so the
/// server leaves every other field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    pub filename: Sparse<String>,
    pub label: Sparse<String>,
    pub title: Sparse<String>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        !self.filename.is_set() && !self.label.is_set() && !self.title.is_set()
    }

    /// The sparse wire body: one key per `Set` field.
    pub fn to_body(&self) -> serde_json::Map<String, Value> {
        let mut body = serde_json::Map::new();
        for (key, field) in [
            ("filename", &self.filename),
            ("label", &self.label),
            ("title", &self.title),
        ] {
            if let Sparse::Set(v) = field {
                body.insert(key.to_string(), Value::String(v.clone()));
            }
        }
        body
    }
}

fn parse_id(data: &Value) -> Result<i64> {
    match data.get("id") {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| Error::MalformedResponse(format!("non-integer id: {n}"))),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| Error::MalformedResponse(format!("non-numeric id: {s:?}"))),
        _ => Err(Error::MalformedResponse("payload has no id".into())),
    }
}

fn attr_str(attrs: Option<&Value>, key: &str) -> Option<String> {
    attrs?.get(key)?.as_str().map(str::to_string)
}

fn attr_u64(attrs: Option<&Value>, key: &str) -> Option<u64> {
    attrs?.get(key)?.as_u64()
}

fn attr_bool(attrs: Option<&Value>, key: &str) -> Option<bool> {
    attrs?.get(key)?.as_bool()
}
