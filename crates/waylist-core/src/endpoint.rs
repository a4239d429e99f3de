//! Endpoint descriptors.
//!
//! An `Endpoint` fully describes one remote operation. Equality and hashing
//! are structural, so an endpoint doubles as the freshness/throttle key.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::Checklist;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where parameters not consumed by the path template are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterEncoding {
    Query,
    Json,
}

/// Immutable description of one remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    path: &'static str,
    method: Method,
    auth_required: bool,
    encoding: ParameterEncoding,
    params: BTreeMap<String, String>,
}

/// Path and leftover parameters after template substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEndpoint {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
}

impl Endpoint {
    pub const fn new(
        method: Method,
        path: &'static str,
        auth_required: bool,
        encoding: ParameterEncoding,
    ) -> Self {
        Self {
            path,
            method,
            auth_required,
            encoding,
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    // Catalog reads

    pub fn places(list: Checklist) -> Self {
        Self::new(
            Method::Get,
            "/checklists/{list}",
            false,
            ParameterEncoding::Query,
        )
        .with_param("list", list.key())
    }

    pub fn rankings(list: Checklist, page: u32) -> Self {
        Self::new(Method::Get, "/rankings/{list}", false, ParameterEncoding::Query)
            .with_param("list", list.key())
            .with_param("page", page)
    }

    pub fn location_photos(location_id: i64) -> Self {
        Self::new(
            Method::Get,
            "/locations/{location_id}/photos",
            false,
            ParameterEncoding::Query,
        )
        .with_param("location_id", location_id)
    }

    pub fn location_posts(location_id: i64) -> Self {
        Self::new(
            Method::Get,
            "/locations/{location_id}/posts",
            false,
            ParameterEncoding::Query,
        )
        .with_param("location_id", location_id)
    }

    // User-scoped reads

    pub fn user_checklists() -> Self {
        Self::new(Method::Get, "/me/checklists", true, ParameterEncoding::Query)
    }

    pub fn profile() -> Self {
        Self::new(Method::Get, "/me", true, ParameterEncoding::Query)
    }

    // Mutations

    pub fn set_visited(list: Checklist, item_id: i64, visited: bool) -> Self {
        let method = if visited { Method::Put } else { Method::Delete };
        Self::new(
            method,
            "/me/checklists/{list}/{item_id}",
            true,
            ParameterEncoding::Json,
        )
        .with_param("list", list.key())
        .with_param("item_id", item_id)
    }

    pub fn upload_photo(location_id: i64, caption: &str) -> Self {
        Self::new(Method::Post, "/me/photos", true, ParameterEncoding::Query)
            .with_param("location_id", location_id)
            .with_param("caption", caption)
    }

    pub fn publish_post(location_id: i64, text: &str) -> Self {
        Self::new(
            Method::Post,
            "/locations/{location_id}/posts",
            true,
            ParameterEncoding::Json,
        )
        .with_param("location_id", location_id)
        .with_param("text", text)
    }

    pub fn update_profile(fields: &BTreeMap<String, String>) -> Self {
        fields.iter().fold(
            Self::new(Method::Put, "/me", true, ParameterEncoding::Json),
            |endpoint, (name, value)| endpoint.with_param(name, value),
        )
    }

    pub const fn path(&self) -> &'static str {
        self.path
    }

    pub const fn method(&self) -> Method {
        self.method
    }

    pub const fn auth_required(&self) -> bool {
        self.auth_required
    }

    pub const fn encoding(&self) -> ParameterEncoding {
        self.encoding
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Short label used in logs and report events, e.g. `GET /checklists/whss`.
    pub fn label(&self) -> String {
        match self.render() {
            Ok(rendered) => format!("{} {}", self.method, rendered.path),
            Err(_) => format!("{} {}", self.method, self.path),
        }
    }

    /// Substitute `{name}` placeholders and split leftover parameters.
    pub fn render(&self) -> Result<RenderedEndpoint> {
        let mut consumed = Vec::new();
        let mut missing = None;
        let path = placeholder_regex()
            .replace_all(self.path, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                self.params.get(name).map_or_else(
                    || {
                        missing.get_or_insert_with(|| name.to_string());
                        String::new()
                    },
                    |value| {
                        consumed.push(name.to_string());
                        urlencoding::encode(value).into_owned()
                    },
                )
            })
            .into_owned();

        if let Some(name) = missing {
            return Err(Error::InvalidInput(format!(
                "Missing path parameter '{name}' for {}",
                self.path
            )));
        }

        let leftover = self
            .params
            .iter()
            .filter(|(name, _)| !consumed.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()));

        let (query, json) = match self.encoding {
            ParameterEncoding::Query => (leftover.collect(), None),
            ParameterEncoding::Json => {
                let body = leftover
                    .map(|(name, value)| (name, serde_json::Value::String(value)))
                    .collect::<serde_json::Map<_, _>>();
                (Vec::new(), (!body.is_empty()).then_some(body.into()))
            }
        };

        Ok(RenderedEndpoint { path, query, json })
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("Invalid regex"))
}
