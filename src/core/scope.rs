//! Breaker identity: polymorphic scoping and the storage key algebra.
//!
//! A breaker is identified by its name plus an optional scope. The scope
//! has two independent sides: a *context* (who the breaker protects, e.g.
//! a tenant or user) and a *boundary* (what it protects, e.g. an external
//! account or integration). Each side is a `(kind, id)` reference pair;
//! the core never dereferences the host's models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used in canonical storage keys.
const KEY_SEPARATOR: &str = ":";

/// A reference to a host model: a type-tag and an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeRef {
    /// Stable type-tag of the referenced model (e.g. `tenant`).
    pub kind: String,
    /// Identifier of the referenced model.
    pub id: String,
}

impl ScopeRef {
    /// Creates a reference from a type-tag and identifier.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind, KEY_SEPARATOR, self.id)
    }
}

/// The ordered pair of optional scope sides.
///
/// Two scopes are equal iff both sides are equal; an absent side only
/// matches an absent side, so global, context-only, boundary-only, and
/// dual-scoped records are all distinct identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// The "who" side.
    pub context: Option<ScopeRef>,
    /// The "what" side.
    pub boundary: Option<ScopeRef>,
}

impl Scope {
    /// The global scope: both sides absent.
    pub fn global() -> Self {
        Self::default()
    }

    /// Returns a copy with the context side set.
    pub fn with_context(mut self, context: impl Into<Option<ScopeRef>>) -> Self {
        self.context = context.into();
        self
    }

    /// Returns a copy with the boundary side set.
    pub fn with_boundary(mut self, boundary: impl Into<Option<ScopeRef>>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Returns `true` if both sides are absent.
    pub fn is_global(&self) -> bool {
        self.context.is_none() && self.boundary.is_none()
    }
}

/// Identifier kinds recognized for scope references and durable rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    /// Decimal integer.
    #[default]
    Integer,
    /// 26-character Crockford base32 ULID.
    Ulid,
    /// Hyphenated UUID.
    Uuid,
}

impl IdentifierKind {
    /// Parses a configuration token.
    pub fn from_config(token: &str) -> Option<Self> {
        match token {
            "integer" => Some(Self::Integer),
            "ulid" => Some(Self::Ulid),
            "uuid" => Some(Self::Uuid),
            _ => None,
        }
    }

    /// Returns `true` if `id` has the shape of this kind.
    pub fn matches(&self, id: &str) -> bool {
        match self {
            Self::Integer => !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()),
            Self::Ulid => {
                id.len() == 26
                    && id.bytes().all(|b| {
                        let upper = b.to_ascii_uppercase();
                        b.is_ascii_digit()
                            || (upper.is_ascii_uppercase()
                                && !matches!(upper, b'I' | b'L' | b'O' | b'U'))
                    })
            }
            Self::Uuid => {
                let bytes = id.as_bytes();
                bytes.len() == 36
                    && bytes.iter().enumerate().all(|(i, b)| match i {
                        8 | 13 | 18 | 23 => *b == b'-',
                        _ => b.is_ascii_hexdigit(),
                    })
            }
        }
    }
}

/// Attribute suffix selecting one of the two logical values per identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAttribute {
    /// The circuit state value.
    State,
    /// The metrics snapshot value.
    Metrics,
}

impl KeyAttribute {
    /// Returns the key suffix token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Metrics => "metrics",
        }
    }
}

/// The full identity of one breaker record in a store.
///
/// The canonical string form joins, with `:`, an optional prefix, each
/// present scope side as a role marker (`c` or `b`) followed by its kind
/// and id, and finally the breaker name. The role markers keep a
/// context-only and a boundary-only scope over the same reference from
/// aliasing to one string. Stores that index by tuples instead of
/// strings must honour the same equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BreakerKey {
    /// Optional store-level key prefix.
    pub prefix: Option<String>,
    /// The breaker name.
    pub name: String,
    /// The scope sides.
    pub scope: Scope,
}

impl BreakerKey {
    /// Creates a key with no prefix.
    pub fn new(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            prefix: None,
            name: name.into(),
            scope,
        }
    }

    /// Returns a copy with the store prefix set.
    pub fn with_prefix(mut self, prefix: impl Into<Option<String>>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Canonical identity string, without an attribute suffix.
    pub fn identity(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(8);
        if let Some(prefix) = &self.prefix {
            parts.push(prefix);
        }
        if let Some(context) = &self.scope.context {
            parts.push("c");
            parts.push(&context.kind);
            parts.push(&context.id);
        }
        if let Some(boundary) = &self.scope.boundary {
            parts.push("b");
            parts.push(&boundary.kind);
            parts.push(&boundary.id);
        }
        parts.push(&self.name);
        parts.join(KEY_SEPARATOR)
    }

    /// Canonical storage key for one attribute of this identity.
    pub fn attribute_key(&self, attribute: KeyAttribute) -> String {
        let mut key = self.identity();
        key.push_str(KEY_SEPARATOR);
        key.push_str(attribute.as_str());
        key
    }
}

impl fmt::Display for BreakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}
