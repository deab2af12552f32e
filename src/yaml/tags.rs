//! Reference tags recognised by the loader.
//!
//! # Tags
//! - `!scs-secret <file>[#<attr>]`: value from the secrets directory, wrapped
//!   as a [`Secret`](super::Secret)
//! - `!scs-common <file>[#<attr>]`: value from the common directory
//! - `!scs-relative <file>[#<attr>]`: value from a file next to the current one
//! - `!scs-expand-env <text>`: `${NAME}` placeholders replaced from the
//!   environment
//! - `!scs-gen-secret`: a random token, persisted back into the file

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::value::Value;
use super::LoadError;

pub const SECRET_TAG: &str = "scs-secret";
pub const COMMON_TAG: &str = "scs-common";
pub const RELATIVE_TAG: &str = "scs-relative";
pub const EXPAND_ENV_TAG: &str = "scs-expand-env";
pub const GEN_SECRET_TAG: &str = "scs-gen-secret";

/// A parsed reference tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTag {
    Secret(FileReference),
    Common(FileReference),
    Relative(FileReference),
    ExpandEnv(String),
    GenerateSecret,
}

/// Discriminant of a [`ReferenceTag`], used to express which tags a file
/// kind accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Secret,
    Common,
    Relative,
    ExpandEnv,
    GenerateSecret,
}

impl TagKind {
    pub fn name(self) -> &'static str {
        match self {
            TagKind::Secret => SECRET_TAG,
            TagKind::Common => COMMON_TAG,
            TagKind::Relative => RELATIVE_TAG,
            TagKind::ExpandEnv => EXPAND_ENV_TAG,
            TagKind::GenerateSecret => GEN_SECRET_TAG,
        }
    }

    /// Looks up a tag by its YAML name. A leading `!` is ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim_start_matches('!') {
            SECRET_TAG => Some(TagKind::Secret),
            COMMON_TAG => Some(TagKind::Common),
            RELATIVE_TAG => Some(TagKind::Relative),
            EXPAND_ENV_TAG => Some(TagKind::ExpandEnv),
            GEN_SECRET_TAG => Some(TagKind::GenerateSecret),
            _ => None,
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{}", self.name())
    }
}

impl ReferenceTag {
    /// Parses the scalar contents of a tagged node.
    pub fn parse(kind: TagKind, raw: &str) -> Result<Self, LoadError> {
        Ok(match kind {
            TagKind::Secret => ReferenceTag::Secret(FileReference::parse(raw)?),
            TagKind::Common => ReferenceTag::Common(FileReference::parse(raw)?),
            TagKind::Relative => ReferenceTag::Relative(FileReference::parse(raw)?),
            TagKind::ExpandEnv => ReferenceTag::ExpandEnv(raw.to_string()),
            TagKind::GenerateSecret => ReferenceTag::GenerateSecret,
        })
    }

    pub fn kind(&self) -> TagKind {
        match self {
            ReferenceTag::Secret(_) => TagKind::Secret,
            ReferenceTag::Common(_) => TagKind::Common,
            ReferenceTag::Relative(_) => TagKind::Relative,
            ReferenceTag::ExpandEnv(_) => TagKind::ExpandEnv,
            ReferenceTag::GenerateSecret => TagKind::GenerateSecret,
        }
    }
}

/// `<file>[#<attribute path>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    /// The reference exactly as written, used as the secret id.
    pub raw: String,
    pub file: String,
    pub attribute: Option<AttributePath>,
}

impl FileReference {
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        let (file, attribute) = match raw.split_once('#') {
            Some((file, attr)) => (file, Some(attr)),
            None => (raw, None),
        };

        if file.is_empty() {
            return Err(LoadError::reference(raw, "no file given"));
        }

        let attribute = match attribute {
            // `file.yaml#` addresses the whole file
            Some("") | None => None,
            Some(attr) => Some(AttributePath::parse(attr).map_err(|e| LoadError::reference(raw, e))?),
        };

        Ok(Self {
            raw: raw.to_string(),
            file: file.to_string(),
            attribute,
        })
    }
}

/// One step of an attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{key}"),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A dot-separated path into a document, e.g. `a.b[0]` or `servers.[1].host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    segments: Vec<Segment>,
}

fn index_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\[(\d+)\]$").expect("valid index regex"))
}

impl AttributePath {
    /// Parses an attribute path.
    ///
    /// Each dot-separated part is a map key, or a list index when written as
    /// `[N]`. A key directly followed by indices (`b[0]`, `m[1][2]`) is
    /// split into the key and its indices.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        for part in raw.split('.') {
            if part.is_empty() {
                return Err(format!("empty segment in attribute path '{raw}'"));
            }
            let (key, mut rest) = match part.find('[') {
                Some(0) => ("", part),
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            while !rest.is_empty() {
                let end = rest
                    .find(']')
                    .ok_or_else(|| format!("unterminated index in attribute path '{raw}'"))?;
                let (index, tail) = rest.split_at(end + 1);
                let captures = index_pattern()
                    .captures(index)
                    .ok_or_else(|| format!("invalid index '{index}' in attribute path '{raw}'"))?;
                let index = captures[1]
                    .parse()
                    .map_err(|_| format!("index out of range in attribute path '{raw}'"))?;
                segments.push(Segment::Index(index));
                rest = tail;
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Walks the path into `value`, returning the addressed node.
    ///
    /// Secret markers on the way are looked through, so a path can reach
    /// inside a value that came from a secret reference.
    pub fn resolve<'a>(&self, value: &'a Value) -> Result<&'a Value, String> {
        let mut current = value;
        for segment in &self.segments {
            while let Value::Secret(secret) = current {
                current = &secret.value;
            }
            current = match (segment, current) {
                (Segment::Key(key), Value::Mapping(map)) => map
                    .get(key)
                    .ok_or_else(|| format!("key '{key}' not found"))?,
                (Segment::Index(index), Value::Sequence(items)) => items
                    .get(*index)
                    .ok_or_else(|| format!("index [{index}] out of range (len {})", items.len()))?,
                (segment, other) => {
                    return Err(format!(
                        "cannot look up '{segment}' in a {}",
                        other.kind()
                    ))
                }
            };
        }
        Ok(current)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
