//! Identifier newtypes for layout entities.
//!
//! [`NodeId`] is the structured form of a layout node identifier. Node ids
//! travel as strings (`s4`, `n17`, `root`, `u12l1s4`), but are parsed exactly
//! once into `{ local, fragment }` so that the rest of the crate never
//! inspects string prefixes.
//!
//! # Namespaces
//!
//! - `s<N>` -- folders (tabs and columns) allocated by the tree
//! - `n<N>` -- portlets allocated by the tree
//! - `root` -- the single root folder of every layout
//! - `u<owner>l<layout><local>` -- nodes merged in from another user's
//!   fragment. The owner's numeric identity and layout id are embedded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Numeric identity of a portal user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u32);

/// Identity of a published content definition (a portlet's channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a fragment-owned node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentOrigin {
    /// The fragment owner's numeric identity.
    pub owner: UserId,
    /// The owner's layout the fragment was taken from.
    pub layout: u32,
}

/// Identifier of a node in a layout tree.
///
/// Serializes as its textual form. Equality and hashing operate on the
/// parsed fields, and the textual form is canonical, so two ids are equal
/// exactly when their strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    fragment: Option<FragmentOrigin>,
    local: String,
}

/// Id of the root folder in every layout.
pub const ROOT_LOCAL_ID: &str = "root";

impl NodeId {
    /// The root folder id.
    pub fn root() -> Self {
        NodeId {
            fragment: None,
            local: ROOT_LOCAL_ID.to_string(),
        }
    }

    /// Allocator form for folders (`s<N>`).
    pub fn folder(seq: u32) -> Self {
        NodeId {
            fragment: None,
            local: format!("s{seq}"),
        }
    }

    /// Allocator form for portlets (`n<N>`).
    pub fn portlet(seq: u32) -> Self {
        NodeId {
            fragment: None,
            local: format!("n{seq}"),
        }
    }

    /// Re-homes a user-owned id into the fragment namespace of `origin`.
    ///
    /// Ids that already carry a fragment origin are returned unchanged; a
    /// fragment is never re-exported through another user.
    pub fn into_fragment(self, origin: FragmentOrigin) -> Self {
        match self.fragment {
            Some(_) => self,
            None => NodeId {
                fragment: Some(origin),
                local: self.local,
            },
        }
    }

    /// The part of the id that is unique within its owner's layout.
    pub fn local_part(&self) -> &str {
        &self.local
    }

    /// Fragment origin, if this node was merged in from a fragment.
    pub fn fragment(&self) -> Option<FragmentOrigin> {
        self.fragment
    }

    /// Whether the id lives in the reserved fragment namespace.
    pub fn is_fragment(&self) -> bool {
        self.fragment.is_some()
    }

    /// Whether the id belongs to a fragment owned by `owner`.
    pub fn is_owned_by(&self, owner: UserId) -> bool {
        self.fragment.map_or(false, |origin| origin.owner == owner)
    }

    pub fn is_root(&self) -> bool {
        self.fragment.is_none() && self.local == ROOT_LOCAL_ID
    }
}

fn validate_local(local: &str) -> Result<(), CoreError> {
    if local.is_empty() {
        return Err(CoreError::InvalidId {
            raw: local.to_string(),
            reason: "id is empty".to_string(),
        });
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CoreError::InvalidId {
            raw: local.to_string(),
            reason: "ids may only contain ASCII letters, digits, '_' and '-'".to_string(),
        });
    }
    Ok(())
}

/// Consumes a canonical unsigned integer (no leading zeros) from the front of
/// `s`, returning the value and the remainder.
fn take_number(s: &str) -> Option<(u32, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let digits = &s[..end];
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return None;
    }
    let value = digits.parse::<u32>().ok()?;
    Some((value, &s[end..]))
}

/// Splits `u<owner>l<layout><local>` into its parts. Returns `None` for
/// anything that is not fragment-shaped.
fn parse_fragment(raw: &str) -> Option<(FragmentOrigin, &str)> {
    let rest = raw.strip_prefix('u')?;
    let (owner, rest) = take_number(rest)?;
    let rest = rest.strip_prefix('l')?;
    let (layout, local) = take_number(rest)?;
    // The local part starts with its own namespace letter.
    if !local.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((
        FragmentOrigin {
            owner: UserId(owner),
            layout,
        },
        local,
    ))
}

impl FromStr for NodeId {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        validate_local(raw)?;
        match parse_fragment(raw) {
            Some((origin, local)) => Ok(NodeId {
                fragment: Some(origin),
                local: local.to_string(),
            }),
            None => Ok(NodeId {
                fragment: None,
                local: raw.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for NodeId {
    type Error = CoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fragment {
            Some(origin) => write!(f, "u{}l{}{}", origin.owner.0, origin.layout, self.local),
            None => f.write_str(&self.local),
        }
    }
}
