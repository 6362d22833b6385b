//! Materialized paths for the conversation tree.
//!
//! A path is a `.`-joined list of fixed-width segments, one per ancestor plus
//! the node itself. Each segment is 12 hex digits of the store's insertion
//! sequence followed by the first 8 hex digits of the node's id, so plain text
//! ordering of paths is a depth-first pre-order walk with siblings in
//! creation order.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

pub const SEPARATOR: char = '.';

const SEQ_WIDTH: usize = 12;
const TAG_WIDTH: usize = 8;
pub const SEGMENT_LEN: usize = SEQ_WIDTH + TAG_WIDTH;

/// Largest sequence number that still fits in a fixed-width segment.
pub const MAX_SEQ: u64 = (1 << (4 * SEQ_WIDTH)) - 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("malformed path segment: {0:?}")]
    MalformedSegment(String),

    #[error("sequence number {0} does not fit in a path segment")]
    SequenceOverflow(u64),
}

/// Builds the segment for the node with identifier `id` inserted as the
/// `seq`-th message of the store.
pub fn segment(seq: u64, id: &Uuid) -> Result<String, PathError> {
    if seq > MAX_SEQ {
        return Err(PathError::SequenceOverflow(seq));
    }
    let tag = id.simple().to_string();
    Ok(format!("{:0width$x}{}", seq, &tag[..TAG_WIDTH], width = SEQ_WIDTH))
}

fn validate_segment(seg: &str) -> Result<(), PathError> {
    let well_formed = seg.len() == SEGMENT_LEN
        && seg
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if well_formed {
        Ok(())
    } else {
        Err(PathError::MalformedSegment(seg.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessagePath(String);

impl MessagePath {
    /// Path of a new tree root: a single segment.
    pub fn root(seq: u64, id: &Uuid) -> Result<Self, PathError> {
        Ok(Self(segment(seq, id)?))
    }

    /// Path of a new child of `self`: this path with one segment appended.
    pub fn child(&self, seq: u64, id: &Uuid) -> Result<Self, PathError> {
        let seg = segment(seq, id)?;
        let mut path = String::with_capacity(self.0.len() + 1 + seg.len());
        path.push_str(&self.0);
        path.push(SEPARATOR);
        path.push_str(&seg);
        Ok(Self(path))
    }

    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        for seg in raw.split(SEPARATOR) {
            validate_segment(seg)?;
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(head, _)| Self(head.to_string()))
    }

    pub fn is_descendant_or_self_of(&self, ancestor: &MessagePath) -> bool {
        match self.0.strip_prefix(ancestor.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }

    /// Exclusive upper bound of the descendant-or-self range.
    ///
    /// Every path in the subtree sorts in `[self, bound)`: `/` is the byte
    /// right after the separator and segments are hex, so no path outside the
    /// subtree falls in between.
    pub fn subtree_upper_bound(&self) -> String {
        let mut bound = String::with_capacity(self.0.len() + 1);
        bound.push_str(&self.0);
        bound.push('/');
        bound
    }
}

impl fmt::Display for MessagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
