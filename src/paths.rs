//! JSON Pointers for instance locations and evaluation paths.
use std::fmt::{self, Write};

/// A single step within a JSON Pointer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    /// Property name within a JSON object.
    Property(Box<str>),
    /// Index within a JSON array.
    Index(usize),
    /// JSON Schema keyword.
    Keyword(&'static str),
}

/// An owned JSON Pointer, stored as individual segments to avoid re-parsing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct JsonPointer(Vec<Segment>);

impl JsonPointer {
    /// Pointer segments as plain strings.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
            .into_iter()
            .map(|segment| match segment {
                Segment::Property(value) => value.into_string(),
                Segment::Index(idx) => idx.to_string(),
                Segment::Keyword(keyword) => keyword.to_string(),
            })
            .collect()
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            f.write_char('/')?;
            match segment {
                Segment::Property(value) => write_escaped(f, value)?,
                Segment::Index(idx) => f.write_str(itoa::Buffer::new().format(*idx))?,
                Segment::Keyword(keyword) => write_escaped(f, keyword)?,
            }
        }
        Ok(())
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    for ch in value.chars() {
        match ch {
            '/' => f.write_str("~1")?,
            '~' => f.write_str("~0")?,
            _ => f.write_char(ch)?,
        }
    }
    Ok(())
}

impl serde::Serialize for JsonPointer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A borrowed pointer segment.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum SegmentRef<'a> {
    Property(&'a str),
    Index(usize),
    Keyword(&'static str),
}

impl From<SegmentRef<'_>> for Segment {
    fn from(value: SegmentRef<'_>) -> Segment {
        match value {
            SegmentRef::Property(value) => Segment::Property(value.into()),
            SegmentRef::Index(value) => Segment::Index(value),
            SegmentRef::Keyword(value) => Segment::Keyword(value),
        }
    }
}

impl<'a> From<&'a str> for SegmentRef<'a> {
    #[inline]
    fn from(value: &'a str) -> SegmentRef<'a> {
        SegmentRef::Property(value)
    }
}

impl From<usize> for SegmentRef<'_> {
    #[inline]
    fn from(value: usize) -> Self {
        SegmentRef::Index(value)
    }
}

/// A node in a linked list representing a JSON Pointer built incrementally
/// while the evaluator descends into the instance and the schema.
///
/// The linked list lives on the call stack, so extending a pointer by one
/// segment costs no allocation; the owned [`JsonPointer`] is only materialized
/// for result nodes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LazyPointer<'a, 'b> {
    segment: SegmentRef<'a>,
    parent: Option<&'b LazyPointer<'b, 'a>>,
}

impl LazyPointer<'_, '_> {
    pub(crate) const fn new() -> Self {
        LazyPointer {
            // Never rendered: the root node has no parent and is skipped.
            segment: SegmentRef::Index(0),
            parent: None,
        }
    }
}

impl<'a, 'b> LazyPointer<'a, 'b> {
    #[inline]
    pub(crate) fn push(&'a self, segment: impl Into<SegmentRef<'a>>) -> Self {
        LazyPointer {
            segment: segment.into(),
            parent: Some(self),
        }
    }

    #[inline]
    pub(crate) fn push_keyword(&'a self, keyword: &'static str) -> Self {
        LazyPointer {
            segment: SegmentRef::Keyword(keyword),
            parent: Some(self),
        }
    }

    pub(crate) fn to_pointer(&'a self) -> JsonPointer {
        let mut capacity = 0;
        let mut head = self;
        while let Some(next) = head.parent {
            head = next;
            capacity += 1;
        }
        let mut buffer = Vec::with_capacity(capacity);
        let mut head = self;
        if head.parent.is_some() {
            buffer.push(head.segment.into());
        }
        while let Some(next) = head.parent {
            head = next;
            if head.parent.is_some() {
                buffer.push(head.segment.into());
            }
        }
        buffer.reverse();
        JsonPointer(buffer)
    }
}

impl<'a, 'b> From<&'a LazyPointer<'a, 'b>> for JsonPointer {
    #[inline]
    fn from(path: &'a LazyPointer<'a, 'b>) -> Self {
        path.to_pointer()
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonPointer, LazyPointer, Segment};
    use serde_json::json;

    #[test]
    fn display_escapes_pointer_characters() {
        let root = LazyPointer::new();
        let first = root.push("/");
        let second = first.push("~");
        let pointer = second.to_pointer().to_string();
        assert_eq!(pointer, "/~1/~0");
        let data = json!({"/": {"~": 42}});
        assert_eq!(data.pointer(&pointer), Some(&json!(42)));
    }

    #[test]
    fn mixed_segments() {
        let root = LazyPointer::new();
        let a = root.push_keyword("properties");
        let b = a.push("name");
        let c = b.push(3usize);
        assert_eq!(c.to_pointer().to_string(), "/properties/name/3");
    }

    #[test]
    fn empty_pointer_renders_empty() {
        assert_eq!(LazyPointer::new().to_pointer().to_string(), "");
        assert_eq!(JsonPointer::default().to_string(), "");
    }

    #[test]
    fn into_vec_stringifies_segments() {
        let pointer = JsonPointer(vec![
            Segment::Keyword("allOf"),
            Segment::Index(0),
            Segment::Property("x".into()),
        ]);
        assert_eq!(pointer.into_vec(), vec!["allOf", "0", "x"]);
    }
}
