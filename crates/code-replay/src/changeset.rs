//! Composable, invertible document changes.
//!
//! A [`ChangeSet`] describes how to turn a document of length [`ChangeSet::len`] into one of
//! length [`ChangeSet::new_len`], as a sequence of sections in character offsets:
//!
//! - `Retain(n)`: keep the next `n` characters;
//! - `Replace { delete, insert }`: drop the next `delete` characters and put `insert` there.
//!
//! Change sets compose (`a.compose(&b)` is "a then b") and invert against the exact document
//! they were applied to, which is what lets the structured replayer batch many recorded edits
//! into a single transaction and walk them backwards.
//!
//! The JSON form is an array whose items are either a number (a retained length) or an array
//! `[deleteLen, line0, line1, ...]` (a replacement whose inserted text has the given lines).

use crate::error::ChangeSetError;
use crate::text::byte_index;
use ropey::Rope;
use serde::de;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Section {
    Retain(usize),
    Replace { delete: usize, insert: String },
}

/// A document change in character offsets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    sections: Vec<Section>,
}

impl ChangeSet {
    /// The identity change for a document of `len` characters.
    pub fn empty(len: usize) -> Self {
        let mut builder = Builder::default();
        builder.retain(len);
        builder.finish()
    }

    /// Replace `from..to` in a document of `doc_len` characters with `text`.
    pub fn replace(
        doc_len: usize,
        from: usize,
        to: usize,
        text: &str,
    ) -> Result<Self, ChangeSetError> {
        if from > to || to > doc_len {
            return Err(ChangeSetError::Malformed(format!(
                "range {from}..{to} outside document of length {doc_len}"
            )));
        }
        let mut builder = Builder::default();
        builder.retain(from);
        builder.delete(to - from);
        builder.insert(text);
        builder.retain(doc_len - to);
        Ok(builder.finish())
    }

    /// Insert `text` at `at` in a document of `doc_len` characters.
    pub fn insert(doc_len: usize, at: usize, text: &str) -> Result<Self, ChangeSetError> {
        Self::replace(doc_len, at, at, text)
    }

    /// Delete `from..to` in a document of `doc_len` characters.
    pub fn delete(doc_len: usize, from: usize, to: usize) -> Result<Self, ChangeSetError> {
        Self::replace(doc_len, from, to, "")
    }

    /// Length of the document this change applies to.
    pub fn len(&self) -> usize {
        self.sections
            .iter()
            .map(|s| match s {
                Section::Retain(n) => *n,
                Section::Replace { delete, .. } => *delete,
            })
            .sum()
    }

    /// Length of the document this change produces.
    pub fn new_len(&self) -> usize {
        self.sections
            .iter()
            .map(|s| match s {
                Section::Retain(n) => *n,
                Section::Replace { insert, .. } => insert.chars().count(),
            })
            .sum()
    }

    /// Returns `true` if the change leaves the document untouched.
    pub fn is_empty(&self) -> bool {
        self.sections
            .iter()
            .all(|s| matches!(s, Section::Retain(_)))
    }

    /// The replaced ranges as `(from, to, inserted)` in pre-change offsets.
    pub fn replacements(&self) -> Vec<(usize, usize, &str)> {
        let mut pos = 0;
        let mut out = Vec::new();
        for section in &self.sections {
            match section {
                Section::Retain(n) => pos += n,
                Section::Replace { delete, insert } => {
                    out.push((pos, pos + delete, insert.as_str()));
                    pos += delete;
                }
            }
        }
        out
    }

    /// Apply to `doc`, producing the changed document.
    pub fn apply(&self, doc: &Rope) -> Result<Rope, ChangeSetError> {
        self.check_len(doc.len_chars())?;

        let mut out = doc.clone();
        let mut pos = 0;
        for section in &self.sections {
            match section {
                Section::Retain(n) => pos += n,
                Section::Replace { delete, insert } => {
                    if *delete > 0 {
                        out.remove(pos..pos + delete);
                    }
                    if !insert.is_empty() {
                        out.insert(pos, insert);
                    }
                    pos += insert.chars().count();
                }
            }
        }
        Ok(out)
    }

    /// The change that undoes `self`, given the document `self` is applied to.
    pub fn invert(&self, doc: &Rope) -> Result<ChangeSet, ChangeSetError> {
        self.check_len(doc.len_chars())?;

        let mut builder = Builder::default();
        let mut pos = 0;
        for section in &self.sections {
            match section {
                Section::Retain(n) => {
                    builder.retain(*n);
                    pos += n;
                }
                Section::Replace { delete, insert } => {
                    let removed = doc.slice(pos..pos + delete).to_string();
                    builder.delete(insert.chars().count());
                    builder.insert(&removed);
                    pos += delete;
                }
            }
        }
        Ok(builder.finish())
    }

    /// The change equivalent to applying `self` and then `other`.
    pub fn compose(&self, other: &ChangeSet) -> Result<ChangeSet, ChangeSetError> {
        if self.new_len() != other.len() {
            return Err(ChangeSetError::LengthMismatch {
                expected: self.new_len(),
                actual: other.len(),
            });
        }

        let mut a_iter = self.atoms().into_iter();
        let mut b_iter = other.atoms().into_iter();
        let mut a = a_iter.next();
        let mut b = b_iter.next();
        let mut out = Builder::default();

        loop {
            match (a.take(), b.take()) {
                (None, None) => break,
                (Some(Atom::Delete(n)), rest_b) => {
                    out.delete(n);
                    a = a_iter.next();
                    b = rest_b;
                }
                (rest_a, Some(Atom::Insert(text))) => {
                    out.insert(&text);
                    a = rest_a;
                    b = b_iter.next();
                }
                (Some(Atom::Retain(x)), Some(Atom::Retain(y))) => {
                    let n = x.min(y);
                    out.retain(n);
                    a = shrink_count(x, n, Atom::Retain).or_else(|| a_iter.next());
                    b = shrink_count(y, n, Atom::Retain).or_else(|| b_iter.next());
                }
                (Some(Atom::Retain(x)), Some(Atom::Delete(y))) => {
                    let n = x.min(y);
                    out.delete(n);
                    a = shrink_count(x, n, Atom::Retain).or_else(|| a_iter.next());
                    b = shrink_count(y, n, Atom::Delete).or_else(|| b_iter.next());
                }
                (Some(Atom::Insert(text)), Some(Atom::Retain(y))) => {
                    let len = text.chars().count();
                    let n = len.min(y);
                    let (kept, rest) = text.split_at(byte_index(&text, n));
                    out.insert(kept);
                    a = (!rest.is_empty())
                        .then(|| Atom::Insert(rest.to_string()))
                        .or_else(|| a_iter.next());
                    b = shrink_count(y, n, Atom::Retain).or_else(|| b_iter.next());
                }
                (Some(Atom::Insert(text)), Some(Atom::Delete(y))) => {
                    // Text inserted by `self` and deleted by `other` never shows up.
                    let len = text.chars().count();
                    let n = len.min(y);
                    let rest = &text[byte_index(&text, n)..];
                    a = (!rest.is_empty())
                        .then(|| Atom::Insert(rest.to_string()))
                        .or_else(|| a_iter.next());
                    b = shrink_count(y, n, Atom::Delete).or_else(|| b_iter.next());
                }
                (None, Some(_)) | (Some(_), None) => {
                    return Err(ChangeSetError::LengthMismatch {
                        expected: self.new_len(),
                        actual: other.len(),
                    });
                }
            }
        }

        Ok(out.finish())
    }

    /// Parse the JSON array form.
    pub fn from_json(value: &Value) -> Result<Self, ChangeSetError> {
        let parts = value
            .as_array()
            .ok_or_else(|| ChangeSetError::Malformed("expected an array".to_string()))?;

        let mut builder = Builder::default();
        for part in parts {
            match part {
                Value::Number(n) => {
                    let len = n.as_u64().ok_or_else(|| {
                        ChangeSetError::Malformed(format!("invalid retain length {n}"))
                    })?;
                    builder.retain(len as usize);
                }
                Value::Array(items) => {
                    let delete = items.first().and_then(Value::as_u64).ok_or_else(|| {
                        ChangeSetError::Malformed("replacement without a deletion length".into())
                    })?;
                    let lines = items[1..]
                        .iter()
                        .map(|line| {
                            line.as_str().ok_or_else(|| {
                                ChangeSetError::Malformed(format!("non-string line {line}"))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    builder.delete(delete as usize);
                    builder.insert(&lines.join("\n"));
                }
                other => {
                    return Err(ChangeSetError::Malformed(format!(
                        "unexpected change section {other}"
                    )));
                }
            }
        }
        Ok(builder.finish())
    }

    /// The JSON array form.
    pub fn to_json(&self) -> Value {
        let parts = self
            .sections
            .iter()
            .map(|section| match section {
                Section::Retain(n) => Value::from(*n),
                Section::Replace { delete, insert } => {
                    let mut items = vec![Value::from(*delete)];
                    if !insert.is_empty() {
                        items.extend(insert.split('\n').map(Value::from));
                    }
                    Value::Array(items)
                }
            })
            .collect();
        Value::Array(parts)
    }

    fn check_len(&self, actual: usize) -> Result<(), ChangeSetError> {
        let expected = self.len();
        if expected != actual {
            return Err(ChangeSetError::LengthMismatch { expected, actual });
        }
        Ok(())
    }

    fn atoms(&self) -> Vec<Atom> {
        let mut atoms = Vec::with_capacity(self.sections.len() * 2);
        for section in &self.sections {
            match section {
                Section::Retain(n) => atoms.push(Atom::Retain(*n)),
                Section::Replace { delete, insert } => {
                    if *delete > 0 {
                        atoms.push(Atom::Delete(*delete));
                    }
                    if !insert.is_empty() {
                        atoms.push(Atom::Insert(insert.clone()));
                    }
                }
            }
        }
        atoms
    }
}

impl Serialize for ChangeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Value::Array(parts) = self.to_json() else {
            return serializer.serialize_seq(Some(0))?.end();
        };
        let mut seq = serializer.serialize_seq(Some(parts.len()))?;
        for part in &parts {
            seq.serialize_element(part)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ChangeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ChangeSet::from_json(&value).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
    Retain(usize),
    Delete(usize),
    Insert(String),
}

fn shrink_count(len: usize, taken: usize, make: fn(usize) -> Atom) -> Option<Atom> {
    (len > taken).then(|| make(len - taken))
}

/// Accumulates sections, merging neighbours of the same kind and dropping empty ones.
#[derive(Default)]
struct Builder {
    sections: Vec<Section>,
}

impl Builder {
    fn retain(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        if let Some(Section::Retain(len)) = self.sections.last_mut() {
            *len += n;
        } else {
            self.sections.push(Section::Retain(n));
        }
    }

    fn delete(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        if let Some(Section::Replace { delete, .. }) = self.sections.last_mut() {
            *delete += n;
        } else {
            self.sections.push(Section::Replace {
                delete: n,
                insert: String::new(),
            });
        }
    }

    fn insert(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Section::Replace { insert, .. }) = self.sections.last_mut() {
            insert.push_str(text);
        } else {
            self.sections.push(Section::Replace {
                delete: 0,
                insert: text.to_string(),
            });
        }
    }

    fn finish(self) -> ChangeSet {
        ChangeSet {
            sections: self.sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_replace() {
        let doc = Rope::from_str("hello world");
        let change = ChangeSet::replace(11, 6, 11, "rust").unwrap();
        assert_eq!(change.apply(&doc).unwrap().to_string(), "hello rust");
        assert_eq!(change.len(), 11);
        assert_eq!(change.new_len(), 10);
    }

    #[test]
    fn test_invert_restores_document() {
        let doc = Rope::from_str("abc\ndef");
        let change = ChangeSet::replace(7, 2, 5, "XY").unwrap();
        let after = change.apply(&doc).unwrap();
        assert_eq!(after.to_string(), "abXYef");

        let inverse = change.invert(&doc).unwrap();
        assert_eq!(inverse.apply(&after).unwrap().to_string(), "abc\ndef");
    }

    #[test]
    fn test_compose_matches_sequential_application() {
        let doc = Rope::from_str("one two");
        let first = ChangeSet::insert(7, 3, ",").unwrap();
        let second = ChangeSet::replace(8, 5, 8, "three").unwrap();

        let composed = first.compose(&second).unwrap();
        let sequential = second.apply(&first.apply(&doc).unwrap()).unwrap();
        assert_eq!(composed.apply(&doc).unwrap(), sequential);
        assert_eq!(sequential.to_string(), "one, three");
    }

    #[test]
    fn test_compose_insert_then_delete_cancels() {
        let first = ChangeSet::insert(3, 1, "zz").unwrap();
        let second = ChangeSet::delete(5, 1, 3).unwrap();
        let composed = first.compose(&second).unwrap();
        assert!(composed.is_empty());
        assert_eq!(composed, ChangeSet::empty(3));
    }

    #[test]
    fn test_compose_length_mismatch() {
        let first = ChangeSet::insert(3, 0, "a").unwrap();
        let err = first.compose(&ChangeSet::empty(3)).unwrap_err();
        assert_eq!(
            err,
            ChangeSetError::LengthMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_apply_wrong_length() {
        let change = ChangeSet::empty(4);
        assert!(change.apply(&Rope::from_str("abc")).is_err());
    }

    #[test]
    fn test_json_form() {
        let change = ChangeSet::replace(10, 2, 4, "a\nb").unwrap();
        assert_eq!(change.to_json(), json!([2, [2, "a", "b"], 6]));
        assert_eq!(ChangeSet::from_json(&change.to_json()).unwrap(), change);

        let deletion = ChangeSet::delete(5, 0, 2).unwrap();
        assert_eq!(deletion.to_json(), json!([[2], 3]));
    }

    #[test]
    fn test_json_rejects_garbage() {
        assert!(ChangeSet::from_json(&json!({"a": 1})).is_err());
        assert!(ChangeSet::from_json(&json!([["x"]])).is_err());
        assert!(ChangeSet::from_json(&json!([[1, 2]])).is_err());
    }

    #[test]
    fn test_replacements_in_input_offsets() {
        let change = ChangeSet::from_json(&json!([1, [2, "x"], 3, [0, "y"]])).unwrap();
        assert_eq!(change.replacements(), vec![(1, 3, "x"), (6, 6, "y")]);
    }
}
