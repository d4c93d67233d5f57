use serde::{Deserialize, Serialize};

use std::fmt;

use crate::error::{Error, Result};
use crate::signature::Signature;

/// Label of one reference group, e.g. `healthy` or `rust`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// Reference signatures grouped by category.
///
/// Categories keep the order they were added in; the matcher walks them in
/// that order, so it decides ties. Every signature has the same length.
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    groups: Vec<(Category, Vec<Signature>)>,
    signature_len: Option<usize>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A corpus whose categories are declared up front, all empty.
    pub fn with_categories<I, C>(categories: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Category>,
    {
        let mut corpus = Self::new();
        for category in categories {
            corpus.add_category(category.into());
        }
        corpus
    }

    /// Declares a category if it is not known yet.
    pub fn add_category(&mut self, category: Category) {
        if self.position(&category).is_none() {
            self.groups.push((category, vec![]));
        }
    }

    /// Adds a reference signature, declaring its category if needed.
    pub fn insert(&mut self, category: Category, signature: Signature) -> Result<()> {
        match self.signature_len {
            Some(expected) if expected != signature.len() => {
                return Err(Error::SignatureLength {
                    expected,
                    found: signature.len(),
                })
            }
            _ => self.signature_len = Some(signature.len()),
        }
        let index = match self.position(&category) {
            Some(i) => i,
            None => {
                self.groups.push((category, vec![]));
                self.groups.len() - 1
            }
        };
        self.groups[index].1.push(signature);
        Ok(())
    }

    /// Adds a batch of signatures to one category. Either all of them are
    /// added or, on a length mismatch, none are and the corpus is unchanged.
    pub fn extend<I>(&mut self, category: Category, signatures: I) -> Result<()>
    where
        I: IntoIterator<Item = Signature>,
    {
        let signatures: Vec<Signature> = signatures.into_iter().collect();
        let expected = self
            .signature_len
            .or_else(|| signatures.first().map(Signature::len));
        if let Some(expected) = expected {
            if let Some(bad) = signatures.iter().find(|s| s.len() != expected) {
                return Err(Error::SignatureLength {
                    expected,
                    found: bad.len(),
                });
            }
            self.signature_len = Some(expected);
        }

        self.add_category(category.clone());
        if let Some(index) = self.position(&category) {
            self.groups[index].1.extend(signatures);
        }
        Ok(())
    }

    pub fn get(&self, category: &Category) -> Option<&[Signature]> {
        self.position(category).map(|i| self.groups[i].1.as_slice())
    }

    /// Categories with their signatures, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Category, &[Signature])> {
        self.groups.iter().map(|(c, s)| (c, s.as_slice()))
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.groups.iter().map(|(c, _)| c)
    }

    /// Length shared by every stored signature, once one has been added.
    pub fn signature_len(&self) -> Option<usize> {
        self.signature_len
    }

    pub fn sample_count(&self) -> usize {
        self.groups.iter().map(|(_, s)| s.len()).sum()
    }

    /// True when no category holds a single signature.
    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    fn position(&self, category: &Category) -> Option<usize> {
        self.groups.iter().position(|(c, _)| c == category)
    }
}
