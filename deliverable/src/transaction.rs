//! Per-transaction state shared between the MAIL and RCPT checks.

use std::fmt::{self, Display};

use deliverable_common::internal;

/// The flavour of a result annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Pass,
    Msg,
    Err,
    Skip,
}

impl Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "pass",
            Self::Msg => "msg",
            Self::Err => "err",
            Self::Skip => "skip",
        })
    }
}

/// A single diagnostic note left on a transaction by a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub text: String,
    /// Log the annotation as soon as it is recorded
    pub emit: bool,
}

impl Annotation {
    fn new(kind: AnnotationKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            emit: false,
        }
    }

    #[must_use]
    pub fn pass(text: impl Into<String>) -> Self {
        Self::new(AnnotationKind::Pass, text)
    }

    #[must_use]
    pub fn msg(text: impl Into<String>) -> Self {
        Self::new(AnnotationKind::Msg, text)
    }

    #[must_use]
    pub fn err(text: impl Into<String>) -> Self {
        Self::new(AnnotationKind::Err, text)
    }

    #[must_use]
    pub fn skip(text: impl Into<String>) -> Self {
        Self::new(AnnotationKind::Skip, text)
    }

    #[must_use]
    pub const fn emitted(mut self) -> Self {
        self.emit = true;
        self
    }
}

impl Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.text)
    }
}

/// Annotations in the order they were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Results {
    annotations: Vec<Annotation>,
}

impl Results {
    pub fn add(&mut self, annotation: Annotation) {
        if annotation.emit {
            internal!(level = INFO, "{annotation}");
        }
        self.annotations.push(annotation);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    /// All annotation texts of the given kind.
    pub fn of_kind(&self, kind: AnnotationKind) -> impl Iterator<Item = &str> {
        self.annotations
            .iter()
            .filter(move |annotation| annotation.kind == kind)
            .map(|annotation| annotation.text.as_str())
    }

    #[must_use]
    pub fn contains(&self, kind: AnnotationKind, text: &str) -> bool {
        self.of_kind(kind).any(|t| t == text)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

/// One SMTP transaction, from MAIL FROM until it is reset or completed.
///
/// Owned by the caller and passed by reference into each check, so that
/// separate transactions never share anything.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    local_sender: bool,
    results: Results,
}

impl Transaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the MAIL FROM address was verified as a local mailbox.
    #[must_use]
    pub const fn local_sender(&self) -> bool {
        self.local_sender
    }

    /// Only the MAIL FROM check sets this, and only once.
    pub(crate) fn mark_local_sender(&mut self) {
        if !self.local_sender {
            self.local_sender = true;
            internal!(level = DEBUG, "Sender marked as local");
        }
    }

    #[must_use]
    pub const fn results(&self) -> &Results {
        &self.results
    }

    pub(crate) fn annotate(&mut self, annotation: Annotation) {
        self.results.add(annotation);
    }
}
