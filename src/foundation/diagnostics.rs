use std::fmt;

/// Category of a recovered, element-level problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Element was malformed and dropped.
    Validation,
    /// A size/position string was malformed; a default was applied.
    UnitResolution,
    /// The element's source could not be acquired; the element was dropped.
    Fetch,
    /// Timeline input was unusual (never visible, invalid speed/volume, ...).
    Timeline,
    /// An animation entry was ignored or adjusted.
    Animation,
}

/// Location inside the input scene document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathElem {
    /// Object field.
    Field(&'static str),
    /// Array index.
    Index(usize),
}

/// Format a path as `$.elements[2].source`.
pub fn format_path(path: &[PathElem]) -> String {
    let mut s = String::from("$");
    for p in path {
        match *p {
            PathElem::Field(name) => {
                s.push('.');
                s.push_str(name);
            }
            PathElem::Index(i) => {
                s.push('[');
                s.push_str(&i.to_string());
                s.push(']');
            }
        }
    }
    s
}

/// One recovered problem, attributed to an element where possible.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Diagnostic {
    /// Problem category.
    pub kind: DiagnosticKind,
    /// Element id, when the element had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    /// JSON-path-like location (`$.elements[0].width`).
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Build a diagnostic at `path`.
    pub fn at(
        kind: DiagnosticKind,
        element_id: Option<&str>,
        path: &[PathElem],
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            element_id: element_id.map(str::to_owned),
            path: format_path(path),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.element_id {
            Some(id) => write!(f, "{} [{}]: {}", self.path, id, self.message),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// Observer for recovered problems.
///
/// Every resolution stage takes a `&mut dyn DiagnosticSink` instead of logging globally, so the
/// stages stay pure functions of their inputs plus this observer.
pub trait DiagnosticSink {
    /// Record one diagnostic.
    fn record(&mut self, diagnostic: Diagnostic);
}

/// Collecting sink; keeps diagnostics in arrival order.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow collected diagnostics.
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Number of collected diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Diagnostics of one kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    /// Consume the collector.
    pub fn into_items(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl DiagnosticSink for Diagnostics {
    fn record(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(%diagnostic, "diagnostic recorded");
        self.items.push(diagnostic);
    }
}

/// A sink bound to one element, so stages can report against `$.elements[i].<field>`.
pub struct ElementScope<'a> {
    /// Element id.
    pub element_id: &'a str,
    /// Element location in the input document.
    pub origin: &'a [PathElem],
    /// Underlying sink.
    pub sink: &'a mut dyn DiagnosticSink,
}

impl<'a> ElementScope<'a> {
    /// Bind `sink` to the element at `origin`.
    pub fn new(element_id: &'a str, origin: &'a [PathElem], sink: &'a mut dyn DiagnosticSink) -> Self {
        Self {
            element_id,
            origin,
            sink,
        }
    }

    /// Record a diagnostic on `field` of this element, or on the element itself.
    pub fn report(&mut self, kind: DiagnosticKind, field: Option<&'static str>, msg: impl Into<String>) {
        let mut path = self.origin.to_vec();
        if let Some(f) = field {
            path.push(PathElem::Field(f));
        }
        self.sink
            .record(Diagnostic::at(kind, Some(self.element_id), &path, msg));
    }
}

/// Sink that only logs; useful when nobody inspects the diagnostics afterwards.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(kind = ?diagnostic.kind, %diagnostic, "element problem");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/diagnostics.rs"]
mod tests;
