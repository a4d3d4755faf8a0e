pub type Span = std::ops::Range<usize>;

/// A span inside a named source, usable as an [`ariadne`] label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub span: Span,
    pub path: String,
}

impl Location {
    pub fn new(span: Span, path: &str) -> Self {
        Self {
            span,
            path: path.to_string(),
        }
    }
}

impl ariadne::Span for Location {
    type SourceId = String;

    fn source(&self) -> &Self::SourceId {
        &self.path
    }

    fn start(&self) -> usize {
        self.span.start
    }

    fn end(&self) -> usize {
        self.span.end
    }
}

/// A node together with the span it was parsed from.
#[derive(Clone, Debug, PartialEq)]
pub struct WithMeta<T>(pub T, pub Span);
