use std::ops::Deref;

use annotate_snippets::{
    display_list::{DisplayList, FormatOptions},
    snippet::{Annotation, AnnotationType, Slice, Snippet, SourceAnnotation},
};

/// A value together with the source region it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Span<'a, T>
where
    T: 'a,
{
    inner: T,
    pub filename: &'a str,
    pub source: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a, T> Deref for Span<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'a, T> Span<'a, T> {
    pub fn new(inner: T, filename: &'a str, source: &'a str, start: usize, end: usize) -> Self {
        Self {
            inner,
            filename,
            source,
            start,
            end,
        }
    }

    pub fn from_pest(inner: T, filename: &'a str, source: &'a str, span: pest::Span<'a>) -> Self {
        Self::new(inner, filename, source, span.start(), span.end())
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Whole lines of the source covering the span.
    pub fn lines(&self) -> Option<LinesInfo<'a>> {
        if self.start > self.source.len() {
            return None;
        }
        let mut start = self.start;
        let mut end = self.end.clamp(start, self.source.len());
        if start == end {
            // Empty spans cover the next character, or the last one at the end of input.
            match self.source[end..].chars().next() {
                Some(c) => end += c.len_utf8(),
                None => {
                    if let Some(c) = self.source[..start].chars().next_back() {
                        start -= c.len_utf8();
                    }
                }
            }
        }

        let first = self.source[..start].rfind('\n').map_or(0, |i| i + 1);
        let last = self.source[end..]
            .find('\n')
            .map_or(self.source.len(), |i| end + i + 1);
        let line_start = self.source[..first].matches('\n').count() + 1;

        Some(LinesInfo {
            filename: self.filename,
            source: &self.source[first..last],
            line_start,
            range: (start - first, end - first),
        })
    }

    /// Render `message` pointing at the span as a diagnostic.
    pub fn render(&self, title: &str, message: &str, color: bool) -> String {
        let lines = self.lines().unwrap_or_default();
        let snippet = Snippet {
            title: Some(Annotation {
                id: None,
                label: Some(title),
                annotation_type: AnnotationType::Error,
            }),
            footer: vec![],
            slices: vec![lines.as_annotation(message, AnnotationType::Error)],
            opt: FormatOptions {
                color,
                ..Default::default()
            },
        };
        DisplayList::from(snippet).to_string()
    }
}

/// Lines of source around a span.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinesInfo<'a> {
    pub filename: &'a str,
    pub source: &'a str,
    /// One-based number of the first line.
    pub line_start: usize,
    /// The span relative to `source`.
    pub range: (usize, usize),
}

impl<'a> LinesInfo<'a> {
    pub fn as_annotation(&self, message: &'a str, annotation_type: AnnotationType) -> Slice<'a> {
        Slice {
            source: self.source,
            line_start: self.line_start.max(1),
            origin: Some(self.filename),
            annotations: vec![SourceAnnotation {
                range: self.range,
                label: message,
                annotation_type,
            }],
            fold: true,
        }
    }
}
