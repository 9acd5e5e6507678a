//! Fills the details/state format strings from data sources.
//!
//! Both lines are treated as one logical string, details first, so
//! placeholders are consumed left to right across the two lines in
//! `format_args` order. Arguments that do not name a known data source are
//! skipped without consuming a placeholder. Placeholders left over once the
//! arguments run out stay in the output verbatim.
//!
//! Each line keeps its own cursor past the last substitution, so a value
//! is never searched for further placeholders and the two lines are never
//! joined on `\n` and split back apart. A value containing `%s` or a
//! newline therefore lands in its line as-is, where a replace-first pass
//! over the joined string would fill into the value or shift text into the
//! state line. For plain values both approaches give the same output.

use super::sources::DataSourceId;

/// Substitution marker inside a format string
pub const PLACEHOLDER: &str = "%s";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    pub details_format: String,
    pub state_format: String,
    /// Data source names in fill order; unknown names are ignored
    pub format_args: Vec<String>,
}

impl FormatSpec {
    pub fn new(
        details_format: impl Into<String>,
        state_format: impl Into<String>,
        format_args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            details_format: details_format.into(),
            state_format: state_format.into(),
            format_args: format_args.into_iter().map(Into::into).collect(),
        }
    }

    /// Total placeholders across both lines
    pub fn placeholder_count(&self) -> usize {
        self.details_format.matches(PLACEHOLDER).count()
            + self.state_format.matches(PLACEHOLDER).count()
    }
}

/// Resolve `formats` into `(details, state)`.
///
/// `lookup` is called lazily, once per placeholder actually filled, so a
/// data source that no placeholder consumes is never queried.
pub fn resolve<F>(formats: &FormatSpec, mut lookup: F) -> (String, String)
where
    F: FnMut(DataSourceId) -> String,
{
    let mut details = Line::new(&formats.details_format);
    let mut state = Line::new(&formats.state_format);

    for arg in &formats.format_args {
        let Ok(id) = arg.parse::<DataSourceId>() else {
            continue;
        };

        let line = if details.has_placeholder() {
            &mut details
        } else if state.has_placeholder() {
            &mut state
        } else {
            break;
        };
        line.fill(&lookup(id));
    }

    (details.finish(), state.finish())
}

/// A format string being filled; `rest` is the part not yet scanned
struct Line<'a> {
    out: String,
    rest: &'a str,
}

impl<'a> Line<'a> {
    fn new(format: &'a str) -> Self {
        Self {
            out: String::with_capacity(format.len()),
            rest: format,
        }
    }

    fn has_placeholder(&self) -> bool {
        self.rest.contains(PLACEHOLDER)
    }

    fn fill(&mut self, value: &str) {
        if let Some(at) = self.rest.find(PLACEHOLDER) {
            self.out.push_str(&self.rest[..at]);
            self.out.push_str(value);
            self.rest = &self.rest[at + PLACEHOLDER.len()..];
        }
    }

    fn finish(mut self) -> String {
        self.out.push_str(self.rest);
        self.out
    }
}
