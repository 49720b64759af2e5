use chrono::NaiveDate;
use url::Url;

/// File naming scheme for downloaded pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageNaming {
    /// `<last path segment>.html`
    DetailSlug,
    /// `<prefix>_<YYYY-MM-DD>_<n>.html` with `n` counted from 1
    DatedIndex { prefix: String, date: NaiveDate },
}

impl PageNaming {
    /// Dated naming stamped with today's local date
    pub fn dated_today(prefix: impl Into<String>) -> Self {
        Self::DatedIndex {
            prefix: prefix.into(),
            date: chrono::Local::now().date_naive(),
        }
    }

    /// File name of the page at `index` (0-based) in the frontier
    pub fn file_name(&self, index: usize, url: &str) -> String {
        match self {
            Self::DetailSlug => format!("{}.html", slug(url, index)),
            Self::DatedIndex { prefix, date } => {
                format!("{}_{}_{}.html", prefix, date.format("%Y-%m-%d"), index + 1)
            }
        }
    }
}

/// Last non-empty path segment of `url`
///
/// Falls back to `page-<n>` when the URL has no usable segment.
fn slug(url: &str, index: usize) -> String {
    let segment = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
    });

    match segment {
        Some(segment) if !segment.contains("..") => segment,
        _ => format!("page-{}", index + 1),
    }
}
