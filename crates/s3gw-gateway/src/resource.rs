//! Resolution of request paths into storage locations.

/// Container and key addressed by a request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePath {
    /// Bucket name. Empty for service-level requests.
    pub container: String,
    /// First key segment below the bucket. Empty when absent.
    pub key: String,
}

impl ResourcePath {
    /// Parse a request path, ignoring any query string.
    ///
    /// Only the first key segment is kept: `/bucket/a/b.txt` resolves to
    /// container `bucket` and key `a`.
    pub fn parse(path_and_query: &str) -> Self {
        let path = path_and_query
            .split_once('?')
            .map_or(path_and_query, |(path, _)| path);

        let mut segments = path.split('/').skip(1);
        let container = segments.next().unwrap_or_default().to_string();
        let key = segments.next().unwrap_or_default().to_string();
        Self { container, key }
    }

    /// Normalized `/container[/key]` location.
    pub fn location(&self) -> String {
        if self.key.is_empty() {
            format!("/{}", self.container)
        } else {
            format!("/{}/{}", self.container, self.key)
        }
    }

    /// Whether the request addresses a bucket.
    pub fn has_container(&self) -> bool {
        !self.container.is_empty()
    }

    /// Whether the path resolves to itself once relayed.
    ///
    /// URL parsers collapse `.` and `..` segments, also percent-encoded
    /// (`%2e`) and when separated by `\`, so a path holding one would be
    /// authorized for one location and served from another. Empty segments
    /// are rejected too, except a trailing one (`/bucket/`).
    pub fn is_canonical(path_and_query: &str) -> bool {
        let path = path_and_query
            .split_once('?')
            .map_or(path_and_query, |(path, _)| path);
        let Some(rest) = path.strip_prefix('/') else {
            return path.is_empty();
        };

        let segments: Vec<&str> = rest.split(|c: char| c == '/' || c == '\\').collect();
        let last = segments.len().saturating_sub(1);
        segments.iter().enumerate().all(|(i, segment)| {
            if segment.is_empty() {
                i == last
            } else {
                !is_dot_segment(segment)
            }
        })
    }
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}
