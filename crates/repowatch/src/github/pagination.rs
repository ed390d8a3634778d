//! `Link` header parsing for paginated endpoints.

/// Pagination hints extracted from a `Link` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkPagination {
    /// Whether a rel="next" link was present.
    pub has_next: bool,
}

/// Parse the Link header to extract pagination info.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/repositories/1/commits?per_page=100&page=2>; rel="next", <...&page=3>; rel="last"`
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let has_next = link_header.split(',').any(|part| {
        let mut segments = part.trim().split(';').map(str::trim);
        let has_url = segments
            .next()
            .is_some_and(|url| url.starts_with('<') && url.ends_with('>'));
        has_url
            && segments.any(|segment| {
                segment
                    .strip_prefix("rel=")
                    .is_some_and(|rel| rel.trim_matches('"') == "next")
            })
    });
    LinkPagination { has_next }
}
