//! URL Helpers
//!
//! Query-string edits on absolute or relative URLs without a URL parser.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped in query keys and values (`application/x-www-form-urlencoded`)
pub const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'*');

/// Percent-encode one key or value for a query string or form body
pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY).to_string()
}

/// Decode one key or value, treating `+` as a space
pub fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Split into (path part, query, fragment); the path part keeps any origin
pub fn split(url: &str) -> (&str, Option<&str>, Option<&str>) {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (url, None),
    };
    match rest.split_once('?') {
        Some((path, query)) => (path, Some(query), fragment),
        None => (rest, None, fragment),
    }
}

/// URL without query or fragment
pub fn path_of(url: &str) -> &str {
    split(url).0
}

/// `scheme://host[:port]` of an absolute URL
pub fn origin_of(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")?;
    let after = &url[scheme_end + 3..];
    let host_end = after.find(['/', '?', '#']).unwrap_or(after.len());
    Some(&url[..scheme_end + 3 + host_end])
}

/// Decoded value of the first `name` parameter
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query, _) = split(url);
    query?
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| decode_component(key) == name)
        .map(|(_, value)| decode_component(value))
}

fn rebuild(path: &str, pairs: &[String], fragment: Option<&str>) -> String {
    let mut url = path.to_string();
    if !pairs.is_empty() {
        url.push('?');
        url.push_str(&pairs.join("&"));
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

/// Set (`Some`) or delete (`None`) parameter `name`, keeping every other parameter
pub fn with_query_param(url: &str, name: &str, value: Option<&str>) -> String {
    let (path, query, fragment) = split(url);
    let mut pairs: Vec<String> = query
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| decode_component(pair.split_once('=').map_or(*pair, |(key, _)| key)) != name)
        .map(str::to_string)
        .collect();
    if let Some(value) = value {
        pairs.push(format!("{}={}", encode_component(name), encode_component(value)));
    }
    rebuild(path, &pairs, fragment)
}

/// Append `name=value` even if `name` is already present
pub fn append_query_param(url: &str, name: &str, value: &str) -> String {
    let (path, query, fragment) = split(url);
    let mut pairs: Vec<String> = query
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(str::to_string)
        .collect();
    pairs.push(format!("{}={}", encode_component(name), encode_component(value)));
    rebuild(path, &pairs, fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split() {
        assert_eq!(split("https://a.test/x/?q=1#top"), ("https://a.test/x/", Some("q=1"), Some("top")));
        assert_eq!(split("/x/"), ("/x/", None, None));
    }

    #[test]
    fn test_origin() {
        assert_eq!(origin_of("https://vote.example:8000/browse/?q=1"), Some("https://vote.example:8000"));
        assert_eq!(origin_of("https://vote.example"), Some("https://vote.example"));
        assert_eq!(origin_of("/relative/"), None);
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("/browse/?page=2&q=foo+bar", "q"), Some("foo bar".to_string()));
        assert_eq!(query_param("/browse/?q=%C3%A9t%C3%A9", "q"), Some("été".to_string()));
        assert_eq!(query_param("/browse/", "q"), None);
    }

    #[test]
    fn test_set_and_delete_param() {
        assert_eq!(
            with_query_param("https://a.test/browse/?page=2#g", "q", Some("a&b")),
            "https://a.test/browse/?page=2&q=a%26b#g"
        );
        assert_eq!(with_query_param("/browse/?q=old&page=2", "q", Some("new")), "/browse/?page=2&q=new");
        assert_eq!(with_query_param("/browse/?q=old", "q", None), "/browse/");
    }

    #[test]
    fn test_append_param() {
        assert_eq!(append_query_param("/vote/hide/3/", "ajax", "yeah"), "/vote/hide/3/?ajax=yeah");
        assert_eq!(append_query_param("/v/?next=%2F", "ajax", "yeah"), "/v/?next=%2F&ajax=yeah");
    }
}
