//! Query-string helpers shared by the request builder, pagination and login.
//!
//! Every helper accepts absolute URLs as well as bare endpoints such as
//! `/me?fields=id`.

use std::collections::BTreeMap;

use url::form_urlencoded;

/// Drop the given keys from the query string.
pub fn remove_params_from_url(url: &str, keys: &[&str]) -> String {
    let (base, query, fragment) = split_url(url);
    let Some(query) = query else {
        return url.to_string();
    };
    let kept: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .filter(|(key, _)| !keys.contains(&key.as_str()))
        .collect();
    join_url(base, &kept, fragment)
}

/// Append params to the query string. A key already present in the URL keeps
/// its value.
pub fn append_params_to_url<'a, I>(url: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let (base, query, fragment) = split_url(url);
    let mut pairs: Vec<(String, String)> = query
        .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    let mut added = false;
    for (key, value) in params {
        if pairs.iter().any(|(existing, _)| existing == key) {
            continue;
        }
        pairs.push((key.to_string(), value.to_string()));
        added = true;
    }
    if !added && query.is_none() {
        return url.to_string();
    }
    join_url(base, &pairs, fragment)
}

/// Decode the query string into a map. Later duplicates win.
pub fn params_from_url(url: &str) -> BTreeMap<String, String> {
    let (_, query, _) = split_url(url);
    query
        .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

pub fn force_slash_prefix(endpoint: &str) -> String {
    if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    }
}

/// Reduce a Graph URL to its endpoint: scheme, host and the leading version
/// segment are dropped, the query is kept.
///
/// `https://graph.facebook.com/v2.8/me/photos?after=x` becomes
/// `/me/photos?after=x`.
pub fn base_graph_url_endpoint(url: &str) -> String {
    let without_origin = match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find(['/', '?']) {
                Some(path_start) => &rest[path_start..],
                None => "/",
            }
        }
        None => url,
    };
    let endpoint = force_slash_prefix(without_origin);

    let (path, query) = match endpoint.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (endpoint.as_str(), None),
    };
    let path = strip_version_segment(path);
    let path = if path.is_empty() { "/" } else { path };
    match query {
        Some(query) if !query.is_empty() => format!("{path}?{query}"),
        _ => path.to_string(),
    }
}

/// `/v2.8/me` -> `/me`, `/v1337` -> ``. Anything else is left alone.
fn strip_version_segment(path: &str) -> &str {
    let Some(rest) = path.strip_prefix("/v") else {
        return path;
    };
    let segment_end = rest.find('/').unwrap_or(rest.len());
    let segment = &rest[..segment_end];
    let mut parts = segment.splitn(2, '.');
    let major = parts.next().unwrap_or_default();
    let minor_ok = parts
        .next()
        .is_none_or(|minor| !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit()));
    if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) || !minor_ok {
        return path;
    }
    &rest[segment_end..]
}

fn split_url(url: &str) -> (&str, Option<&str>, Option<&str>) {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (url, None),
    };
    match rest.split_once('?') {
        Some((base, query)) => (base, Some(query), fragment),
        None => (rest, None, fragment),
    }
}

fn join_url(base: &str, pairs: &[(String, String)], fragment: Option<&str>) -> String {
    let mut url = base.to_string();
    if !pairs.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        url.push('?');
        url.push_str(&query);
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_only_named_params() {
        assert_eq!(
            remove_params_from_url("/me?foo=bar&access_token=abc&appsecret_proof=p", &[
                "access_token",
                "appsecret_proof"
            ]),
            "/me?foo=bar"
        );
        assert_eq!(
            remove_params_from_url("https://example.com/cb?code=1&state=2", &["code", "state"]),
            "https://example.com/cb"
        );
        assert_eq!(remove_params_from_url("/me", &["code"]), "/me");
    }

    #[test]
    fn append_keeps_existing_values() {
        let url = append_params_to_url("/v2.8/me?fields=id", [
            ("fields", "name"),
            ("access_token", "foo token"),
        ]);
        assert_eq!(url, "/v2.8/me?fields=id&access_token=foo+token");
        assert_eq!(append_params_to_url("/me", []), "/me");
    }

    #[test]
    fn base_endpoint_drops_origin_and_version() {
        assert_eq!(
            base_graph_url_endpoint("https://graph.facebook.com/v2.8/998899/photos?after=abc"),
            "/998899/photos?after=abc"
        );
        assert_eq!(
            base_graph_url_endpoint("https://graph.beta.facebook.com/v1337/me"),
            "/me"
        );
        assert_eq!(base_graph_url_endpoint("/v2.8"), "/");
        assert_eq!(base_graph_url_endpoint("/vacation/photos"), "/vacation/photos");
        assert_eq!(base_graph_url_endpoint("me/friends"), "/me/friends");
    }

    #[test]
    fn params_are_decoded() {
        let params = params_from_url("https://www.facebook.com/cb?code=foo%20code&state=s");
        assert_eq!(params.get("code").map(String::as_str), Some("foo code"));
        assert_eq!(params.get("state").map(String::as_str), Some("s"));
    }
}
