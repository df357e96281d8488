//! Splits a push-gateway URL into its scheme+host and port+path halves.
//!
//! `PROMETHEUS_PUSH_URL` must look like `[scheme://]host[:port][/path]`.
//! The scheme defaults to `http` (a push gateway normally sits on a trusted
//! network); `https` is accepted, anything else is rejected, as are query
//! strings, fragments and userinfo. The colon before the port is omitted
//! from the second half on purpose: the consumer joins the parts itself.

use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitUrl {
    /// `scheme://host`, e.g. `http://pushgateway.internal`.
    pub schemehost: String,
    /// `[port][/path]`, e.g. `9091/metrics`.
    pub portpath: String,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SplitUrlError {
    #[error("failed to parse URL: {0}")]
    Bad(#[from] url::ParseError),
    #[error("unexpected scheme {0} (expected http or https)")]
    UnexpectedScheme(String),
    #[error("URL must not contain a query")]
    HasQuery,
    #[error("URL must not contain a fragment")]
    HasFragment,
    #[error("URL must not contain userinfo")]
    HasUserinfo,
    #[error("URL has no host")]
    NoHost,
}

pub fn split_url(url: &str) -> Result<SplitUrl, SplitUrlError> {
    let normalized;
    let url = if url.starts_with("http://") || url.starts_with("https://") {
        url
    } else if let Some((scheme, _)) = url.split_once("://") {
        return Err(SplitUrlError::UnexpectedScheme(scheme.to_string()));
    } else {
        normalized = format!("http://{url}");
        &normalized
    };

    let parsed = Url::parse(url)?;
    if parsed.query().is_some() {
        return Err(SplitUrlError::HasQuery);
    }
    if parsed.fragment().is_some() {
        return Err(SplitUrlError::HasFragment);
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(SplitUrlError::HasUserinfo);
    }
    let host = parsed.host_str().ok_or(SplitUrlError::NoHost)?;

    let path = match parsed.path() {
        "/" => "",
        path => path,
    };
    let portpath = match parsed.port() {
        Some(port) => format!("{port}{path}"),
        None => path.to_string(),
    };

    Ok(SplitUrl {
        schemehost: format!("{}://{host}", parsed.scheme()),
        portpath,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(url: &str) -> SplitUrl {
        split_url(url).unwrap()
    }

    #[test]
    fn splits_full_url() {
        let s = split("https://example.com:9091/metrics");
        assert_eq!(s.schemehost, "https://example.com");
        assert_eq!(s.portpath, "9091/metrics");
    }

    #[test]
    fn scheme_defaults_to_http() {
        let s = split("pushgateway.internal:9091");
        assert_eq!(s.schemehost, "http://pushgateway.internal");
        assert_eq!(s.portpath, "9091");
    }

    #[test]
    fn port_and_path_are_optional() {
        assert_eq!(split("example.com").portpath, "");
        assert_eq!(split("example.com/push").portpath, "/push");
        assert_eq!(split("http://example.com/").portpath, "");
    }

    #[test]
    fn ipv6_hosts_keep_their_brackets() {
        let s = split("http://[::1]:9091");
        assert_eq!(s.schemehost, "http://[::1]");
        assert_eq!(s.portpath, "9091");
    }

    #[test]
    fn rejects_foreign_schemes() {
        assert_eq!(
            split_url("ftp://example.com"),
            Err(SplitUrlError::UnexpectedScheme("ftp".to_string()))
        );
    }

    #[test]
    fn rejects_query_fragment_userinfo() {
        assert_eq!(split_url("example.com/p?q=1"), Err(SplitUrlError::HasQuery));
        assert_eq!(split_url("example.com/p#frag"), Err(SplitUrlError::HasFragment));
        assert_eq!(
            split_url("http://user@example.com"),
            Err(SplitUrlError::HasUserinfo)
        );
        assert_eq!(
            split_url("http://user:pw@example.com"),
            Err(SplitUrlError::HasUserinfo)
        );
    }
}
