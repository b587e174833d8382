//! Public asset path grammar.
//!
//! Three shapes are recognised, tried in this order:
//! ```text
//! /public/subdomain-alias/{alias}/{subpath*}
//! /public/{owner}/{repo}/alias/{alias}/{subpath*}
//! /public/{owner}/{repo}/{ref}/{subpath*}
//! ```
//! Anything else is not a public asset path and is left alone.

/// Path prefix for all public asset requests.
pub const PUBLIC_PREFIX: &str = "/public/";

/// First segment marking the wildcard-subdomain grammar.
pub const SUBDOMAIN_SEGMENT: &str = "subdomain-alias";

const ALIAS_SEGMENT: &str = "alias";

/// What the path refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    /// `owner/repo` followed by a commit SHA or alias name.
    Project {
        owner: String,
        repo: String,
        reference: String,
        /// The path used the explicit `alias/{name}` form.
        alias_qualified: bool,
    },
    /// Alias resolved from a wildcard subdomain; project unknown up front.
    SubdomainAlias { alias: String },
}

/// A parsed public asset path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicPath {
    pub target: AssetRef,
    /// Remainder after the reference segment; always starts with `/`.
    pub subpath: String,
    /// Everything before the subpath, e.g. `/public/acme/site/main`.
    pub prefix: String,
}

impl PublicPath {
    /// Rebuild the full request path with `subpath` in place of the parsed one.
    pub fn with_subpath(&self, subpath: &str) -> String {
        if subpath.starts_with('/') {
            format!("{}{}", self.prefix, subpath)
        } else {
            format!("{}/{}", self.prefix, subpath)
        }
    }
}

/// Parse a request path (without query string).
pub fn parse(path: &str) -> Option<PublicPath> {
    let rest = path.strip_prefix(PUBLIC_PREFIX)?;

    if let Some((segments, subpath)) = split_segments(rest, 2) {
        if segments[0] == SUBDOMAIN_SEGMENT {
            let target = AssetRef::SubdomainAlias {
                alias: segments[1].to_string(),
            };
            return Some(build(&segments, subpath, target));
        }
    }

    if let Some((segments, subpath)) = split_segments(rest, 4) {
        if segments[2] == ALIAS_SEGMENT {
            let target = AssetRef::Project {
                owner: segments[0].to_string(),
                repo: segments[1].to_string(),
                reference: segments[3].to_string(),
                alias_qualified: true,
            };
            return Some(build(&segments, subpath, target));
        }
    }

    let (segments, subpath) = split_segments(rest, 3)?;
    let target = AssetRef::Project {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        reference: segments[2].to_string(),
        alias_qualified: false,
    };
    Some(build(&segments, subpath, target))
}

/// Take `count` non-empty leading segments; the rest is the subpath,
/// which keeps its leading slash.
fn split_segments(rest: &str, count: usize) -> Option<(Vec<&str>, &str)> {
    let mut segments = Vec::with_capacity(count);
    let mut remaining = rest;
    for _ in 0..count {
        let (segment, tail) = match remaining.find('/') {
            Some(idx) => remaining.split_at(idx),
            None => (remaining, ""),
        };
        if segment.is_empty() {
            return None;
        }
        segments.push(segment);
        remaining = tail;
        if segments.len() < count {
            remaining = remaining.strip_prefix('/')?;
        }
    }
    let subpath = if remaining.is_empty() { "/" } else { remaining };
    Some((segments, subpath))
}

fn build(segments: &[&str], subpath: &str, target: AssetRef) -> PublicPath {
    PublicPath {
        target,
        subpath: subpath.to_string(),
        prefix: format!("{}{}", PUBLIC_PREFIX, segments.join("/")),
    }
}

/// Path portion of an `X-Original-URI` value; the value itself when it has
/// no query.
pub fn strip_query(uri: &str) -> &str {
    uri.split_once('?').map_or(uri, |(path, _)| path)
}
