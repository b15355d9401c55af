use super::{LinkRewriter, RewriteError, Rewritten, decode, encode};
use crate::filter::UrlFilter;
use crate::{DiscoveredLink, ResourceKind};
use encoding_rs::Encoding;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use url::Url;

/// `url('...')`, `url("...")` or `url(...)`, one capture group per form
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:'([^']*)'|"([^"]*)"|([^'")\s]+))\s*\)"#)
        .expect("CSS url() pattern is valid")
});

/// Pulls the reference and its quote character out of a `url(...)` match
fn reference<'t>(caps: &Captures<'t>) -> Option<(&'t str, &'static str)> {
    if let Some(m) = caps.get(1) {
        Some((m.as_str(), "'"))
    } else if let Some(m) = caps.get(2) {
        Some((m.as_str(), "\""))
    } else {
        caps.get(3).map(|m| (m.as_str(), ""))
    }
}

/// Rewrites every `url(...)` in a stylesheet to point into the mirror
///
/// The quoting style of each occurrence is preserved. Links are collected by
/// scanning the rewritten text, so they are exactly the references the saved
/// stylesheet makes. Without a header `charset` a leading `@charset` rule
/// decides the encoding.
pub fn rewrite_css(
    base: &Url,
    local_base: &Path,
    body: &[u8],
    charset: Option<&str>,
    scope: &UrlFilter,
) -> Result<Rewritten, RewriteError> {
    let declared = match charset {
        Some(_) => None,
        None => at_charset(body),
    };
    let (text, encoding) = decode(body, charset.or(declared))?;
    let rewriter = LinkRewriter::new(base, local_base, scope);

    // Rewritten href -> the link it stands for
    let mut targets: HashMap<String, DiscoveredLink> = HashMap::new();

    let rewritten = CSS_URL.replace_all(&text, |caps: &Captures| {
        let whole = caps[0].to_string();
        let Some((raw, quote)) = reference(caps) else {
            return whole;
        };
        match rewriter.rewrite(raw, ResourceKind::Asset) {
            Some((href, link)) => {
                let replacement = format!("url({quote}{href}{quote})");
                targets.insert(href, link);
                replacement
            }
            None => whole,
        }
    });

    let links = discover(&rewritten, &rewriter, &targets);
    ::log::debug!("Rewrote {} url() references in {}", links.len(), base);

    Ok(Rewritten {
        body: encode(&rewritten, encoding),
        links,
    })
}

/// The label of a leading `@charset "...";` rule
fn at_charset(body: &[u8]) -> Option<&str> {
    let rest = body.strip_prefix(b"@charset \"")?;
    let end = rest.iter().position(|&b| b == b'"')?;
    std::str::from_utf8(&rest[..end])
        .ok()
        .filter(|label| Encoding::for_label(label.as_bytes()).is_some())
}

/// Collects the in-scope links referenced by a (rewritten) stylesheet
fn discover(
    css: &str,
    rewriter: &LinkRewriter<'_>,
    targets: &HashMap<String, DiscoveredLink>,
) -> Vec<DiscoveredLink> {
    CSS_URL
        .captures_iter(css)
        .filter_map(|caps| {
            let (raw, _) = reference(&caps)?;
            match targets.get(raw) {
                Some(link) => Some(link.clone()),
                None => rewriter
                    .rewrite(raw, ResourceKind::Asset)
                    .map(|(_, link)| link),
            }
        })
        .collect()
}
