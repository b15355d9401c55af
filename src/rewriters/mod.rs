pub mod css;
pub mod html;


use crate::filter::{UrlFilter, normalize_url};
use crate::pathmap::{self, local_path, looks_like_page};
use crate::{DiscoveredLink, ResourceKind};
use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Errors that stop a document from being rewritten
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("unknown character encoding '{0}'")]
    UnknownCharset(String),
}

/// A rewritten document plus the links it references
#[derive(Debug, Clone)]
pub struct Rewritten {
    /// Bytes to write to disk
    pub body: Vec<u8>,
    /// In-scope links found in the document, in document order
    pub links: Vec<DiscoveredLink>,
}

/// How a fetched resource is handled before it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Rewritten as HTML, links followed
    Html,
    /// Rewritten as a stylesheet
    Css,
    /// Written verbatim
    Binary,
}

impl ContentKind {
    /// Classifies a response by its Content-Type, falling back to the URL
    pub fn classify(content_type: &str, url: &Url, kind: ResourceKind) -> Self {
        let content_type = content_type.to_ascii_lowercase();

        let css_path = url.path().to_ascii_lowercase().ends_with(".css");

        if content_type.contains("text/html") || content_type.contains("application/xhtml") {
            ContentKind::Html
        } else if content_type.contains("text/css") || css_path {
            ContentKind::Css
        } else if content_type.is_empty() && kind == ResourceKind::Page && looks_like_page(url) {
            // Servers that omit the header still get their pages rewritten
            ContentKind::Html
        } else {
            ContentKind::Binary
        }
    }
}

/// Resolves a reference found in a document against the document's URL
///
/// Returns None for empty values, fragment-only references, and schemes
/// that cannot be fetched (`data:`, `javascript:`, `mailto:` and anything
/// else that is not http or https).
pub fn resolve_reference(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let lower = reference.to_ascii_lowercase();
    if ["data:", "javascript:", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let resolved = base.join(reference).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Shared state for rewriting one document
pub(crate) struct LinkRewriter<'a> {
    base: &'a Url,
    local_base: &'a Path,
    scope: &'a UrlFilter,
}

impl<'a> LinkRewriter<'a> {
    pub(crate) fn new(base: &'a Url, local_base: &'a Path, scope: &'a UrlFilter) -> Self {
        Self {
            base,
            local_base,
            scope,
        }
    }

    /// Resolves and scope-checks a reference, yielding the normalized target
    pub(crate) fn target(&self, reference: &str) -> Option<Url> {
        let resolved = resolve_reference(self.base, reference)?;
        if !self.scope.should_crawl(&resolved) {
            ::log::trace!("Leaving out-of-scope reference {}", resolved);
            return None;
        }
        Some(resolved)
    }

    /// Rewrites one reference to a local relative href
    ///
    /// Returns the new attribute value and the discovered link, or None when
    /// the reference should be left untouched.
    pub(crate) fn rewrite(
        &self,
        reference: &str,
        kind: ResourceKind,
    ) -> Option<(String, DiscoveredLink)> {
        let resolved = self.target(reference)?;
        let mut href = local_href(self.local_base, &resolved);
        if let Some(fragment) = resolved.fragment() {
            href.push('#');
            href.push_str(fragment);
        }

        let link = DiscoveredLink {
            url: normalize_url(&resolved),
            kind,
        };
        Some((href, link))
    }
}

/// Relative href from the document at `local_base` to the mirror copy of `target`
///
/// Mapped file names keep the percent-encoding of the URL path, so a
/// literal `%` has to be escaped again for the browser to find the file.
pub fn local_href(local_base: &Path, target: &Url) -> String {
    pathmap::relative_link(local_base, &local_path(target)).replace('%', "%25")
}

/// The `charset` parameter of a Content-Type header, if any
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then_some(value)
    })
}

/// Decodes a document body into text
///
/// A byte order mark wins over `charset`; without either the body is read as
/// UTF-8. Malformed sequences become U+FFFD rather than failing. Returns the
/// encoding that was used so the rewritten text can be encoded back.
pub(crate) fn decode<'b>(
    body: &'b [u8],
    charset: Option<&str>,
) -> Result<(Cow<'b, str>, &'static Encoding), RewriteError> {
    let encoding = match charset {
        Some(label) => Encoding::for_label(label.as_bytes())
            .ok_or_else(|| RewriteError::UnknownCharset(label.to_string()))?,
        None => UTF_8,
    };

    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        ::log::debug!("Replaced malformed {} sequences while decoding", used.name());
    }
    Ok((text, used))
}

/// Encodes rewritten text back into the document's own encoding
///
/// Characters the encoding cannot represent become numeric character
/// references.
pub(crate) fn encode(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_8 {
        return text.as_bytes().to_vec();
    }
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}
