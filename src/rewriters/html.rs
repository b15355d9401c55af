use super::{LinkRewriter, RewriteError, Rewritten, decode, encode};
use crate::filter::UrlFilter;
use crate::{DiscoveredLink, ResourceKind};
use encoding_rs::Encoding;
use scraper::{Html, Node};
use std::path::Path;
use url::Url;

/// Elements whose `src`/`srcset` point at embedded resources
const EMBED_TAGS: [&str; 6] = ["script", "img", "source", "video", "audio", "iframe"];

/// How far into a document a `<meta charset>` declaration is looked for
const META_PRESCAN_BYTES: usize = 1024;

/// Rewrites the links of an HTML document to point into the mirror
///
/// `base` is the URL the document was fetched from and `local_base` the path
/// it will be saved at. `charset` comes from the Content-Type header; without
/// it a `<meta>` declaration near the top of the document is honoured. The
/// output keeps the document's encoding. Anchors are discovered as pages;
/// stylesheets and embedded media as assets.
pub fn rewrite_html(
    base: &Url,
    local_base: &Path,
    body: &[u8],
    charset: Option<&str>,
    scope: &UrlFilter,
) -> Result<Rewritten, RewriteError> {
    let declared = match charset {
        Some(_) => None,
        None => meta_charset(body),
    };
    let (text, encoding) = decode(body, charset.or(declared.as_deref()))?;
    let mut document = Html::parse_document(&text);
    let rewriter = LinkRewriter::new(base, local_base, scope);
    let mut links = Vec::new();

    // Walk iteratively: collect the ids first, then mutate node by node
    let ids: Vec<_> = document.tree.nodes().map(|node| node.id()).collect();
    for id in ids {
        let Some(mut node) = document.tree.get_mut(id) else {
            continue;
        };
        let Node::Element(element) = node.value() else {
            continue;
        };
        let tag = element.name().to_ascii_lowercase();

        for (name, value) in element.attrs.iter_mut() {
            let attr: &str = &name.local;
            let current: &str = value;
            let replacement = match (tag.as_str(), attr) {
                ("a", "href") => rewrite_single(&rewriter, current, ResourceKind::Page, &mut links),
                ("link", "href") => {
                    rewrite_single(&rewriter, current, ResourceKind::Asset, &mut links)
                }
                (t, "src") if EMBED_TAGS.contains(&t) => {
                    rewrite_single(&rewriter, current, ResourceKind::Asset, &mut links)
                }
                (t, "srcset") if EMBED_TAGS.contains(&t) => {
                    rewrite_srcset(&rewriter, current, &mut links)
                }
                _ => None,
            };

            if let Some(new_value) = replacement {
                *value = new_value.as_str().into();
            }
        }
    }

    ::log::debug!("Rewrote {} links in {}", links.len(), base);
    Ok(Rewritten {
        body: encode(&document.html(), encoding),
        links,
    })
}

/// Finds a known encoding label declared by `<meta charset>` or `http-equiv`
fn meta_charset(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(META_PRESCAN_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();

    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        .collect();
    Encoding::for_label(label.as_bytes()).map(|_| label)
}

fn rewrite_single(
    rewriter: &LinkRewriter<'_>,
    value: &str,
    kind: ResourceKind,
    links: &mut Vec<DiscoveredLink>,
) -> Option<String> {
    let (href, link) = rewriter.rewrite(value, kind)?;
    links.push(link);
    Some(href)
}

/// Rewrites each `<url> <descriptor...>` entry of a srcset independently
///
/// Entries that cannot be resolved or are out of scope pass through as-is.
fn rewrite_srcset(
    rewriter: &LinkRewriter<'_>,
    value: &str,
    links: &mut Vec<DiscoveredLink>,
) -> Option<String> {
    let mut changed = false;
    let mut entries = Vec::new();

    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.split_whitespace();
        let Some(reference) = parts.next() else {
            continue;
        };

        match rewriter.rewrite(reference, ResourceKind::Asset) {
            Some((href, link)) => {
                links.push(link);
                changed = true;
                let rebuilt: Vec<&str> = std::iter::once(href.as_str()).chain(parts).collect();
                entries.push(rebuilt.join(" "));
            }
            None => entries.push(entry.to_string()),
        }
    }

    changed.then(|| entries.join(", "))
}
