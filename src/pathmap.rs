//! Maps URLs onto the on-disk layout of the mirror.
//!
//! Every URL lands at `<host>/<path segments>`; pages without a file name get
//! `index.html`, query strings get a short digest spliced in before the
//! extension so `a.css?v=1` and `a.css?v=2` do not overwrite each other.

use crate::ResourceKind;
use crate::utils::sanitize_segment;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Extensions that mark a path as an HTML document
const PAGE_EXTENSIONS: [&str; 3] = [".html", ".htm", ".xhtml"];

/// Number of digest bytes used to tell query variants apart
const QUERY_DIGEST_BYTES: usize = 4;

/// Returns the extension (with its dot) of the last segment of a URL path
fn extension(path: &str) -> &str {
    let last = path.rsplit('/').next().unwrap_or("");
    match last.rfind('.') {
        Some(idx) => &last[idx..],
        None => "",
    }
}

/// Whether a URL path looks like an HTML document
pub fn looks_like_page(url: &Url) -> bool {
    let path = url.path();
    if path.is_empty() || path.ends_with('/') {
        return true;
    }
    let ext = extension(path).to_ascii_lowercase();
    ext.is_empty() || PAGE_EXTENSIONS.contains(&ext.as_str())
}

/// Local path (relative to the output root) for a URL
///
/// Every reference to a URL and the document saved for it go through this
/// function, so both always agree on a single location.
pub fn local_path(url: &Url) -> PathBuf {
    local_path_for_kind(url, ResourceKind::Page)
}

/// Local path for a URL when the kind of resource behind it is known
///
/// Extensionless page paths become directories holding `index.html`;
/// extensionless assets get a synthetic `.bin` suffix instead.
pub fn local_path_for_kind(url: &Url, kind: ResourceKind) -> PathBuf {
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };

    let mut path = url.path().to_string();
    if path.is_empty() {
        path.push('/');
    }

    let as_page = kind == ResourceKind::Page;
    if path.ends_with('/') {
        path.push_str(if as_page { "index.html" } else { "index.bin" });
    } else if extension(&path).is_empty() {
        path.push_str(if as_page { "/index.html" } else { ".bin" });
    }

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        let digest = Sha256::digest(query.as_bytes());
        let suffix = format!("_q_{}", hex::encode(&digest[..QUERY_DIGEST_BYTES]));
        let stem_len = path.len() - extension(&path).len();
        path.insert_str(stem_len, &suffix);
    }

    let mut local = PathBuf::from(sanitize_segment(&host.to_ascii_lowercase()));
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        local.push(sanitize_segment(segment));
    }
    local
}

/// Relative link from one mapped file to another, with `/` separators
pub fn relative_link(from: &Path, to: &Path) -> String {
    let from_dir: Vec<Component> = from
        .parent()
        .map(|dir| dir.components().collect())
        .unwrap_or_default();
    let to_parts: Vec<Component> = to.components().collect();

    let common = from_dir
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::with_capacity(from_dir.len() + to_parts.len());
    parts.extend(std::iter::repeat_n("..".to_string(), from_dir.len() - common));
    parts.extend(
        to_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    let rel = parts.join("/");
    rel.strip_prefix("./").map(str::to_string).unwrap_or(rel)
}
