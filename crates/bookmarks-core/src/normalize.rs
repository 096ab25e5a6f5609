//! URL canonicalization.
//!
//! [`normalize_url`] is applied to every URL at write time and again at
//! reindex time, so its output must be stable: normalizing an already
//! normalized URL returns it unchanged. The primary URL produced here is
//! the storage id.
//!
//! Rules, applied in order:
//!
//! 1. Surrounding whitespace is trimmed.
//! 2. Input that does not parse as a URL is returned as-is (trimmed).
//! 3. Scheme and host are lowercased and default ports dropped (done by
//!    the `url` parser).
//! 4. The fragment is removed.
//! 5. Tracking parameters (`utm_*`, `fbclid`, `gclid`, `mc_cid`, `mc_eid`)
//!    are removed. Other parameters keep their position, which matters for
//!    prefix-matched URLs such as `watch?v=`.
//! 6. Trailing slashes are removed from non-root paths.

use url::Url;

const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid"];

fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name)
}

/// Rewrites `raw` into its canonical comparison and storage form.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => return trimmed.to_string(),
    };

    url.set_fragment(None);
    strip_tracking_params(&mut url);

    if !url.cannot_be_a_base() {
        let path = url.path();
        if path.len() > 1 && path.ends_with('/') {
            let stripped = match path.trim_end_matches('/') {
                "" => "/".to_string(),
                p => p.to_string(),
            };
            url.set_path(&stripped);
        }
    }

    url.to_string()
}

fn strip_tracking_params(url: &mut Url) {
    if url.query() == Some("") {
        url.set_query(None);
        return;
    }
    if !url.query_pairs().any(|(name, _)| is_tracking_param(&name)) {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}
