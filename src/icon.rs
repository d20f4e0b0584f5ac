// ============================================================================
// Coin icons: a deterministic SVG placeholder that always works, upgraded to a
// remote logo once one of the candidate URLs answers with an image
// ============================================================================

use dashmap::DashMap;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_ICON_SOURCES: [&str; 3] = [
    "https://raw.githubusercontent.com/spothq/cryptocurrency-icons/master/64/color/{base}.png",
    "https://raw.githubusercontent.com/ErikThiart/cryptocurrency-icons/master/64/color/{base}.png",
    "https://cryptoicons.org/api/icon/{base}/64",
];

const PLACEHOLDER_FG: &str = "#e7ecf5";

// ============================================================================
// Placeholder
// ============================================================================

/// 32-bit FNV-1a. Only used to pick a hue.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for byte in bytes {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

/// HSL (degrees, percent, percent) to `#rrggbb`.
pub fn hsl_to_hex(h: f64, s: f64, l: f64) -> String {
    let s = s / 100.0;
    let l = l / 100.0;
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match h {
        h if (0.0..60.0).contains(&h) => (c, x, 0.0),
        h if (60.0..120.0).contains(&h) => (x, c, 0.0),
        h if (120.0..180.0).contains(&h) => (0.0, c, x),
        h if (180.0..240.0).contains(&h) => (0.0, x, c),
        h if (240.0..300.0).contains(&h) => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}

pub fn placeholder_svg(base: &str) -> String {
    let letter = base
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "?".to_string());
    let hue = fnv1a32(base.as_bytes()) % 360;
    let bg = hsl_to_hex(f64::from(hue), 65.0, 38.0);

    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 64 64">"#,
            r#"<rect width="64" height="64" rx="12" ry="12" fill="{bg}"/>"#,
            r#"<text x="50%" y="55%" text-anchor="middle" font-size="30" "#,
            r#"font-family="Inter,Segoe UI,Arial" fill="{fg}">{letter}</text></svg>"#
        ),
        bg = bg,
        fg = PLACEHOLDER_FG,
        letter = crate::render::escape_html(&letter),
    )
}

/// `data:` URI for [`placeholder_svg`], usable directly as an `<img src>`.
pub fn placeholder_data_uri(base: &str) -> String {
    format!(
        "data:image/svg+xml;utf8,{}",
        urlencoding::encode(&placeholder_svg(base))
    )
}

/// Candidate logo URLs for `base`, in the order they should be tried.
pub fn logo_urls_for<S: AsRef<str>>(sources: &[S], base: &str) -> Vec<String> {
    let lower = base.to_lowercase();
    sources
        .iter()
        .map(|template| template.as_ref().replace("{base}", &lower))
        .collect()
}

// ============================================================================
// Remote resolution
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconState {
    Pending,
    Resolved(String),
    Unavailable,
}

/// Resolves remote logos in the background and caches the outcome per base asset.
#[derive(Clone)]
pub struct IconResolver {
    client: reqwest::Client,
    sources: Arc<Vec<String>>,
    probe_timeout: Duration,
    cache: Arc<DashMap<String, IconState>>,
}

/// Handle to a running lookup. Dropping it detaches the lookup; [`IconLookup::cancel`]
/// aborts it.
pub struct IconLookup {
    base: String,
    handle: JoinHandle<Option<String>>,
    cache: Arc<DashMap<String, IconState>>,
}

impl IconLookup {
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Abort the probe. A later lookup for the same base may start again.
    pub fn cancel(self) {
        self.handle.abort();
        self.cache
            .remove_if(&self.base, |_, state| *state == IconState::Pending);
    }

    /// Wait for the probe to finish. `None` if every candidate failed.
    pub async fn wait(self) -> Option<String> {
        self.handle.await.ok().flatten()
    }
}

impl IconResolver {
    pub fn new(client: reqwest::Client, sources: Vec<String>, probe_timeout: Duration) -> Self {
        Self {
            client,
            sources: Arc::new(sources),
            probe_timeout,
            cache: Arc::new(DashMap::new()),
        }
    }

    pub fn with_default_sources(client: reqwest::Client, probe_timeout: Duration) -> Self {
        let sources = DEFAULT_ICON_SOURCES.iter().map(|s| s.to_string()).collect();
        Self::new(client, sources, probe_timeout)
    }

    pub fn state(&self, base: &str) -> Option<IconState> {
        self.cache.get(&base.to_uppercase()).map(|s| s.clone())
    }

    /// Image source to render right now: the resolved logo, else the placeholder.
    pub fn src_for(&self, base: &str) -> String {
        match self.state(base) {
            Some(IconState::Resolved(url)) => url,
            _ => placeholder_data_uri(base),
        }
    }

    /// Start probing candidates for `base`. Returns `None` when a lookup already
    /// ran or is running for it.
    pub fn spawn_lookup(&self, base: &str) -> Option<IconLookup> {
        let key = base.to_uppercase();
        if key.is_empty() {
            return None;
        }

        match self.cache.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(IconState::Pending);
            }
        }

        let candidates = logo_urls_for(self.sources.as_slice(), &key);
        let client = self.client.clone();
        let timeout = self.probe_timeout;
        let cache = self.cache.clone();
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            for url in candidates {
                if probe(&client, &url, timeout).await {
                    cache.insert(task_key, IconState::Resolved(url.clone()));
                    return Some(url);
                }
            }
            cache.insert(task_key, IconState::Unavailable);
            None
        });

        Some(IconLookup {
            base: key,
            handle,
            cache: self.cache.clone(),
        })
    }

    /// Fire-and-forget lookups for every base not seen before.
    pub fn prefetch<I, S>(&self, bases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for base in bases {
            let _ = self.spawn_lookup(base.as_ref());
        }
    }
}

async fn probe(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let resp = match client.get(url).timeout(timeout).send().await {
        Ok(resp) => resp,
        Err(e) => {
            debug!(%url, error = %e, "icon candidate unreachable");
            return false;
        }
    };

    if !resp.status().is_success() {
        debug!(%url, status = resp.status().as_u16(), "icon candidate rejected");
        return false;
    }

    match resp.headers().get(CONTENT_TYPE) {
        None => true,
        Some(value) => value
            .to_str()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false),
    }
}
