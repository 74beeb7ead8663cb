//! Per-site attach rules and the video matcher built from them.

use url::Url;
use vs_core::EngineError;
use vs_core::EngineResult;

/// Facts about a video that a site rule may inspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoInfo<'a> {
    pub src: Option<&'a str>,
}

impl<'a> VideoInfo<'a> {
    pub fn with_src(src: &'a str) -> Self {
        Self { src: Some(src) }
    }
}

/// Decides whether a video on the rule's site gets a controller.
pub type SitePredicate = fn(&VideoInfo<'_>) -> bool;

/// A rule keyed by base domain.
#[derive(Debug, Clone, Copy)]
pub struct SiteRule {
    pub domain: &'static str,
    pub predicate: SitePredicate,
}

impl SiteRule {
    pub fn applies(&self, video: &VideoInfo<'_>) -> bool {
        (self.predicate)(video)
    }
}

/// Ordered rule table. The first rule whose domain matches wins.
#[derive(Debug, Clone, Default)]
pub struct SiteRules {
    rules: Vec<SiteRule>,
}

impl SiteRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules shipped with the extension.
    pub fn builtin() -> Self {
        Self::empty().with_rule("primevideo.com", blob_source_only)
    }

    pub fn with_rule(mut self, domain: &'static str, predicate: SitePredicate) -> Self {
        self.rules.push(SiteRule { domain, predicate });
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_for(&self, base_domain: &str) -> Option<&SiteRule> {
        self.rules.iter().find(|rule| rule.domain == base_domain)
    }
}

/// Prime Video plays through MSE; `<video>` elements with plain URLs are previews.
fn blob_source_only(video: &VideoInfo<'_>) -> bool {
    video.src.is_some_and(|src| src.starts_with("blob:"))
}

/// Reduces a hostname to its last two labels; shorter hosts are kept as-is.
pub fn base_domain(host: &str) -> String {
    let normalized = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = normalized.split('.').collect();
    if labels.len() < 2 {
        return normalized;
    }
    labels[labels.len() - 2..].join(".")
}

/// Resolved per-page attach predicate.
#[derive(Debug, Clone)]
pub struct VideoMatcher {
    base_domain: String,
    rule: Option<SiteRule>,
}

impl VideoMatcher {
    pub fn for_hostname(rules: &SiteRules, hostname: &str) -> Self {
        let base_domain = base_domain(hostname);
        let rule = rules.rule_for(&base_domain).copied();
        match &rule {
            Some(rule) => log::debug!("site rule active for {}", rule.domain),
            None => log::trace!("no site rule for {base_domain}; attaching to every video"),
        }
        Self { base_domain, rule }
    }

    pub fn for_page_url(rules: &SiteRules, page_url: &str) -> EngineResult<Self> {
        let parsed = Url::parse(page_url).map_err(|error| {
            EngineError::new(
                "sites.url.invalid",
                format!("failed to parse page URL `{page_url}`: {error}"),
            )
        })?;
        let host = parsed.host_str().ok_or_else(|| {
            EngineError::new("sites.url.host_missing", "page URL must include a host")
        })?;
        Ok(Self::for_hostname(rules, host))
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    pub fn has_site_rule(&self) -> bool {
        self.rule.is_some()
    }

    pub fn should_attach(&self, video: &VideoInfo<'_>) -> bool {
        match &self.rule {
            Some(rule) => rule.applies(video),
            None => true,
        }
    }
}
