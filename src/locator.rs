//! Source-specific locator rewrites and local file naming.
//!
//! Some sites link to a landing page rather than the resource itself. [`normalize`] maps those
//! locators onto the direct resource before anything is fetched, using a table of independent
//! prefix/suffix rules. [`local_filename`] then derives the attachment name, which is a pure
//! function of the normalized locator so repeated references resolve to the same file.

/// One prefix/suffix rewrite. A locator starting with any of `prefixes` has its first `from`
/// segment replaced by `to`, and `suffix` appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteRule {
    pub name: &'static str,
    pub prefixes: &'static [&'static str],
    pub from: &'static str,
    pub to: &'static str,
    pub suffix: &'static str,
}

impl RewriteRule {
    pub fn matches(&self, locator: &str) -> bool {
        self.prefixes.iter().any(|p| locator.starts_with(p))
    }

    pub fn apply(&self, locator: &str) -> String {
        let mut rewritten = locator.replacen(self.from, self.to, 1);
        rewritten.push_str(self.suffix);
        rewritten
    }
}

/// arXiv abstract pages (`/abs/<id>`) become the PDF itself (`/pdf/<id>.pdf`).
pub const ARXIV_ABSTRACT: RewriteRule = RewriteRule {
    name: "arxiv-abstract",
    prefixes: &["http://arxiv.org/abs/", "https://arxiv.org/abs/"],
    from: "/abs/",
    to: "/pdf/",
    suffix: ".pdf",
};

/// Rules are disjoint, so order is irrelevant; the first match wins.
pub const RULES: &[RewriteRule] = &[ARXIV_ABSTRACT];

pub fn normalize(locator: &str) -> String {
    match RULES.iter().find(|rule| rule.matches(locator)) {
        Some(rule) => {
            let rewritten = rule.apply(locator);
            tracing::debug!("[Normalizer] {} rewrote {} -> {}", rule.name, locator, rewritten);
            rewritten
        }
        None => locator.to_string(),
    }
}

/// Everything after the final `/`. Empty when the locator ends with a slash.
pub fn local_filename(normalized: &str) -> &str {
    match normalized.rfind('/') {
        Some(idx) => &normalized[idx + 1..],
        None => normalized,
    }
}
