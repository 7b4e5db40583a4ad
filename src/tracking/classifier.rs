//! Decides whether a click landed on a trackable affiliate link
//!
//! A link is trackable when either its marker attribute (`data-aff="true"`
//! by default) is set, or its destination goes through the outbound redirect
//! segment (`/go/` by default). Pages use one convention or the other, so
//! both are recognised.

use reqwest::Url;
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::page::{ClickEvent, Document, Element};

const MARKER_SENTINEL: &str = "true";

/// Normalized view of a trackable anchor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedLink {
    pub offer: String,
    pub merchant: String,
    pub position: String,
    pub price: String,
    pub action: String,
    /// Visible link text, used when `offer` is missing
    pub text: String,
    /// Raw `href` attribute as written in the markup
    pub href: String,
    /// `href` resolved against the page URL; empty when it cannot be resolved
    pub resolved_url: String,
    /// Host of `resolved_url`; empty when there is none
    pub out_url_domain: String,
}

#[derive(Debug, Clone)]
pub struct LinkClassifier {
    marker: String,
    redirect_segment: String,
}

impl Default for LinkClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl LinkClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            marker: config.affiliate_marker.clone(),
            redirect_segment: format!("/{}/", config.redirect_segment.to_ascii_lowercase()),
        }
    }

    /// Classify `click` against `document`. `None` means "not trackable" and
    /// is not an error.
    pub fn classify(
        &self,
        document: &Document,
        click: &ClickEvent,
        page_url: &Url,
    ) -> Option<ClassifiedLink> {
        let Some((anchor_id, anchor)) = document.closest(click.target, Element::is_anchor) else {
            debug!("click outside any anchor, ignoring");
            return None;
        };
        let href = anchor.attr("href").unwrap_or_default();
        let resolved = resolve(page_url, href);

        if !self.is_marked(anchor) && !self.is_redirect_path(resolved.as_ref(), href) {
            debug!(href, "anchor is not an affiliate link, ignoring");
            return None;
        }

        let field = |key: &str| anchor.data(key).unwrap_or_default().to_string();

        Some(ClassifiedLink {
            offer: field("offer"),
            merchant: field("merchant"),
            position: field("position"),
            price: field("price"),
            action: field("action"),
            text: document.text_content(anchor_id),
            href: href.to_string(),
            out_url_domain: resolved
                .as_ref()
                .and_then(Url::host_str)
                .unwrap_or_default()
                .to_string(),
            resolved_url: resolved.map(String::from).unwrap_or_default(),
        })
    }

    fn is_marked(&self, anchor: &Element) -> bool {
        anchor
            .data(&self.marker)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(MARKER_SENTINEL))
    }

    fn is_redirect_path(&self, resolved: Option<&Url>, raw_href: &str) -> bool {
        let path = match resolved {
            Some(url) => url.path(),
            None => raw_href,
        };
        path.to_ascii_lowercase().contains(&self.redirect_segment)
    }
}

fn resolve(page_url: &Url, href: &str) -> Option<Url> {
    if href.trim().is_empty() {
        return None;
    }
    match page_url.join(href) {
        Ok(url) => Some(url),
        Err(err) => {
            debug!(href, error = %err, "href could not be resolved");
            None
        }
    }
}
