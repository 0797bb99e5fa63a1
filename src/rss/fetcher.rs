//! RSS feed fetcher with security measures.
//!
//! One GET per call, no retries. The body is decoded into the
//! channel/item shape and the text fields are HTML-unescaped once.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::rss::types::{FeedDocument, ParsedItem};

/// Source of feed documents.
#[async_trait]
pub trait FetchFeed: Send + Sync {
    /// Fetch and decode the feed at `url`.
    async fn fetch(&self, url: &str) -> Result<FeedDocument, FetchError>;
}

/// HTTP feed fetcher.
pub struct RssFetcher {
    client: Client,
    max_feed_size: u64,
    allow_private_hosts: bool,
}

impl RssFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(redirect_policy(
                config.max_redirects,
                config.allow_private_hosts,
            ))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    fn check_size(&self, size: u64) -> Result<(), FetchError> {
        if size > self.max_feed_size {
            return Err(FetchError::TooLarge {
                size,
                max: self.max_feed_size,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FetchFeed for RssFetcher {
    async fn fetch(&self, url: &str) -> Result<FeedDocument, FetchError> {
        validate_url(url, self.allow_private_hosts)?;

        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        if let Some(content_length) = response.content_length() {
            self.check_size(content_length)?;
        }

        // Content-Length may be absent or wrong; the cap applies to what is read
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            self.check_size(body.len() as u64)?;
        }

        debug!(url, size = body.len(), "Fetched feed body");
        parse_feed(&body)
    }
}

/// Redirect policy that caps hops and re-applies the URL checks to every
/// redirect target.
fn redirect_policy(max_redirects: usize, allow_private: bool) -> Policy {
    Policy::custom(move |attempt| {
        match check_redirect(
            attempt.url().as_str(),
            attempt.previous().len(),
            max_redirects,
            allow_private,
        ) {
            Ok(()) => attempt.follow(),
            Err(e) => attempt.error(e),
        }
    })
}

/// Check one redirect hop. `hops` counts the URLs already visited,
/// the initial one included.
fn check_redirect(
    url: &str,
    hops: usize,
    max_redirects: usize,
    allow_private: bool,
) -> Result<(), FetchError> {
    if hops > max_redirects {
        return Err(FetchError::TooManyRedirects(max_redirects));
    }
    validate_url(url, allow_private)
}

/// Validate a URL before fetching.
///
/// The URL must use http or https and have a host. Unless `allow_private`
/// is set, private/loopback addresses and reserved hostnames are refused.
pub fn validate_url(url: &str, allow_private: bool) -> Result<(), FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| FetchError::InvalidUrl(format!("URL has no host: {url}")))?;

    if allow_private {
        return Ok(());
    }

    match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(FetchError::Forbidden(domain.to_string()));
            }
        }
        url::Host::Ipv4(ipv4) => {
            let ip = IpAddr::V4(ipv4);
            if is_private_ip(&ip) {
                return Err(FetchError::Forbidden(ip.to_string()));
            }
        }
        url::Host::Ipv6(ipv6) => {
            let ip = IpAddr::V6(ipv6);
            if is_private_ip(&ip) {
                return Err(FetchError::Forbidden(ip.to_string()));
            }
        }
    }

    Ok(())
}

const FORBIDDEN_SUFFIXES: [&str; 7] = [
    ".local",
    ".localhost",
    ".internal",
    ".intranet",
    ".corp",
    ".home",
    ".lan",
];

fn is_forbidden_hostname(host: &str) -> bool {
    let host = host.to_lowercase();
    host == "localhost" || FORBIDDEN_SUFFIXES.iter().any(|s| host.ends_with(s))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                || ipv4.is_documentation()
                // Carrier-grade NAT: 100.64.0.0/10
                || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        }
        IpAddr::V6(ipv6) => {
            if let Some(mapped) = ipv6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            let first = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (first & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (first & 0xffc0) == 0xfe80
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRss {
    channel: RawChannel,
}

// Namespace prefixes are not part of the matched name, so `itunes:title`
// and `media:description` land on the same field as their plain siblings.
// Text fields collect every occurrence and `first_text` picks one.
#[derive(Debug, Deserialize)]
struct RawChannel {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    description: Vec<String>,
    #[serde(default, rename = "item")]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    link: Vec<String>,
    #[serde(default)]
    description: Vec<String>,
    #[serde(default, rename = "pubDate")]
    pub_date: Vec<String>,
}

/// Decode an RSS document.
///
/// Invalid UTF-8 is replaced rather than rejected. Channel and item titles
/// and descriptions are HTML-unescaped exactly once after XML decoding.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument, FetchError> {
    let text = String::from_utf8_lossy(bytes);
    let raw: RawRss = quick_xml::de::from_str(&text)?;

    let items = raw
        .channel
        .items
        .into_iter()
        .map(|item| ParsedItem {
            title: unescape(&first_text(item.title)),
            link: first_text(item.link).trim().to_string(),
            description: unescape(&first_text(item.description)),
            pub_date: first_text(item.pub_date).trim().to_string(),
        })
        .collect();

    Ok(FeedDocument {
        title: unescape(&first_text(raw.channel.title)),
        description: unescape(&first_text(raw.channel.description)),
        items,
    })
}

/// First occurrence with non-blank text, or an empty string.
fn first_text(values: Vec<String>) -> String {
    values
        .into_iter()
        .find(|v| !v.trim().is_empty())
        .unwrap_or_default()
}

fn unescape(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
