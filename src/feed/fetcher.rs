use std::time::Duration;

use feed_rs::parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use url::Url;

use crate::error::Result;
use crate::models::NewArticle;

use super::sources::{extract_tags, infer_network, is_breaking, FeedSource};

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("chainwire/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    pub async fn fetch_source(&self, source: &FeedSource) -> Result<Vec<NewArticle>> {
        let response = self.client.get(source.url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        let feed = parser::parse(&bytes[..])?;
        let base = Url::parse(source.url).ok();

        let articles: Vec<NewArticle> = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                // Some feeds publish relative entry links.
                let url = entry
                    .links
                    .first()
                    .and_then(|l| absolutize(base.as_ref(), &l.href))?;

                let title = entry
                    .title
                    .map(|t| t.content)
                    .unwrap_or_else(|| "Untitled".to_string());

                // Try content first, then fall back to summary
                let content_html = entry
                    .content
                    .as_ref()
                    .and_then(|c| c.body.as_ref())
                    .or_else(|| entry.summary.as_ref().map(|s| &s.content));

                let content_text = content_html
                    .and_then(|html| html2text::from_read(html.as_bytes(), 80).ok());

                // Media enclosures often carry a usable cover candidate;
                // it still has to pass HEAD validation before being stored.
                let cover_candidate = entry
                    .media
                    .iter()
                    .flat_map(|m| m.content.iter())
                    .filter_map(|c| c.url.as_ref())
                    .map(|u| u.to_string())
                    .next();

                let network = source
                    .network
                    .map(|n| n.to_string())
                    .or_else(|| infer_network(&title));

                let author = entry.authors.first().map(|a| a.name.clone());
                let metadata = author.map(|a| serde_json::json!({ "author": a }));

                Some(NewArticle {
                    tags: extract_tags(&title),
                    is_breaking: is_breaking(&title),
                    content: content_text,
                    summary: None,
                    url,
                    source: source.name.to_string(),
                    published_at: entry.published.or(entry.updated),
                    category: Some(source.category.to_string()),
                    network,
                    cover_image: cover_candidate,
                    metadata,
                    title,
                })
            })
            .collect();

        Ok(articles)
    }

    /// Refresh all sources concurrently with bounded parallelism. A failing
    /// source is logged and skipped; it never blocks the rest of the cycle.
    pub async fn refresh_all(&self, sources: &[FeedSource]) -> Vec<(FeedSource, Vec<NewArticle>)> {
        let results: Vec<_> = stream::iter(sources.iter().cloned())
            .map(|source| async move {
                match self.fetch_source(&source).await {
                    Ok(articles) => {
                        tracing::debug!("Fetched {} articles from {}", articles.len(), source.name);
                        Some((source, articles))
                    }
                    Err(e) => {
                        tracing::warn!("Failed to fetch {}: {}", source.url, e);
                        None
                    }
                }
            })
            .buffer_unordered(5) // Max 5 concurrent fetches
            .filter_map(|r| async { r })
            .collect()
            .await;

        results
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn absolutize(base: Option<&Url>, href: &str) -> Option<String> {
    if let Ok(absolute) = Url::parse(href) {
        return Some(absolute.to_string());
    }
    base?.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Wire</title>
    <item>
      <title>BREAKING: Hedera governing council expands</title>
      <link>https://example.com/hedera-council</link>
      <description>&lt;p&gt;The council added two members.&lt;/p&gt;</description>
      <pubDate>Mon, 10 Aug 2026 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Weekly staking roundup</title>
      <link>https://example.com/staking</link>
      <description>Yield overview.</description>
    </item>
  </channel>
</rss>"#;

    fn map_entries(source: &FeedSource, xml: &str) -> Vec<NewArticle> {
        // Exercise the same mapping fetch_source applies, without the network.
        let feed = parser::parse(xml.as_bytes()).unwrap();
        feed.entries
            .into_iter()
            .filter_map(|entry| {
                let url = entry.links.first().map(|l| l.href.clone())?;
                let title = entry.title.map(|t| t.content).unwrap_or_default();
                Some(NewArticle {
                    tags: extract_tags(&title),
                    is_breaking: is_breaking(&title),
                    content: None,
                    summary: None,
                    url,
                    source: source.name.to_string(),
                    published_at: entry.published,
                    category: Some(source.category.to_string()),
                    network: source.network.map(|n| n.to_string()).or_else(|| infer_network(&title)),
                    cover_image: None,
                    metadata: None,
                    title,
                })
            })
            .collect()
    }

    #[test]
    fn maps_feed_entries_to_articles() {
        let source = FeedSource {
            name: "Test Wire",
            url: "https://example.com/rss",
            category: "markets",
            network: None,
        };
        let articles = map_entries(&source, SAMPLE_RSS);

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].url, "https://example.com/hedera-council");
        assert_eq!(articles[0].network.as_deref(), Some("hedera"));
        assert!(articles[0].is_breaking);
        assert!(articles[0].published_at.is_some());
        assert!(!articles[1].is_breaking);
        assert_eq!(articles[1].network, None);
    }

    #[tokio::test]
    async fn failing_source_does_not_block_others() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // One-shot HTTP server for the healthy feed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/rss+xml\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    SAMPLE_RSS.len(),
                    SAMPLE_RSS
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        // A bound-then-dropped port refuses connections.
        let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let live_url: &'static str =
            Box::leak(format!("http://{}/rss", addr).into_boxed_str());
        let dead_url: &'static str =
            Box::leak(format!("http://{}/rss", dead_addr).into_boxed_str());

        let sources = vec![
            FeedSource {
                name: "Dead Wire",
                url: dead_url,
                category: "markets",
                network: None,
            },
            FeedSource {
                name: "Live Wire",
                url: live_url,
                category: "markets",
                network: None,
            },
        ];

        let results = FeedFetcher::new().refresh_all(&sources).await;

        assert_eq!(results.len(), 1);
        let (source, articles) = &results[0];
        assert_eq!(source.name, "Live Wire");
        assert_eq!(articles.len(), 2);
    }

    #[test]
    fn relative_links_resolve_against_feed_url() {
        let base = Url::parse("https://example.com/blog/rss.xml").unwrap();
        assert_eq!(
            absolutize(Some(&base), "/posts/launch").as_deref(),
            Some("https://example.com/posts/launch")
        );
        assert_eq!(
            absolutize(Some(&base), "https://other.example/x").as_deref(),
            Some("https://other.example/x")
        );
        assert_eq!(absolutize(None, "/posts/launch"), None);
    }
}
