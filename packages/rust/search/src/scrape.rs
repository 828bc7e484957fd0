//! HTML-scraping tier against the DuckDuckGo HTML results page.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use dossier_shared::{DossierError, Result, SearchHit};

use crate::SearchTier;

/// Scrapes a public HTML search page. No credentials required.
pub struct ScrapeTier {
    client: Client,
    endpoint: String,
}

impl ScrapeTier {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl SearchTier for ScrapeTier {
    fn name(&self) -> &'static str {
        "duckduckgo-html"
    }

    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| DossierError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(DossierError::Network(format!(
                "{}: HTTP {status}",
                self.endpoint
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DossierError::Network(format!("{}: failed to read body: {e}", self.endpoint)))?;

        // `Html` is not `Send`, so parsing stays out of the await points.
        let hits = parse_results(&body, count);
        if hits.is_empty() {
            return Err(DossierError::parse("no results found on search page"));
        }

        debug!(hits = hits.len(), "scraped search results");
        Ok(hits)
    }
}

/// Extract up to `count` hits from a DuckDuckGo HTML results page.
pub(crate) fn parse_results(html: &str, count: usize) -> Vec<SearchHit> {
    let doc = Html::parse_document(html);
    let result_sel = Selector::parse(".result").unwrap();
    let title_sel = Selector::parse("a.result__a").unwrap();
    let snippet_sel = Selector::parse(".result__snippet").unwrap();

    let mut hits = Vec::new();

    for result in doc.select(&result_sel) {
        if hits.len() >= count {
            break;
        }

        let Some(anchor) = result.select(&title_sel).next() else {
            continue;
        };

        let title = element_text(anchor);
        if title.is_empty() {
            continue;
        }

        let link = anchor
            .value()
            .attr("href")
            .map(resolve_link)
            .unwrap_or_default();

        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(element_text)
            .unwrap_or_default();

        hits.push(SearchHit {
            title,
            link,
            snippet,
        });
    }

    hits
}

/// Collapse an element's text nodes into a single trimmed line.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unwrap DuckDuckGo redirect links (`//duckduckgo.com/l/?uddg=<target>`).
fn resolve_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };

    match Url::parse(&absolute) {
        Ok(url) if url.path().starts_with("/l/") => url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
            .unwrap_or(absolute),
        _ => absolute,
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fixture() -> String {
        std::fs::read_to_string("../../../fixtures/search/duckduckgo.html")
            .expect("read duckduckgo fixture")
    }

    #[test]
    fn parses_fixture_results() {
        let hits = parse_results(&fixture(), 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Rust Programming Language");
        assert_eq!(hits[0].link, "https://www.rust-lang.org/");
        assert!(hits[0].snippet.starts_with("A language empowering everyone"));
        // Result without a snippet element
        assert_eq!(hits[2].snippet, "");
    }

    #[test]
    fn parse_respects_count() {
        let hits = parse_results(&fixture(), 2);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn parse_empty_page() {
        let hits = parse_results("<html><body><p>No results.</p></body></html>", 5);
        assert!(hits.is_empty());
    }

    #[test]
    fn resolve_redirect_link() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fdoc.rust-lang.org%2Fbook%2F&rut=abc";
        assert_eq!(resolve_link(href), "https://doc.rust-lang.org/book/");
    }

    #[test]
    fn resolve_direct_link() {
        assert_eq!(
            resolve_link("https://example.com/page"),
            "https://example.com/page"
        );
    }

    #[tokio::test]
    async fn scrape_with_mock_server() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/html/"))
            .and(body_string_contains("q=rust"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .mount(&server)
            .await;

        let tier = ScrapeTier::new(Client::new(), &format!("{}/html/", server.uri()));
        let hits = tier.search("rust", 5).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn non_200_is_err() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).set_body_string(fixture()))
            .mount(&server)
            .await;

        let tier = ScrapeTier::new(Client::new(), &format!("{}/html/", server.uri()));
        assert!(tier.search("rust", 5).await.is_err());
    }

    #[tokio::test]
    async fn empty_page_is_err() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let tier = ScrapeTier::new(Client::new(), &format!("{}/html/", server.uri()));
        assert!(tier.search("rust", 5).await.is_err());
    }
}
