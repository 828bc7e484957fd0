//! Deterministic last-resort result set.

use dossier_shared::SearchHit;

/// Five template hits (overview, recent studies, global perspectives,
/// economic analysis, technological innovations), truncated to `count`.
pub fn synthetic_hits(query: &str, count: usize) -> Vec<SearchHit> {
    let templates = [
        (
            format!("Comprehensive Guide to {query}"),
            "https://example.com/guide",
            format!(
                "This guide gives an overview of {query}, covering its historical context, \
                 current trends, and future projections. It highlights the main challenges and \
                 opportunities."
            ),
        ),
        (
            format!("Recent Studies on {query}"),
            "https://example.edu/research",
            format!(
                "A review of recent studies on {query} finds broad and measurable impact. \
                 Researchers call for prompt action on the emerging issues."
            ),
        ),
        (
            format!("Global Perspectives: {query}"),
            "https://global-news.example.com/article",
            format!(
                "Regions around the world approach {query} in different ways. This article \
                 compares policies in the EU, the USA, and Asia and their regulatory frameworks."
            ),
        ),
        (
            format!("Economic Analysis of {query}"),
            "https://finance-daily.example.com/report",
            format!(
                "The economic implications of {query} are significant. Analysts expect related \
                 sectors to grow steadily over the next decade, driven by innovation and demand."
            ),
        ),
        (
            format!("Technological Innovations in {query}"),
            "https://tech-insider.example.net/innovation",
            format!(
                "New technologies are reshaping {query}. AI integration and automated systems \
                 are changing the landscape quickly."
            ),
        ),
    ];

    templates
        .into_iter()
        .take(count)
        .map(|(title, link, snippet)| SearchHit::new(title, link, snippet))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_templates_max() {
        assert_eq!(synthetic_hits("x", 10).len(), 5);
        assert_eq!(synthetic_hits("x", 3).len(), 3);
        assert!(synthetic_hits("x", 0).is_empty());
    }

    #[test]
    fn deterministic_and_query_derived() {
        let a = synthetic_hits("urban farming", 5);
        let b = synthetic_hits("urban farming", 5);
        assert_eq!(a, b);
        for hit in &a {
            assert!(hit.title.contains("urban farming"));
            assert!(hit.snippet.contains("urban farming"));
            assert!(!hit.link.is_empty());
        }
    }

    #[test]
    fn covers_expected_angles() {
        let titles: Vec<String> = synthetic_hits("q", 5).into_iter().map(|h| h.title).collect();
        assert!(titles[0].contains("Guide"));
        assert!(titles[1].contains("Recent Studies"));
        assert!(titles[2].contains("Global Perspectives"));
        assert!(titles[3].contains("Economic Analysis"));
        assert!(titles[4].contains("Technological Innovations"));
    }
}
