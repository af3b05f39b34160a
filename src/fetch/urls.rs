// src/fetch/urls.rs

use scraper::{Html, Selector};
use url::Url;

/// All `<a href>` targets ending in `.pdf`, resolved against `base`.
pub fn pdf_links(html: &str, base: &Url) -> Vec<Url> {
    let selector =
        Selector::parse(r#"a[href$=".pdf"]"#).expect("CSS selector for PDF links should be valid");
    Html::parse_document(html)
        .select(&selector)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .collect()
}

/// Whether `url` is on `domain` or one of its subdomains.
pub fn is_allowed(url: &Url, domain: &str) -> bool {
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    match url.host_str() {
        Some(host) => {
            let host = host.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{}", domain))
        }
        None => false,
    }
}

/// File name a PDF is stored under: the last segment of the URL path, verbatim.
pub fn pdf_name(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <a href="/content/dam/fees/part-b-2024.pdf">2024</a>
          <a href="https://www.pa.gov/content/dam/fees/part-b-2023.pdf">2023</a>
          <a href="notes.PDF">upper case</a>
          <a href="schedule.html">page</a>
          <a>no target</a>
          <a href="https://example.com/other.pdf">elsewhere</a>
        </body></html>
    "#;

    #[test]
    fn finds_and_resolves_pdf_links() {
        let base = Url::parse("https://www.pa.gov/agencies/dli/fees.html").unwrap();
        let links: Vec<String> = pdf_links(PAGE, &base)
            .iter()
            .map(Url::to_string)
            .collect();
        assert_eq!(
            links,
            vec![
                "https://www.pa.gov/content/dam/fees/part-b-2024.pdf",
                "https://www.pa.gov/content/dam/fees/part-b-2023.pdf",
                "https://example.com/other.pdf",
            ]
        );
    }

    #[test]
    fn domain_filter_accepts_subdomains() {
        let ok = Url::parse("https://www.pa.gov/a.pdf").unwrap();
        let bare = Url::parse("https://pa.gov/a.pdf").unwrap();
        let lookalike = Url::parse("https://notpa.gov/a.pdf").unwrap();
        let other = Url::parse("https://example.com/a.pdf").unwrap();
        assert!(is_allowed(&ok, "pa.gov"));
        assert!(is_allowed(&bare, "PA.gov"));
        assert!(!is_allowed(&lookalike, "pa.gov"));
        assert!(!is_allowed(&other, "pa.gov"));
    }

    #[test]
    fn name_is_last_path_segment() {
        let u = Url::parse("https://www.pa.gov/dam/fee%202024.pdf").unwrap();
        assert_eq!(pdf_name(&u).as_deref(), Some("fee%202024.pdf"));
        let dir = Url::parse("https://www.pa.gov/dam/").unwrap();
        assert_eq!(pdf_name(&dir), None);
    }
}
