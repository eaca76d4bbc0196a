//! Page text extraction for content-derived tag suggestions.
//!
//! Collects candidate text from a page's structured regions in a fixed
//! order. Each source contributes at most one space-joined string.

use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

const IGNORED_PATH_SEGMENTS: [&str; 12] = [
    "www", "com", "org", "net", "html", "htm", "php", "asp", "aspx", "index", "home", "page",
];

const MAIN_REGIONS: [&str; 5] = ["main", "article", "[role=\"main\"]", ".main", ".content"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

/// `main strong, article strong, ...` for every main region and each inner selector.
fn in_main_region(inner: &[&str]) -> Selector {
    let parts: Vec<String> = MAIN_REGIONS
        .iter()
        .flat_map(|region| inner.iter().map(move |el| format!("{} {}", region, el)))
        .collect();
    selector(&parts.join(", "))
}

static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static META_KEYWORDS: Lazy<Selector> = Lazy::new(|| selector("meta[name=\"keywords\"]"));
static META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector("meta[name=\"description\"]"));
static HEADINGS: Lazy<Selector> = Lazy::new(|| selector("h1, h2, h3"));
static WITH_TITLE: Lazy<Selector> = Lazy::new(|| selector("[title]"));
static EMPHASIS: Lazy<Selector> = Lazy::new(|| {
    in_main_region(&["strong", "b", "em", "i", "mark", "dfn", "cite", "kbd", "code"])
});
static DEFINITION_TERMS: Lazy<Selector> = Lazy::new(|| in_main_region(&["dl dt"]));
static TABLE_HEADERS: Lazy<Selector> = Lazy::new(|| in_main_region(&["th", "caption"]));
static MAIN_IMAGES: Lazy<Selector> = Lazy::new(|| in_main_region(&["img"]));
static MAIN_LINKS: Lazy<Selector> = Lazy::new(|| in_main_region(&["a"]));
static NAVIGATION: Lazy<[Selector; 3]> =
    Lazy::new(|| [selector("nav"), selector("header nav"), selector("[role=\"navigation\"]")]);
static BREADCRUMB: Lazy<Selector> = Lazy::new(|| {
    selector(
        "[aria-label*=\"breadcrumb\" i], .breadcrumb, [itemtype*=\"BreadcrumbList\"]",
    )
});
static BREADCRUMB_ITEMS: Lazy<Selector> = Lazy::new(|| selector("a, [itemprop=\"name\"]"));
static LINKS: Lazy<Selector> = Lazy::new(|| selector("a"));

/// Text of an element: its own `title`, a descendant's `title`, then its trimmed text.
pub fn element_text(element: &ElementRef) -> String {
    if let Some(title) = element.value().attr("title").map(str::trim) {
        if !title.is_empty() {
            return title.to_string();
        }
    }
    let child_title = element
        .select(&WITH_TITLE)
        .next()
        .and_then(|child| child.value().attr("title"))
        .map(str::trim)
        .unwrap_or_default();
    if !child_title.is_empty() {
        return child_title.to_string();
    }
    element.text().collect::<String>().trim().to_string()
}

/// Path segments of `page_url` that carry meaning.
pub fn meaningful_path_segments(page_url: &str) -> Vec<String> {
    let url = match Url::parse(page_url) {
        Ok(url) => url,
        Err(_) => return Vec::new(),
    };
    url.path()
        .split('/')
        .filter(|seg| seg.len() >= 2)
        .filter(|seg| !IGNORED_PATH_SEGMENTS.contains(&seg.to_lowercase().as_str()))
        .filter(|seg| !seg.chars().all(|c| c.is_ascii_digit()))
        .map(|seg| urlencoding::decode(seg).map(|s| s.into_owned()).unwrap_or_else(|_| seg.to_string()))
        .collect()
}

fn meta_content(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

/// Joins the non-empty texts of up to `cap` elements.
fn joined<'a>(elements: impl Iterator<Item = ElementRef<'a>>, cap: usize) -> Option<String> {
    let texts: Vec<String> = elements
        .take(cap)
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join(" "))
    }
}

/// Candidate texts of one page, in source order.
pub fn extract_texts(html: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut texts = Vec::new();

    if let Some(title) = document.select(&TITLE).next() {
        let title = title.text().collect::<String>().trim().to_string();
        if !title.is_empty() {
            texts.push(title);
        }
    }

    let segments = meaningful_path_segments(page_url);
    if !segments.is_empty() {
        texts.push(segments.join(" "));
    }

    texts.extend(meta_content(&document, &META_KEYWORDS));
    texts.extend(meta_content(&document, &META_DESCRIPTION));

    texts.extend(joined(document.select(&HEADINGS), usize::MAX));
    texts.extend(joined(document.select(&EMPHASIS), 60));
    texts.extend(joined(document.select(&DEFINITION_TERMS), 40));
    texts.extend(joined(document.select(&TABLE_HEADERS), 40));

    let nav = NAVIGATION.iter().find_map(|sel| document.select(sel).next());
    if let Some(nav) = nav {
        texts.extend(joined(nav.select(&LINKS), 40));
    }

    if let Some(breadcrumb) = document.select(&BREADCRUMB).next() {
        texts.extend(joined(breadcrumb.select(&BREADCRUMB_ITEMS), 40));
    }

    let alts: Vec<&str> = document
        .select(&MAIN_IMAGES)
        .take(10)
        .filter_map(|img| img.value().attr("alt"))
        .filter(|alt| !alt.is_empty())
        .collect();
    if !alts.is_empty() {
        texts.push(alts.join(" "));
    }

    texts.extend(joined(document.select(&MAIN_LINKS), 20));

    tracing::trace!(sources = texts.len(), "page_texts_extracted");
    texts
}
