use crate::{
    board::Occupant,
    utils::{collapse_whitespace, resolve_url},
    PageSource,
};
use lazy_regex::regex;
use lazy_static::lazy_static;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

const E: &str = "Invalid selector";
lazy_static! {
    static ref CONTENT: Selector = Selector::parse(".mw-parser-output").expect(E);
    static ref IMG: Selector = Selector::parse("img").expect(E);
    static ref CAPTION: Selector =
        Selector::parse("figcaption, .lightbox-caption, .thumbcaption, .gallerytext, .pi-caption")
            .expect(E);
    static ref INFOBOX_IMG: Selector =
        Selector::parse(".portable-infobox img, .infobox img").expect(E);
    static ref FIGURE_IMG: Selector = Selector::parse(
        "figure img, .wikia-gallery-item img, .gallerybox img, .thumb img, .thumbimage"
    )
    .expect(E);
}

/// Images declaring a smaller width or height are icons or badges.
const MIN_IMAGE_DIMENSION: u32 = 50;
/// Scaled thumbnails at least this wide are treated as real pictures.
const LARGE_THUMBNAIL_WIDTH: u32 = 200;
/// How far up from an image to look for its caption.
const MAX_CAPTION_CLIMB: usize = 4;

const FURNITURE: &[&str] = &["logo", "icon", "badge", "button"];

type ListingStrategy = fn(&ImageResolver, &Html, &str) -> Option<String>;
type DetailStrategy = fn(&ImageResolver, &Html) -> Option<String>;

/// Finds a picture of the occupant, first on the board page and then on the
/// occupant's own wiki page.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    base: Url,
}

impl ImageResolver {
    const LISTING: [ListingStrategy; 2] = [Self::by_caption, Self::by_alt_or_filename];
    const DETAIL: [DetailStrategy; 3] = [Self::infobox, Self::first_figure, Self::any_large_image];

    pub fn new(base: Url) -> Self {
        ImageResolver { base }
    }

    /// A miss in both tiers, or a failed detail-page fetch, yields `None`.
    pub async fn resolve<S>(
        &self,
        source: &S,
        markup: &str,
        occupant: &Occupant,
        detail_page_url: Option<&str>,
    ) -> Option<String>
    where
        S: PageSource + ?Sized,
    {
        let name = occupant.name()?;

        let listed = {
            let doc = Html::parse_document(markup);
            self.from_listing(&doc, name)
        };
        if listed.is_some() {
            return listed;
        }

        let Some(url) = detail_page_url else {
            warn!("No image for {} on the board page and no detail page to try", name);
            return None;
        };

        debug!("Falling back to detail page {}", url);
        let html = match source.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Could not fetch detail page {}", url);
                return None;
            }
        };

        let found = {
            let doc = Html::parse_document(&html);
            self.from_detail_page(&doc)
        };
        match &found {
            Some(image) => info!("Found image for {} on detail page: {}", name, image),
            None => warn!("Could not find an image for {}", name),
        }
        found
    }

    pub fn from_listing(&self, doc: &Html, occupant: &str) -> Option<String> {
        Self::LISTING
            .iter()
            .find_map(|strategy| strategy(self, doc, occupant))
    }

    pub fn from_detail_page(&self, doc: &Html) -> Option<String> {
        Self::DETAIL.iter().find_map(|strategy| strategy(self, doc))
    }

    fn by_caption(&self, doc: &Html, occupant: &str) -> Option<String> {
        content_region(doc)
            .select(&IMG)
            .filter(|img| {
                caption_container(*img).map_or(false, |container| {
                    container
                        .select(&CAPTION)
                        .any(|caption| mentions(&caption.text().collect::<String>(), occupant))
                })
            })
            .find_map(|img| self.source_of(img))
    }

    fn by_alt_or_filename(&self, doc: &Html, occupant: &str) -> Option<String> {
        content_region(doc)
            .select(&IMG)
            .filter(|img| !is_small(*img))
            .filter_map(|img| {
                let url = self.source_of(img)?;
                let alt = img.value().attr("alt").unwrap_or_default();
                (mentions(alt, occupant) || mentions(file_name(&url), occupant)).then_some(url)
            })
            .next()
    }

    fn infobox(&self, doc: &Html) -> Option<String> {
        doc.select(&INFOBOX_IMG)
            .find_map(|img| self.source_of(img))
    }

    fn first_figure(&self, doc: &Html) -> Option<String> {
        content_region(doc)
            .select(&FIGURE_IMG)
            .filter(|img| !is_small(*img))
            .find_map(|img| self.source_of(img))
    }

    fn any_large_image(&self, doc: &Html) -> Option<String> {
        content_region(doc)
            .select(&IMG)
            .filter(|img| !is_small(*img))
            .filter_map(|img| self.source_of(img).map(|url| (img, url)))
            .find(|(img, url)| !is_furniture(*img, url))
            .map(|(_, url)| url)
    }

    /// Normalized image URL, preferring the lazy-load `data-src` over a placeholder `src`.
    fn source_of(&self, img: ElementRef) -> Option<String> {
        ["data-src", "src"]
            .iter()
            .filter_map(|attr| img.value().attr(attr))
            .find_map(|src| normalize_image_url(&self.base, src))
    }
}

fn content_region(doc: &Html) -> ElementRef {
    doc.select(&CONTENT)
        .next()
        .unwrap_or_else(|| doc.root_element())
}

/// Closest ancestor holding a caption and no other image.
fn caption_container(img: ElementRef) -> Option<ElementRef> {
    img.ancestors()
        .take(MAX_CAPTION_CLIMB)
        .filter_map(ElementRef::wrap)
        .take_while(|ancestor| ancestor.select(&IMG).nth(1).is_none())
        .find(|ancestor| ancestor.select(&CAPTION).next().is_some())
}

fn dimension(img: ElementRef, attr: &str) -> Option<u32> {
    img.value()
        .attr(attr)
        .and_then(|v| v.trim().trim_end_matches("px").parse().ok())
}

/// Undeclared dimensions never count as small.
fn is_small(img: ElementRef) -> bool {
    [dimension(img, "width"), dimension(img, "height")]
        .iter()
        .flatten()
        .any(|d| *d < MIN_IMAGE_DIMENSION)
}

fn is_furniture(img: ElementRef, url: &str) -> bool {
    let haystack = format!(
        "{} {} {}",
        url,
        img.value().attr("alt").unwrap_or_default(),
        img.value().attr("class").unwrap_or_default()
    )
    .to_lowercase();

    if FURNITURE.iter().any(|word| haystack.contains(word)) {
        return true;
    }
    haystack.contains("thumb") && !is_large_thumbnail(img, url)
}

fn is_large_thumbnail(img: ElementRef, url: &str) -> bool {
    let scaled = regex!(r"scale-to-width(?:-down)?/(\d+)")
        .captures(url)
        .and_then(|c| c[1].parse::<u32>().ok());
    scaled
        .or_else(|| dimension(img, "width"))
        .map_or(false, |w| w >= LARGE_THUMBNAIL_WIDTH)
}

fn normalize_for_match(s: &str) -> String {
    collapse_whitespace(&s.replace("%20", " ").replace('_', " ")).to_lowercase()
}

/// `text` names the occupant, with or without the "Twisted" prefix next to it.
fn mentions(text: &str, occupant: &str) -> bool {
    let text = normalize_for_match(text);
    let name = normalize_for_match(occupant);
    if name.is_empty() {
        return false;
    }
    if text.contains(&name) {
        return true;
    }
    match name.strip_prefix("twisted ") {
        Some(bare) => text.contains("twisted") && text.contains(bare),
        None => false,
    }
}

fn file_name(url: &str) -> &str {
    let path = url.split(|c| c == '?' || c == '#').next().unwrap_or(url);
    let path = path.split("/revision/").next().unwrap_or(path);
    path.rsplit('/').next().unwrap_or(path)
}

/// Resolves relative sources and trims Fandom scaling/revision suffixes.
///
/// - direct image file without a revision segment: returned as-is
/// - canonical `static.wikia.nocookie.net/<wiki>/images/x/xy/<file>`: cut to that
/// - anything else with `/revision/`: cut before it
/// - otherwise unchanged
pub fn normalize_image_url(base: &Url, raw: &str) -> Option<String> {
    let url = resolve_url(base, raw)?;
    let has_revision = url.contains("/revision/");

    if !has_revision && regex!(r"(?i)\.(?:png|jpe?g|gif|webp|svg)$").is_match(&url) {
        return Some(url);
    }
    if let Some(m) = regex!(
        r"^https?://static\.wikia\.nocookie\.net/[^/]+/images/[0-9a-f]/[0-9a-f]{2}/[^/?#]+"
    )
    .find(&url)
    {
        return Some(m.as_str().to_string());
    }
    if let Some(idx) = url.find("/revision/") {
        return Some(url[..idx].to_string());
    }
    Some(url)
}
