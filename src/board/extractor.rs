use crate::{
    board::{BoardState, Occupant},
    utils::{collapse_whitespace, resolve_url},
};
use lazy_regex::regex;
use lazy_static::lazy_static;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

const E: &str = "Invalid selector";
lazy_static! {
    static ref LINK_OR_BOLD: Selector = Selector::parse("a, b, strong").expect(E);
    static ref LINK: Selector = Selector::parse("a[href]").expect(E);
}

/// How many ancestor levels above the anchor text are searched for the occupant.
const MAX_ANCHOR_CLIMB: usize = 2;
/// Blocks after the anchor's own block that may hold the occupant.
const MAX_FOLLOWING_BLOCKS: usize = 3;

/// Pulls the occupant and countdown out of the Daily Twisted Board page.
#[derive(Debug, Clone)]
pub struct BoardExtractor {
    base: Url,
}

impl BoardExtractor {
    pub fn new(base: Url) -> Self {
        BoardExtractor { base }
    }

    /// Never fails: missing pieces come back as `Occupant::Unknown` or `None`.
    /// The image is left empty; `ImageResolver` fills it in.
    pub fn extract(&self, doc: &Html) -> BoardState {
        let (occupant, detail_page_url) = match self.occupant(doc) {
            Some((name, url)) => (Occupant::Known(name), url),
            None => {
                warn!("Could not find the current occupant in the board page");
                (Occupant::Unknown, None)
            }
        };

        let countdown_text = countdown(doc);
        if countdown_text.is_none() {
            debug!("No countdown found in the board page");
        }

        BoardState {
            occupant,
            countdown_text,
            image_url: None,
            detail_page_url,
        }
    }

    /// Finds the anchor sentence, then the first link or bold node after it.
    pub fn occupant(&self, doc: &Html) -> Option<(String, Option<String>)> {
        // The phrase may be split over inline tags, so it is matched per block.
        let mut block = None;
        let mut line = String::new();
        let anchor = doc.root_element().descendants().find(|node| {
            let Some(text) = node.value().as_text() else {
                return false;
            };
            let owner = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| !is_inline(*el));
            if owner != block {
                block = owner;
                line.clear();
            }
            line.push_str(text);
            anchor_end(&line).is_some()
        })?;

        let mut current = anchor;
        for _ in 0..=MAX_ANCHOR_CLIMB {
            let found = current
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find_map(|el| self.candidate(el));
            if let Some(found) = found {
                debug!("Extracted occupant: {}", found.0);
                return Some(found);
            }
            match current
                .parent()
                .filter(|parent| ElementRef::wrap(*parent).map_or(false, is_inline))
            {
                Some(parent) => current = parent,
                None => break,
            }
        }

        // "occupied by:" may close its own block, with the name in the next one.
        let block = block?;
        if !ends_with_anchor(block) {
            return None;
        }
        let found = block
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take(MAX_FOLLOWING_BLOCKS)
            .find_map(|el| self.candidate(el))?;
        debug!("Extracted occupant from a following block: {}", found.0);
        Some(found)
    }

    fn candidate(&self, el: ElementRef) -> Option<(String, Option<String>)> {
        std::iter::once(el)
            .chain(el.select(&LINK_OR_BOLD))
            .filter(|el| matches!(el.value().name(), "a" | "b" | "strong"))
            .find_map(|el| self.qualify(el))
    }

    fn qualify(&self, el: ElementRef) -> Option<(String, Option<String>)> {
        let name = occupant_name(&el.text().collect::<String>())?;

        if el.value().name() == "a" {
            let url = el
                .value()
                .attr("href")
                .and_then(|href| resolve_url(&self.base, href));
            return Some((name, url));
        }

        // Bold text wrapping the character link still carries the link's target.
        let url = el
            .select(&LINK)
            .find(|a| occupant_name(&a.text().collect::<String>()).as_deref() == Some(name.as_str()))
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_url(&self.base, href));
        Some((name, url))
    }
}

fn is_inline(el: ElementRef) -> bool {
    matches!(
        el.value().name(),
        "a" | "b" | "strong" | "i" | "em" | "span" | "small" | "u" | "s" | "sup" | "sub"
            | "abbr" | "code" | "font" | "mark" | "img"
    )
}

fn anchor_end(text: &str) -> Option<usize> {
    regex!(r"(?i)currently,?\s+the\s+board\s+is\s+occupied\s+by")
        .find(text)
        .map(|m| m.end())
}

/// Nothing but a colon or full stop follows the anchor phrase in `block`.
fn ends_with_anchor(block: ElementRef) -> bool {
    let text = block.text().collect::<String>();
    anchor_end(&text).map_or(false, |end| {
        text[end..]
            .trim_matches(|c: char| c.is_whitespace() || c == ':' || c == '.')
            .is_empty()
    })
}

/// Trims and drops a trailing parenthetical; rejects empty text and the bare word "Twisted".
pub(crate) fn occupant_name(raw: &str) -> Option<String> {
    let name = collapse_whitespace(raw);
    let name = regex!(r"\s*\([^()]*\)$").replace(&name, "").trim().to_string();
    if name.is_empty() || name.eq_ignore_ascii_case("twisted") {
        None
    } else {
        Some(name)
    }
}

/// First match wins, most specific pattern first. No match crosses a block boundary.
pub fn countdown(doc: &Html) -> Option<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    block_lines(doc.root_element(), &mut lines, &mut line);
    flush_line(&mut lines, &mut line);
    countdown_in_text(&lines.join("\n"))
}

/// Document text with one line per block element.
fn block_lines(el: ElementRef, lines: &mut Vec<String>, line: &mut String) {
    if matches!(el.value().name(), "script" | "style") {
        return;
    }
    let block = !is_inline(el);
    if block {
        flush_line(lines, line);
    }
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            line.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            block_lines(child, lines, line);
        }
    }
    if block {
        flush_line(lines, line);
    }
}

fn flush_line(lines: &mut Vec<String>, line: &mut String) {
    let text = collapse_whitespace(line);
    if !text.is_empty() {
        lines.push(text);
    }
    line.clear();
}

/// `text` holds one block per line; `.` never matches the newline between them.
pub(crate) fn countdown_in_text(text: &str) -> Option<String> {
    [
        regex!(r"(?i)it will be .+? until the (?:daily twisted )?board changes"),
        regex!(r"(?i)\d+ hours?, \d+ minutes? and \d+ seconds? until"),
        regex!(r"(?i)\d+ hours? and \d+ minutes? until"),
        regex!(r"(?i)\d+ minutes? and \d+ seconds? until"),
        regex!(r"(?i)\d+ seconds? until"),
    ]
    .iter()
    .find_map(|re| re.find(text))
    .map(|m| {
        let cleaned = regex!(r"(?i)\[\s*edit\s*\]").replace_all(m.as_str(), " ");
        collapse_whitespace(&cleaned)
    })
    .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extractor() -> BoardExtractor {
        BoardExtractor::new(
            Url::parse("https://dandys-world-robloxhorror.fandom.com/wiki/Daily_Twisted_Board")
                .unwrap(),
        )
    }

    fn parse(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{}</body></html>", body))
    }

    #[test]
    fn no_anchor_means_unknown() {
        let doc = parse("<p>The board is empty today. <a href=\"/wiki/Goob\">Goob</a></p>");
        let state = extractor().extract(&doc);
        assert_eq!(state.occupant, Occupant::Unknown);
        assert_eq!(state.detail_page_url, None);
    }

    #[test]
    fn empty_document_means_unknown() {
        let state = extractor().extract(&Html::parse_document(""));
        assert_eq!(state.occupant, Occupant::Unknown);
        assert_eq!(state.countdown_text, None);
        assert_eq!(state.image_url, None);
    }

    #[test]
    fn link_after_anchor_is_occupant() {
        let doc = parse(
            r#"<p>Currently, the board is occupied by <a href="/wiki/Twisted_Goob">Twisted Goob</a>.</p>"#,
        );
        let state = extractor().extract(&doc);
        assert_eq!(state.occupant, Occupant::Known("Twisted Goob".to_string()));
        assert_eq!(
            state.detail_page_url.as_deref(),
            Some("https://dandys-world-robloxhorror.fandom.com/wiki/Twisted_Goob")
        );
    }

    #[test]
    fn skips_bare_twisted_and_strips_parenthetical() {
        let doc = parse(
            r#"<p>Currently, the board is occupied by <b>Twisted</b> <a href="/wiki/Shelly_(Twisted)">Shelly (Twisted)</a>.</p>"#,
        );
        let (name, url) = extractor().occupant(&doc).unwrap();
        assert_eq!(name, "Shelly");
        assert_eq!(
            url.as_deref(),
            Some("https://dandys-world-robloxhorror.fandom.com/wiki/Shelly_(Twisted)")
        );
    }

    #[test]
    fn bold_occupant_without_link() {
        let doc = parse("<p>Currently, the board is occupied by <strong>Twisted Vee</strong>.</p>");
        assert_eq!(
            extractor().occupant(&doc),
            Some(("Twisted Vee".to_string(), None))
        );
    }

    #[test]
    fn bold_wrapping_link_keeps_target() {
        let doc = parse(
            r#"<p>Currently, the board is occupied by <b><a href="/wiki/Twisted_Pebble">Twisted Pebble</a></b>.</p>"#,
        );
        assert_eq!(
            extractor().occupant(&doc),
            Some((
                "Twisted Pebble".to_string(),
                Some("https://dandys-world-robloxhorror.fandom.com/wiki/Twisted_Pebble".to_string())
            ))
        );
    }

    #[test]
    fn anchor_inside_bold_climbs_to_parent_siblings() {
        let doc = parse(
            r#"<p><i>Currently, the board is occupied by</i> <a href="/wiki/Twisted_Astro">Twisted Astro</a></p>"#,
        );
        assert_eq!(
            extractor().occupant(&doc).map(|(name, _)| name),
            Some("Twisted Astro".to_string())
        );
    }

    #[test]
    fn does_not_take_names_from_the_next_paragraph() {
        let doc = parse(
            "<p>Currently, the board is occupied by nobody.</p><p>It will be <b>3 hours</b> until the board changes</p>",
        );
        assert_eq!(extractor().occupant(&doc), None);
    }

    #[test]
    fn occupant_in_the_block_after_the_anchor() {
        let doc = parse(
            r#"<p>Currently, the board is occupied by:</p><p><a href="/wiki/Twisted_Goob">Twisted Goob</a></p>"#,
        );
        assert_eq!(
            extractor().occupant(&doc),
            Some((
                "Twisted Goob".to_string(),
                Some("https://dandys-world-robloxhorror.fandom.com/wiki/Twisted_Goob".to_string())
            ))
        );
    }

    #[test]
    fn following_blocks_are_bounded() {
        let doc = parse(
            r#"<p>Currently, the board is occupied by:</p><p>a</p><p>b</p><p>c</p><p><a href="/wiki/Twisted_Goob">Twisted Goob</a></p>"#,
        );
        assert_eq!(extractor().occupant(&doc), None);
    }

    #[test]
    fn anchor_split_across_inline_tags() {
        let doc = parse(
            r#"<p>Currently, the board is <i>occupied</i> by <a href="/wiki/Twisted_Goob">Twisted Goob</a></p>"#,
        );
        assert_eq!(
            extractor().occupant(&doc).map(|(name, _)| name),
            Some("Twisted Goob".to_string())
        );
    }

    #[test]
    fn anchor_without_candidate_is_unknown() {
        let doc = parse("<p>Currently, the board is occupied by nobody.</p>");
        let state = extractor().extract(&doc);
        assert_eq!(state.occupant, Occupant::Unknown);
        assert_eq!(state.detail_page_url, None);
    }

    #[test]
    fn countdown_does_not_depend_on_occupant() {
        let doc = parse("<p>2 hours and 5 minutes until the next change.</p>");
        let state = extractor().extract(&doc);
        assert_eq!(state.occupant, Occupant::Unknown);
        assert_eq!(state.countdown_text.as_deref(), Some("2 hours and 5 minutes until"));
    }

    #[test]
    fn full_sentence_wins_over_numeric_pattern() {
        let text = "It will be 3 hours, 12 minutes and 40 seconds until the Daily Twisted Board changes.";
        assert_eq!(
            countdown_in_text(text).as_deref(),
            Some("It will be 3 hours, 12 minutes and 40 seconds until the Daily Twisted Board changes")
        );
        assert_eq!(countdown_in_text(text), countdown_in_text(text));
    }

    #[test]
    fn countdown_narrower_patterns_in_order() {
        assert_eq!(
            countdown_in_text("only 12 minutes and 3 seconds until reset").as_deref(),
            Some("12 minutes and 3 seconds until")
        );
        assert_eq!(
            countdown_in_text("just 9 seconds until reset").as_deref(),
            Some("9 seconds until")
        );
        assert_eq!(countdown_in_text("no timer here"), None);
    }

    #[test]
    fn countdown_strips_edit_marker() {
        let doc = parse(
            "<h2>Timer<span>[edit]</span></h2><p>It will be <b>5 hours</b> [edit] until the board changes</p>",
        );
        assert_eq!(
            countdown(&doc).as_deref(),
            Some("It will be 5 hours until the board changes")
        );
    }

    #[test]
    fn countdown_stays_inside_one_paragraph() {
        let doc = parse(
            "<p>It will be a long night for survivors.</p><p>Board info below.</p>\
             <p>It will be 3 hours, 2 minutes and 1 seconds until the Daily Twisted Board changes.</p>",
        );
        assert_eq!(
            countdown(&doc).as_deref(),
            Some("It will be 3 hours, 2 minutes and 1 seconds until the Daily Twisted Board changes")
        );
        assert_eq!(
            countdown_in_text("It will be dark\n2 hours and 5 minutes until the board changes")
                .as_deref(),
            Some("2 hours and 5 minutes until")
        );
    }

    #[test]
    fn occupant_name_cleanup() {
        assert_eq!(occupant_name("  Twisted   Goob (character) "), Some("Twisted Goob".to_string()));
        assert_eq!(occupant_name("Twisted"), None);
        assert_eq!(occupant_name("   "), None);
    }
}
