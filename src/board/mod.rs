mod extractor;
mod image;

pub use extractor::{countdown, BoardExtractor};
pub use image::{normalize_image_url, ImageResolver};

use std::fmt;

/// Display value for a board whose occupant could not be read.
pub const UNKNOWN_OCCUPANT: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occupant {
    Known(String),
    Unknown,
}

impl Occupant {
    pub fn name(&self) -> Option<&str> {
        match self {
            Occupant::Known(name) => Some(name.as_str()),
            Occupant::Unknown => None,
        }
    }
}

impl fmt::Display for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or(UNKNOWN_OCCUPANT))
    }
}

/// What one check saw on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    pub occupant: Occupant,
    pub countdown_text: Option<String>,
    pub image_url: Option<String>,
    pub detail_page_url: Option<String>,
}

impl BoardState {
    pub fn unknown() -> Self {
        BoardState {
            occupant: Occupant::Unknown,
            countdown_text: None,
            image_url: None,
            detail_page_url: None,
        }
    }
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Occupant        : {}", self.occupant)?;
        if let Some(d) = self.countdown_text.as_ref() {
            writeln!(f, "Countdown       : {}", d)?;
        } else {
            writeln!(f, "Countdown       : None")?;
        };

        if let Some(d) = self.image_url.as_ref() {
            writeln!(f, "Image           : {}", d)?;
        } else {
            writeln!(f, "Image           : None")?;
        };

        if let Some(d) = self.detail_page_url.as_ref() {
            writeln!(f, "Detail Page     : {}", d)?;
        } else {
            writeln!(f, "Detail Page     : None")?;
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::Url;
    use scraper::html::Html;
    use std::fs;

    fn base() -> Url {
        Url::parse("https://dandys-world-robloxhorror.fandom.com/wiki/Daily_Twisted_Board").unwrap()
    }

    #[test]
    fn test_parsing_board_page() {
        let html = fs::read_to_string("tests/htmls/board.html").expect("Invalid file path");
        let doc = Html::parse_document(&html);

        let mut state = BoardExtractor::new(base()).extract(&doc);
        state.image_url = ImageResolver::new(base()).from_listing(&doc, "Twisted Goob");

        let expected = BoardState {
            occupant: Occupant::Known("Twisted Goob".to_string()),
            countdown_text: Some(
                "It will be 3 hours, 41 minutes and 12 seconds until the Daily Twisted Board changes"
                    .to_string(),
            ),
            image_url: Some(
                "https://static.wikia.nocookie.net/dandys-world-robloxhorror/images/4/4e/Twisted_Goob.png"
                    .to_string(),
            ),
            detail_page_url: Some(
                "https://dandys-world-robloxhorror.fandom.com/wiki/Twisted_Goob".to_string(),
            ),
        };
        assert_eq!(state, expected);
    }

    #[test]
    fn test_parsing_detail_page() {
        let html = fs::read_to_string("tests/htmls/twisted_goob.html").expect("Invalid file path");
        let doc = Html::parse_document(&html);

        assert_eq!(
            ImageResolver::new(base()).from_detail_page(&doc).as_deref(),
            Some("https://static.wikia.nocookie.net/dandys-world-robloxhorror/images/9/9c/Twisted_Goob_Render.png")
        );
    }

    #[test]
    fn display_lists_every_field() {
        let state = BoardState {
            occupant: Occupant::Known("Twisted Vee".to_string()),
            countdown_text: Some("5 seconds until".to_string()),
            image_url: None,
            detail_page_url: None,
        };
        assert_eq!(
            state.to_string(),
            "Occupant        : Twisted Vee\n\
             Countdown       : 5 seconds until\n\
             Image           : None\n\
             Detail Page     : None\n"
        );
        assert_eq!(BoardState::unknown().occupant.to_string(), UNKNOWN_OCCUPANT);
    }
}
