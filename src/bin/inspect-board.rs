use reqwest::Url;
use scraper::Html;
use twisted_board_watcher::{
    board::{BoardExtractor, ImageResolver},
    config::DEFAULT_BOARD_URL,
    fetch::{build_client, HttpFetcher},
    PageSource,
};

/// Prints what the watcher would see on the board right now, without notifying anyone.
async fn inspect_board(url: Url) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = HttpFetcher::new(build_client()?);
    let html = fetcher.fetch(url.as_str()).await?;

    let mut state = {
        let doc = Html::parse_document(&html);
        BoardExtractor::new(url.clone()).extract(&doc)
    };
    state.image_url = ImageResolver::new(url)
        .resolve(
            &fetcher,
            &html,
            &state.occupant,
            state.detail_page_url.as_deref(),
        )
        .await;

    print!("{}", state);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_BOARD_URL.to_string());
    inspect_board(Url::parse(&url)?).await
}
