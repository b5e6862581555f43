mod scrape_extras;

use std::time::Duration;

use scrape_extras::{ABOUT_HTML, SEED_HTML, SEED_URL, StubFetcher, chain_fetcher, options};
use sitescribe::crawl::PageState;
use sitescribe::{Archiver, Crawler, Frontier};
use spectral::assert_that;
use spectral::boolean::BooleanAssertions;
use spectral::vec::VecAssertions;

fn crawler(fetcher: StubFetcher, root: &std::path::Path, max_depth: usize) -> Crawler<StubFetcher> {
    Crawler::new(Archiver::new(fetcher, options(root, false)), max_depth)
        .with_site_delay(Duration::ZERO)
}

fn urls(records: &[sitescribe::SiteRecord]) -> Vec<String> {
    records.iter().map(|record| record.url.clone()).collect()
}

#[tokio::test]
async fn follows_in_domain_links_only() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fetcher = StubFetcher::new()
        .with_page(SEED_URL, SEED_HTML)
        .with_page("https://example.com/about", ABOUT_HTML)
        .with_page("https://external.com/", "<p>elsewhere</p>");
    let crawler = crawler(fetcher, temp.path(), 1);

    let records = crawler.crawl(SEED_URL).await.expect("crawl runs");

    assert_that(&urls(&records)).is_equal_to(vec![
        SEED_URL.to_string(),
        "https://example.com/about".to_string(),
    ]);
    assert_that(&crawler.archiver().fetcher().was_fetched("https://external.com/")).is_false();
}

#[tokio::test]
async fn stops_at_max_depth() {
    let temp = tempfile::tempdir().expect("tempdir");
    let crawler = crawler(chain_fetcher(), temp.path(), 2);

    let records = crawler.crawl("https://chain.test/").await.expect("crawl runs");

    assert_that(&urls(&records)).is_equal_to(vec![
        "https://chain.test/".to_string(),
        "https://chain.test/a".to_string(),
        "https://chain.test/b".to_string(),
    ]);
    let depths: Vec<usize> = records.iter().map(|record| record.depth).collect();
    assert_that(&depths).is_equal_to(vec![0, 1, 2]);
    assert_that(&crawler.archiver().fetcher().was_fetched("https://chain.test/c")).is_false();
}

#[tokio::test]
async fn depth_zero_archives_only_the_seed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let crawler = crawler(chain_fetcher(), temp.path(), 0);

    let records = crawler.crawl("https://chain.test/").await.expect("crawl runs");

    assert_that(&records).has_length(1);
    assert_that(&crawler.archiver().fetcher().calls()).has_length(1);
}

#[tokio::test]
async fn visits_each_page_of_a_cycle_once() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fetcher = StubFetcher::new()
        .with_page(
            "https://loop.test/",
            r#"<a href="/x">x</a><a href="/y/">y</a><a href="/#top">top</a>"#,
        )
        .with_page("https://loop.test/x", r#"<a href="/">home</a><a href="/y">y</a>"#)
        .with_page("https://loop.test/y/", r#"<a href="/x#again">x</a>"#);
    let crawler = crawler(fetcher, temp.path(), 5);

    let records = crawler.crawl("https://loop.test/").await.expect("crawl runs");

    assert_that(&records).has_length(3);
    assert_that(&crawler.archiver().fetcher().calls()).is_equal_to(vec![
        "https://loop.test/".to_string(),
        "https://loop.test/x".to_string(),
        "https://loop.test/y/".to_string(),
    ]);
}

#[tokio::test]
async fn resolves_relative_links_against_the_fetched_page() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fetcher = StubFetcher::new()
        .with_page("https://site.test/", r#"<a href="/docs/">docs</a>"#)
        .with_page(
            "https://site.test/docs/",
            r#"<script src="app.js"></script><a href="intro">intro</a>"#,
        )
        .with_page("https://site.test/docs/intro", "<p>intro</p>")
        .with_page("https://site.test/docs/app.js", "run();");
    let crawler = Crawler::new(Archiver::new(fetcher, options(temp.path(), true)), 2)
        .with_site_delay(Duration::ZERO);

    let records = crawler.crawl("https://site.test/").await.expect("crawl runs");

    let outcomes: Vec<(String, usize, bool)> = records
        .iter()
        .map(|record| (record.url.clone(), record.depth, record.success))
        .collect();
    assert_that(&outcomes).is_equal_to(vec![
        ("https://site.test/".to_string(), 0, true),
        ("https://site.test/docs/".to_string(), 1, true),
        ("https://site.test/docs/intro".to_string(), 2, true),
    ]);
    assert_that(&records[1].missing_scripts).has_length(0);
    assert_that(&records[1].script_files).has_length(1);
    assert_that(&crawler.archiver().fetcher().was_fetched("https://site.test/docs")).is_false();
}

#[tokio::test]
async fn invalid_seed_stops_a_batch_before_any_fetch() {
    let temp = tempfile::tempdir().expect("tempdir");
    let crawler = crawler(chain_fetcher(), temp.path(), 1);
    let seeds = vec!["https://chain.test/".to_string(), "not a url".to_string()];

    let result = crawler.crawl_all(&seeds).await;

    assert_that(&matches!(result, Err(sitescribe::Error::InvalidUrl { .. }))).is_true();
    assert_that(&crawler.archiver().fetcher().calls()).has_length(0);
}

#[tokio::test]
async fn crawls_every_seed_of_a_batch() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fetcher = chain_fetcher().with_page(SEED_URL, SEED_HTML);
    let crawler = crawler(fetcher, temp.path(), 0);
    let seeds = vec!["https://chain.test/".to_string(), SEED_URL.to_string()];

    let records = crawler.crawl_all(&seeds).await.expect("seeds are valid");

    assert_that(&urls(&records)).is_equal_to(seeds);
}

#[tokio::test]
async fn failed_pages_are_recorded_and_crawl_continues() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fetcher = StubFetcher::new()
        .with_page(
            "https://mixed.test/",
            r#"<a href="/broken">broken</a><a href="/fine">fine</a>"#,
        )
        .with_page("https://mixed.test/fine", "<p>fine</p>");
    let crawler = crawler(fetcher, temp.path(), 1);

    let records = crawler.crawl("https://mixed.test/").await.expect("crawl runs");

    let outcomes: Vec<(String, bool)> = records
        .iter()
        .map(|record| (record.url.clone(), record.success))
        .collect();
    assert_that(&outcomes).is_equal_to(vec![
        ("https://mixed.test/".to_string(), true),
        ("https://mixed.test/broken".to_string(), false),
        ("https://mixed.test/fine".to_string(), true),
    ]);
}

#[tokio::test]
async fn honors_the_page_limit() {
    let temp = tempfile::tempdir().expect("tempdir");
    let crawler = crawler(chain_fetcher(), temp.path(), 10).with_max_pages(Some(2));

    let records = crawler.crawl("https://chain.test/").await.expect("crawl runs");

    assert_that(&records).has_length(2);
    assert_that(&crawler.archiver().fetcher().calls()).has_length(2);
}

#[tokio::test]
async fn invalid_seed_is_an_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let crawler = crawler(StubFetcher::new(), temp.path(), 1);

    let result = crawler.crawl("not a url").await;

    assert_that(&matches!(result, Err(sitescribe::Error::InvalidUrl { .. }))).is_true();
    assert_that(&crawler.archiver().fetcher().calls()).has_length(0);
}

#[test]
fn frontier_refuses_known_urls() {
    let mut frontier = Frontier::new();

    assert_that(&frontier.enqueue("https://a.test/".to_string(), 0)).is_true();
    assert_that(&frontier.enqueue("https://a.test/".to_string(), 1)).is_false();

    let popped = frontier.pop();
    assert_that(&popped).is_equal_to(Some(("https://a.test/".to_string(), 0)));
    assert_that(&frontier.state("https://a.test/")).is_equal_to(Some(PageState::Visiting));

    frontier.mark_visited("https://a.test/");
    assert_that(&frontier.enqueue("https://a.test/".to_string(), 2)).is_false();
    assert_that(&frontier.enqueue("https://a.test/#top".to_string(), 2)).is_false();
    assert_that(&frontier.state("https://a.test/")).is_equal_to(Some(PageState::Visited));
    assert_that(&frontier.is_empty()).is_true();
}

#[test]
fn frontier_tracks_urls_by_normalized_form() {
    let mut frontier = Frontier::new();

    assert_that(&frontier.enqueue("https://a.test/docs/".to_string(), 1)).is_true();
    assert_that(&frontier.enqueue("https://a.test/docs".to_string(), 1)).is_false();
    assert_that(&frontier.enqueue("https://a.test/docs#intro".to_string(), 1)).is_false();

    assert_that(&frontier.pop()).is_equal_to(Some(("https://a.test/docs/".to_string(), 1)));
    assert_that(&frontier.state("https://a.test/docs")).is_equal_to(Some(PageState::Visiting));
}

#[test]
fn frontier_pops_in_breadth_first_order() {
    let mut frontier = Frontier::new();
    frontier.enqueue("https://a.test/1".to_string(), 1);
    frontier.enqueue("https://a.test/2".to_string(), 1);
    frontier.enqueue("https://a.test/3".to_string(), 2);

    let order: Vec<String> = std::iter::from_fn(|| frontier.pop().map(|(url, _)| url)).collect();

    assert_that(&order).is_equal_to(vec![
        "https://a.test/1".to_string(),
        "https://a.test/2".to_string(),
        "https://a.test/3".to_string(),
    ]);
}

#[test]
fn frontier_counts_finished_pages() {
    let mut frontier = Frontier::new();
    frontier.enqueue("https://a.test/ok".to_string(), 0);
    frontier.enqueue("https://a.test/bad".to_string(), 0);
    frontier.pop();
    frontier.pop();

    frontier.mark_visited("https://a.test/ok");
    frontier.mark_failed("https://a.test/bad");

    assert_that(&frontier.finished()).is_equal_to(2);
    assert_that(&frontier.state("https://a.test/bad")).is_equal_to(Some(PageState::Failed));
    assert_that(&frontier.state("https://a.test/unknown")).is_equal_to(None);
}
