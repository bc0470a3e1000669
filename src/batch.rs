//! Batch orchestration: every article through the image and metadata phases.

use crate::capture::generate_card;
use crate::content::{discover_articles, Article, CardPaths};
use crate::frontmatter::update_article_images;
use crate::{CardConfig, Error, Result, Session};
use futures::StreamExt;
use std::sync::Arc;

/// Flags controlling which phases run
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Do not capture any card
    pub skip_image: bool,
    /// Do not rewrite any article's front matter
    pub skip_post_update: bool,
    /// Regenerate cards even when one already exists
    pub force: bool,
}

/// What happened to an article's card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStatus {
    Generated,
    /// A card already existed and was left alone
    Existing,
    NotRequested,
}

/// What happened to an article's front matter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataStatus {
    Updated,
    /// The card path was already listed
    Unchanged,
    /// No card on disk to reference
    NoCard,
    NotRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleOutcome {
    pub card: CardStatus,
    pub metadata: MetadataStatus,
}

/// Result of a run, sorted by slug
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(String, ArticleOutcome)>,
    pub failures: Vec<(String, String)>,
}

impl BatchReport {
    fn slugs_where(&self, pred: impl Fn(&ArticleOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| pred(o))
            .map(|(slug, _)| slug.as_str())
            .collect()
    }

    pub fn generated(&self) -> Vec<&str> {
        self.slugs_where(|o| o.card == CardStatus::Generated)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.slugs_where(|o| o.card == CardStatus::Existing)
    }

    pub fn updated(&self) -> Vec<&str> {
        self.slugs_where(|o| o.metadata == MetadataStatus::Updated)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.failures.iter().map(|(slug, _)| slug.as_str()).collect()
    }

    /// Articles attempted, successful or not
    pub fn attempted(&self) -> usize {
        self.outcomes.len() + self.failures.len()
    }
}

/// Run the card generator over every article in the content directory.
///
/// `launch` starts the browser session. It is called at most once, and only
/// when at least one article needs a card. Failing to launch, or failing to
/// list the content directory, aborts the run; any other error is recorded
/// against its article and the remaining articles still run.
pub async fn run_batch<S, F>(config: &CardConfig, options: BatchOptions, launch: F) -> Result<BatchReport>
where
    S: Session + 'static,
    F: FnOnce(CardConfig) -> Result<S> + Send + 'static,
{
    config.validate()?;

    let articles = discover_articles(&config.content_dir, &config.extensions)?;
    log::info!("Found {} articles in {}", articles.len(), config.content_dir.display());

    let paths = CardPaths::new(config);
    let needs_card = |article: &Article| !options.skip_image && (options.force || !paths.card_exists(&article.slug));

    let session = if articles.iter().any(needs_card) {
        let launch_config = config.clone();
        let session = tokio::task::spawn_blocking(move || launch(launch_config))
            .await
            .map_err(|e| Error::InitializationError(format!("Browser launch task failed: {}", e)))??;
        Some(Arc::new(session))
    } else {
        log::info!("No cards to generate, browser not started");
        None
    };

    let results = futures::stream::iter(articles.into_iter().map(|article| {
        let session = session.clone();
        let config = config.clone();
        let paths = paths.clone();
        async move {
            let slug = article.slug.clone();
            let joined = tokio::task::spawn_blocking(move || {
                process_article(session.as_deref(), &config, &paths, options, &article)
            })
            .await;
            let result = joined.unwrap_or_else(|e| Err(Error::Other(format!("article task failed: {}", e))));
            (slug, result)
        }
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect::<Vec<_>>()
    .await;

    // Closes the browser once every page is gone
    drop(session);

    let mut report = BatchReport::default();
    for (slug, result) in results {
        match result {
            Ok(outcome) => report.outcomes.push((slug, outcome)),
            Err(e) => {
                log::error!("[{}] failed: {}", slug, e);
                report.failures.push((slug, e.to_string()));
            }
        }
    }
    report.outcomes.sort_by(|a, b| a.0.cmp(&b.0));
    report.failures.sort_by(|a, b| a.0.cmp(&b.0));

    log::info!(
        "Done: {} generated, {} already present, {} articles updated, {} failed",
        report.generated().len(),
        report.skipped().len(),
        report.updated().len(),
        report.failures.len()
    );

    Ok(report)
}

/// Both phases for a single article. Errors stop this article only.
fn process_article<S: Session>(
    session: Option<&S>,
    config: &CardConfig,
    paths: &CardPaths,
    options: BatchOptions,
    article: &Article,
) -> Result<ArticleOutcome> {
    let slug = article.slug.as_str();

    let card = if options.skip_image {
        CardStatus::NotRequested
    } else if !options.force && paths.card_exists(slug) {
        log::info!("[{}] card already exists, skipping capture", slug);
        CardStatus::Existing
    } else {
        let session = session.ok_or_else(|| Error::Other("no browser session available".into()))?;
        generate_card(session, config, paths, slug)?;
        CardStatus::Generated
    };

    let metadata = if options.skip_post_update {
        MetadataStatus::NotRequested
    } else if !paths.card_exists(slug) {
        log::warn!("[{}] no card at {}, front matter left as is", slug, paths.card_path(slug).display());
        MetadataStatus::NoCard
    } else if update_article_images(&article.path, &paths.public_path(slug))? {
        log::info!("[{}] added card to {}", slug, article.path.display());
        MetadataStatus::Updated
    } else {
        MetadataStatus::Unchanged
    };

    Ok(ArticleOutcome { card, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(card: CardStatus, metadata: MetadataStatus) -> ArticleOutcome {
        ArticleOutcome { card, metadata }
    }

    #[test]
    fn report_partitions_slugs() {
        let report = BatchReport {
            outcomes: vec![
                ("a".into(), outcome(CardStatus::Generated, MetadataStatus::Updated)),
                ("b".into(), outcome(CardStatus::Existing, MetadataStatus::Unchanged)),
            ],
            failures: vec![("c".into(), "boom".into())],
        };
        assert_eq!(report.generated(), vec!["a"]);
        assert_eq!(report.skipped(), vec!["b"]);
        assert_eq!(report.updated(), vec!["a"]);
        assert_eq!(report.failed(), vec!["c"]);
        assert_eq!(report.attempted(), 3);
    }
}
