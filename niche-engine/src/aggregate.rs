use futures::stream::{self, StreamExt};
use nichefinder_core::{
    dedup_by_url, matches_pattern, normalize_subreddit, Aggregate, CoreError, ErrorExt,
    FetchFailure, FilterConfiguration, PatternMode, PhrasePatternSet, Post, PostSource, SortMode,
    PER_PATTERN_CAP,
};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// One outbound fetch in an aggregation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub subreddit: String,
    pub sort: SortMode,
    pub search_term: Option<String>,
    /// Index into the pattern table when the fetch searches for a phrase.
    pub pattern: Option<usize>,
}

/// Fans out post fetches over subreddits and sort modes and merges the
/// results.
#[derive(Debug, Clone)]
pub struct Aggregator {
    patterns: PhrasePatternSet,
    max_in_flight: usize,
}

impl Aggregator {
    pub fn new(patterns: PhrasePatternSet) -> Self {
        Self {
            patterns,
            max_in_flight: 1,
        }
    }

    /// Allows up to `limit` fetches in flight; 0 is treated as 1.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = limit.max(1);
        self
    }

    pub fn patterns(&self) -> &PhrasePatternSet {
        &self.patterns
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// The ordered fetch list for one run.
    ///
    /// Listing modes get one task per (subreddit, sort). [`PatternMode::All`]
    /// gets one search per (subreddit, phrase) using the first selected sort.
    pub fn plan<S: AsRef<str>>(
        &self,
        subreddits: &[S],
        sorts: &BTreeSet<SortMode>,
        config: &FilterConfiguration,
    ) -> Vec<FetchTask> {
        let mut seen = HashSet::new();
        let names: Vec<String> = subreddits
            .iter()
            .map(|s| normalize_subreddit(s.as_ref()))
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();

        let Some(&first_sort) = sorts.iter().next() else {
            return Vec::new();
        };

        match config.pattern_mode {
            PatternMode::All => names
                .iter()
                .flat_map(|name| {
                    self.patterns
                        .iter()
                        .enumerate()
                        .map(move |(idx, pattern)| FetchTask {
                            subreddit: name.clone(),
                            sort: first_sort,
                            search_term: Some(pattern.phrase().to_string()),
                            pattern: Some(idx),
                        })
                })
                .collect(),
            PatternMode::None | PatternMode::Phrase(_) => names
                .iter()
                .flat_map(|name| {
                    sorts.iter().map(move |&sort| FetchTask {
                        subreddit: name.clone(),
                        sort,
                        search_term: None,
                        pattern: None,
                    })
                })
                .collect(),
        }
    }

    /// Fetches and merges posts for every planned task.
    ///
    /// A failed fetch is logged and recorded in [`Aggregate::failures`];
    /// only fatal errors (bad configuration, rejected credentials) abort the
    /// run. The merged list is deduplicated by url in task order, so the
    /// result does not depend on which fetch finished first.
    pub async fn aggregate<P, S>(
        &self,
        source: &P,
        subreddits: &[S],
        sorts: &BTreeSet<SortMode>,
        config: &FilterConfiguration,
    ) -> Result<Aggregate, CoreError>
    where
        P: PostSource + Sync,
        S: AsRef<str>,
    {
        let tasks = self.plan(subreddits, sorts, config);
        if tasks.is_empty() {
            debug!("Nothing to aggregate: no subreddits or sort modes selected");
            return Ok(Aggregate::default());
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("aggregate", %run_id);
        self.run(source, tasks).instrument(span).await
    }

    async fn run<P>(&self, source: &P, tasks: Vec<FetchTask>) -> Result<Aggregate, CoreError>
    where
        P: PostSource + Sync,
    {
        info!(
            "Aggregating {} fetches with up to {} in flight",
            tasks.len(),
            self.max_in_flight
        );
        let outcomes = stream::iter(tasks)
            .map(|task| async move {
                let result = source
                    .fetch_posts(&task.subreddit, task.sort, task.search_term.as_deref())
                    .await;
                (task, result)
            })
            .buffered(self.max_in_flight);
        let mut outcomes = std::pin::pin!(outcomes);

        let mut collected: Vec<Post> = Vec::new();
        let mut failures = Vec::new();

        while let Some((task, result)) = outcomes.next().await {
            match result {
                Ok(posts) => {
                    let fetched = posts.len();
                    let kept = self.select(posts, &task);
                    debug!(
                        "r/{} ({}): kept {} of {} posts",
                        task.subreddit,
                        task.search_term.as_deref().unwrap_or(task.sort.as_str()),
                        kept.len(),
                        fetched
                    );
                    collected.extend(kept);
                }
                Err(e) if e.is_fatal() => {
                    e.log_error();
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Fetch for r/{} ({}) failed: {}",
                        task.subreddit, task.sort, e
                    );
                    failures.push(FetchFailure {
                        subreddit: task.subreddit,
                        sort_mode: task.sort,
                        search_term: task.search_term,
                        error_code: failure_code(&e),
                        message: e.user_friendly_message(),
                    });
                }
            }
        }

        let posts = dedup_by_url(collected);
        info!(
            "Aggregated {} unique posts, {} failed fetches",
            posts.len(),
            failures.len()
        );
        Ok(Aggregate { posts, failures })
    }

    /// Phrase searches keep only the first few results that really contain
    /// the phrase; listings are kept whole. The keyword is not applied here.
    fn select(&self, posts: Vec<Post>, task: &FetchTask) -> Vec<Post> {
        let Some(pattern) = task.pattern.and_then(|idx| self.patterns.iter().nth(idx)) else {
            return posts;
        };
        posts
            .into_iter()
            .filter(|p| matches_pattern(&p.title, pattern, None))
            .take(PER_PATTERN_CAP)
            .collect()
    }
}

/// Reddit errors report their own code rather than the generic wrapper's.
fn failure_code(error: &CoreError) -> String {
    match error {
        CoreError::RedditApi(inner) => inner.error_code(),
        other => other.error_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{post, FakeSource};
    use nichefinder_core::RedditApiError;

    fn aggregator() -> Aggregator {
        Aggregator::new(PhrasePatternSet::new(["i wish there was", "is there an app"]).unwrap())
    }

    fn sorts(modes: &[SortMode]) -> BTreeSet<SortMode> {
        modes.iter().copied().collect()
    }

    #[test]
    fn test_plan_listing_tasks() {
        let config = FilterConfiguration::new("", PatternMode::None);
        let tasks = aggregator().plan(
            &["Rust", "r/rust", "golang"],
            &sorts(&[SortMode::Top, SortMode::Hot]),
            &config,
        );

        let summary: Vec<(&str, SortMode)> = tasks
            .iter()
            .map(|t| (t.subreddit.as_str(), t.sort))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("rust", SortMode::Hot),
                ("rust", SortMode::Top),
                ("golang", SortMode::Hot),
                ("golang", SortMode::Top),
            ]
        );
        assert!(tasks.iter().all(|t| t.search_term.is_none()));
    }

    #[test]
    fn test_plan_pattern_searches_use_first_sort() {
        let config = FilterConfiguration::new("", PatternMode::All);
        let tasks = aggregator().plan(&["rust"], &sorts(&[SortMode::Top, SortMode::New]), &config);

        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.sort == SortMode::New));
        assert_eq!(tasks[0].search_term.as_deref(), Some("i wish there was"));
        assert_eq!(tasks[1].pattern, Some(1));
    }

    #[tokio::test]
    async fn test_empty_inputs_make_no_fetch() {
        let source = FakeSource::new();
        let config = FilterConfiguration::new("", PatternMode::None);
        let agg = aggregator();

        let none: [&str; 0] = [];
        let result = agg
            .aggregate(&source, &none, &sorts(&[SortMode::Top]), &config)
            .await
            .unwrap();
        assert!(result.is_empty());

        let result = agg
            .aggregate(&source, &["rust"], &BTreeSet::new(), &config)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicates_across_sorts_are_merged() {
        let source = FakeSource::new()
            .with_posts("rust", SortMode::Hot, vec![post("rust", "a", 1), post("rust", "b", 2)])
            .with_posts("rust", SortMode::Top, vec![post("rust", "b", 20), post("rust", "c", 3)]);
        let config = FilterConfiguration::new("", PatternMode::None);

        let result = aggregator()
            .aggregate(&source, &["rust"], &sorts(&[SortMode::Hot, SortMode::Top]), &config)
            .await
            .unwrap();

        let titles: Vec<&str> = result.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        // last seen wins
        assert_eq!(result.posts[1].score, 20);
        assert_eq!(result.posts[1].sort_mode, SortMode::Top);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_contained() {
        let source = FakeSource::new()
            .with_error("golang", SortMode::Top, RedditApiError::RateLimitExceeded { retry_after: 60 })
            .with_posts("rust", SortMode::Top, vec![post("rust", "kept", 5)]);
        let config = FilterConfiguration::new("", PatternMode::None);

        let result = aggregator()
            .aggregate(&source, &["golang", "rust"], &sorts(&[SortMode::Top]), &config)
            .await
            .unwrap();

        assert_eq!(result.posts.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].subreddit, "golang");
        assert_eq!(result.failures[0].error_code, "REDDIT_RATE_LIMIT");
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_token_fails_only_its_fetch() {
        let source = FakeSource::new()
            .with_error("private_sub", SortMode::Top, RedditApiError::InvalidToken)
            .with_posts("rust", SortMode::Top, vec![post("rust", "still here", 7)]);
        let config = FilterConfiguration::new("", PatternMode::None);

        let result = aggregator()
            .aggregate(&source, &["private_sub", "rust"], &sorts(&[SortMode::Top]), &config)
            .await
            .unwrap();

        assert_eq!(source.call_count(), 2);
        assert_eq!(result.posts.len(), 1);
        assert_eq!(result.posts[0].title, "still here");
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].subreddit, "private_sub");
        assert_eq!(result.failures[0].error_code, "REDDIT_INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_fatal_error_aborts() {
        let source = FakeSource::new().with_error(
            "rust",
            SortMode::Top,
            RedditApiError::AuthenticationFailed {
                reason: "invalid_client".to_string(),
            },
        );
        let config = FilterConfiguration::new("", PatternMode::None);

        let err = aggregator()
            .aggregate(&source, &["rust", "golang"], &sorts(&[SortMode::Top]), &config)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_pattern_search_caps_each_pattern() {
        let wishes: Vec<Post> = (0..5)
            .map(|i| post("rust", &format!("I wish there was a tool {}", i), i))
            .chain(std::iter::once(post("rust", "unrelated search hit", 99)))
            .collect();
        let apps: Vec<Post> = (0..4)
            .map(|i| post("rust", &format!("Is there an app for thing {}", i), i))
            .collect();

        let source = FakeSource::new()
            .with_search("rust", "i wish there was", wishes)
            .with_search("rust", "is there an app", apps);
        let config = FilterConfiguration::new("", PatternMode::All);

        let result = aggregator()
            .aggregate(&source, &["rust"], &sorts(&[SortMode::Top]), &config)
            .await
            .unwrap();

        assert_eq!(result.posts.len(), 6);
        assert!(result.posts.iter().all(|p| !p.title.contains("unrelated")));
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_keep_task_order() {
        let source = FakeSource::new()
            .with_delay_ms("a", 30)
            .with_posts("a", SortMode::Top, vec![post("a", "from a", 1)])
            .with_posts("b", SortMode::Top, vec![post("b", "from b", 1)])
            .with_posts("c", SortMode::Top, vec![post("c", "from c", 1)]);
        let config = FilterConfiguration::new("", PatternMode::None);

        let result = aggregator()
            .with_max_in_flight(3)
            .aggregate(&source, &["a", "b", "c"], &sorts(&[SortMode::Top]), &config)
            .await
            .unwrap();

        let titles: Vec<&str> = result.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["from a", "from b", "from c"]);
    }
}
