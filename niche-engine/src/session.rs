//! Interactive search state: a topic's subreddit suggestions, the tracked
//! subreddit set, the filter settings and the paged results of the last
//! aggregation.
//!
//! Every mutating operation takes `&mut self`, so a response can never land
//! on state that changed while the request was in flight.

use crate::aggregate::Aggregator;
use nichefinder_core::{
    count_by_subreddit, filter_posts, normalize_subreddit, AppConfig, CoreError, ErrorExt,
    FetchFailure, FilterConfiguration, Paginator, PatternMode, PhrasePatternSet, Post,
    PostSource, ResultOrder, SortMode, SubredditCount, SubredditSuggestion, SuggestionSource,
    TrackedSubreddits,
};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct SearchSession<S> {
    source: S,
    aggregator: Aggregator,
    default_sorts: BTreeSet<SortMode>,

    topic: String,
    suggestions: Vec<SubredditSuggestion>,
    suggestion_cursor: Option<String>,
    suggestion_pager: Paginator,
    include_adult: bool,

    tracked: TrackedSubreddits,
    sorts: BTreeSet<SortMode>,
    filter: FilterConfiguration,
    include_suggested: bool,

    searched: Vec<String>,
    raw_posts: Vec<Post>,
    results: Vec<Post>,
    result_pager: Paginator,
    failures: Vec<FetchFailure>,
}

impl<S> SearchSession<S>
where
    S: SuggestionSource + PostSource + Sync,
{
    pub fn new(source: S, config: &AppConfig) -> Result<Self, CoreError> {
        let aggregator =
            Aggregator::new(config.pattern_set()?).with_max_in_flight(config.search.max_in_flight);
        Ok(Self::with_aggregator(source, aggregator, config))
    }

    pub fn with_aggregator(source: S, aggregator: Aggregator, config: &AppConfig) -> Self {
        let default_sorts: BTreeSet<SortMode> =
            config.search.default_sorts.iter().copied().collect();

        Self {
            source,
            aggregator,
            sorts: default_sorts.clone(),
            default_sorts,
            topic: String::new(),
            suggestions: Vec::new(),
            suggestion_cursor: None,
            suggestion_pager: Paginator::new(config.paging.suggestion_page_size),
            include_adult: false,
            tracked: TrackedSubreddits::new(),
            filter: FilterConfiguration::default(),
            include_suggested: false,
            searched: Vec::new(),
            raw_posts: Vec::new(),
            results: Vec::new(),
            result_pager: Paginator::new(config.paging.posts_per_page),
            failures: Vec::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn patterns(&self) -> &PhrasePatternSet {
        self.aggregator.patterns()
    }

    // -- suggestions --

    /// Replaces the suggestion list with the first batch for `topic`.
    ///
    /// A blank topic clears the list without a request. Non-fatal fetch
    /// errors are logged and leave the list empty.
    pub async fn search_topic(&mut self, topic: &str) -> Result<usize, CoreError> {
        self.topic = topic.trim().to_string();
        self.suggestions.clear();
        self.suggestion_cursor = None;
        self.suggestion_pager.reset();

        if self.topic.is_empty() {
            return Ok(0);
        }

        let page = match self.source.suggest(&self.topic, None).await {
            Ok(page) => page,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                e.log_warn();
                return Ok(0);
            }
        };

        info!(
            "Topic '{}' returned {} subreddit suggestions",
            self.topic,
            page.items.len()
        );
        self.suggestion_cursor = page.next_cursor;
        self.suggestions = page.items;
        Ok(self.suggestions.len())
    }

    /// Appends the next batch for the current topic; returns how many new
    /// suggestions were added.
    pub async fn load_more_suggestions(&mut self) -> Result<usize, CoreError> {
        let Some(cursor) = self.suggestion_cursor.clone() else {
            return Ok(0);
        };

        let page = match self.source.suggest(&self.topic, Some(&cursor)).await {
            Ok(page) => page,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                e.log_warn();
                return Ok(0);
            }
        };

        let mut known: HashSet<String> = self
            .suggestions
            .iter()
            .map(|s| s.name.to_lowercase())
            .collect();
        let before = self.suggestions.len();
        self.suggestions.extend(
            page.items
                .into_iter()
                .filter(|s| known.insert(s.name.to_lowercase())),
        );
        self.suggestion_cursor = page.next_cursor;
        self.suggestion_pager.reset();

        let added = self.suggestions.len() - before;
        debug!("Loaded {} more suggestions for '{}'", added, self.topic);
        Ok(added)
    }

    pub fn has_more_suggestions(&self) -> bool {
        self.suggestion_cursor.is_some()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Suggestions the user can still pick: adult entries only when
    /// allowed, tracked names removed, SFW entries first.
    pub fn filtered_suggestions(&self) -> Vec<&SubredditSuggestion> {
        let candidates = self
            .suggestions
            .iter()
            .filter(|s| self.include_adult || !s.adult)
            .filter(|s| !self.tracked.contains(&s.name));
        let (sfw, nsfw): (Vec<_>, Vec<_>) = candidates.partition(|s| !s.adult);
        sfw.into_iter().chain(nsfw).collect()
    }

    /// The current page of [`Self::filtered_suggestions`].
    pub fn visible_suggestions(&self) -> Vec<&SubredditSuggestion> {
        self.suggestion_pager
            .current(&self.filtered_suggestions())
            .to_vec()
    }

    pub fn suggestion_page_count(&self) -> usize {
        self.suggestion_pager
            .page_count(self.filtered_suggestions().len())
    }

    pub fn suggestion_page_index(&self) -> usize {
        self.suggestion_pager.index()
    }

    pub fn next_suggestion_page(&mut self) -> bool {
        let len = self.filtered_suggestions().len();
        self.suggestion_pager.next(len)
    }

    pub fn prev_suggestion_page(&mut self) -> bool {
        self.suggestion_pager.prev()
    }

    pub fn set_include_adult(&mut self, include: bool) {
        if self.include_adult != include {
            self.include_adult = include;
            self.suggestion_pager.reset();
        }
    }

    // -- tracking --

    pub fn track(&mut self, name: &str) -> bool {
        let added = self.tracked.add(name);
        if added {
            self.suggestion_pager.reset();
        }
        added
    }

    pub fn untrack(&mut self, name: &str) -> bool {
        let removed = self.tracked.remove(name);
        if removed {
            self.suggestion_pager.reset();
        }
        removed
    }

    pub fn tracked(&self) -> &TrackedSubreddits {
        &self.tracked
    }

    pub fn set_include_suggested(&mut self, include: bool) {
        self.include_suggested = include;
    }

    /// Subreddits the next search covers: tracked names, then (when
    /// enabled) the suggestions the user could see, without repeats.
    pub fn target_subreddits(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut targets: Vec<String> = Vec::new();

        let tracked = self.tracked.iter().map(str::to_string);
        let suggested = self
            .include_suggested
            .then(|| self.filtered_suggestions())
            .unwrap_or_default()
            .into_iter()
            .map(|s| normalize_subreddit(&s.name));

        for name in tracked.chain(suggested) {
            if seen.insert(name.clone()) {
                targets.push(name);
            }
        }
        targets
    }

    // -- sort modes and filter settings --

    /// Flips `sort` in the selection; returns whether it is now selected.
    pub fn toggle_sort(&mut self, sort: SortMode) -> bool {
        if self.sorts.remove(&sort) {
            false
        } else {
            self.sorts.insert(sort);
            true
        }
    }

    pub fn set_sorts<I: IntoIterator<Item = SortMode>>(&mut self, sorts: I) {
        self.sorts = sorts.into_iter().collect();
    }

    pub fn sorts(&self) -> &BTreeSet<SortMode> {
        &self.sorts
    }

    pub fn set_keyword(&mut self, keyword: &str) {
        self.filter.keyword = keyword.to_string();
        self.refilter();
    }

    pub fn set_pattern_mode(&mut self, mode: PatternMode) {
        self.filter.pattern_mode = mode;
        self.refilter();
    }

    pub fn set_order(&mut self, order: ResultOrder) {
        self.filter.order = order;
        self.refilter();
    }

    pub fn filter_config(&self) -> &FilterConfiguration {
        &self.filter
    }

    // -- results --

    /// Aggregates posts over [`Self::target_subreddits`] and applies the
    /// current filter; returns the number of filtered results.
    pub async fn search_posts(&mut self) -> Result<usize, CoreError> {
        let targets = self.target_subreddits();
        let aggregate = self
            .aggregator
            .aggregate(&self.source, &targets, &self.sorts, &self.filter)
            .await?;

        if aggregate.has_failures() {
            warn!(
                "{} fetches failed, results are partial",
                aggregate.failures.len()
            );
        }
        self.searched = targets;
        self.raw_posts = aggregate.posts;
        self.failures = aggregate.failures;
        self.refilter();

        info!(
            "Search over {} subreddits produced {} results",
            self.searched.len(),
            self.results.len()
        );
        Ok(self.results.len())
    }

    fn refilter(&mut self) {
        self.results = filter_posts(&self.raw_posts, &self.filter, self.aggregator.patterns());
        self.result_pager.reset();
    }

    pub fn results(&self) -> &[Post] {
        &self.results
    }

    pub fn result_page(&self) -> &[Post] {
        self.result_pager.current(&self.results)
    }

    pub fn result_page_index(&self) -> usize {
        self.result_pager.index()
    }

    pub fn result_page_count(&self) -> usize {
        self.result_pager.page_count(self.results.len())
    }

    pub fn next_result_page(&mut self) -> bool {
        self.result_pager.next(self.results.len())
    }

    pub fn prev_result_page(&mut self) -> bool {
        self.result_pager.prev()
    }

    /// How many fetched posts each searched subreddit contributed under the
    /// current pattern selection.
    pub fn match_counts(&self) -> Vec<SubredditCount> {
        count_by_subreddit(
            &self.raw_posts,
            &self.searched,
            &self.filter,
            self.aggregator.patterns(),
        )
    }

    /// Fetches that failed during the last search.
    pub fn last_failures(&self) -> &[FetchFailure] {
        &self.failures
    }

    /// Back to a fresh session: no topic, nothing tracked, default sorts.
    pub fn reset(&mut self) {
        self.topic.clear();
        self.suggestions.clear();
        self.suggestion_cursor = None;
        self.suggestion_pager.reset();
        self.include_adult = false;
        self.tracked.clear();
        self.sorts = self.default_sorts.clone();
        self.filter = FilterConfiguration::default();
        self.include_suggested = false;
        self.searched.clear();
        self.raw_posts.clear();
        self.results.clear();
        self.result_pager.reset();
        self.failures.clear();
    }
}
