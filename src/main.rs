use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use niche_engine::SearchSession;
use nichefinder_core::{
    matching_patterns, AppConfig, CoreError, ErrorReporter, PatternMode, ResultOrder, SortMode,
    SubredditIndex,
};
use reddit_client::RedditClient;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "nichefinder=info,niche_engine=info,reddit_client=info";

#[derive(Debug, Parser)]
#[command(name = "nichefinder")]
#[command(about = "Find subreddits for a topic and mine them for unmet needs")]
struct Cli {
    /// TOML config file; defaults plus REDDIT_* environment variables otherwise
    #[arg(long, global = true, env = "NICHEFINDER_CONFIG")]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Suggest subreddits for a topic
    Suggest(SuggestArgs),
    /// Aggregate and filter posts from subreddits
    Posts(PostsArgs),
    /// List the phrase patterns
    Patterns,
    /// Build or query the offline subreddit index
    #[command(subcommand)]
    Index(IndexCommands),
}

#[derive(Debug, Subcommand)]
enum IndexCommands {
    /// Collect subreddit metadata from Reddit's directory
    Build {
        /// Output file (config index.path otherwise)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Entries to collect (config index.target_size otherwise)
        #[arg(long)]
        total: Option<usize>,
    },
    /// Rank indexed subreddits by similarity to a topic
    Match {
        topic: String,
        /// Index file (config index.path otherwise)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Matches to show (config index.match_limit otherwise)
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Args)]
struct SuggestArgs {
    topic: String,
    /// Include NSFW subreddits
    #[arg(long)]
    nsfw: bool,
    /// Suggestion batches to fetch
    #[arg(long, default_value_t = 1)]
    batches: usize,
}

#[derive(Debug, Args)]
struct PostsArgs {
    /// Subreddits to read (repeatable)
    #[arg(short = 's', long = "sub", value_name = "NAME")]
    subreddits: Vec<String>,
    /// Sort modes: hot, new, top (repeatable; config default otherwise)
    #[arg(long = "sort", value_name = "MODE")]
    sorts: Vec<SortMode>,
    /// Keep only titles containing this text
    #[arg(short, long, default_value = "")]
    keyword: String,
    /// none, all, or one phrase from the pattern list
    #[arg(short, long, default_value = "none")]
    pattern: PatternMode,
    /// Order results by score, highest first
    #[arg(long)]
    by_score: bool,
    /// Also search the subreddits suggested for this topic
    #[arg(long, value_name = "TOPIC")]
    topic: Option<String>,
    /// Include NSFW suggestions when --topic is used
    #[arg(long)]
    nsfw: bool,
    /// Result page to show, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let reporter = ErrorReporter::new();

    let config = load_config(cli.config.as_ref()).map_err(|e| {
        reporter.report_error(&e);
        e
    })?;

    let result = match cli.command {
        Commands::Suggest(args) => run_suggest(&config, args, cli.json).await,
        Commands::Posts(args) => run_posts(&config, args, cli.json).await,
        Commands::Patterns => run_patterns(&config, cli.json),
        Commands::Index(command) => run_index(&config, command, cli.json).await,
    };

    if let Err(e) = &result {
        reporter.report_error(e);
    }
    result.context("nichefinder failed")
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig, CoreError> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::from_env()?),
    }
}

fn session(config: &AppConfig) -> Result<SearchSession<RedditClient>, CoreError> {
    let client = RedditClient::new(config)?;
    tracing::info!(
        "Reddit client ready (authenticated: {})",
        client.is_authenticated()
    );
    SearchSession::new(client, config)
}

async fn run_suggest(config: &AppConfig, args: SuggestArgs, json: bool) -> Result<(), CoreError> {
    let mut session = session(config)?;
    session.set_include_adult(args.nsfw);
    session.search_topic(&args.topic).await?;
    for _ in 1..args.batches {
        if !session.has_more_suggestions() {
            break;
        }
        session.load_more_suggestions().await?;
    }

    let suggestions = session.filtered_suggestions();
    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(());
    }

    if suggestions.is_empty() {
        println!("No subreddits found for '{}'", args.topic);
        return Ok(());
    }
    for s in suggestions {
        let adult = if s.adult { " [nsfw]" } else { "" };
        let subscribers = s
            .subscribers
            .map(|n| format!("{} subscribers", n))
            .unwrap_or_else(|| "subscribers unknown".to_string());
        match &s.title {
            Some(title) => println!("r/{}{}  ({})  {}", s.name, adult, subscribers, title),
            None => println!("r/{}{}  ({})", s.name, adult, subscribers),
        }
    }
    if session.has_more_suggestions() {
        println!("... more available, use --batches to fetch further");
    }
    Ok(())
}

async fn run_posts(config: &AppConfig, args: PostsArgs, json: bool) -> Result<(), CoreError> {
    let mut session = session(config)?;

    for name in &args.subreddits {
        session.track(name);
    }
    if !args.sorts.is_empty() {
        session.set_sorts(args.sorts.iter().copied());
    }
    if let Some(topic) = &args.topic {
        session.set_include_adult(args.nsfw);
        session.search_topic(topic).await?;
        session.set_include_suggested(true);
    }
    session.set_keyword(&args.keyword);
    session.set_pattern_mode(args.pattern.clone());
    if args.by_score {
        session.set_order(ResultOrder::ScoreDescending);
    }

    if session.target_subreddits().is_empty() {
        return Err(CoreError::InvalidInput {
            message: "give at least one --sub or a --topic with suggestions".to_string(),
        });
    }

    session.search_posts().await?;
    for _ in 1..args.page.max(1) {
        if !session.next_result_page() {
            break;
        }
    }

    if json {
        let output = serde_json::json!({
            "page": session.result_page_index() + 1,
            "pages": session.result_page_count(),
            "total": session.results().len(),
            "posts": session.result_page(),
            "failures": session.last_failures(),
            "counts": session.match_counts(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for failure in session.last_failures() {
        println!(
            "! r/{} ({}) skipped: {}",
            failure.subreddit, failure.sort_mode, failure.message
        );
    }
    if session.results().is_empty() {
        println!("No posts matched");
        return Ok(());
    }

    for post in session.result_page() {
        println!("[{:>5}] r/{}  {}", post.score, post.subreddit, post.title);
        let phrases = matching_patterns(&post.title, session.patterns());
        if !phrases.is_empty() {
            println!("        matches: {}", phrases.join(", "));
        }
        println!("        {}", post.url);
    }
    println!(
        "Page {}/{} ({} posts)",
        session.result_page_index() + 1,
        session.result_page_count(),
        session.results().len()
    );

    println!("Matches per subreddit:");
    for count in session.match_counts() {
        println!("  r/{:<24} {}", count.subreddit, count.count);
    }
    Ok(())
}

fn run_patterns(config: &AppConfig, json: bool) -> Result<(), CoreError> {
    let patterns = config.pattern_set()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&patterns.phrases())?);
    } else {
        for phrase in patterns.phrases() {
            println!("{}", phrase);
        }
    }
    Ok(())
}

async fn run_index(config: &AppConfig, command: IndexCommands, json: bool) -> Result<(), CoreError> {
    match command {
        IndexCommands::Build { out, total } => {
            let path = out.unwrap_or_else(|| config.index.path.clone());
            let total = total.unwrap_or(config.index.target_size);
            let client = RedditClient::new(config)?;

            tracing::info!("Building subreddit index of up to {} entries", total);
            let index = client.build_index(total).await?;
            index.save(&path)?;
            println!("Wrote {} subreddits to {}", index.len(), path.display());
        }
        IndexCommands::Match { topic, file, limit } => {
            let path = file.unwrap_or_else(|| config.index.path.clone());
            let index = SubredditIndex::load(&path)?;
            let matches = index.best_matches(&topic, limit.unwrap_or(config.index.match_limit))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
                return Ok(());
            }
            for m in matches {
                println!(
                    "{:.3}  r/{}  {}",
                    m.score,
                    m.name,
                    m.title.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}
