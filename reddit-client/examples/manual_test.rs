use nichefinder_core::{AppConfig, PostSource, SortMode, SuggestionSource};
use reddit_client::RedditClient;
use std::io::{self, Write};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Reddit API Manual Test ===\n");
    println!("📋 Set REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET to test the OAuth path;");
    println!("   without them the public JSON endpoints are used.\n");

    let config = AppConfig::from_env()?;
    let client = RedditClient::new(&config)?;
    println!("✅ Reddit client created (authenticated: {})\n", client.is_authenticated());

    print!("Enter a topic to search subreddits for: ");
    io::stdout().flush()?;
    let mut topic = String::new();
    io::stdin().read_line(&mut topic)?;
    let topic = topic.trim();

    if topic.is_empty() {
        println!("❌ Topic cannot be empty.");
        return Ok(());
    }

    let page = client.suggest(topic, None).await?;
    println!("\n🔍 {} suggestions (more available: {})", page.items.len(), page.has_more());
    for suggestion in page.items.iter().take(10) {
        let adult = if suggestion.adult { " [NSFW]" } else { "" };
        println!(
            "   r/{}{} - {} subscribers",
            suggestion.name,
            adult,
            suggestion.subscribers.unwrap_or(0)
        );
    }

    let Some(first) = page.items.iter().find(|s| !s.adult) else {
        println!("\n❌ No SFW suggestions to fetch posts from.");
        return Ok(());
    };

    println!("\n📰 Top posts from r/{}:", first.name);
    let posts = client.fetch_posts(&first.name, SortMode::Top, None).await?;
    for post in posts.iter().take(5) {
        println!("   [{}] {}", post.score, post.title);
        println!("        {}", post.url);
    }

    let metrics = client.get_api_metrics().await;
    println!(
        "\n📊 {} requests, {} failed, average {:?}",
        metrics.total_requests, metrics.failed_requests, metrics.average_response_time
    );

    println!("\n🎉 Manual test completed!");
    Ok(())
}
