use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inkpost_client::content::{
    estimate_read_time, render_markdown, thread_comments, PostDraft, ProfileStats, TagList,
};
use inkpost_client::models::{
    Comment, LoginCredentials, NewComment, Post, PostUpdate, ProfileUpdate, RegisterData, User,
};
use inkpost_client::{BlogClient, ClientConfig, ClientError, FileStore};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod logging;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API base URL (overrides INKPOST_API_URL)
    #[arg(short, long)]
    server: Option<String>,

    /// Directory holding the persisted token and user (default ~/.inkpost)
    #[arg(long)]
    session_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,
    },

    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    Logout,

    Whoami,

    UpdateProfile {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        avatar: Option<String>,

        #[arg(long)]
        bio: Option<String>,
    },

    List,

    Get {
        #[arg(short, long)]
        id: String,

        /// Also fetch and show the comments
        #[arg(long)]
        comments: bool,
    },

    ByAuthor {
        /// Author id (defaults to the signed-in user)
        #[arg(short, long)]
        id: Option<String>,
    },

    Search {
        query: String,
    },

    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        excerpt: String,

        #[arg(short, long, conflicts_with = "content_file")]
        content: Option<String>,

        #[arg(long)]
        content_file: Option<PathBuf>,

        /// Comma or semicolon separated tags
        #[arg(long, default_value = "")]
        tags: String,

        #[arg(long)]
        image: Option<String>,
    },

    Update {
        #[arg(short, long)]
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        excerpt: Option<String>,

        #[arg(short, long)]
        content: Option<String>,

        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        image: Option<String>,
    },

    Delete {
        #[arg(short, long)]
        id: String,
    },

    Comments {
        #[arg(short, long)]
        post_id: String,
    },

    Comment {
        #[arg(short, long)]
        post_id: String,

        #[arg(short, long)]
        content: String,

        /// Reply to this comment
        #[arg(long)]
        parent: Option<String>,
    },

    /// Render a markdown file the way posts are displayed
    Preview {
        file: PathBuf,
    },

    Stats {
        /// Author id (defaults to the signed-in user)
        #[arg(short, long)]
        id: Option<String>,
    },
}

fn session_dir(custom: Option<PathBuf>) -> Result<PathBuf> {
    match custom {
        Some(dir) => Ok(dir),
        None => {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join(".inkpost"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Failed to read configuration")?;
    if let Some(server) = cli.server {
        config = config.with_base_url(server);
    }

    let store = FileStore::new(session_dir(cli.session_dir)?);
    let client = BlogClient::new(&config, Arc::new(store));

    if let Err(e) = run(&client, cli.command).await {
        report(&e);
        std::process::exit(1);
    }

    Ok(())
}

fn report(e: &anyhow::Error) {
    match e.downcast_ref::<ClientError>() {
        Some(err) if err.is_auth() => {
            println!("❌ {:#}", e);
            println!("   Please login first: inkpost login --email <email> --password <password>");
        }
        Some(err) if err.status() == Some(403) => {
            println!("❌ Forbidden. You may not own this post");
        }
        _ => println!("❌ {:#}", e),
    }
}

async fn run(client: &BlogClient, command: Commands) -> Result<()> {
    let session = client.session();
    let posts = client.posts();

    match command {
        Commands::Register {
            username,
            email,
            password,
            first_name,
            last_name,
        } => {
            println!("📝 Registering user: {}", username);
            let data = RegisterData {
                username,
                email,
                password,
                first_name,
                last_name,
            };
            let user = session.register(&data).await.context("Registration failed")?;
            println!("✅ Registration successful!");
            println!("   User ID: {}", user.id);
            println!("   Username: {}", user.username);
            println!("   Email: {}", user.email);
        }

        Commands::Login { email, password } => {
            println!("🔑 Logging in as: {}", email);
            let user = session
                .login(&LoginCredentials { email, password })
                .await
                .context("Login failed")?;
            println!("✅ Login successful!");
            println!("   User ID: {}", user.id);
            println!("   Username: {}", user.username);
            println!("   Name: {}", user.display_name());
        }

        Commands::Logout => {
            session.logout();
            println!("👋 Logged out");
        }

        Commands::Whoami => match session.initialize().await {
            Some(user) => {
                println!("🔑 Signed in as {} ({})", user.username, user.display_name());
                println!("   User ID: {}", user.id);
                println!("   Email: {}", user.email);
                if let Some(bio) = &user.bio {
                    println!("   Bio: {}", bio);
                }
                println!("   Member since: {}", user.created_at.format("%Y-%m-%d"));
            }
            None => {
                println!("❌ Not logged in");
                std::process::exit(1);
            }
        },

        Commands::UpdateProfile {
            username,
            email,
            first_name,
            last_name,
            avatar,
            bio,
        } => {
            let update = ProfileUpdate {
                username,
                email,
                first_name,
                last_name,
                avatar,
                bio,
            };
            if update.is_empty() {
                println!("Nothing to update");
                return Ok(());
            }
            let user = session
                .update_profile(&update)
                .await
                .context("Failed to update profile")?;
            println!("✅ Profile updated for {}", user.display_name());
        }

        Commands::List => {
            let list = posts.list_posts().await.context("Failed to list posts")?;
            print_post_list(&list);
        }

        Commands::Get { id, comments } => {
            println!("🔍 Getting post {}", id);

            let found = if comments {
                posts.get_post_with_comments(&id).await?
            } else {
                posts.get_post(&id).await?.map(|post| (post, Vec::new()))
            };

            match found {
                Some((post, list)) => {
                    print_post(&post);
                    if comments {
                        println!();
                        println!("💬 Comments ({})", list.len());
                        print_comments(&thread_comments(list), 1);
                    }
                }
                None => {
                    println!("❌ Post {} not found", id);
                    println!("   Tip: Use 'list' command to see available posts");
                    std::process::exit(1);
                }
            }
        }

        Commands::ByAuthor { id } => {
            let author = author_id(client, id).await?;
            let list = posts.list_posts_by_author(&author).await?;
            print_post_list(&list);
        }

        Commands::Search { query } => {
            let list = posts.search_posts(&query).await.context("Search failed")?;
            println!(
                "🔎 {} result{} for \"{}\"",
                list.len(),
                if list.len() == 1 { "" } else { "s" },
                query
            );
            print_post_list(&list);
        }

        Commands::Create {
            title,
            excerpt,
            content,
            content_file,
            tags,
            image,
        } => {
            let user = restored_user(client).await?;
            let content = match (content, content_file) {
                (Some(content), _) => content,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {:?}", path))?,
                (None, None) => anyhow::bail!("either --content or --content-file is required"),
            };

            let draft = PostDraft {
                title,
                excerpt,
                content,
                image,
                tags: TagList::parse(&tags)?,
            };
            println!("📝 Creating new post...");
            let input = draft.into_input(&user.id)?;
            let post = posts.create_post(&input).await.context("Failed to create post")?;
            println!("✅ Post created successfully!");
            print_post(&post);
        }

        Commands::Update {
            id,
            title,
            excerpt,
            content,
            tags,
            image,
        } => {
            println!("✏️ Updating post {}", id);
            let update = PostUpdate {
                read_time: content.as_deref().map(estimate_read_time),
                title,
                excerpt,
                content,
                tags: tags.map(|t| TagList::parse(&t)).transpose()?.map(TagList::into_vec),
                image,
            };
            let post = posts
                .update_post(&id, &update)
                .await
                .context("Failed to update post")?;
            println!("✅ Post updated successfully!");
            print_post(&post);
        }

        Commands::Delete { id } => {
            println!("🗑️ Deleting post {}", id);
            posts.delete_post(&id).await.context("Failed to delete post")?;
            println!("✅ Post deleted successfully!");
        }

        Commands::Comments { post_id } => {
            let list = posts.list_comments_by_post(&post_id).await?;
            if list.is_empty() {
                println!("   No comments yet. Be the first to share your thoughts!");
            } else {
                print_comments(&thread_comments(list), 0);
            }
        }

        Commands::Comment {
            post_id,
            content,
            parent,
        } => {
            let user = restored_user(client).await?;
            let comment = posts
                .create_comment(&NewComment {
                    content: content.trim().to_string(),
                    post_id,
                    author: user.id,
                    parent_id: parent,
                })
                .await
                .context("Failed to add comment")?;
            println!("✅ Comment {} added", comment.id);
        }

        Commands::Preview { file } => {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            println!("{}", render_markdown(&content));
            eprintln!("⏱️ {} min read", estimate_read_time(&content));
        }

        Commands::Stats { id } => {
            let author = author_id(client, id).await?;
            let list = posts.list_posts_by_author(&author).await?;
            let stats = ProfileStats::from_posts(&list);
            println!("📊 {} articles, {} likes", stats.articles, stats.total_likes);
        }
    }

    Ok(())
}

async fn restored_user(client: &BlogClient) -> Result<User> {
    client.session().initialize().await;
    Ok(client.session().require_user()?)
}

async fn author_id(client: &BlogClient, explicit: Option<String>) -> Result<String> {
    match explicit {
        Some(id) => Ok(id),
        None => Ok(restored_user(client).await?.id),
    }
}

fn print_post(post: &Post) {
    println!("   ID: {}", post.id);
    println!("   Title: {}", post.title);
    println!("   Author: {} ({})", post.author.username, post.author.id);
    println!("   Excerpt: {}", post.excerpt);
    if !post.tags.is_empty() {
        println!("   Tags: {}", post.tags.join(", "));
    }
    println!("   Read time: {} min | Likes: {}", post.read_time, post.likes);
    println!("   Created: {}", post.created_at);
    println!("   Updated: {}", post.updated_at);
    println!();
    println!("{}", post.content);
}

fn print_post_list(list: &[Post]) {
    if list.is_empty() {
        println!("   No posts found");
        return;
    }

    println!("✅ Found {} posts", list.len());
    println!();
    for (i, post) in list.iter().enumerate() {
        println!("   {}. [{}] {}", i + 1, post.id, post.title);
        println!("      By {} · {} min read", post.author.username, post.read_time);
        println!("      {}", truncate(&post.excerpt, 80));
        if !post.tags.is_empty() {
            let shown: Vec<&str> = post.tags.iter().take(3).map(String::as_str).collect();
            println!("      Tags: {}", shown.join(", "));
        }
        println!();
    }
}

fn print_comments(list: &[Comment], depth: usize) {
    let indent = "   ".repeat(depth + 1);
    for comment in list {
        println!(
            "{}{} · {}",
            indent,
            comment.author.display_name(),
            comment.created_at.format("%b %e, %Y %H:%M")
        );
        println!("{}{}", indent, comment.content);
        print_comments(&comment.replies, depth + 1);
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
