use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use connectsphere::api::{ApiClient, ImageFile, NewPost, PostEdit};
use connectsphere::auth::Auth;
use connectsphere::avatars::{Avatar, AvatarCache};
use connectsphere::config::ConfigManager;
use connectsphere::display_mode::DisplayMode;
use connectsphere::error::StoreResult;
use connectsphere::logging::{self, LogConfig};
use connectsphere::notice::Notice;
use connectsphere::session::{AuthedSession, SessionStore};
use connectsphere::store::PostStore;
use connectsphere::thread::{thread_rows, ThreadController};
use connectsphere::view::{PostView, ViewSource, ViewState};
use connectsphere::log_debug;
use connectsphere_types::{Likeable, Post};

/// ConnectSphere - share posts, comments and likes from the command line
#[derive(Parser)]
#[command(name = "connectsphere")]
#[command(version)]
struct Cli {
    /// Server URL to connect to
    #[arg(long, short, global = true)]
    server: Option<String>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and log in
    Register { username: String, password: String },
    Login { username: String, password: String },
    Logout,
    /// Show all posts, newest first
    Feed,
    /// Publish a post
    Post {
        content: String,
        /// Image files to attach (up to 4)
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Change the text or images of one of your posts
    Edit {
        post_id: i64,
        content: String,
        /// Index of an existing image to drop
        #[arg(long = "remove-image")]
        remove_images: Vec<usize>,
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Delete a post, or a comment with --comment
    Delete {
        id: i64,
        #[arg(long)]
        comment: bool,
    },
    /// Toggle your like on a post, or on a comment with --comment
    Like {
        id: i64,
        #[arg(long)]
        comment: bool,
    },
    /// Comment on a post
    Comment { post_id: i64, content: String },
    /// Reply to a top-level comment
    Reply {
        post_id: i64,
        comment_id: i64,
        content: String,
    },
    /// Show posts containing #tag
    Hashtag { tag: String },
    /// Show a user's profile and posts
    Profile { user_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = dotenv::dotenv();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::minimal()
    };
    logging::init_logging(&log_config)?;

    let config_manager = ConfigManager::new()?;
    let config = config_manager.load_or_default();
    DisplayMode::global().set_dark(config.dark_mode);

    let server_url = config_manager.resolve_server_url(cli.server.as_deref());
    log::info!("Using server {}", server_url);

    let api = ApiClient::with_timeout(&server_url, config.request_timeout())?.with_log_config(log_config.clone());
    let auth = Auth::new(api.clone(), SessionStore::new()?).with_log_config(log_config.clone());
    let store = PostStore::new(api.clone()).with_log_config(log_config.clone());

    let app = App {
        api,
        auth,
        store,
        log: log_config,
    };
    app.run(cli.command).await
}

struct App {
    api: ApiClient,
    auth: Auth,
    store: PostStore,
    log: LogConfig,
}

impl App {
    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Register { username, password } => {
                let result = self.auth.register(&username, &password).await;
                self.report(&result, format!("Welcome, {}!", username));
            }
            Command::Login { username, password } => {
                let result = self.auth.login(&username, &password).await;
                self.report(&result, format!("Logged in as {}", username));
            }
            Command::Logout => {
                self.auth.logout()?;
                println!("{}", Notice::success("Logged out"));
            }
            Command::Feed => self.show(ViewSource::Feed).await,
            Command::Hashtag { tag } => self.show(ViewSource::Hashtag(tag)).await,
            Command::Profile { user_id } => {
                match self.api.get_user(user_id).await {
                    Ok(profile) => {
                        println!(
                            "@{} ({} followers, {} following)",
                            profile.username,
                            profile.followers.len(),
                            profile.following.len()
                        );
                        if let Some(bio) = profile.bio.filter(|b| !b.is_empty()) {
                            println!("{}", bio);
                        }
                        println!();
                    }
                    Err(e) => println!("{}", self.auth.handle_failure(&e.into())),
                }
                self.show(ViewSource::Profile(user_id)).await;
            }
            Command::Post { content, images } => {
                let Some(session) = self.session().await else { return Ok(()) };
                let post = NewPost {
                    content,
                    images: read_images(&images)?,
                };
                let result = self.store.add_post(&session, post).await;
                if let Ok(post) = &result {
                    print_post(post, Some(session.user_id()), None);
                }
                self.report(&result, "Post published");
            }
            Command::Edit {
                post_id,
                content,
                remove_images,
                images,
            } => {
                let Some(session) = self.session().await else { return Ok(()) };
                let current = match self.api.get_post(post_id).await {
                    Ok(post) => post,
                    Err(e) => {
                        println!("{}", self.auth.handle_failure(&e.into()));
                        return Ok(());
                    }
                };
                let mut edit = PostEdit::of(&current, content);
                for index in remove_images {
                    edit = edit.remove_image(index);
                }
                for image in read_images(&images)? {
                    edit = edit.add_image(image);
                }
                let result = self.store.update_post(&session, post_id, edit).await;
                self.report(&result, "Post updated");
            }
            Command::Delete { id, comment } => {
                let Some(session) = self.session().await else { return Ok(()) };
                if comment {
                    let notice = ThreadController::new(&self.store, &session).delete(id).await;
                    self.print_notice(notice);
                } else {
                    let result = self.store.delete_post(&session, id).await;
                    self.report(&result, "Post deleted");
                }
            }
            Command::Like { id, comment } => {
                let Some(session) = self.session().await else { return Ok(()) };
                if comment {
                    let notice = ThreadController::new(&self.store, &session).like(id).await;
                    self.print_notice(notice);
                } else {
                    let result = self.store.toggle_like(&session, id).await;
                    let message = match &result {
                        Ok(state) if state.contains(session.user_id()) => format!("Liked ({} likes)", state.likes),
                        Ok(state) => format!("Like removed ({} likes)", state.likes),
                        Err(_) => String::new(),
                    };
                    self.report(&result, message);
                }
            }
            Command::Comment { post_id, content } => {
                let Some(session) = self.session().await else { return Ok(()) };
                let notice = ThreadController::new(&self.store, &session)
                    .reply(post_id, None, &content)
                    .await;
                self.print_notice(notice);
            }
            Command::Reply {
                post_id,
                comment_id,
                content,
            } => {
                let Some(session) = self.session().await else { return Ok(()) };
                let notice = ThreadController::new(&self.store, &session)
                    .reply(post_id, Some(comment_id), &content)
                    .await;
                self.print_notice(notice);
            }
        }
        Ok(())
    }

    /// Restore the stored login, printing a notice when there is none
    async fn session(&self) -> Option<AuthedSession> {
        match self.auth.restore().await {
            Ok(Some(session)) => Some(session),
            Ok(None) => {
                println!("{}", Notice::reauth());
                None
            }
            Err(e) => {
                println!("{}", self.auth.handle_failure(&e));
                None
            }
        }
    }

    fn report<T>(&self, result: &StoreResult<T>, success: impl Into<String>) {
        self.print_notice(Notice::from_outcome(result, success));
    }

    /// Print the notice, dropping the stored login when the server no longer accepts it
    fn print_notice(&self, notice: Notice) {
        if notice.requires_reauth {
            if let Err(e) = self.auth.logout() {
                log::warn!("Failed to discard session: {:#}", e);
            }
        }
        log_debug!(self.log, "Notice: {}", notice.message);
        println!("{}", notice);
    }

    async fn show(&self, source: ViewSource) {
        let viewer = match self.auth.restore().await {
            Ok(session) => session.map(|s| s.user_id()),
            Err(_) => None,
        };

        let avatars = AvatarCache::new(self.api.clone());
        let mut view = PostView::new(source).with_log_config(self.log.clone());
        view.load(&self.api, &avatars, &CancellationToken::new()).await;

        match view.state() {
            ViewState::Ready if view.posts().is_empty() => println!("No posts yet."),
            ViewState::Ready => {
                for post in view.posts().iter() {
                    let avatar = view.avatar(post.user.id).map(Avatar::display_url);
                    print_post(post, viewer, avatar);
                }
            }
            ViewState::Error(message) => println!("{}", Notice::failure(message.clone())),
            ViewState::Loading => {}
        }
    }
}

fn read_images(paths: &[PathBuf]) -> Result<Vec<ImageFile>> {
    paths.iter().map(ImageFile::from_path).collect()
}

fn print_post(post: &Post, viewer: Option<i64>, avatar: Option<&str>) {
    let heart = if viewer.is_some_and(|id| post.is_liked_by(id)) { "♥" } else { "♡" };
    println!(
        "[{}] @{} · {} · {} {}",
        post.id,
        post.user.username,
        post.created_at.format("%Y-%m-%d %H:%M"),
        heart,
        post.likes
    );
    if let Some(url) = avatar {
        println!("  avatar: {}", url);
    }
    println!("  {}", post.content);
    for image in &post.images {
        println!("  [image] {}", image);
    }
    for row in thread_rows(post, viewer) {
        let indent = "  ".repeat(row.depth + 2);
        println!(
            "{}[{}] @{}: {} ({} likes)",
            indent, row.comment.id, row.comment.user.username, row.comment.content, row.comment.likes
        );
    }
    println!();
}
