use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::client::ApiClient;
use crate::core::errors::ClientError;
use crate::models::{Field, FieldErrors, Post};

/// The two post lists the dashboard shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    /// Public feed of every post.
    All,
    /// Posts written by the signed-in user.
    Mine,
}

/// Case-insensitive match of `query` against title or content. A blank
/// query keeps every post.
pub fn filter_posts<'a>(posts: &'a [Post], query: &str) -> Vec<&'a Post> {
    let needle = query.trim().to_lowercase();
    posts
        .iter()
        .filter(|post| {
            needle.is_empty()
                || post.title.to_lowercase().contains(&needle)
                || post.content.to_lowercase().contains(&needle)
        })
        .collect()
}

pub fn validate_post(title: &str, content: &str) -> Result<(), ClientError> {
    let mut errors = FieldErrors::new();
    if title.trim().is_empty() {
        errors.set(Field::Title, "Title is required");
    }
    if content.trim().is_empty() {
        errors.set(Field::Content, "Content is required");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClientError::Validation(errors))
    }
}

/// Fetch cache and mutation layer over the post endpoints.
///
/// Lists are cached per feed until invalidated. Any successful write drops
/// both feeds, since a post can appear in either. A fetch that was already
/// in flight when the cache was invalidated is returned to its caller but
/// not cached. Create and update share
/// one in-flight slot: while one is pending, another fails with
/// [`ClientError::Busy`] instead of racing it.
pub struct PostFeed {
    client: Arc<ApiClient>,
    cache: Mutex<HashMap<Feed, Vec<Post>>>,
    generation: AtomicU64,
    form: tokio::sync::Mutex<()>,
}

impl PostFeed {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            form: tokio::sync::Mutex::new(()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<Feed, Vec<Post>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cached(&self, feed: Feed) -> Option<Vec<Post>> {
        self.cache().get(&feed).cloned()
    }

    pub async fn posts(&self, feed: Feed) -> Result<Vec<Post>, ClientError> {
        if let Some(posts) = self.cached(feed) {
            debug!(?feed, "serving posts from cache");
            return Ok(posts);
        }
        let started = self.generation.load(Ordering::SeqCst);
        let posts = match feed {
            Feed::All => self.client.list_all_posts().await?,
            Feed::Mine => self.client.list_own_posts().await?,
        };
        let mut cache = self.cache();
        if self.generation.load(Ordering::SeqCst) == started {
            cache.insert(feed, posts.clone());
        } else {
            debug!(?feed, "cache invalidated during fetch; not caching");
        }
        Ok(posts)
    }

    pub fn invalidate_all(&self) {
        let mut cache = self.cache();
        self.generation.fetch_add(1, Ordering::SeqCst);
        cache.clear();
    }

    /// True while a create or update is pending.
    pub fn is_saving(&self) -> bool {
        self.form.try_lock().is_err()
    }

    pub async fn create(&self, title: &str, content: &str) -> Result<Post, ClientError> {
        validate_post(title, content)?;
        let _slot = self.form.try_lock().map_err(|_| ClientError::Busy)?;
        let post = self.client.create_post(title, content).await?;
        info!(id = post.id, "post created");
        self.invalidate_all();
        Ok(post)
    }

    pub async fn update(&self, id: i64, title: &str, content: &str) -> Result<Post, ClientError> {
        validate_post(title, content)?;
        let _slot = self.form.try_lock().map_err(|_| ClientError::Busy)?;
        let post = self.client.update_post(id, title, content).await?;
        info!(id, "post updated");
        self.invalidate_all();
        Ok(post)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        self.client.delete_post(id).await?;
        info!(id, "post deleted");
        self.invalidate_all();
        Ok(())
    }
}
