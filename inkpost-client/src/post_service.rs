use crate::error::ClientError;
use crate::http::HttpClient;
use crate::models::{Comment, NewComment, Post, PostInput, PostUpdate};
use crate::storage::SessionStore;
use reqwest::Method;
use std::sync::Arc;

/// Posts and comments. Mutating calls send the persisted bearer token;
/// authorization is left to the server.
#[derive(Clone)]
pub struct PostService {
    http: HttpClient,
    store: Arc<dyn SessionStore>,
}

impl PostService {
    pub fn new(http: HttpClient, store: Arc<dyn SessionStore>) -> Self {
        Self { http, store }
    }

    fn token(&self) -> Result<Option<String>, ClientError> {
        self.store.token()
    }

    // ==================== Чтение ====================

    pub async fn list_posts(&self) -> Result<Vec<Post>, ClientError> {
        let request = self.http.request(Method::GET, "/Post/getpost", None);
        self.http.send(request).await
    }

    /// `None` when the post does not exist.
    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, ClientError> {
        let path = format!("/Post/getbyid/{}", HttpClient::segment(id));
        let request = self.http.request(Method::GET, &path, None);
        self.http.send_optional(request).await
    }

    pub async fn list_posts_by_author(&self, author_id: &str) -> Result<Vec<Post>, ClientError> {
        let path = format!("/Post/author/{}", HttpClient::segment(author_id));
        let request = self.http.request(Method::GET, &path, None);
        self.http.send(request).await
    }

    pub async fn search_posts(&self, query: &str) -> Result<Vec<Post>, ClientError> {
        let request = self
            .http
            .request(Method::GET, "/Post/search", None)
            .query(&[("q", query)]);
        self.http.send(request).await
    }

    pub async fn list_comments_by_post(&self, post_id: &str) -> Result<Vec<Comment>, ClientError> {
        let path = format!("/Comment/comment/{}", HttpClient::segment(post_id));
        let request = self.http.request(Method::GET, &path, None);
        self.http.send(request).await
    }

    /// Fetches a post and its comments concurrently.
    pub async fn get_post_with_comments(
        &self,
        id: &str,
    ) -> Result<Option<(Post, Vec<Comment>)>, ClientError> {
        let (post, comments) =
            futures::try_join!(self.get_post(id), self.list_comments_by_post(id))?;
        Ok(post.map(|post| (post, comments)))
    }

    // ==================== Изменение ====================

    pub async fn create_post(&self, input: &PostInput) -> Result<Post, ClientError> {
        input.validate()?;

        let token = self.token()?;
        let request = self
            .http
            .request(Method::POST, "/Post/createpost", token.as_deref())
            .json(input);
        let post: Post = self.http.send(request).await?;

        tracing::info!(post_id = %post.id, "Post created");
        Ok(post)
    }

    pub async fn update_post(&self, id: &str, update: &PostUpdate) -> Result<Post, ClientError> {
        update.validate()?;

        let token = self.token()?;
        let path = format!("/Post/updatepost/{}", HttpClient::segment(id));
        let request = self
            .http
            .request(Method::PUT, &path, token.as_deref())
            .json(update);
        self.http.send(request).await
    }

    pub async fn delete_post(&self, id: &str) -> Result<(), ClientError> {
        let token = self.token()?;
        let path = format!("/Post/deletepost/{}", HttpClient::segment(id));
        let request = self.http.request(Method::DELETE, &path, token.as_deref());
        self.http.send_empty(request).await?;

        tracing::info!(post_id = id, "Post deleted");
        Ok(())
    }

    pub async fn create_comment(&self, comment: &NewComment) -> Result<Comment, ClientError> {
        if comment.content.trim().is_empty() {
            return Err(ClientError::InvalidInput(
                "comment content must not be empty".into(),
            ));
        }

        let token = self.token()?;
        let request = self
            .http
            .request(Method::POST, "/Comment/create", token.as_deref())
            .json(comment);
        self.http.send(request).await
    }
}
