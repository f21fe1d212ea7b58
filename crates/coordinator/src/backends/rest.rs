use anyhow::{Context, Result};
use async_trait::async_trait;
use domain::{Comment, CommentPatch, NewComment};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::traits::CommentBackend;

#[derive(Serialize)]
struct CreateCommentRequest<'a> {
    author_id: &'a str,
    parent_id: Option<&'a str>,
    body: &'a str,
}

#[derive(Serialize)]
struct LikeRequest<'a> {
    user_id: &'a str,
}

#[derive(Deserialize)]
struct MutationResponse {
    affected: u64,
}

/// Talks to the comment server over HTTP. Writes are signed with the bearer
/// session token; reads are public.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = self.authed(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Backend returned {}: {}", status, text);
        }
        Ok(resp)
    }
}

#[async_trait]
impl CommentBackend for RestBackend {
    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        let url = self.url(&format!("/api/posts/{}/comments", post_id));
        let resp = self.send(self.client.get(&url)).await?;
        resp.json()
            .await
            .with_context(|| format!("Failed to decode comments of {}", post_id))
    }

    async fn create_comment(&self, new: NewComment) -> Result<Comment> {
        let url = self.url(&format!("/api/posts/{}/comments", new.post_id));
        let payload = CreateCommentRequest {
            author_id: &new.author_id,
            parent_id: new.parent_id.as_deref(),
            body: &new.body,
        };
        let resp = self.send(self.client.post(&url).json(&payload)).await?;
        Ok(resp.json().await?)
    }

    async fn update_comment(
        &self,
        comment_id: &str,
        author_id: &str,
        patch: CommentPatch,
    ) -> Result<Vec<Comment>> {
        let url = self.url(&format!("/api/comments/{}", comment_id));
        let req = self
            .client
            .patch(&url)
            .query(&[("author_id", author_id)])
            .json(&patch);
        Ok(self.send(req).await?.json().await?)
    }

    async fn delete_comment(&self, comment_id: &str, author_id: &str) -> Result<u64> {
        let url = self.url(&format!("/api/comments/{}", comment_id));
        let req = self.client.delete(&url).query(&[("author_id", author_id)]);
        let resp: MutationResponse = self.send(req).await?.json().await?;
        Ok(resp.affected)
    }

    async fn like_comment(&self, comment_id: &str, user_id: &str) -> Result<u64> {
        let url = self.url(&format!("/api/comments/{}/likes", comment_id));
        let req = self.client.post(&url).json(&LikeRequest { user_id });
        let resp: MutationResponse = self.send(req).await?.json().await?;
        Ok(resp.affected)
    }

    async fn unlike_comment(&self, comment_id: &str, user_id: &str) -> Result<u64> {
        let url = self.url(&format!("/api/comments/{}/likes", comment_id));
        let req = self.client.delete(&url).query(&[("user_id", user_id)]);
        let resp: MutationResponse = self.send(req).await?.json().await?;
        Ok(resp.affected)
    }
}
