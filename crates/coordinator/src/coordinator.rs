use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use domain::{
    build_thread, Comment, CommentCommand, CommentNode, CommentPatch, CommentView, NewComment,
    Notice, Viewer,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::traits::{CommentBackend, Confirm};

/// What a mutation amounted to, as far as the calling view is concerned.
/// Failure details travel on the notice channel only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    AuthRequired,
    Cancelled,
    Failed,
}

/// A control that is busy while its own request is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKey {
    Post { post_id: String },
    Reply { parent_id: String },
    Edit { comment_id: String },
    Delete { comment_id: String },
    Like { comment_id: String },
}

/// Requests in flight per action. A key is pending while its count is above
/// zero, so overlapping requests on one control keep it busy until the last
/// one settles.
type PendingSet = Arc<Mutex<HashMap<ActionKey, usize>>>;

/// Releases its request from the pending set when the request settles.
struct PendingGuard {
    set: PendingSet,
    key: ActionKey,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = lock(&self.set);
        if let Some(count) = pending.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                pending.remove(&self.key);
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Issues comment writes and keeps the per-post comment cache in step.
///
/// The cache is only ever replaced by a refetch; no write touches it
/// directly. Create, edit and delete wait for the backend before anything
/// changes locally. Toggling a like reads the cached like rows to decide
/// between insert and delete, then refetches like every other write.
pub struct MutationCoordinator<B> {
    backend: Arc<B>,
    cache: Arc<Mutex<HashMap<String, Vec<Comment>>>>,
    views: Arc<Mutex<HashMap<String, CommentView>>>,
    drafts: Arc<Mutex<HashMap<String, String>>>,
    pending: PendingSet,
    notices: broadcast::Sender<Notice>,
}

impl<B> Clone for MutationCoordinator<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            cache: self.cache.clone(),
            views: self.views.clone(),
            drafts: self.drafts.clone(),
            pending: self.pending.clone(),
            notices: self.notices.clone(),
        }
    }
}

impl<B: CommentBackend> MutationCoordinator<B> {
    pub fn new(backend: B) -> Self {
        Self::with_backend(Arc::new(backend))
    }

    pub fn with_backend(backend: Arc<B>) -> Self {
        let (notices, _) = broadcast::channel(64);
        Self {
            backend,
            cache: Arc::default(),
            views: Arc::default(),
            drafts: Arc::default(),
            pending: Arc::default(),
            notices,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // --- reads ---

    /// Fetches the comments of a post, replaces the cached collection and
    /// returns the assembled forest.
    pub async fn load(&self, post_id: &str) -> anyhow::Result<Vec<CommentNode>> {
        let rows = self.backend.fetch_comments(post_id).await?;
        debug!("Loaded {} comment(s) for {}", rows.len(), post_id);
        lock(&self.cache).insert(post_id.to_string(), rows.clone());
        Ok(build_thread(rows))
    }

    /// Forest for a post from the cache alone.
    pub fn thread(&self, post_id: &str) -> Vec<CommentNode> {
        let rows = lock(&self.cache).get(post_id).cloned().unwrap_or_default();
        build_thread(rows)
    }

    /// Whether the viewer has a like row on the comment, judged from the
    /// cached rows.
    pub fn is_liked(&self, viewer: &Viewer, post_id: &str, comment_id: &str) -> bool {
        let Some(user_id) = viewer.current_user() else {
            return false;
        };
        lock(&self.cache)
            .get(post_id)
            .and_then(|rows| rows.iter().find(|c| c.id == comment_id))
            .map(|c| c.liked_by(user_id))
            .unwrap_or(false)
    }

    pub fn is_pending(&self, key: &ActionKey) -> bool {
        lock(&self.pending).contains_key(key)
    }

    // --- local UI state ---

    pub fn view(&self, comment_id: &str) -> CommentView {
        lock(&self.views).get(comment_id).cloned().unwrap_or_default()
    }

    pub fn begin_edit(&self, comment_id: &str, current_body: &str) {
        self.set_view(comment_id, CommentView::begin_edit(current_body));
    }

    pub fn begin_reply(&self, comment_id: &str) {
        self.set_view(comment_id, CommentView::begin_reply());
    }

    pub fn set_view_draft(&self, comment_id: &str, text: &str) {
        if let Some(view) = lock(&self.views).get_mut(comment_id) {
            view.set_draft(text);
        }
    }

    /// Leaves edit or reply mode without writing anything.
    pub fn cancel(&self, comment_id: &str) {
        lock(&self.views).remove(comment_id);
    }

    /// Text in the post's top-level compose box.
    pub fn draft(&self, post_id: &str) -> String {
        lock(&self.drafts).get(post_id).cloned().unwrap_or_default()
    }

    pub fn set_draft(&self, post_id: &str, text: &str) {
        lock(&self.drafts).insert(post_id.to_string(), text.to_string());
    }

    // --- writes ---

    /// Posts a root comment or, with `parent_id`, a reply.
    ///
    /// The body is sent as given; empty bodies are kept out by the form.
    pub async fn create(
        &self,
        viewer: &Viewer,
        post_id: &str,
        parent_id: Option<&str>,
        body: &str,
    ) -> Outcome {
        let Some(user_id) = viewer.current_user() else {
            return self.require_auth();
        };

        let key = match parent_id {
            Some(parent) => ActionKey::Reply {
                parent_id: parent.to_string(),
            },
            None => ActionKey::Post {
                post_id: post_id.to_string(),
            },
        };
        let _busy = self.begin(key);

        let new = NewComment {
            post_id: post_id.to_string(),
            author_id: user_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            body: body.to_string(),
        };

        match self.backend.create_comment(new).await {
            Ok(created) => {
                info!("Comment {} created on {} by {}", created.id, post_id, user_id);
                self.refresh(post_id).await;
                let message = match parent_id {
                    Some(parent) => {
                        lock(&self.views).remove(parent);
                        "Reply posted"
                    }
                    None => {
                        lock(&self.drafts).remove(post_id);
                        "Comment posted"
                    }
                };
                self.notify(Notice::Success(message.to_string()));
                Outcome::Done
            }
            Err(e) => {
                warn!("Failed to create comment on {}: {:#}", post_id, e);
                self.notify(Notice::Error("Failed to post comment".to_string()));
                Outcome::Failed
            }
        }
    }

    /// Rewrites a comment body, scoped to the viewer as author.
    ///
    /// A write that matches no row (not the author, or already gone) is
    /// reported the same way as one that did; the refetch shows the truth.
    /// On failure the comment stays in edit mode so the user can retry.
    pub async fn edit(
        &self,
        viewer: &Viewer,
        post_id: &str,
        comment_id: &str,
        body: &str,
    ) -> Outcome {
        let Some(user_id) = viewer.current_user() else {
            return self.require_auth();
        };
        let _busy = self.begin(ActionKey::Edit {
            comment_id: comment_id.to_string(),
        });

        let patch = CommentPatch {
            body: body.to_string(),
        };
        match self.backend.update_comment(comment_id, user_id, patch).await {
            Ok(rows) => {
                if rows.is_empty() {
                    debug!("Edit of {} by {} changed no rows", comment_id, user_id);
                }
                lock(&self.views).remove(comment_id);
                self.refresh(post_id).await;
                self.notify(Notice::Success("Comment updated".to_string()));
                Outcome::Done
            }
            Err(e) => {
                warn!("Failed to update comment {}: {:#}", comment_id, e);
                self.notify(Notice::Error("Failed to update comment".to_string()));
                Outcome::Failed
            }
        }
    }

    /// Deletes a comment after the user confirms. Scoped to the viewer as
    /// author; a declined prompt issues no request.
    pub async fn delete(
        &self,
        viewer: &Viewer,
        post_id: &str,
        comment_id: &str,
        confirm: &dyn Confirm,
    ) -> Outcome {
        let Some(user_id) = viewer.current_user() else {
            return self.require_auth();
        };
        if !confirm
            .confirm("Are you sure you want to delete this comment?")
            .await
        {
            return Outcome::Cancelled;
        }
        let _busy = self.begin(ActionKey::Delete {
            comment_id: comment_id.to_string(),
        });

        match self.backend.delete_comment(comment_id, user_id).await {
            Ok(affected) => {
                debug!("Delete of {} by {} removed {} row(s)", comment_id, user_id, affected);
                lock(&self.views).remove(comment_id);
                self.refresh(post_id).await;
                self.notify(Notice::Success("Comment deleted".to_string()));
                Outcome::Done
            }
            Err(e) => {
                warn!("Failed to delete comment {}: {:#}", comment_id, e);
                self.notify(Notice::Error("Failed to delete comment".to_string()));
                Outcome::Failed
            }
        }
    }

    /// Likes or unlikes a comment depending on the cached like rows.
    ///
    /// Two toggles fired before the first refetch lands read the same cached
    /// state and issue the same write twice; the second one fails against
    /// the unique like row (or deletes nothing) and is reported as any other
    /// failure.
    pub async fn toggle_like(&self, viewer: &Viewer, post_id: &str, comment_id: &str) -> Outcome {
        let Some(user_id) = viewer.current_user() else {
            return self.require_auth();
        };
        let liked = self.is_liked(viewer, post_id, comment_id);
        let _busy = self.begin(ActionKey::Like {
            comment_id: comment_id.to_string(),
        });

        let result = if liked {
            self.backend.unlike_comment(comment_id, user_id).await
        } else {
            self.backend.like_comment(comment_id, user_id).await
        };

        match result {
            Ok(_) => {
                debug!(
                    "{} {} comment {}",
                    user_id,
                    if liked { "unliked" } else { "liked" },
                    comment_id
                );
                self.refresh(post_id).await;
                Outcome::Done
            }
            Err(e) => {
                warn!("Failed to toggle like on {}: {:#}", comment_id, e);
                self.notify(Notice::Error("Failed to update like".to_string()));
                Outcome::Failed
            }
        }
    }

    pub async fn dispatch(
        &self,
        viewer: &Viewer,
        cmd: CommentCommand,
        confirm: &dyn Confirm,
    ) -> Outcome {
        debug!("Dispatching command on post {}", cmd.post_id());
        match cmd {
            CommentCommand::Create {
                post_id,
                parent_id,
                body,
            } => {
                self.create(viewer, &post_id, parent_id.as_deref(), &body)
                    .await
            }
            CommentCommand::Edit {
                post_id,
                comment_id,
                body,
            } => self.edit(viewer, &post_id, &comment_id, &body).await,
            CommentCommand::Delete {
                post_id,
                comment_id,
            } => self.delete(viewer, &post_id, &comment_id, confirm).await,
            CommentCommand::ToggleLike {
                post_id,
                comment_id,
            } => self.toggle_like(viewer, &post_id, &comment_id).await,
        }
    }

    // --- internals ---

    /// Refetches a post's comments. On failure the previous collection stays.
    async fn refresh(&self, post_id: &str) {
        match self.backend.fetch_comments(post_id).await {
            Ok(rows) => {
                lock(&self.cache).insert(post_id.to_string(), rows);
                self.notify(Notice::ThreadRefreshed {
                    post_id: post_id.to_string(),
                });
            }
            Err(e) => warn!("Refetch of {} failed, keeping cached thread: {:#}", post_id, e),
        }
    }

    fn begin(&self, key: ActionKey) -> PendingGuard {
        *lock(&self.pending).entry(key.clone()).or_insert(0) += 1;
        PendingGuard {
            set: self.pending.clone(),
            key,
        }
    }

    fn set_view(&self, comment_id: &str, view: CommentView) {
        lock(&self.views).insert(comment_id.to_string(), view);
    }

    fn require_auth(&self) -> Outcome {
        self.notify(Notice::AuthRequired);
        Outcome::AuthRequired
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use domain::AuthorProfile;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn ts(n: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(n as i64)
    }

    #[derive(Default)]
    struct FakeBackend {
        rows: Mutex<Vec<Comment>>,
        likes: Mutex<Vec<(String, String)>>,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
        writes: AtomicUsize,
        entered: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        fn seeded(rows: Vec<(&str, &str, Option<&str>)>) -> Self {
            let fake = FakeBackend::default();
            for (id, author, parent) in rows {
                fake.push(id, author, parent, &format!("body of {}", id));
            }
            fake
        }

        fn push(&self, id: &str, author: &str, parent: Option<&str>, body: &str) -> Comment {
            let mut rows = lock(&self.rows);
            let comment = Comment {
                id: id.to_string(),
                post_id: "p1".to_string(),
                author_id: author.to_string(),
                parent_id: parent.map(str::to_string),
                body: body.to_string(),
                created_at: ts(rows.len()),
                updated_at: None,
                author: AuthorProfile::default(),
                likes: Vec::new(),
            };
            rows.push(comment.clone());
            comment
        }

        fn like_rows(&self, comment_id: &str) -> usize {
            lock(&self.likes)
                .iter()
                .filter(|(c, _)| c == comment_id)
                .count()
        }

        fn write(&self) -> anyhow::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                bail!("backend unavailable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CommentBackend for FakeBackend {
        async fn fetch_comments(&self, post_id: &str) -> anyhow::Result<Vec<Comment>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                bail!("read timeout");
            }
            let likes = lock(&self.likes).clone();
            Ok(lock(&self.rows)
                .iter()
                .filter(|c| c.post_id == post_id)
                .cloned()
                .map(|mut c| {
                    c.likes = likes
                        .iter()
                        .filter(|(cid, _)| *cid == c.id)
                        .map(|(_, user_id)| domain::CommentLike {
                            user_id: user_id.clone(),
                        })
                        .collect();
                    c
                })
                .collect())
        }

        async fn create_comment(&self, new: NewComment) -> anyhow::Result<Comment> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.write()?;
            let id = format!("c{}", lock(&self.rows).len());
            Ok(self.push(&id, &new.author_id, new.parent_id.as_deref(), &new.body))
        }

        async fn update_comment(
            &self,
            comment_id: &str,
            author_id: &str,
            patch: CommentPatch,
        ) -> anyhow::Result<Vec<Comment>> {
            self.write()?;
            let mut rows = lock(&self.rows);
            Ok(rows
                .iter_mut()
                .filter(|c| c.id == comment_id && c.author_id == author_id)
                .map(|c| {
                    c.body = patch.body.clone();
                    c.clone()
                })
                .collect())
        }

        async fn delete_comment(&self, comment_id: &str, author_id: &str) -> anyhow::Result<u64> {
            self.write()?;
            let mut rows = lock(&self.rows);
            let before = rows.len();
            rows.retain(|c| !(c.id == comment_id && c.author_id == author_id));
            Ok((before - rows.len()) as u64)
        }

        async fn like_comment(&self, comment_id: &str, user_id: &str) -> anyhow::Result<u64> {
            self.write()?;
            let mut likes = lock(&self.likes);
            if likes.iter().any(|(c, u)| c == comment_id && u == user_id) {
                bail!("duplicate key value violates unique constraint");
            }
            likes.push((comment_id.to_string(), user_id.to_string()));
            Ok(1)
        }

        async fn unlike_comment(&self, comment_id: &str, user_id: &str) -> anyhow::Result<u64> {
            self.write()?;
            let mut likes = lock(&self.likes);
            let before = likes.len();
            likes.retain(|(c, u)| !(c == comment_id && u == user_id));
            Ok((before - likes.len()) as u64)
        }
    }

    fn drain(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    fn always(answer: bool) -> impl Fn(&str) -> bool + Send + Sync {
        move |_: &str| answer
    }

    #[tokio::test]
    async fn test_anonymous_writes_ask_for_sign_in() {
        let coord = MutationCoordinator::new(FakeBackend::seeded(vec![("c0", "u1", None)]));
        coord.load("p1").await.unwrap();
        let mut rx = coord.subscribe();
        let anon = Viewer::Anonymous;

        assert_eq!(coord.create(&anon, "p1", None, "hi").await, Outcome::AuthRequired);
        assert_eq!(coord.create(&anon, "p1", Some("c0"), "hi").await, Outcome::AuthRequired);
        assert_eq!(coord.toggle_like(&anon, "p1", "c0").await, Outcome::AuthRequired);
        assert_eq!(coord.edit(&anon, "p1", "c0", "x").await, Outcome::AuthRequired);
        assert_eq!(
            coord.delete(&anon, "p1", "c0", &always(true)).await,
            Outcome::AuthRequired
        );

        assert_eq!(coord.backend().writes.load(Ordering::SeqCst), 0);
        assert!(drain(&mut rx).iter().all(|n| *n == Notice::AuthRequired));
    }

    #[tokio::test]
    async fn test_create_refetches_and_clears_compose_box() {
        let coord = MutationCoordinator::new(FakeBackend::default());
        let mut rx = coord.subscribe();
        let user = Viewer::user("u1");

        coord.set_draft("p1", "first!");
        let body = coord.draft("p1");
        assert_eq!(coord.create(&user, "p1", None, &body).await, Outcome::Done);

        assert_eq!(coord.draft("p1"), "");
        let thread = coord.thread("p1");
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].comment.body, "first!");
        assert_eq!(
            drain(&mut rx),
            vec![
                Notice::ThreadRefreshed {
                    post_id: "p1".to_string()
                },
                Notice::Success("Comment posted".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_create_keeps_draft() {
        let backend = FakeBackend::default();
        backend.fail_writes.store(true, Ordering::SeqCst);
        let coord = MutationCoordinator::new(backend);
        let mut rx = coord.subscribe();

        coord.set_draft("p1", "keep me");
        let outcome = coord.create(&Viewer::user("u1"), "p1", None, "keep me").await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(coord.draft("p1"), "keep me");
        assert!(coord.thread("p1").is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![Notice::Error("Failed to post comment".to_string())]
        );
    }

    #[tokio::test]
    async fn test_reply_closes_reply_box_and_nests() {
        let coord = MutationCoordinator::new(FakeBackend::seeded(vec![("c0", "u1", None)]));
        coord.load("p1").await.unwrap();

        coord.begin_reply("c0");
        coord.set_view_draft("c0", "agreed");
        assert!(coord.view("c0").is_replying());

        let outcome = coord
            .create(&Viewer::user("u2"), "p1", Some("c0"), "agreed")
            .await;
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(coord.view("c0"), CommentView::Viewing);

        let thread = coord.thread("p1");
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].replies.len(), 1);
        assert_eq!(thread[0].replies[0].comment.author_id, "u2");
    }

    #[tokio::test]
    async fn test_edit_saves_and_returns_to_viewing() {
        let coord = MutationCoordinator::new(FakeBackend::seeded(vec![("c0", "u1", None)]));
        coord.load("p1").await.unwrap();

        coord.begin_edit("c0", "body of c0");
        let outcome = coord.edit(&Viewer::user("u1"), "p1", "c0", "fixed typo").await;

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(coord.view("c0"), CommentView::Viewing);
        assert_eq!(coord.thread("p1")[0].comment.body, "fixed typo");
    }

    #[tokio::test]
    async fn test_failed_edit_stays_in_edit_mode() {
        let coord = MutationCoordinator::new(FakeBackend::seeded(vec![("c0", "u1", None)]));
        coord.load("p1").await.unwrap();
        coord.begin_edit("c0", "body of c0");
        coord.set_view_draft("c0", "second try");
        coord.backend().fail_writes.store(true, Ordering::SeqCst);

        let outcome = coord.edit(&Viewer::user("u1"), "p1", "c0", "second try").await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(coord.view("c0").draft(), Some("second try"));
        assert_eq!(coord.thread("p1")[0].comment.body, "body of c0");
    }

    #[tokio::test]
    async fn test_edit_by_non_author_changes_nothing() {
        let coord = MutationCoordinator::new(FakeBackend::seeded(vec![("c0", "u1", None)]));
        coord.load("p1").await.unwrap();

        let outcome = coord.edit(&Viewer::user("u2"), "p1", "c0", "defaced").await;

        // zero rows affected looks like success to the caller
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(coord.thread("p1")[0].comment.body, "body of c0");
    }

    #[tokio::test]
    async fn test_declined_delete_sends_nothing() {
        let coord = MutationCoordinator::new(FakeBackend::seeded(vec![("c0", "u1", None)]));
        coord.load("p1").await.unwrap();
        let user = Viewer::user("u1");

        let outcome = coord.delete(&user, "p1", "c0", &always(false)).await;
        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(coord.backend().writes.load(Ordering::SeqCst), 0);

        let outcome = coord.delete(&user, "p1", "c0", &always(true)).await;
        assert_eq!(outcome, Outcome::Done);
        assert!(coord.thread("p1").is_empty());
    }

    #[tokio::test]
    async fn test_deleting_a_parent_hides_its_replies() {
        let coord = MutationCoordinator::new(FakeBackend::seeded(vec![
            ("c0", "u1", None),
            ("c1", "u2", Some("c0")),
            ("c2", "u3", None),
        ]));
        coord.load("p1").await.unwrap();

        let outcome = coord
            .delete(&Viewer::user("u1"), "p1", "c0", &always(true))
            .await;
        assert_eq!(outcome, Outcome::Done);

        let ids: Vec<String> = coord.thread("p1").iter().map(|n| n.id().to_string()).collect();
        assert_eq!(ids, vec!["c2"]);
    }

    #[tokio::test]
    async fn test_like_toggle_round_trip() {
        let coord = MutationCoordinator::new(FakeBackend::seeded(vec![("c0", "u1", None)]));
        coord.load("p1").await.unwrap();
        let user = Viewer::user("u2");

        assert_eq!(coord.toggle_like(&user, "p1", "c0").await, Outcome::Done);
        assert_eq!(coord.backend().like_rows("c0"), 1);
        assert!(coord.is_liked(&user, "p1", "c0"));
        assert_eq!(coord.thread("p1")[0].comment.like_count(), 1);

        assert_eq!(coord.toggle_like(&user, "p1", "c0").await, Outcome::Done);
        assert_eq!(coord.backend().like_rows("c0"), 0);
        assert!(!coord.is_liked(&user, "p1", "c0"));

        for _ in 0..4 {
            coord.toggle_like(&user, "p1", "c0").await;
        }
        assert_eq!(coord.backend().like_rows("c0"), 0);
    }

    #[tokio::test]
    async fn test_toggle_on_stale_cache_repeats_the_insert() {
        let coord = MutationCoordinator::new(FakeBackend::seeded(vec![("c0", "u1", None)]));
        coord.load("p1").await.unwrap();
        coord.backend().fail_reads.store(true, Ordering::SeqCst);
        let user = Viewer::user("u2");
        let mut rx = coord.subscribe();

        assert_eq!(coord.toggle_like(&user, "p1", "c0").await, Outcome::Done);
        // refetch failed, so the cache still says "not liked"
        assert!(!coord.is_liked(&user, "p1", "c0"));
        assert_eq!(coord.toggle_like(&user, "p1", "c0").await, Outcome::Failed);

        assert_eq!(coord.backend().like_rows("c0"), 1);
        assert_eq!(
            drain(&mut rx),
            vec![Notice::Error("Failed to update like".to_string())]
        );
    }

    #[tokio::test]
    async fn test_pending_flag_covers_only_its_request() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let coord = MutationCoordinator::new(backend);
        let key = ActionKey::Post {
            post_id: "p1".to_string(),
        };

        let task = {
            let coord = coord.clone();
            tokio::spawn(async move { coord.create(&Viewer::user("u1"), "p1", None, "hello").await })
        };
        while !coord.is_pending(&key) {
            tokio::task::yield_now().await;
        }
        assert!(!coord.is_pending(&ActionKey::Post {
            post_id: "p2".to_string()
        }));

        gate.notify_one();
        assert_eq!(task.await.unwrap(), Outcome::Done);
        assert!(!coord.is_pending(&key));
    }

    #[tokio::test]
    async fn test_overlapping_requests_keep_the_flag_until_the_last_settles() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let coord = MutationCoordinator::new(backend);
        let key = ActionKey::Post {
            post_id: "p1".to_string(),
        };

        let spawn_post = |body: &'static str| {
            let coord = coord.clone();
            tokio::spawn(async move { coord.create(&Viewer::user("u1"), "p1", None, body).await })
        };
        let first = spawn_post("one");
        let second = spawn_post("two");
        while coord.backend().entered.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        assert!(coord.is_pending(&key));

        gate.notify_one();
        while !(first.is_finished() || second.is_finished()) {
            tokio::task::yield_now().await;
        }
        assert!(coord.is_pending(&key));

        gate.notify_one();
        assert_eq!(first.await.unwrap(), Outcome::Done);
        assert_eq!(second.await.unwrap(), Outcome::Done);
        assert!(!coord.is_pending(&key));
        assert_eq!(coord.thread("p1").len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_routes_commands() {
        let coord = MutationCoordinator::new(FakeBackend::default());
        let user = Viewer::user("u1");
        let yes = always(true);

        let outcome = coord
            .dispatch(
                &user,
                CommentCommand::Create {
                    post_id: "p1".to_string(),
                    parent_id: None,
                    body: "via command".to_string(),
                },
                &yes,
            )
            .await;
        assert_eq!(outcome, Outcome::Done);
        let id = coord.thread("p1")[0].id().to_string();

        let outcome = coord
            .dispatch(
                &user,
                CommentCommand::ToggleLike {
                    post_id: "p1".to_string(),
                    comment_id: id.clone(),
                },
                &yes,
            )
            .await;
        assert_eq!(outcome, Outcome::Done);
        assert!(coord.is_liked(&user, "p1", &id));
    }

    #[tokio::test]
    async fn test_scoped_edit_against_sqlite() {
        let db = storage::Db::new("sqlite::memory:").await.unwrap();
        let original = db
            .insert_comment(&NewComment {
                post_id: "p1".to_string(),
                author_id: "u1".to_string(),
                parent_id: None,
                body: "mine".to_string(),
            })
            .await
            .unwrap();

        let coord = MutationCoordinator::new(db);
        coord.load("p1").await.unwrap();

        let outcome = coord
            .edit(&Viewer::user("u2"), "p1", &original.id, "not yours")
            .await;
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(coord.thread("p1")[0].comment.body, "mine");

        let outcome = coord
            .edit(&Viewer::user("u1"), "p1", &original.id, "still mine")
            .await;
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(coord.thread("p1")[0].comment.body, "still mine");
    }
}
