use std::io::{self, BufRead, Write};

use anyhow::Context;
use coordinator::{MutationCoordinator, Outcome, RestBackend};
use domain::{session, thread, Notice, Viewer};
use serde::Serialize;

const BASE_URL: &str = "http://127.0.0.1:3000";
const POST_ID: &str = "hello-inkwell";
const USER_ID: &str = "ferris";

#[derive(Serialize)]
struct ProfileRequest<'a> {
    display_name: &'a str,
    avatar_url: Option<&'a str>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let secret = std::env::var("INKWELL_SECURITY__SESSION_SECRET")
        .unwrap_or_else(|_| "change_me_please".to_string());
    let token = session::issue_token(&secret, USER_ID).context("Failed to sign session token")?;
    println!("Starting Inkwell test client as '{}'...", USER_ID);

    println!("\n[1/5] Publishing profile...");
    let resp = reqwest::Client::new()
        .put(format!("{}/api/profile", BASE_URL))
        .bearer_auth(&token)
        .json(&ProfileRequest {
            display_name: "Ferris the Crab",
            avatar_url: None,
        })
        .send()
        .await?;
    println!("   -> {}", resp.status());

    let coord = MutationCoordinator::new(RestBackend::new(BASE_URL, Some(token)));
    let mut notices = coord.subscribe();
    let viewer = Viewer::user(USER_ID);

    println!("\n[2/5] Posting a comment and a reply...");
    coord.load(POST_ID).await?;
    coord.set_draft(POST_ID, "This is a message from the Inkwell test client!");
    let draft = coord.draft(POST_ID);
    if coord.create(&viewer, POST_ID, None, &draft).await != Outcome::Done {
        report(&mut notices);
        return Ok(());
    }
    let root_id = match coord.thread(POST_ID).last() {
        Some(node) => node.id().to_string(),
        None => anyhow::bail!("Posted comment did not come back on refetch"),
    };
    coord.begin_reply(&root_id);
    coord
        .create(&viewer, POST_ID, Some(root_id.as_str()), "Replying to myself.")
        .await;

    println!("\n[3/5] Liking and editing...");
    coord.toggle_like(&viewer, POST_ID, &root_id).await;
    coord.begin_edit(&root_id, &draft);
    coord
        .edit(&viewer, POST_ID, &root_id, "Edited by the Inkwell test client.")
        .await;

    println!("\n[4/5] Thread now reads:");
    print_thread(&coord.thread(POST_ID), &viewer);

    println!("\n[5/5] Deleting the root comment...");
    let confirm = |message: &str| ask(message);
    coord.delete(&viewer, POST_ID, &root_id, &confirm).await;
    print_thread(&coord.thread(POST_ID), &viewer);

    report(&mut notices);
    Ok(())
}

fn print_thread(forest: &[domain::CommentNode], viewer: &Viewer) {
    for (depth, node) in thread::walk(forest) {
        let c = &node.comment;
        let liked = viewer.current_user().is_some_and(|u| c.liked_by(u));
        println!(
            "   {}- [{}] {}: {} ({} like{}{})",
            "  ".repeat(depth),
            c.created_at,
            c.author_name(),
            c.body,
            c.like_count(),
            if c.like_count() == 1 { "" } else { "s" },
            if liked { ", liked by you" } else { "" },
        );
    }
}

fn report(notices: &mut tokio::sync::broadcast::Receiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        match notice {
            Notice::Success(msg) => println!("   -> ✅ {}", msg),
            Notice::Error(msg) => println!("   -> ❌ {}", msg),
            Notice::AuthRequired => println!("   -> 🔒 Sign in to continue"),
            Notice::ThreadRefreshed { .. } => {}
        }
    }
}

fn ask(message: &str) -> bool {
    print!("{} [y/N] ", message);
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y" | "yes")
}
