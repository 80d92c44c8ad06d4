use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config;
use crate::data::{self, CommentService, FeedService, InteractionService, SubmoltService};
use crate::moltbook;
use crate::ui;

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());

    let feed_service: Arc<dyn FeedService>;
    let submolt_service: Arc<dyn SubmoltService>;
    let comment_service: Arc<dyn CommentService>;
    let interaction_service: Arc<dyn InteractionService>;
    let status: String;

    let api_key = if cfg.moltbook.api_key.trim().is_empty() {
        None
    } else {
        Some(cfg.moltbook.api_key.clone())
    };

    match moltbook::Client::new(moltbook::ClientConfig {
        user_agent: cfg.moltbook.user_agent.clone(),
        base_url: Some(cfg.moltbook.base_url.clone()),
        api_key,
        http_client: None,
    }) {
        Ok(client) => {
            let client = Arc::new(client);
            feed_service = Arc::new(data::MoltbookFeedService::new(client.clone()));
            submolt_service = Arc::new(data::MoltbookSubmoltService::new(client.clone()));
            comment_service = Arc::new(data::MoltbookCommentService::new(client.clone()));
            interaction_service = Arc::new(data::MoltbookInteractionService::new(client));
            status =
                "Browsing Moltbook. Press j/k to navigate, Enter to open comments, q to quit."
                    .to_string();
        }
        Err(err) => {
            feed_service = Arc::new(data::MockFeedService);
            submolt_service = Arc::new(data::MockSubmoltService);
            comment_service = Arc::new(data::MockCommentService);
            interaction_service = Arc::new(data::MockInteractionService);
            status = format!("Moltbook client unavailable ({err}). Showing sample content.");
        }
    }

    let options = ui::Options {
        status_message: status,
        feed_service,
        submolt_service,
        comment_service,
        interaction_service,
        default_sort: data::sort_option_from_key(&cfg.feed.default_sort),
        page_size: cfg.feed.page_size,
        refresh_interval: cfg.feed.refresh_interval,
        config_path: display_path,
    };

    let mut model = ui::Model::new(options);
    model.run()
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/molt-tui/config.yaml".to_string()
    }
}
