use anyhow::{Context, Result};
use std::sync::Arc;

use crate::moltbook::{self, Comment, ListingQuery, PostListing, SortOption, Submolt};

pub trait FeedService: Send + Sync {
    fn load_feed(
        &self,
        sort: SortOption,
        submolt: Option<&str>,
        page_size: u32,
    ) -> Result<PostListing>;
}

pub trait SubmoltService: Send + Sync {
    fn list_submolts(&self) -> Result<Vec<Submolt>>;
}

pub trait CommentService: Send + Sync {
    fn load_comments(&self, post_id: &str) -> Result<Vec<Comment>>;
}

pub trait InteractionService: Send + Sync {
    fn vote(&self, target_id: &str, value: i32) -> Result<()>;
    fn can_vote(&self) -> bool;
}

pub struct MoltbookFeedService {
    client: Arc<moltbook::Client>,
}

impl MoltbookFeedService {
    pub fn new(client: Arc<moltbook::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for MoltbookFeedService {
    fn load_feed(
        &self,
        sort: SortOption,
        submolt: Option<&str>,
        page_size: u32,
    ) -> Result<PostListing> {
        let query = ListingQuery {
            sort: Some(sort),
            submolt: submolt.map(|name| name.to_string()),
            limit: Some(page_size),
            page: None,
        };
        self.client.posts(query).context("fetch post feed")
    }
}

pub struct MoltbookSubmoltService {
    client: Arc<moltbook::Client>,
}

impl MoltbookSubmoltService {
    pub fn new(client: Arc<moltbook::Client>) -> Self {
        Self { client }
    }
}

impl SubmoltService for MoltbookSubmoltService {
    fn list_submolts(&self) -> Result<Vec<Submolt>> {
        self.client.submolts().context("fetch submolt listing")
    }
}

pub struct MoltbookCommentService {
    client: Arc<moltbook::Client>,
}

impl MoltbookCommentService {
    pub fn new(client: Arc<moltbook::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for MoltbookCommentService {
    fn load_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        self.client.comments(post_id).context("fetch comments")
    }
}

pub struct MoltbookInteractionService {
    client: Arc<moltbook::Client>,
}

impl MoltbookInteractionService {
    pub fn new(client: Arc<moltbook::Client>) -> Self {
        Self { client }
    }
}

impl InteractionService for MoltbookInteractionService {
    fn vote(&self, target_id: &str, value: i32) -> Result<()> {
        self.client.vote(target_id, value)
    }

    fn can_vote(&self) -> bool {
        self.client.has_api_key()
    }
}

#[derive(Default)]
pub struct MockFeedService;

impl FeedService for MockFeedService {
    fn load_feed(
        &self,
        _sort: SortOption,
        submolt: Option<&str>,
        page_size: u32,
    ) -> Result<PostListing> {
        let title = match submolt {
            Some(name) => format!("Sample posts for m/{}", name),
            None => "Welcome to Moltbook".to_string(),
        };
        Ok(mock_listing(&title, page_size))
    }
}

#[derive(Default)]
pub struct MockSubmoltService;

impl SubmoltService for MockSubmoltService {
    fn list_submolts(&self) -> Result<Vec<Submolt>> {
        Ok(vec![
            Submolt {
                id: "general".into(),
                name: "general".into(),
                display_name: Some("General".into()),
                description: None,
                subscriber_count: 0,
                post_count: 0,
                created_at: None,
            },
            Submolt {
                id: "agents".into(),
                name: "agents".into(),
                display_name: Some("Agent Talk".into()),
                description: None,
                subscriber_count: 0,
                post_count: 0,
                created_at: None,
            },
        ])
    }
}

#[derive(Default)]
pub struct MockCommentService;

impl CommentService for MockCommentService {
    fn load_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        Ok(vec![Comment {
            id: "mock".into(),
            post_id: post_id.into(),
            author_id: String::new(),
            author: None,
            parent_id: None,
            content: "Comments are unavailable in this mock response.".into(),
            score: 1,
            upvotes: 1,
            downvotes: 0,
            depth: 0,
            status: moltbook::Status::Published,
            created_at: None,
            updated_at: None,
        }])
    }
}

#[derive(Default)]
pub struct MockInteractionService;

impl InteractionService for MockInteractionService {
    fn vote(&self, _target_id: &str, _value: i32) -> Result<()> {
        Ok(())
    }

    fn can_vote(&self) -> bool {
        false
    }
}

fn mock_listing(title: &str, page_size: u32) -> PostListing {
    let posts = vec![moltbook::Post {
        id: "welcome".into(),
        author_id: String::new(),
        author: None,
        submolt_id: "general".into(),
        submolt: "general".into(),
        title: title.into(),
        content: Some("Sample content provided for offline browsing.".into()),
        url: None,
        post_type: moltbook::PostType::Text,
        score: 1,
        upvotes: 1,
        downvotes: 0,
        comment_count: 1,
        status: moltbook::Status::Published,
        created_at: None,
        updated_at: None,
    }];
    let total = posts.len() as u64;
    PostListing {
        posts,
        total,
        page: moltbook::DEFAULT_PAGE,
        limit: page_size,
    }
}

pub fn sort_option_from_key(key: &str) -> SortOption {
    match key {
        "new" => SortOption::New,
        "top" => SortOption::Top,
        _ => SortOption::Hot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_keys_map_to_options() {
        assert_eq!(sort_option_from_key("new"), SortOption::New);
        assert_eq!(sort_option_from_key("top"), SortOption::Top);
        assert_eq!(sort_option_from_key("hot"), SortOption::Hot);
        assert_eq!(sort_option_from_key("weird"), SortOption::Hot);
    }

    #[test]
    fn mock_feed_names_the_submolt() {
        let listing = MockFeedService
            .load_feed(SortOption::Hot, Some("agents"), 10)
            .unwrap();
        assert_eq!(listing.posts[0].title, "Sample posts for m/agents");
        assert_eq!(listing.limit, 10);
    }
}
