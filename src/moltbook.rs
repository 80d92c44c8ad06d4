use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.moltbook.com/api/v1/";
pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const DEFAULT_PAGE: u64 = 1;
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Failures of the HTTP exchange itself. Malformed response bodies are not
/// errors; they normalize to empty results instead.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("moltbook: request failed: {0}")]
    Transport(String),
    #[error("moltbook: api key required")]
    MissingCredential,
    #[error("moltbook: unauthorized")]
    Unauthorized,
    #[error("moltbook: forbidden")]
    Forbidden,
    #[error("moltbook: rate limited: {0}")]
    RateLimited(String),
    #[error("moltbook: api error {status}: {message}")]
    Status { status: u16, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub http_client: Option<HttpClient>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOption {
    #[default]
    Hot,
    New,
    Top,
}

impl SortOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Hot => "hot",
            SortOption::New => "new",
            SortOption::Top => "top",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortOption::Hot => "Hot",
            SortOption::New => "New",
            SortOption::Top => "Top",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Observer,
    Contributor,
    Admin,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Text,
    Link,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Published,
    Pending,
    Rejected,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub karma: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub author: Option<Agent>,
    #[serde(default)]
    pub submolt_id: String,
    #[serde(default)]
    pub submolt: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub post_type: PostType,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submolt {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subscriber_count: i64,
    #[serde(default)]
    pub post_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub author: Option<Agent>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub depth: i64,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Normalized `/posts` listing. The server has shipped at least two envelope
/// shapes for this endpoint; callers only ever see this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListing {
    pub posts: Vec<Post>,
    pub total: u64,
    pub page: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    pub sort: Option<SortOption>,
    pub submolt: Option<String>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

impl ListingQuery {
    fn as_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(sort) = self.sort {
            params.push(("sort".into(), sort.as_str().to_string()));
        }
        if let Some(submolt) = &self.submolt {
            params.push(("submolt".into(), submolt.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".into(), limit.to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page".into(), page.to_string()));
        }
        params
    }
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    api_key: Option<String>,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("moltbook client user agent required");
        }
        let mut base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            base_url,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn posts(&self, query: ListingQuery) -> Result<PostListing> {
        let params = query.as_params();
        let resp = self.request(Method::GET, "posts", &params, None)?;
        let body = resp.json::<Value>().unwrap_or(Value::Null);
        Ok(normalize_post_listing(body, &query))
    }

    pub fn submolts(&self) -> Result<Vec<Submolt>> {
        let resp = self.request(Method::GET, "submolts", &[], None)?;
        let body = resp.json::<Value>().unwrap_or(Value::Null);
        Ok(normalize_submolts(body))
    }

    /// Comments arrive pre-sorted by the server in depth-first display
    /// order; they are returned as-is.
    pub fn comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        let path = format!("posts/{}/comments", post_id);
        let resp = self.request(Method::GET, &path, &[], None)?;
        let body = resp.json::<Value>().unwrap_or(Value::Null);
        Ok(normalize_comments(body))
    }

    pub fn vote(&self, target_id: &str, value: i32) -> Result<()> {
        if value != 1 && value != -1 {
            bail!("moltbook: vote value must be 1 or -1");
        }
        if self.api_key.is_none() {
            return Err(ApiError::MissingCredential.into());
        }
        let payload = serde_json::json!({
            "target_id": target_id,
            "target_type": "post",
            "value": value,
        });
        self.request(Method::POST, "votes", &[], Some(payload))?;
        Ok(())
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Response> {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }

        let mut req = self.http.request(method, url);
        req = req.header(USER_AGENT, self.user_agent.clone());
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key.clone());
        }
        if let Some(json) = body {
            req = req.header(CONTENT_TYPE, "application/json");
            req = req.json(&json);
        }

        let resp = req
            .send()
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let message = resp.text().unwrap_or_default();
            Err(match status.as_u16() {
                401 => ApiError::Unauthorized,
                403 => ApiError::Forbidden,
                429 => ApiError::RateLimited(message),
                code => ApiError::Status {
                    status: code,
                    message,
                },
            }
            .into())
        }
    }
}

/// Accepts both listing envelopes the server has been seen to produce:
/// a flat `{posts, total, page, limit}` object and an enveloped
/// `{data, pagination: {count, offset, limit}}` one. Anything else
/// degrades to an empty listing.
fn normalize_post_listing(body: Value, query: &ListingQuery) -> PostListing {
    let posts: Vec<Post> = body
        .get("posts")
        .or_else(|| body.get("data"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    let pagination = body.get("pagination");
    let total = field_u64(&body, "total")
        .or_else(|| pagination.and_then(|p| field_u64(p, "count")))
        .unwrap_or(posts.len() as u64);
    let page = field_u64(&body, "page")
        .or_else(|| pagination.and_then(|p| field_u64(p, "offset")))
        .or(query.page.map(u64::from))
        .unwrap_or(DEFAULT_PAGE);
    let limit = field_u64(&body, "limit")
        .or_else(|| pagination.and_then(|p| field_u64(p, "limit")))
        .map(|value| value.min(u32::MAX as u64) as u32)
        .or(query.limit)
        .unwrap_or(DEFAULT_PAGE_SIZE);

    PostListing {
        posts,
        total,
        page,
        limit,
    }
}

fn normalize_submolts(body: Value) -> Vec<Submolt> {
    let items = match &body {
        Value::Array(items) => Some(items),
        Value::Object(_) => body.get("submolts").and_then(Value::as_array),
        _ => None,
    };
    items
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_comments(body: Value) -> Vec<Comment> {
    let items = match &body {
        Value::Array(items) => Some(items),
        Value::Object(_) => body.get("comments").and_then(Value::as_array),
        _ => None,
    };
    items
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn field_u64(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post_value(id: &str) -> Value {
        json!({
            "id": id,
            "author_id": "a1",
            "submolt_id": "s1",
            "submolt": "agents",
            "title": format!("Post {id}"),
            "post_type": "text",
            "score": 3,
            "comment_count": 1,
            "status": "published",
        })
    }

    #[test]
    fn normalizes_flat_envelope() {
        let body = json!({
            "posts": [post_value("p1"), post_value("p2")],
            "total": 40,
            "page": 2,
        });
        let query = ListingQuery {
            limit: Some(10),
            ..Default::default()
        };
        let listing = normalize_post_listing(body, &query);
        assert_eq!(listing.posts.len(), 2);
        assert_eq!(listing.total, 40);
        assert_eq!(listing.page, 2);
        // Server omitted limit, so the caller's wins.
        assert_eq!(listing.limit, 10);
    }

    #[test]
    fn normalizes_paginated_envelope() {
        let body = json!({
            "data": [post_value("p1")],
            "pagination": {"count": 99, "offset": 3, "limit": 50},
        });
        let listing = normalize_post_listing(body, &ListingQuery::default());
        assert_eq!(listing.posts.len(), 1);
        assert_eq!(listing.total, 99);
        assert_eq!(listing.page, 3);
        assert_eq!(listing.limit, 50);
    }

    #[test]
    fn missing_posts_array_yields_empty_listing() {
        for body in [
            Value::Null,
            json!({"posts": null}),
            json!({"posts": "not-an-array"}),
            json!({"unexpected": true}),
        ] {
            let listing = normalize_post_listing(body, &ListingQuery::default());
            assert!(listing.posts.is_empty());
            assert_eq!(listing.page, DEFAULT_PAGE);
            assert_eq!(listing.limit, DEFAULT_PAGE_SIZE);
        }
    }

    #[test]
    fn malformed_elements_are_skipped() {
        let body = json!({
            "posts": [post_value("p1"), {"title": "missing id"}, 42],
        });
        let listing = normalize_post_listing(body, &ListingQuery::default());
        assert_eq!(listing.posts.len(), 1);
        assert_eq!(listing.posts[0].id, "p1");
    }

    #[test]
    fn submolts_accept_bare_and_enveloped_arrays() {
        let submolt = json!({"id": "s1", "name": "agents", "subscriber_count": 7});
        let bare = normalize_submolts(json!([submolt]));
        assert_eq!(bare.len(), 1);
        let wrapped = normalize_submolts(json!({"submolts": [submolt]}));
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].subscriber_count, 7);
        assert!(normalize_submolts(json!({"submolts": 12})).is_empty());
        assert!(normalize_submolts(Value::Null).is_empty());
    }

    #[test]
    fn comments_keep_server_order() {
        let body = json!([
            {"id": "c1", "post_id": "p1", "content": "root", "depth": 0},
            {"id": "c2", "post_id": "p1", "content": "child", "depth": 1, "parent_id": "c1"},
            {"id": "c3", "post_id": "p1", "content": "second root", "depth": 0},
        ]);
        let comments = normalize_comments(body);
        let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
        assert_eq!(comments[1].depth, 1);
        assert_eq!(comments[1].parent_id.as_deref(), Some("c1"));
    }

    #[test]
    fn unknown_role_deserializes_to_catch_all() {
        let agent: Agent = serde_json::from_value(json!({
            "id": "a1",
            "name": "crab-9",
            "role": "superuser",
        }))
        .unwrap();
        assert_eq!(agent.role, Some(Role::Unknown));

        let no_role: Agent =
            serde_json::from_value(json!({"id": "a2", "name": "crab-10"})).unwrap();
        assert_eq!(no_role.role, None);
    }

    #[test]
    fn listing_query_params() {
        let query = ListingQuery {
            sort: Some(SortOption::Top),
            submolt: Some("agents".into()),
            limit: Some(25),
            page: None,
        };
        let params = query.as_params();
        assert_eq!(
            params,
            vec![
                ("sort".to_string(), "top".to_string()),
                ("submolt".to_string(), "agents".to_string()),
                ("limit".to_string(), "25".to_string()),
            ]
        );
    }

    #[test]
    fn vote_rejects_out_of_range_values() {
        let client = Client::new(ClientConfig {
            user_agent: "molt-tui/test".into(),
            api_key: Some("key".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(client.vote("p1", 0).is_err());
        assert!(client.vote("p1", 2).is_err());
    }

    #[test]
    fn vote_requires_credential() {
        let client = Client::new(ClientConfig {
            user_agent: "molt-tui/test".into(),
            ..Default::default()
        })
        .unwrap();
        let err = client.vote("p1", 1).unwrap_err();
        assert!(err.to_string().contains("api key"));
    }
}
