use std::collections::{HashMap, HashSet};
use std::io::{self, Stdout};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use unicode_width::UnicodeWidthStr;

use crate::data::{CommentService, FeedService, InteractionService, SubmoltService};
use crate::moltbook::{Agent, Comment, PostListing, PostType, Role, SortOption};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(250, 179, 135);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const COLOR_ROLE_ADMIN: Color = Color::Rgb(243, 139, 168);
const COLOR_ROLE_CONTRIBUTOR: Color = Color::Rgb(137, 180, 250);
const COLOR_ROLE_OBSERVER: Color = Color::Rgb(166, 173, 200);

const COMMENT_DEPTH_COLORS: [Color; 6] = [
    Color::Rgb(250, 179, 135),
    Color::Rgb(166, 227, 161),
    Color::Rgb(203, 166, 247),
    Color::Rgb(245, 194, 231),
    Color::Rgb(137, 220, 235),
    Color::Rgb(249, 226, 175),
];

const NAV_SORTS: [SortOption; 3] = [SortOption::Hot, SortOption::New, SortOption::Top];
const SUBMOLT_LIST_LIMIT: usize = 10;
const BODY_PREVIEW_LIMIT: usize = 300;
const COMMENT_INDENT_WIDTH: usize = 2;
const UNKNOWN_AGENT: &str = "unknown agent";
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const POST_ROW_HEIGHT: usize = 3;

fn comment_depth_color(depth: usize) -> Color {
    COMMENT_DEPTH_COLORS[depth % COMMENT_DEPTH_COLORS.len()]
}

fn comment_indent(depth: i64) -> String {
    let depth = depth.max(0) as usize;
    " ".repeat(depth * COMMENT_INDENT_WIDTH)
}

/// Bucketed elapsed-time label, floor division throughout.
fn relative_time(seconds: i64) -> String {
    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h ago", seconds / 3600)
    } else {
        format!("{}d ago", seconds / 86400)
    }
}

fn time_label(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match created {
        Some(created) => relative_time((now - created).num_seconds().max(0)),
        None => String::new(),
    }
}

fn author_display(author: Option<&Agent>) -> String {
    match author {
        Some(agent) => agent
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| agent.name.clone()),
        None => UNKNOWN_AGENT.to_string(),
    }
}

/// Fixed role-to-style mapping; anything unrecognized or absent renders
/// with the observer style.
fn role_badge(role: Option<Role>) -> (&'static str, Color) {
    match role {
        Some(Role::Admin) => ("admin", COLOR_ROLE_ADMIN),
        Some(Role::Contributor) => ("contributor", COLOR_ROLE_CONTRIBUTOR),
        _ => ("observer", COLOR_ROLE_OBSERVER),
    }
}

/// Returns the body to display plus whether the full text exceeds the
/// preview limit (and therefore owns a read-more toggle).
fn display_body(content: &str, expanded: bool) -> (String, bool) {
    let over_limit = content.chars().count() > BODY_PREVIEW_LIMIT;
    if !over_limit || expanded {
        (content.to_string(), over_limit)
    } else {
        let mut preview: String = content.chars().take(BODY_PREVIEW_LIMIT).collect();
        preview.push_str("...");
        (preview, over_limit)
    }
}

fn wrap_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    wrap(text, width.max(1))
        .into_iter()
        .map(|cow| Line::from(Span::styled(cow.into_owned(), style)))
        .collect()
}

fn wrap_indented(text: &str, width: usize, indent: &str, style: Style) -> Vec<Line<'static>> {
    let body_width = width.saturating_sub(indent.len()).max(1);
    wrap(text, body_width)
        .into_iter()
        .map(|cow| {
            Line::from(vec![
                Span::raw(indent.to_string()),
                Span::styled(cow.into_owned(), style),
            ])
        })
        .collect()
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    for line in lines.iter_mut() {
        let current: usize = line
            .spans
            .iter()
            .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
            .sum();
        let target = width as usize;
        if current < target {
            let style = line
                .spans
                .last()
                .map(|span| span.style)
                .unwrap_or_default();
            line.spans
                .push(Span::styled(" ".repeat(target - current), style));
        }
    }
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pane {
    Navigation,
    Posts,
    Content,
}

impl Pane {
    fn title(&self) -> &'static str {
        match self {
            Pane::Navigation => "Moltbook",
            Pane::Posts => "Feed",
            Pane::Content => "Post",
        }
    }

    fn next(&self) -> Pane {
        match self {
            Pane::Navigation => Pane::Posts,
            Pane::Posts => Pane::Content,
            Pane::Content => Pane::Navigation,
        }
    }

    fn prev(&self) -> Pane {
        match self {
            Pane::Navigation => Pane::Content,
            Pane::Posts => Pane::Navigation,
            Pane::Content => Pane::Posts,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NavMode {
    Sorts,
    Submolts,
}

/// Feed pane state keyed by the current (sort, submolt) selection.
#[derive(Clone, PartialEq, Debug)]
enum FeedPhase {
    Loading,
    Ready,
    Empty,
    Error(String),
}

struct PendingPosts {
    request_id: u64,
    cancel_flag: Arc<AtomicBool>,
    background: bool,
}

struct PendingComments {
    request_id: u64,
    post_id: String,
    cancel_flag: Arc<AtomicBool>,
}

struct PendingSubmolts {
    request_id: u64,
}

enum AsyncResponse {
    Posts {
        request_id: u64,
        sort: SortOption,
        submolt: Option<String>,
        result: Result<PostListing>,
    },
    Comments {
        request_id: u64,
        post_id: String,
        result: Result<Vec<Comment>>,
    },
    Submolts {
        request_id: u64,
        result: Result<Vec<crate::moltbook::Submolt>>,
    },
    VoteResult {
        post_id: String,
        value: i32,
        error: Option<String>,
    },
}

pub struct Options {
    pub status_message: String,
    pub feed_service: Arc<dyn FeedService>,
    pub submolt_service: Arc<dyn SubmoltService>,
    pub comment_service: Arc<dyn CommentService>,
    pub interaction_service: Arc<dyn InteractionService>,
    pub default_sort: SortOption,
    pub page_size: u32,
    pub refresh_interval: Duration,
    pub config_path: String,
}

pub struct Model {
    status_message: String,
    sort: SortOption,
    selected_submolt: Option<String>,
    submolts: Vec<crate::moltbook::Submolt>,
    posts: Vec<crate::moltbook::Post>,
    feed_phase: FeedPhase,
    comment_threads: HashMap<String, Vec<Comment>>,
    open_threads: HashSet<String>,
    expanded_bodies: HashSet<String>,
    selected_post: usize,
    content_scroll: u16,
    focused_pane: Pane,
    nav_mode: NavMode,
    nav_index: usize,
    feed_service: Arc<dyn FeedService>,
    submolt_service: Arc<dyn SubmoltService>,
    comment_service: Arc<dyn CommentService>,
    interaction_service: Arc<dyn InteractionService>,
    page_size: u32,
    refresh_interval: Duration,
    last_refresh: Instant,
    spinner: Spinner,
    needs_redraw: bool,
    config_path: String,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
    pending_posts: Option<PendingPosts>,
    pending_comments: Option<PendingComments>,
    pending_submolts: Option<PendingSubmolts>,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        Model {
            status_message: options.status_message,
            sort: options.default_sort,
            selected_submolt: None,
            submolts: Vec::new(),
            posts: Vec::new(),
            feed_phase: FeedPhase::Loading,
            comment_threads: HashMap::new(),
            open_threads: HashSet::new(),
            expanded_bodies: HashSet::new(),
            selected_post: 0,
            content_scroll: 0,
            focused_pane: Pane::Posts,
            nav_mode: NavMode::Sorts,
            nav_index: 0,
            feed_service: options.feed_service,
            submolt_service: options.submolt_service,
            comment_service: options.comment_service,
            interaction_service: options.interaction_service,
            page_size: options.page_size,
            refresh_interval: options.refresh_interval,
            last_refresh: Instant::now(),
            spinner: Spinner::new(),
            needs_redraw: true,
            config_path: options.config_path,
            response_tx,
            response_rx,
            next_request_id: 0,
            pending_posts: None,
            pending_comments: None,
            pending_submolts: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.reload_submolts();
        self.reload_posts(false);

        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.last_refresh.elapsed() >= self.refresh_interval
                && self.pending_posts.is_none()
            {
                self.reload_posts(true);
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                }
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.pending_posts.is_some()
            || self.pending_comments.is_some()
            || self.pending_submolts.is_some()
    }

    fn current_feed_label(&self) -> String {
        match &self.selected_submolt {
            Some(name) => format!("m/{}", name),
            None => "all".to_string(),
        }
    }

    fn selected_post(&self) -> Option<&crate::moltbook::Post> {
        self.posts.get(self.selected_post)
    }

    // Every selection change supersedes any in-flight fetch: the old
    // request is flagged cancelled and its late response discarded.
    fn reload_posts(&mut self, background: bool) {
        if let Some(pending) = self.pending_posts.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
        }

        if !background {
            if let Some(pending) = self.pending_comments.take() {
                pending.cancel_flag.store(true, Ordering::SeqCst);
            }
            self.feed_phase = FeedPhase::Loading;
            self.posts.clear();
            self.selected_post = 0;
            self.content_scroll = 0;
            self.comment_threads.clear();
            self.open_threads.clear();
            self.expanded_bodies.clear();
            self.status_message = format!(
                "Loading {} ({})...",
                self.current_feed_label(),
                self.sort.label()
            );
            self.spinner.reset();
        }

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.pending_posts = Some(PendingPosts {
            request_id,
            cancel_flag: cancel_flag.clone(),
            background,
        });
        self.last_refresh = Instant::now();

        let tx = self.response_tx.clone();
        let service = self.feed_service.clone();
        let sort = self.sort;
        let submolt = self.selected_submolt.clone();
        let page_size = self.page_size;

        thread::spawn(move || {
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let result = service.load_feed(sort, submolt.as_deref(), page_size);
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(AsyncResponse::Posts {
                request_id,
                sort,
                submolt,
                result,
            });
        });
        self.mark_dirty();
    }

    fn reload_submolts(&mut self) {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending_submolts = Some(PendingSubmolts { request_id });

        let tx = self.response_tx.clone();
        let service = self.submolt_service.clone();
        thread::spawn(move || {
            let result = service.list_submolts();
            let _ = tx.send(AsyncResponse::Submolts { request_id, result });
        });
    }

    fn toggle_comments(&mut self) {
        let Some(post) = self.selected_post() else {
            return;
        };
        let post_id = post.id.clone();

        if self.open_threads.contains(&post_id) {
            self.open_threads.remove(&post_id);
            self.mark_dirty();
            return;
        }

        self.open_threads.insert(post_id.clone());
        self.mark_dirty();
        if self.comment_threads.contains_key(&post_id) {
            return;
        }
        if self
            .pending_comments
            .as_ref()
            .is_some_and(|pending| pending.post_id == post_id)
        {
            return;
        }
        self.request_comments(post_id);
    }

    fn request_comments(&mut self, post_id: String) {
        if let Some(pending) = self.pending_comments.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
        }

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.pending_comments = Some(PendingComments {
            request_id,
            post_id: post_id.clone(),
            cancel_flag: cancel_flag.clone(),
        });

        let tx = self.response_tx.clone();
        let service = self.comment_service.clone();
        thread::spawn(move || {
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let result = service.load_comments(&post_id);
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(AsyncResponse::Comments {
                request_id,
                post_id,
                result,
            });
        });
    }

    fn toggle_body(&mut self) {
        let Some(post) = self.selected_post() else {
            return;
        };
        let post_id = post.id.clone();
        if !self.expanded_bodies.remove(&post_id) {
            self.expanded_bodies.insert(post_id);
        }
        self.mark_dirty();
    }

    fn open_link(&mut self) {
        let Some(post) = self.selected_post() else {
            return;
        };
        let Some(url) = post.url.clone().filter(|url| !url.trim().is_empty()) else {
            self.status_message = "Selected post has no external link.".to_string();
            self.mark_dirty();
            return;
        };
        self.status_message = match webbrowser::open(&url) {
            Ok(()) => format!("Opened {}", url),
            Err(err) => format!("Failed to open link: {}", err),
        };
        self.mark_dirty();
    }

    fn vote_selected_post(&mut self, value: i32) {
        if !self.interaction_service.can_vote() {
            self.status_message = format!(
                "Voting requires an API key (set moltbook.api_key in {}).",
                self.config_path
            );
            self.mark_dirty();
            return;
        }
        let Some(post) = self.selected_post() else {
            self.status_message = "No posts available to vote on.".to_string();
            self.mark_dirty();
            return;
        };
        let post_id = post.id.clone();
        let title = post.title.clone();
        let action_word = if value == 1 { "Upvoting" } else { "Downvoting" };
        self.status_message = format!("{} \"{}\"...", action_word, title);
        self.mark_dirty();

        let tx = self.response_tx.clone();
        let service = self.interaction_service.clone();
        thread::spawn(move || {
            let error = service
                .vote(&post_id, value)
                .err()
                .map(|err| format!("{err:#}"));
            let _ = tx.send(AsyncResponse::VoteResult {
                post_id,
                value,
                error,
            });
        });
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Posts {
                request_id,
                sort,
                submolt,
                result,
            } => {
                let Some(pending) = &self.pending_posts else {
                    return;
                };
                if pending.cancel_flag.load(Ordering::SeqCst) || pending.request_id != request_id {
                    return;
                }
                let background = pending.background;
                self.pending_posts = None;
                if sort != self.sort || submolt != self.selected_submolt {
                    return;
                }

                match result {
                    Ok(listing) => {
                        if listing.posts.is_empty() {
                            self.posts.clear();
                            self.selected_post = 0;
                            self.feed_phase = FeedPhase::Empty;
                            self.status_message = format!(
                                "No posts yet in {} ({}).",
                                self.current_feed_label(),
                                self.sort.label()
                            );
                        } else {
                            let live: HashSet<String> = listing
                                .posts
                                .iter()
                                .map(|post| post.id.clone())
                                .collect();
                            self.comment_threads.retain(|id, _| live.contains(id));
                            self.open_threads.retain(|id| live.contains(id));
                            self.expanded_bodies.retain(|id| live.contains(id));

                            self.posts = listing.posts;
                            self.selected_post =
                                self.selected_post.min(self.posts.len().saturating_sub(1));
                            self.feed_phase = FeedPhase::Ready;
                            self.status_message = format!(
                                "Loaded {} of {} posts from {} ({}).",
                                self.posts.len(),
                                listing.total,
                                self.current_feed_label(),
                                self.sort.label()
                            );
                        }
                    }
                    Err(err) => {
                        if background && self.feed_phase == FeedPhase::Ready {
                            // Keep the feed the reader is looking at; a
                            // failed poll only surfaces in the status line.
                            self.status_message =
                                "Background refresh failed. Press r to retry.".to_string();
                        } else {
                            self.posts.clear();
                            self.selected_post = 0;
                            self.feed_phase = FeedPhase::Error(format!("{err:#}"));
                            self.status_message =
                                "Failed to load posts. Press r to retry.".to_string();
                        }
                    }
                }
                self.mark_dirty();
            }
            AsyncResponse::Comments {
                request_id,
                post_id,
                result,
            } => {
                let Some(pending) = &self.pending_comments else {
                    return;
                };
                if pending.cancel_flag.load(Ordering::SeqCst)
                    || pending.request_id != request_id
                    || pending.post_id != post_id
                {
                    return;
                }
                self.pending_comments = None;

                match result {
                    Ok(comments) => {
                        self.comment_threads.insert(post_id, comments);
                    }
                    Err(err) => {
                        // Soft-fail: the thread shows as empty and the
                        // rest of the post keeps rendering.
                        self.comment_threads.insert(post_id, Vec::new());
                        self.status_message = format!("Failed to load comments: {err:#}");
                    }
                }
                self.mark_dirty();
            }
            AsyncResponse::Submolts { request_id, result } => {
                let Some(pending) = &self.pending_submolts else {
                    return;
                };
                if pending.request_id != request_id {
                    return;
                }
                self.pending_submolts = None;

                match result {
                    Ok(submolts) => {
                        self.submolts = submolts;
                    }
                    Err(err) => {
                        // The sidebar degrades to its placeholder.
                        self.status_message = format!("Failed to load submolts: {err:#}");
                    }
                }
                self.mark_dirty();
            }
            AsyncResponse::VoteResult {
                post_id: _,
                value,
                error,
            } => {
                let action = if value == 1 { "Upvote" } else { "Downvote" };
                self.status_message = match error {
                    Some(message) => format!("{} failed: {}", action, message),
                    None => format!("{} recorded.", action),
                };
                self.mark_dirty();
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('h') | KeyCode::Left => {
                self.focused_pane = self.focused_pane.prev();
                self.mark_dirty();
            }
            KeyCode::Char('l') | KeyCode::Right => {
                self.focused_pane = self.focused_pane.next();
                self.mark_dirty();
            }
            KeyCode::Char('1') => self.set_sort(SortOption::Hot),
            KeyCode::Char('2') => self.set_sort(SortOption::New),
            KeyCode::Char('3') => self.set_sort(SortOption::Top),
            KeyCode::Char('r') => self.reload_posts(false),
            KeyCode::Char('j') | KeyCode::Down => self.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(),
            KeyCode::Enter => match self.focused_pane {
                Pane::Navigation => self.commit_navigation_selection(),
                Pane::Posts | Pane::Content => self.toggle_comments(),
            },
            KeyCode::Char('c') => self.toggle_comments(),
            KeyCode::Char('e') => self.toggle_body(),
            KeyCode::Char('o') => self.open_link(),
            KeyCode::Char('u') => self.vote_selected_post(1),
            KeyCode::Char('d') => self.vote_selected_post(-1),
            _ => {}
        }
        Ok(false)
    }

    fn set_sort(&mut self, sort: SortOption) {
        if self.sort == sort {
            return;
        }
        self.sort = sort;
        self.reload_posts(false);
    }

    fn move_down(&mut self) {
        match self.focused_pane {
            Pane::Navigation => match self.nav_mode {
                NavMode::Sorts => {
                    if self.nav_index + 1 < NAV_SORTS.len() {
                        self.nav_index += 1;
                    } else {
                        self.nav_mode = NavMode::Submolts;
                        self.nav_index = 0;
                    }
                }
                NavMode::Submolts => {
                    let entries = self.sidebar_len() + 1;
                    if self.nav_index + 1 < entries {
                        self.nav_index += 1;
                    }
                }
            },
            Pane::Posts => {
                if self.selected_post + 1 < self.posts.len() {
                    self.selected_post += 1;
                    self.content_scroll = 0;
                }
            }
            Pane::Content => {
                self.content_scroll = self.content_scroll.saturating_add(1);
            }
        }
        self.mark_dirty();
    }

    fn move_up(&mut self) {
        match self.focused_pane {
            Pane::Navigation => match self.nav_mode {
                NavMode::Sorts => {
                    self.nav_index = self.nav_index.saturating_sub(1);
                }
                NavMode::Submolts => {
                    if self.nav_index == 0 {
                        self.nav_mode = NavMode::Sorts;
                        self.nav_index = NAV_SORTS.len() - 1;
                    } else {
                        self.nav_index -= 1;
                    }
                }
            },
            Pane::Posts => {
                if self.selected_post > 0 {
                    self.selected_post -= 1;
                    self.content_scroll = 0;
                }
            }
            Pane::Content => {
                self.content_scroll = self.content_scroll.saturating_sub(1);
            }
        }
        self.mark_dirty();
    }

    fn sidebar_len(&self) -> usize {
        self.submolts.len().min(SUBMOLT_LIST_LIMIT)
    }

    fn commit_navigation_selection(&mut self) {
        match self.nav_mode {
            NavMode::Sorts => {
                if let Some(sort) = NAV_SORTS.get(self.nav_index).copied() {
                    self.set_sort(sort);
                }
            }
            NavMode::Submolts => {
                let target = if self.nav_index == 0 {
                    None
                } else {
                    self.submolts
                        .iter()
                        .take(SUBMOLT_LIST_LIMIT)
                        .nth(self.nav_index - 1)
                        .map(|submolt| submolt.name.clone())
                };
                if target != self.selected_submolt {
                    self.selected_submolt = target;
                    self.reload_posts(false);
                }
            }
        }
    }

    fn pane_block(&self, pane: Pane) -> Block<'static> {
        let focused = self.focused_pane == pane;
        Block::default()
            .title(pane.title())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused {
                COLOR_BORDER_FOCUSED
            } else {
                COLOR_BORDER_IDLE
            }))
            .style(Style::default().bg(if focused {
                COLOR_PANEL_FOCUSED_BG
            } else {
                COLOR_PANEL_BG
            }))
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(22),
                Constraint::Percentage(38),
                Constraint::Percentage(40),
            ])
            .split(layout[1]);

        self.draw_navigation(frame, main_chunks[0]);
        self.draw_posts(frame, main_chunks[1]);
        self.draw_content(frame, main_chunks[2]);

        let footer = Paragraph::new(
            "j/k move · h/l panes · 1/2/3 sort · Enter comments · e expand · u/d vote · o open link · r refresh · q quit",
        )
        .style(
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .bg(COLOR_PANEL_BG)
                .add_modifier(Modifier::ITALIC),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);
    }

    fn draw_navigation(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Navigation);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let focused = self.focused_pane == Pane::Navigation;

        let mut lines: Vec<Line<'static>> = Vec::new();
        lines.push(Line::from(Span::styled(
            "Sort",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::BOLD),
        )));
        for (idx, sort) in NAV_SORTS.iter().enumerate() {
            let is_active = self.sort == *sort;
            let is_selected =
                focused && self.nav_mode == NavMode::Sorts && self.nav_index == idx;
            let marker = if is_active { "●" } else { "○" };
            let mut style = Style::default().fg(if is_active {
                COLOR_ACCENT
            } else {
                COLOR_TEXT_SECONDARY
            });
            if is_selected {
                style = style
                    .add_modifier(Modifier::BOLD)
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .fg(COLOR_TEXT_PRIMARY);
            }
            lines.push(Line::from(Span::styled(
                format!("{} {} {}", idx + 1, marker, sort.label()),
                style,
            )));
        }

        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Submolts",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::BOLD),
        )));

        let entry_style = |selected: bool, active: bool| {
            let mut style = Style::default().fg(if selected || active {
                COLOR_TEXT_PRIMARY
            } else {
                COLOR_TEXT_SECONDARY
            });
            if selected {
                style = style.bg(COLOR_PANEL_SELECTED_BG);
            }
            if selected || active {
                style = style.add_modifier(Modifier::BOLD);
            }
            style
        };

        let all_selected =
            focused && self.nav_mode == NavMode::Submolts && self.nav_index == 0;
        lines.push(Line::from(Span::styled(
            "All".to_string(),
            entry_style(all_selected, self.selected_submolt.is_none()),
        )));

        if self.submolts.is_empty() {
            lines.push(Line::from(Span::styled(
                "No submolts yet",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )));
        } else {
            for (idx, submolt) in self
                .submolts
                .iter()
                .take(SUBMOLT_LIST_LIMIT)
                .enumerate()
            {
                let selected = focused
                    && self.nav_mode == NavMode::Submolts
                    && self.nav_index == idx + 1;
                let active = self.selected_submolt.as_deref() == Some(submolt.name.as_str());
                let label = format!(
                    "m/{} · {} subs",
                    submolt.name, submolt.subscriber_count
                );
                lines.push(Line::from(Span::styled(
                    label,
                    entry_style(selected, active),
                )));
            }
        }

        pad_lines_to_width(&mut lines, inner.width);
        let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, inner);
    }

    fn draw_posts(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Posts);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        match &self.feed_phase {
            FeedPhase::Loading => {
                let paragraph = Paragraph::new(Text::from(vec![
                    Line::default(),
                    Line::from(Span::styled(
                        format!("{} Loading feed...", self.spinner.frame()),
                        Style::default().fg(COLOR_TEXT_SECONDARY),
                    )),
                ]))
                .alignment(Alignment::Center);
                frame.render_widget(paragraph, inner);
            }
            FeedPhase::Error(message) => {
                let mut lines = vec![
                    Line::default(),
                    Line::from(Span::styled(
                        "Unable to load feed",
                        Style::default()
                            .fg(COLOR_ERROR)
                            .add_modifier(Modifier::BOLD),
                    )),
                    Line::default(),
                ];
                lines.extend(wrap_plain(
                    message,
                    inner.width.max(1) as usize,
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                ));
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    "Press r to retry.",
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )));
                let paragraph = Paragraph::new(Text::from(lines)).alignment(Alignment::Center);
                frame.render_widget(paragraph, inner);
            }
            FeedPhase::Empty => {
                let paragraph = Paragraph::new(Text::from(vec![
                    Line::default(),
                    Line::from(Span::styled(
                        "No posts yet!",
                        Style::default()
                            .fg(COLOR_TEXT_PRIMARY)
                            .add_modifier(Modifier::BOLD),
                    )),
                    Line::default(),
                    Line::from(Span::styled(
                        "Deploy some agents and watch them populate Moltbook.",
                        Style::default().fg(COLOR_TEXT_SECONDARY),
                    )),
                ]))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
                frame.render_widget(paragraph, inner);
            }
            FeedPhase::Ready => self.draw_post_rows(frame, inner),
        }
    }

    fn draw_post_rows(&self, frame: &mut Frame<'_>, inner: Rect) {
        let now = Utc::now();
        let rows = (inner.height as usize / POST_ROW_HEIGHT).max(1);
        let first = if self.selected_post >= rows {
            (self.selected_post + 1 - rows).min(self.posts.len().saturating_sub(rows))
        } else {
            0
        };

        let mut items: Vec<ListItem> = Vec::new();
        for (idx, post) in self.posts.iter().enumerate().skip(first).take(rows) {
            let selected = idx == self.selected_post;
            let background = if selected {
                COLOR_PANEL_SELECTED_BG
            } else {
                COLOR_PANEL_BG
            };
            let mut title_style = Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(background);
            if selected {
                title_style = title_style.add_modifier(Modifier::BOLD);
            }
            let marker = match post.post_type {
                PostType::Link => "🔗 ",
                _ => "",
            };
            let mut meta = format!(
                "▲ {} · m/{} · {} comments",
                post.score, post.submolt, post.comment_count
            );
            let time = time_label(post.created_at, now);
            if !time.is_empty() {
                meta.push_str(&format!(" · {}", time));
            }
            let mut lines = vec![
                Line::from(Span::styled(
                    format!("{}{}", marker, post.title),
                    title_style,
                )),
                Line::from(Span::styled(
                    meta,
                    Style::default().fg(COLOR_TEXT_SECONDARY).bg(background),
                )),
                Line::from(Span::styled(
                    String::new(),
                    Style::default().bg(background),
                )),
            ];
            pad_lines_to_width(&mut lines, inner.width);
            items.push(ListItem::new(lines));
        }

        let list = List::new(items);
        frame.render_widget(list, inner);
    }

    fn draw_content(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Content);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(post) = self.selected_post() else {
            let paragraph = Paragraph::new(Span::styled(
                "Nothing selected.",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            ));
            frame.render_widget(paragraph, inner);
            return;
        };

        let now = Utc::now();
        let width = inner.width.max(1) as usize;
        let mut lines: Vec<Line<'static>> = Vec::new();

        lines.extend(wrap_plain(
            &post.title,
            width,
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        ));

        let author = author_display(post.author.as_ref());
        let (role_label, role_color) =
            role_badge(post.author.as_ref().and_then(|agent| agent.role));
        let mut header_spans = vec![
            Span::styled(
                author,
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(format!("[{}]", role_label), Style::default().fg(role_color)),
            Span::styled(
                format!(" · m/{}", post.submolt),
                Style::default().fg(COLOR_ACCENT),
            ),
        ];
        let time = time_label(post.created_at, now);
        if !time.is_empty() {
            header_spans.push(Span::styled(
                format!(" · {}", time),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ));
        }
        lines.push(Line::from(header_spans));
        lines.push(Line::default());

        if let Some(content) = post
            .content
            .as_deref()
            .filter(|content| !content.trim().is_empty())
        {
            let expanded = self.expanded_bodies.contains(&post.id);
            let (body, over_limit) = display_body(content, expanded);
            lines.extend(wrap_plain(
                &body,
                width,
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ));
            if over_limit {
                lines.push(Line::from(Span::styled(
                    if expanded {
                        "▲ show less (e)"
                    } else {
                        "▼ read more (e)"
                    },
                    Style::default().fg(COLOR_ACCENT),
                )));
            }
            lines.push(Line::default());
        }

        if post.post_type == PostType::Link {
            // Link posts should carry a URL; tolerate its absence.
            if let Some(url) = post.url.as_deref().filter(|url| !url.trim().is_empty()) {
                lines.extend(wrap_plain(
                    &format!("🔗 {} (o to open)", url),
                    width,
                    Style::default().fg(COLOR_BORDER_FOCUSED),
                ));
                lines.push(Line::default());
            }
        }

        lines.push(Line::from(Span::styled(
            "─".repeat(width),
            Style::default().fg(COLOR_BORDER_IDLE),
        )));
        lines.extend(self.comment_section_lines(post, width, now));

        let paragraph = Paragraph::new(Text::from(lines)).scroll((self.content_scroll, 0));
        frame.render_widget(paragraph, inner);
    }

    fn comment_section_lines(
        &self,
        post: &crate::moltbook::Post,
        width: usize,
        now: DateTime<Utc>,
    ) -> Vec<Line<'static>> {
        let mut lines: Vec<Line<'static>> = Vec::new();

        if !self.open_threads.contains(&post.id) {
            lines.push(Line::from(Span::styled(
                format!("{} comments — press Enter to load", post.comment_count),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
            return lines;
        }

        let pending = self
            .pending_comments
            .as_ref()
            .is_some_and(|pending| pending.post_id == post.id);
        let Some(comments) = self.comment_threads.get(&post.id) else {
            if pending {
                lines.push(Line::from(Span::styled(
                    format!("{} Loading comments...", self.spinner.frame()),
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )));
            }
            return lines;
        };

        if comments.is_empty() {
            lines.push(Line::from(Span::styled(
                "No comments yet.",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )));
            return lines;
        }

        lines.push(Line::from(Span::styled(
            format!("Comments ({})", comments.len()),
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::default());

        for comment in comments {
            let depth = comment.depth.max(0) as usize;
            let indent = comment_indent(comment.depth);
            let color = comment_depth_color(depth);
            let author = author_display(comment.author.as_ref());
            let mut header = format!("{} · {} pts", author, comment.score);
            let time = time_label(comment.created_at, now);
            if !time.is_empty() {
                header.push_str(&format!(" · {}", time));
            }
            lines.push(Line::from(vec![
                Span::raw(indent.clone()),
                Span::styled(header, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            ]));
            lines.extend(wrap_indented(
                &comment.content,
                width,
                &indent,
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ));
            lines.push(Line::default());
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        MockCommentService, MockFeedService, MockInteractionService, MockSubmoltService,
    };
    use crate::moltbook::{Post, PostType, Status, Submolt};

    fn test_post(id: &str) -> Post {
        Post {
            id: id.into(),
            author_id: "a1".into(),
            author: None,
            submolt_id: "s1".into(),
            submolt: "agents".into(),
            title: format!("Post {id}"),
            content: Some("hello".into()),
            url: None,
            post_type: PostType::Text,
            score: 1,
            upvotes: 1,
            downvotes: 0,
            comment_count: 0,
            status: Status::Published,
            created_at: None,
            updated_at: None,
        }
    }

    fn test_listing(ids: &[&str]) -> PostListing {
        PostListing {
            posts: ids.iter().map(|id| test_post(id)).collect(),
            total: ids.len() as u64,
            page: 1,
            limit: 25,
        }
    }

    fn test_model() -> Model {
        Model::new(Options {
            status_message: String::new(),
            feed_service: Arc::new(MockFeedService),
            submolt_service: Arc::new(MockSubmoltService),
            comment_service: Arc::new(MockCommentService),
            interaction_service: Arc::new(MockInteractionService),
            default_sort: SortOption::Hot,
            page_size: 25,
            refresh_interval: Duration::from_secs(30),
            config_path: "~/.config/molt-tui/config.yaml".into(),
        })
    }

    fn pending_posts(request_id: u64, background: bool) -> PendingPosts {
        PendingPosts {
            request_id,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            background,
        }
    }

    #[test]
    fn relative_time_bucket_boundaries() {
        assert_eq!(relative_time(0), "just now");
        assert_eq!(relative_time(59), "just now");
        assert_eq!(relative_time(60), "1m ago");
        assert_eq!(relative_time(3599), "59m ago");
        assert_eq!(relative_time(3600), "1h ago");
        assert_eq!(relative_time(86399), "23h ago");
        assert_eq!(relative_time(86400), "1d ago");
        assert_eq!(relative_time(3 * 86400 + 7), "3d ago");
    }

    #[test]
    fn display_body_truncates_past_limit() {
        let short = "a".repeat(BODY_PREVIEW_LIMIT);
        assert_eq!(display_body(&short, false), (short.clone(), false));

        let long = "b".repeat(BODY_PREVIEW_LIMIT + 1);
        let (preview, over) = display_body(&long, false);
        assert!(over);
        assert_eq!(preview.chars().count(), BODY_PREVIEW_LIMIT + 3);
        assert!(preview.ends_with("..."));

        // Expanding shows the full body; collapsing again restores the
        // exact truncated form.
        let (full, _) = display_body(&long, true);
        assert_eq!(full, long);
        assert_eq!(display_body(&long, false).0, preview);
    }

    #[test]
    fn author_display_falls_back() {
        let mut agent = Agent {
            id: "a1".into(),
            name: "crab-7".into(),
            display_name: Some("The Crab".into()),
            description: None,
            avatar_url: None,
            role: None,
            karma: 0,
            created_at: None,
        };
        assert_eq!(author_display(Some(&agent)), "The Crab");
        agent.display_name = Some("  ".into());
        assert_eq!(author_display(Some(&agent)), "crab-7");
        agent.display_name = None;
        assert_eq!(author_display(Some(&agent)), "crab-7");
        assert_eq!(author_display(None), UNKNOWN_AGENT);
    }

    #[test]
    fn role_badge_defaults_to_observer() {
        assert_eq!(role_badge(Some(Role::Admin)).0, "admin");
        assert_eq!(role_badge(Some(Role::Contributor)).0, "contributor");
        assert_eq!(role_badge(Some(Role::Observer)).0, "observer");
        assert_eq!(role_badge(Some(Role::Unknown)).0, "observer");
        assert_eq!(role_badge(None).0, "observer");
    }

    #[test]
    fn comment_indent_scales_with_depth() {
        assert_eq!(comment_indent(0), "");
        assert_eq!(comment_indent(1), " ".repeat(COMMENT_INDENT_WIDTH));
        assert_eq!(comment_indent(4), " ".repeat(4 * COMMENT_INDENT_WIDTH));
        assert_eq!(comment_indent(-2), "");
    }

    #[test]
    fn feed_response_transitions_phases() {
        let mut model = test_model();
        model.pending_posts = Some(pending_posts(7, false));
        model.handle_async_response(AsyncResponse::Posts {
            request_id: 7,
            sort: SortOption::Hot,
            submolt: None,
            result: Ok(test_listing(&["p1", "p2"])),
        });
        assert_eq!(model.feed_phase, FeedPhase::Ready);
        assert_eq!(model.posts.len(), 2);
        assert!(model.pending_posts.is_none());

        model.pending_posts = Some(pending_posts(8, false));
        model.handle_async_response(AsyncResponse::Posts {
            request_id: 8,
            sort: SortOption::Hot,
            submolt: None,
            result: Ok(test_listing(&[])),
        });
        assert_eq!(model.feed_phase, FeedPhase::Empty);
        assert!(model.posts.is_empty());

        model.pending_posts = Some(pending_posts(9, false));
        model.handle_async_response(AsyncResponse::Posts {
            request_id: 9,
            sort: SortOption::Hot,
            submolt: None,
            result: Err(anyhow::anyhow!("boom")),
        });
        assert!(matches!(model.feed_phase, FeedPhase::Error(_)));
    }

    #[test]
    fn stale_feed_response_is_discarded() {
        let mut model = test_model();
        model.feed_phase = FeedPhase::Loading;
        model.pending_posts = Some(pending_posts(5, false));

        // Older request id: superseded by a newer fetch.
        model.handle_async_response(AsyncResponse::Posts {
            request_id: 3,
            sort: SortOption::Hot,
            submolt: None,
            result: Ok(test_listing(&["stale"])),
        });
        assert_eq!(model.feed_phase, FeedPhase::Loading);
        assert!(model.posts.is_empty());
        assert!(model.pending_posts.is_some());
    }

    #[test]
    fn cancelled_feed_response_is_discarded() {
        let mut model = test_model();
        model.feed_phase = FeedPhase::Loading;
        let pending = pending_posts(5, false);
        pending.cancel_flag.store(true, Ordering::SeqCst);
        model.pending_posts = Some(pending);

        model.handle_async_response(AsyncResponse::Posts {
            request_id: 5,
            sort: SortOption::Hot,
            submolt: None,
            result: Ok(test_listing(&["stale"])),
        });
        assert_eq!(model.feed_phase, FeedPhase::Loading);
        assert!(model.posts.is_empty());
    }

    #[test]
    fn response_for_moved_selection_is_discarded() {
        let mut model = test_model();
        model.feed_phase = FeedPhase::Loading;
        model.sort = SortOption::Top;
        model.pending_posts = Some(pending_posts(5, false));

        // The request id matches but the view has moved to sort=top since
        // this sort=new fetch went out.
        model.handle_async_response(AsyncResponse::Posts {
            request_id: 5,
            sort: SortOption::New,
            submolt: None,
            result: Ok(test_listing(&["stale"])),
        });
        assert_eq!(model.feed_phase, FeedPhase::Loading);
        assert!(model.posts.is_empty());
    }

    #[test]
    fn response_without_pending_request_is_dropped() {
        let mut model = test_model();
        model.handle_async_response(AsyncResponse::Posts {
            request_id: 1,
            sort: SortOption::Hot,
            submolt: None,
            result: Ok(test_listing(&["late"])),
        });
        assert!(model.posts.is_empty());
        assert_eq!(model.feed_phase, FeedPhase::Loading);
    }

    #[test]
    fn expanding_thread_twice_fetches_once() {
        let mut model = test_model();
        model.posts = vec![test_post("p1")];
        model.feed_phase = FeedPhase::Ready;

        model.toggle_comments();
        assert!(model.open_threads.contains("p1"));
        let (request_id, post_id) = {
            let pending = model.pending_comments.as_ref().expect("fetch scheduled");
            (pending.request_id, pending.post_id.clone())
        };

        model.handle_async_response(AsyncResponse::Comments {
            request_id,
            post_id,
            result: Ok(vec![]),
        });
        assert!(model.pending_comments.is_none());
        assert!(model.comment_threads.contains_key("p1"));

        // Collapse and re-expand: the cached thread is reused.
        model.toggle_comments();
        assert!(!model.open_threads.contains("p1"));
        model.toggle_comments();
        assert!(model.open_threads.contains("p1"));
        assert!(model.pending_comments.is_none());
    }

    #[test]
    fn comment_failure_soft_fails_to_empty_thread() {
        let mut model = test_model();
        model.posts = vec![test_post("p1")];
        model.feed_phase = FeedPhase::Ready;

        model.toggle_comments();
        let (request_id, post_id) = {
            let pending = model.pending_comments.as_ref().expect("fetch scheduled");
            (pending.request_id, pending.post_id.clone())
        };
        model.handle_async_response(AsyncResponse::Comments {
            request_id,
            post_id,
            result: Err(anyhow::anyhow!("502 bad gateway")),
        });
        assert_eq!(model.comment_threads.get("p1").map(Vec::len), Some(0));
        assert!(model.status_message.contains("Failed to load comments"));
    }

    #[test]
    fn stale_comment_response_is_discarded() {
        let mut model = test_model();
        model.posts = vec![test_post("p1")];
        model.feed_phase = FeedPhase::Ready;
        model.toggle_comments();
        let request_id = model
            .pending_comments
            .as_ref()
            .map(|pending| pending.request_id)
            .unwrap();

        model.handle_async_response(AsyncResponse::Comments {
            request_id: request_id.wrapping_add(10),
            post_id: "p1".into(),
            result: Ok(vec![]),
        });
        assert!(model.pending_comments.is_some());
        assert!(!model.comment_threads.contains_key("p1"));
    }

    #[test]
    fn background_refresh_prunes_state_for_dropped_posts() {
        let mut model = test_model();
        model.posts = vec![test_post("p1"), test_post("p2")];
        model.feed_phase = FeedPhase::Ready;
        model.open_threads.insert("p1".into());
        model.comment_threads.insert("p1".into(), vec![]);
        model.expanded_bodies.insert("p2".into());

        model.pending_posts = Some(pending_posts(11, true));
        model.handle_async_response(AsyncResponse::Posts {
            request_id: 11,
            sort: SortOption::Hot,
            submolt: None,
            result: Ok(test_listing(&["p2", "p3"])),
        });

        assert!(!model.open_threads.contains("p1"));
        assert!(!model.comment_threads.contains_key("p1"));
        assert!(model.expanded_bodies.contains("p2"));
    }

    #[test]
    fn submolt_failure_leaves_sidebar_empty() {
        let mut model = test_model();
        model.pending_submolts = Some(PendingSubmolts { request_id: 2 });
        model.handle_async_response(AsyncResponse::Submolts {
            request_id: 2,
            result: Err(anyhow::anyhow!("offline")),
        });
        assert!(model.submolts.is_empty());
        assert!(model.status_message.contains("Failed to load submolts"));
    }

    #[test]
    fn navigation_commit_changes_selection_and_resets_feed() {
        let mut model = test_model();
        model.submolts = vec![Submolt {
            id: "agents".into(),
            name: "agents".into(),
            display_name: None,
            description: None,
            subscriber_count: 3,
            post_count: 9,
            created_at: None,
        }];
        model.posts = vec![test_post("p1")];
        model.feed_phase = FeedPhase::Ready;

        model.focused_pane = Pane::Navigation;
        model.nav_mode = NavMode::Submolts;
        model.nav_index = 1;
        model.commit_navigation_selection();

        assert_eq!(model.selected_submolt.as_deref(), Some("agents"));
        assert_eq!(model.feed_phase, FeedPhase::Loading);
        assert!(model.posts.is_empty());
        assert!(model.pending_posts.is_some());
    }
}
