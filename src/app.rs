use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::{ApiClient, Stats};
use crate::config::Config;

/// First transcript entry, seeded at startup and retained by clear-chat.
pub const WELCOME_MESSAGE: &str =
    "Welcome to RAG Chat! Ask a question about the indexed documents.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    Error,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub ordinal: usize,
}

/// Status indicator shown at the right edge of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Ready,
    Loading,
    Error,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Transcript state
    pub messages: Vec<ChatMessage>,
    pub message_count: usize,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Request state (at most one query in flight)
    pub loading: bool,
    pub query_task: Option<JoinHandle<anyhow::Result<String>>>,

    // Query options, read at send time
    pub use_rerank: bool,
    pub use_memory: bool,

    // Header strip
    pub stats: Option<Stats>,
    pub status_level: StatusLevel,
    pub status_text: String,

    // Clear-chat confirmation overlay
    pub confirm_clear: bool,

    // Chat scroll state
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat area, set during render
    pub chat_width: u16,  // inner width of the chat area, for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub session_id: String,
    pub client: ApiClient,
}

impl App {
    pub fn new(config: &Config, client: ApiClient) -> Self {
        let welcome = ChatMessage {
            role: ChatRole::Assistant,
            content: WELCOME_MESSAGE.to_string(),
            ordinal: 0,
        };

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            messages: vec![welcome],
            message_count: 0,

            input: String::new(),
            cursor: 0,

            loading: false,
            query_task: None,

            use_rerank: config.use_rerank,
            use_memory: config.use_memory,

            stats: None,
            status_level: StatusLevel::Ready,
            status_text: "Ready".to_string(),

            confirm_clear: false,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            session_id: format!("tui-user-{}", Uuid::new_v4()),
            client,
        }
    }

    pub fn set_status(&mut self, level: StatusLevel, text: &str) {
        self.status_level = level;
        self.status_text = text.to_string();
    }

    /// Append a message to the transcript. Ordinals count every message added
    /// after the welcome one and reset to zero on clear.
    pub fn push_message(&mut self, role: ChatRole, content: String) {
        self.message_count += 1;
        self.messages.push(ChatMessage {
            role,
            content,
            ordinal: self.message_count,
        });
        self.scroll_chat_to_bottom();
    }

    /// Start a query for the current input. A no-op while a query is in
    /// flight or when the trimmed input is empty.
    pub fn submit_query(&mut self) {
        if self.loading {
            return;
        }

        let question = self.input.trim().to_string();
        if question.is_empty() {
            return;
        }

        self.push_message(ChatRole::User, question.clone());

        self.input.clear();
        self.cursor = 0;
        self.loading = true;
        self.set_status(StatusLevel::Loading, "Thinking...");

        // Options are captured here; flipping a toggle mid-flight affects
        // only the next query.
        let client = self.client.clone();
        let session_id = if self.use_memory {
            Some(self.session_id.clone())
        } else {
            None
        };
        let use_rerank = self.use_rerank;

        self.query_task = Some(tokio::spawn(async move {
            client
                .query(&question, session_id.as_deref(), use_rerank)
                .await
        }));
    }

    /// Reap the in-flight query task once it finishes. Called from the event
    /// loop on every iteration.
    pub async fn poll_query_task(&mut self) {
        let finished = self
            .query_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.query_task.take() {
            let result = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow::anyhow!("query task panicked: {join_err}")),
            };
            self.finish_query(result);
        }
    }

    /// Close out the current query: exactly one assistant-or-error message is
    /// appended, the busy flag is cleared, and the input regains focus.
    pub fn finish_query(&mut self, result: anyhow::Result<String>) {
        self.loading = false;
        self.query_task = None;
        self.animation_frame = 0;

        match result {
            Ok(answer) => {
                self.push_message(ChatRole::Assistant, answer);
                self.set_status(StatusLevel::Ready, "Ready");
            }
            Err(err) => {
                tracing::error!("query failed: {err:#}");
                self.push_message(ChatRole::Error, format!("Failed to get answer: {err}"));
                self.set_status(StatusLevel::Error, "Error occurred");
            }
        }

        self.input_mode = InputMode::Editing;
    }

    pub fn request_clear(&mut self) {
        self.confirm_clear = true;
    }

    /// Remove every message except the welcome one and reset the counter.
    /// When memory is on, also ask the server to drop this session's history;
    /// that call is best-effort and its failure is only logged.
    pub fn clear_conversation(&mut self) {
        self.confirm_clear = false;
        self.messages.truncate(1);
        self.message_count = 0;
        self.chat_scroll = 0;

        if self.use_memory {
            let client = self.client.clone();
            let session_id = self.session_id.clone();
            tokio::spawn(async move {
                match client.clear_history(&session_id).await {
                    Ok(()) => tracing::info!("server history cleared"),
                    Err(err) => tracing::warn!("failed to clear server history: {err}"),
                }
            });
        }

        self.set_status(StatusLevel::Ready, "Chat cleared");
        self.input_mode = InputMode::Editing;
    }

    /// Populate the header strip: index stats and server health. An
    /// unreachable server also drops a connectivity note into the transcript.
    pub async fn refresh_status(&mut self) {
        match self.client.stats().await {
            Ok(stats) => self.stats = Some(stats),
            Err(err) => {
                tracing::warn!("failed to load stats: {err}");
                self.stats = None;
            }
        }

        match self.client.health().await {
            Ok(true) => self.set_status(StatusLevel::Ready, "Ready"),
            Ok(false) => self.set_status(StatusLevel::Error, "API is not healthy"),
            Err(err) => {
                tracing::warn!("health check failed: {err}");
                self.set_status(StatusLevel::Error, "Cannot connect to API");
                self.push_message(
                    ChatRole::Error,
                    format!(
                        "Cannot connect to API server. Make sure it's running at {}",
                        self.client.base_url()
                    ),
                );
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
            self.scroll_chat_to_bottom();
        }
    }

    fn transcript_line_count(&self, wrap_width: usize) -> u16 {
        let mut total: u16 = 0;

        for msg in &self.messages {
            total += 1; // role label line
            for line in msg.content.lines() {
                // Character count, not byte length, for UTF-8 content
                let char_count = line.chars().count();
                if char_count == 0 {
                    total += 1;
                } else {
                    total += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total += 1; // blank line after message
        }

        if self.loading {
            total += 2; // label + "Thinking..."
        }

        total
    }

    /// Scroll chat so the latest message (or the thinking indicator) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        let total_lines = self.transcript_line_count(wrap_width);
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };
        let max_scroll = self
            .transcript_line_count(wrap_width)
            .saturating_sub(self.chat_height.max(1));
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }
}
