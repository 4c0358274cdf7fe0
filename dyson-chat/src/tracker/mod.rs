//! Session tracking.
//!
//! `ChatController` owns every chat thread of the running process, the
//! bubbles currently on screen and the flags that keep a thread from being
//! sent twice at once or saved twice. Its collaborators (chat service,
//! persister, renderer) are injected so each can be swapped out in tests.

mod persist;
mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::client::ChatService;
use crate::format::{escape_html, format_response};
use crate::models::{Bubble, Message, Session};
use crate::render::{NoopRenderer, Renderer};

pub use persist::{NoopPersister, Persister};
use state::TrackerState;

/// User-facing strings shown by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    /// HTML of the bubble that opens every thread.
    pub welcome_html: String,
    /// Text of the indicator shown while waiting for a reply.
    pub thinking: String,
    /// Text that replaces the indicator when the request fails.
    pub connection_error: String,
    /// Reply shown when the service answers with nothing.
    pub fallback_reply: String,
    /// Title used when a thread has no user message.
    pub untitled: String,
}

impl Branding {
    /// Strings for an assistant called `name`.
    pub fn for_assistant(name: &str) -> Self {
        Self {
            welcome_html: format!(
                "<p>Hi, I'm {}! How can I assist you today?</p>",
                escape_html(name)
            ),
            thinking: format!("{name} is thinking..."),
            connection_error: format!("Error connecting to {name} server."),
            fallback_reply: "Sorry, I couldn't understand that.".to_string(),
            untitled: "Untitled Chat".to_string(),
        }
    }
}

impl Default for Branding {
    fn default() -> Self {
        Self::for_assistant("DysonASI")
    }
}

/// Why a send did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The input was blank.
    Empty,
    /// Another send is still waiting for its reply.
    Busy,
}

/// Result of `ChatController::send_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing was recorded.
    Ignored(IgnoreReason),
    /// The reply arrived; `html` is the formatted reply.
    Replied { html: String },
    /// The request failed and the error string was shown instead.
    Failed,
}

/// Result of `ChatController::start_new_thread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadStarted {
    /// Index of the new, now active, session.
    pub index: usize,
    /// Whether the previous thread was handed to the persister.
    pub persisted_previous: bool,
}

/// Clears the single-flight flag when the send completes, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Tracks chat threads and drives one exchange at a time.
pub struct ChatController {
    service: Arc<dyn ChatService>,
    persister: Arc<dyn Persister>,
    renderer: Arc<dyn Renderer>,
    branding: Branding,
    state: Mutex<TrackerState>,
    in_flight: AtomicBool,
}

impl ChatController {
    /// Create a controller that saves nothing and draws nothing.
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        Self {
            service,
            persister: Arc::new(NoopPersister),
            renderer: Arc::new(NoopRenderer),
            branding: Branding::default(),
            state: Mutex::new(TrackerState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_persister(mut self, persister: Arc<dyn Persister>) -> Self {
        self.persister = persister;
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_branding(mut self, branding: Branding) -> Self {
        self.branding = branding;
        self
    }

    /// Start the first thread unless one is already active.
    pub async fn initialize(&self) {
        let mut state = self.state.lock().await;
        if state.active.is_none() {
            self.start_thread_locked(&mut state).await;
        }
    }

    /// Save the current thread if it holds a real exchange that has not been
    /// saved, then open a fresh thread with only the welcome bubble.
    pub async fn start_new_thread(&self) -> ThreadStarted {
        let mut state = self.state.lock().await;
        self.start_thread_locked(&mut state).await
    }

    async fn start_thread_locked(&self, state: &mut TrackerState) -> ThreadStarted {
        let persisted_previous = match state.pending_save(&self.branding.untitled) {
            Some((content, title)) => self.persist(&content, &title).await,
            None => false,
        };

        state.sessions.push(Session::new());
        let index = state.sessions.len() - 1;
        state.active = Some(index);
        state.title = None;
        state.saved = false;

        let renderer = self.renderer.as_ref();
        state.clear_view(renderer);
        state.push_bubble(renderer, Bubble::assistant(self.branding.welcome_html.clone()));

        info!(index, persisted_previous, "started new thread");
        ThreadStarted {
            index,
            persisted_previous,
        }
    }

    /// Send one user message and wait for the reply.
    ///
    /// Blank input and input arriving while another send is outstanding are
    /// dropped. The user message stays recorded even if the request fails.
    pub async fn send_message(&self, input: &str) -> SendOutcome {
        let message = input.trim();
        if message.is_empty() {
            return SendOutcome::Ignored(IgnoreReason::Empty);
        }
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("send already in flight, dropping input");
            return SendOutcome::Ignored(IgnoreReason::Busy);
        };

        let renderer = self.renderer.as_ref();
        let (session_index, thinking_index, generation) = {
            let mut state = self.state.lock().await;
            let session_index = match state.active {
                Some(index) => index,
                None => self.start_thread_locked(&mut state).await.index,
            };
            if state.title.is_none() {
                state.title = Some(message.to_string());
            }
            state.sessions[session_index].push(Message::user(message));
            state.push_bubble(renderer, Bubble::user(message));
            let thinking = state.push_bubble(renderer, Bubble::thinking(&self.branding.thinking));
            (session_index, thinking, state.generation)
        };

        let result = self.service.reply(message).await;

        let mut state = self.state.lock().await;
        let on_screen = state.generation == generation;
        match result {
            Ok(reply) => {
                let reply = if reply.is_empty() {
                    self.branding.fallback_reply.clone()
                } else {
                    reply
                };
                let html = format_response(&reply);
                state.sessions[session_index].push(Message::assistant(reply));

                if !on_screen {
                    debug!(session_index, "thread changed while waiting, reply not shown");
                    return SendOutcome::Replied { html };
                }

                state.remove_bubble(renderer, thinking_index);
                state.push_bubble(renderer, Bubble::assistant(html.clone()));

                if !state.saved {
                    if let Some(title) = state.title.clone() {
                        let content = state.transcript();
                        if self.persist(&content, &title).await {
                            state.saved = true;
                        }
                    }
                }
                SendOutcome::Replied { html }
            }
            Err(e) => {
                error!(error = %e, "chat request failed");
                if on_screen {
                    state.replace_bubble(
                        renderer,
                        thinking_index,
                        Bubble::thinking(&self.branding.connection_error),
                    );
                }
                SendOutcome::Failed
            }
        }
    }

    /// Best-effort save before the front end goes away. Returns whether the
    /// persister was called.
    pub async fn unload(&self) -> bool {
        let mut state = self.state.lock().await;
        let Some((content, title)) = state.pending_save(&self.branding.untitled) else {
            return false;
        };
        let persisted = self.persist(&content, &title).await;
        if persisted {
            state.saved = true;
        }
        persisted
    }

    /// Hand a transcript to the persister. Returns false when no persister
    /// is available; save failures are logged and still count as handed off.
    async fn persist(&self, content: &str, title: &str) -> bool {
        if !self.persister.is_available() {
            debug!("no persister available, skipping save");
            return false;
        }
        if let Err(e) = self.persister.save(content, title).await {
            warn!(error = %e, title, "failed to save chat");
        }
        true
    }

    pub async fn active_index(&self) -> Option<usize> {
        self.state.lock().await.active
    }

    /// Snapshot of every session, oldest first.
    pub async fn sessions(&self) -> Vec<Session> {
        self.state.lock().await.sessions.clone()
    }

    /// Snapshot of the bubbles on screen.
    pub async fn view(&self) -> Vec<Bubble> {
        self.state.lock().await.view.clone()
    }

    pub async fn transcript(&self) -> String {
        self.state.lock().await.transcript()
    }

    /// Title of the active thread (its first user message).
    pub async fn title(&self) -> Option<String> {
        self.state.lock().await.title.clone()
    }

    pub async fn is_saved(&self) -> bool {
        self.state.lock().await.saved
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::error::ChatError;
    use crate::models::BubbleKind;
    use crate::render::ViewUpdate;

    /// Replies from a script; an exhausted script echoes the message.
    #[derive(Default)]
    struct ScriptedService {
        replies: StdMutex<VecDeque<Result<String, ChatError>>>,
        seen: StdMutex<Vec<String>>,
    }

    impl ScriptedService {
        fn with(replies: Vec<Result<String, ChatError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: StdMutex::new(replies.into()),
                seen: StdMutex::default(),
            })
        }
    }

    #[async_trait]
    impl ChatService for ScriptedService {
        async fn reply(&self, message: &str) -> Result<String, ChatError> {
            self.seen.lock().unwrap().push(message.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(format!("echo {message}")))
        }
    }

    /// Blocks every reply until released.
    #[derive(Default)]
    struct GatedService {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ChatService for GatedService {
        async fn reply(&self, message: &str) -> Result<String, ChatError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(format!("echo {message}"))
        }
    }

    #[derive(Default)]
    struct RecordingPersister {
        saves: StdMutex<Vec<(String, String)>>,
    }

    impl RecordingPersister {
        fn saves(&self) -> Vec<(String, String)> {
            self.saves.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Persister for RecordingPersister {
        async fn save(&self, content: &str, title: &str) -> anyhow::Result<()> {
            self.saves
                .lock()
                .unwrap()
                .push((content.to_string(), title.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        updates: StdMutex<Vec<String>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, update: ViewUpdate<'_>) {
            let line = match update {
                ViewUpdate::Cleared => "clear".to_string(),
                ViewUpdate::Appended { index, bubble } => format!("append {index} {}", bubble.text()),
                ViewUpdate::Replaced { index, bubble } => format!("replace {index} {}", bubble.text()),
                ViewUpdate::Removed { index } => format!("remove {index}"),
            };
            self.updates.lock().unwrap().push(line);
        }
    }

    fn controller(service: Arc<dyn ChatService>, persister: &Arc<RecordingPersister>) -> ChatController {
        ChatController::new(service).with_persister(Arc::clone(persister) as Arc<dyn Persister>)
    }

    fn user_messages(sessions: &[Session]) -> Vec<String> {
        sessions
            .iter()
            .flat_map(|s| s.messages.iter())
            .filter(|m| m.is_user())
            .map(|m| m.text.clone())
            .collect()
    }

    #[tokio::test]
    async fn initialize_opens_one_thread_with_welcome() {
        let persister = Arc::new(RecordingPersister::default());
        let ctrl = controller(ScriptedService::with(vec![]), &persister);

        ctrl.initialize().await;
        ctrl.initialize().await;

        assert_eq!(ctrl.active_index().await, Some(0));
        assert_eq!(ctrl.sessions().await.len(), 1);
        assert_eq!(
            ctrl.transcript().await,
            "AI: Hi, I'm DysonASI! How can I assist you today?"
        );
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let persister = Arc::new(RecordingPersister::default());
        let service = ScriptedService::with(vec![]);
        let ctrl = controller(service.clone(), &persister);

        assert_eq!(
            ctrl.send_message("   \n").await,
            SendOutcome::Ignored(IgnoreReason::Empty)
        );
        assert_eq!(ctrl.active_index().await, None);
        assert!(service.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_lazily_starts_thread_and_saves_once() {
        let persister = Arc::new(RecordingPersister::default());
        let service = ScriptedService::with(vec![Ok("Sure\n- one\n- two".to_string())]);
        let ctrl = controller(service.clone(), &persister);

        let outcome = ctrl.send_message("  list two things ").await;
        assert_eq!(
            outcome,
            SendOutcome::Replied {
                html: "<p>Sure</p>\n<ul>\n<li>one</li>\n<li>two</li>\n</ul>".to_string()
            }
        );
        assert_eq!(service.seen.lock().unwrap().as_slice(), ["list two things"]);
        assert_eq!(ctrl.active_index().await, Some(0));
        assert_eq!(ctrl.title().await.as_deref(), Some("list two things"));
        assert!(ctrl.is_saved().await);
        assert!(!ctrl.is_busy());

        let session = &ctrl.sessions().await[0];
        assert_eq!(
            session.messages,
            vec![
                Message::user("list two things"),
                Message::assistant("Sure\n- one\n- two"),
            ]
        );

        let saves = persister.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1, "list two things");
        assert_eq!(
            saves[0].0,
            "AI: Hi, I'm DysonASI! How can I assist you today?\n\
             User: list two things\n\
             AI: Sure\n\none\ntwo\n"
        );

        ctrl.send_message("again").await;
        assert_eq!(persister.saves().len(), 1);
    }

    #[tokio::test]
    async fn empty_reply_uses_fallback() {
        let persister = Arc::new(RecordingPersister::default());
        let ctrl = controller(ScriptedService::with(vec![Ok(String::new())]), &persister);

        let outcome = ctrl.send_message("hm").await;
        assert_eq!(
            outcome,
            SendOutcome::Replied {
                html: "<p>Sorry, I couldn&#x27;t understand that.</p>".to_string()
            }
        );
    }

    #[tokio::test]
    async fn failure_shows_error_and_keeps_user_message() {
        let persister = Arc::new(RecordingPersister::default());
        let renderer = Arc::new(RecordingRenderer::default());
        let service = ScriptedService::with(vec![Err(ChatError::Status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        ))]);
        let ctrl = controller(service, &persister)
            .with_renderer(Arc::clone(&renderer) as Arc<dyn Renderer>);

        assert_eq!(ctrl.send_message("hello").await, SendOutcome::Failed);
        assert!(!ctrl.is_busy());
        assert!(!ctrl.is_saved().await);
        assert!(persister.saves().is_empty());

        let view = ctrl.view().await;
        assert_eq!(view.len(), 3);
        assert_eq!(view[2].kind, BubbleKind::Thinking);
        assert_eq!(view[2].text(), "Error connecting to DysonASI server.");
        assert_eq!(user_messages(&ctrl.sessions().await), vec!["hello"]);

        let updates = renderer.updates.lock().unwrap().clone();
        assert_eq!(
            updates,
            vec![
                "clear",
                "append 0 Hi, I'm DysonASI! How can I assist you today?",
                "append 1 hello",
                "append 2 DysonASI is thinking...",
                "replace 2 Error connecting to DysonASI server.",
            ]
        );

        // The guard was released, so the next send goes through.
        assert!(matches!(
            ctrl.send_message("retry").await,
            SendOutcome::Replied { .. }
        ));
    }

    #[tokio::test]
    async fn overlapping_send_is_dropped() {
        let persister = Arc::new(RecordingPersister::default());
        let service = Arc::new(GatedService::default());
        let ctrl = controller(Arc::clone(&service) as Arc<dyn ChatService>, &persister);
        ctrl.initialize().await;

        let first = ctrl.send_message("one");
        let second = async {
            service.entered.notified().await;
            assert!(ctrl.is_busy());
            let outcome = ctrl.send_message("two").await;
            service.release.notify_one();
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, SendOutcome::Replied { .. }));
        assert_eq!(second, SendOutcome::Ignored(IgnoreReason::Busy));
        assert_eq!(user_messages(&ctrl.sessions().await), vec!["one"]);
    }

    #[tokio::test]
    async fn sequential_sends_record_each_message_once() {
        let persister = Arc::new(RecordingPersister::default());
        let ctrl = controller(ScriptedService::with(vec![]), &persister);

        ctrl.send_message("first").await;
        ctrl.send_message("second").await;

        assert_eq!(
            user_messages(&ctrl.sessions().await),
            vec!["first", "second"]
        );
        assert_eq!(ctrl.title().await.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn new_thread_on_default_session_saves_nothing() {
        let persister = Arc::new(RecordingPersister::default());
        let ctrl = controller(ScriptedService::with(vec![]), &persister);
        ctrl.initialize().await;

        let started = ctrl.start_new_thread().await;
        assert_eq!(
            started,
            ThreadStarted {
                index: 1,
                persisted_previous: false
            }
        );
        assert!(persister.saves().is_empty());
    }

    #[tokio::test]
    async fn new_thread_saves_unsaved_exchange_with_first_user_title() {
        let persister = Arc::new(RecordingPersister::default());
        let service = ScriptedService::with(vec![Err(ChatError::Status(
            reqwest::StatusCode::BAD_GATEWAY,
        ))]);
        let ctrl = controller(service, &persister);
        ctrl.initialize().await;
        ctrl.send_message("what is rust?").await;

        let started = ctrl.start_new_thread().await;
        assert!(started.persisted_previous);
        assert_eq!(started.index, 1);

        let saves = persister.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1, "what is rust?");
        assert!(saves[0].0.contains("User: what is rust?"));

        assert_eq!(ctrl.title().await, None);
        assert!(!ctrl.is_saved().await);
        assert_eq!(ctrl.view().await.len(), 1);
    }

    #[tokio::test]
    async fn new_thread_after_saved_exchange_does_not_save_again() {
        let persister = Arc::new(RecordingPersister::default());
        let ctrl = controller(ScriptedService::with(vec![]), &persister);
        ctrl.send_message("hi").await;
        assert_eq!(persister.saves().len(), 1);

        let started = ctrl.start_new_thread().await;
        assert!(!started.persisted_previous);
        assert_eq!(persister.saves().len(), 1);

        ctrl.send_message("second thread").await;
        let saves = persister.saves();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[1].1, "second thread");
    }

    #[tokio::test]
    async fn unload_saves_at_most_once() {
        let persister = Arc::new(RecordingPersister::default());
        let service = ScriptedService::with(vec![Err(ChatError::Status(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
        ))]);
        let ctrl = controller(service, &persister);
        ctrl.send_message("bye").await;

        assert!(ctrl.unload().await);
        assert!(!ctrl.unload().await);
        assert_eq!(persister.saves().len(), 1);
    }

    #[tokio::test]
    async fn without_persister_nothing_is_marked_saved() {
        let ctrl = ChatController::new(ScriptedService::with(vec![]));
        ctrl.send_message("hi").await;
        assert!(!ctrl.is_saved().await);
        assert!(!ctrl.unload().await);
    }

    /// Counts save attempts and fails every one of them.
    #[derive(Default)]
    struct FailingPersister {
        attempts: StdMutex<usize>,
    }

    #[async_trait]
    impl Persister for FailingPersister {
        async fn save(&self, _content: &str, _title: &str) -> anyhow::Result<()> {
            *self.attempts.lock().unwrap() += 1;
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn failed_save_still_counts_as_saved() {
        let persister = Arc::new(FailingPersister::default());
        let ctrl = ChatController::new(ScriptedService::with(vec![]))
            .with_persister(Arc::clone(&persister) as Arc<dyn Persister>);

        assert!(matches!(
            ctrl.send_message("hi").await,
            SendOutcome::Replied { .. }
        ));
        assert!(ctrl.is_saved().await);
        assert_eq!(*persister.attempts.lock().unwrap(), 1);

        ctrl.send_message("again").await;
        assert!(!ctrl.unload().await);
        assert_eq!(*persister.attempts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn reply_after_thread_change_stays_with_its_session() {
        let persister = Arc::new(RecordingPersister::default());
        let service = Arc::new(GatedService::default());
        let ctrl = controller(Arc::clone(&service) as Arc<dyn ChatService>, &persister);
        ctrl.initialize().await;

        let send = ctrl.send_message("slow");
        let switch = async {
            service.entered.notified().await;
            let started = ctrl.start_new_thread().await;
            service.release.notify_one();
            started
        };
        let (outcome, started) = tokio::join!(send, switch);

        assert!(matches!(outcome, SendOutcome::Replied { .. }));
        assert!(started.persisted_previous);
        let sessions = ctrl.sessions().await;
        assert_eq!(sessions[0].messages.len(), 2);
        assert!(sessions[1].messages.is_empty());
        assert_eq!(ctrl.view().await.len(), 1);
    }

    #[test]
    fn branding_escapes_assistant_name() {
        let branding = Branding::for_assistant("<Bot>");
        assert_eq!(
            branding.welcome_html,
            "<p>Hi, I'm &lt;Bot&gt;! How can I assist you today?</p>"
        );
    }
}
