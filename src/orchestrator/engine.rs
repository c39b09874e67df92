//! Session engine: connection lifecycle, prompts and resumption.
//!
//! [`SessionEngine::start_session`] opens the transport and spawns three
//! tasks sharing one cancellation token:
//!
//! - the reader ([`run_reader`]) classifying inbound frames,
//! - the writer ([`run_writer`]) draining the outbound queue,
//! - the dispatcher ([`run_dispatcher`]) serving agent tool calls.
//!
//! `initialize` is the first frame written; prompts are refused until the
//! agent has answered it. The first prompt creates the agent session with
//! `session/new`. Prompts are serialised, one turn at a time.
//!
//! Resuming a session restores local state only. The agent is not sent the
//! earlier history and starts with no memory of the resumed conversation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::state::SessionState;
use crate::acp::correlator::Correlator;
use crate::acp::handshake::{
    initialize_params, new_session_params, parse_session_id, prompt_params, ClientCapabilities,
    METHOD_INITIALIZE, METHOD_SESSION_NEW, METHOD_SESSION_PROMPT,
};
use crate::acp::message::{Message, Outcome};
use crate::acp::reader::{run_reader, AgentUpdate, InboundRoutes};
use crate::acp::writer::{run_writer, OutboundQueue};
use crate::approval::ApprovalGate;
use crate::audit::{self, AuditEntry, AuditEventType, AuditLogger};
use crate::config::ClientConfig;
use crate::models::session::{HistoryKind, Session};
use crate::persistence::session_repo::SessionRepo;
use crate::tools::dispatch::{run_dispatcher, ToolDispatcher};
use crate::tools::ToolHost;
use crate::transport::Transport;
use crate::{AppError, Result};

/// Engine settings independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Model requested for new sessions.
    pub model: String,
    /// Workspace announced to the agent.
    pub workspace_root: PathBuf,
    /// Save the session after every state change.
    pub auto_persist: bool,
    /// Capabilities advertised in `initialize`.
    pub capabilities: ClientCapabilities,
}

impl EngineConfig {
    /// Settings with auto-persist on and every capability advertised.
    #[must_use]
    pub fn new(model: impl Into<String>, workspace_root: PathBuf) -> Self {
        Self {
            model: model.into(),
            workspace_root,
            auto_persist: true,
            capabilities: ClientCapabilities::default(),
        }
    }
}

impl From<&ClientConfig> for EngineConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            auto_persist: config.auto_persist,
            ..Self::new(config.model.clone(), config.workspace_root.clone())
        }
    }
}

/// Handles to a running connection.
#[derive(Clone)]
struct Link {
    correlator: Arc<Correlator>,
    outbound: OutboundQueue,
    cancel: CancellationToken,
}

/// Client side of one agent conversation.
pub struct SessionEngine {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    tools: Arc<dyn ToolHost>,
    approver: Arc<dyn ApprovalGate>,
    audit: Option<Arc<dyn AuditLogger>>,
    state: Arc<SessionState>,
    updates: std::sync::Mutex<Option<mpsc::UnboundedSender<AgentUpdate>>>,
    link: std::sync::Mutex<Option<Link>>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    ready: AtomicBool,
    turn: Mutex<()>,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("config", &self.config)
            .field("ready", &self.ready.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SessionEngine {
    /// Create an idle engine. Nothing is sent until [`Self::start_session`].
    #[must_use]
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        tools: Arc<dyn ToolHost>,
        approver: Arc<dyn ApprovalGate>,
    ) -> Self {
        let state = Arc::new(SessionState::new(None, config.auto_persist));
        Self {
            config,
            transport,
            tools,
            approver,
            audit: None,
            state,
            updates: std::sync::Mutex::new(None),
            link: std::sync::Mutex::new(None),
            tasks: std::sync::Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            turn: Mutex::new(()),
        }
    }

    /// Attach a session store used for persistence and resumption.
    #[must_use]
    pub fn with_store(mut self, store: SessionRepo) -> Self {
        self.state = Arc::new(SessionState::new(Some(store), self.config.auto_persist));
        self
    }

    /// Attach an audit logger.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Receive agent notifications (`session/update` and friends).
    ///
    /// Must be called before [`Self::start_session`]; a later call returns
    /// a receiver that never yields. Only the latest subscriber is kept.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AgentUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.updates) = Some(tx);
        rx
    }

    /// Open the transport and complete the `initialize` handshake.
    ///
    /// # Errors
    ///
    /// - `AppError::Acp` if the engine was already started or the agent
    ///   answers `initialize` with an error.
    /// - `AppError::Transport` if the stream cannot be opened or the
    ///   connection closes before the handshake completes.
    pub async fn start_session(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AppError::Acp("session engine already started".into()));
        }

        let frames = match self.transport.open().await {
            Ok(frames) => frames,
            Err(err) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        let cancel = CancellationToken::new();
        let correlator = Arc::new(Correlator::new());
        let (outbound, outbound_rx) = OutboundQueue::new();
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let routes = InboundRoutes {
            peer_requests: peer_tx,
            updates: lock(&self.updates).take(),
        };
        let dispatcher = Arc::new(
            ToolDispatcher::new(
                Arc::clone(&self.tools),
                Arc::clone(&self.approver),
                outbound.clone(),
                Arc::clone(&self.state),
                cancel.clone(),
            )
            .with_audit(self.audit.clone()),
        );

        let handles = vec![
            tokio::spawn(
                run_writer(Arc::clone(&self.transport), outbound_rx, cancel.clone())
                    .instrument(info_span!("acp_writer")),
            ),
            tokio::spawn(
                run_reader(frames, Arc::clone(&correlator), routes, cancel.clone())
                    .instrument(info_span!("acp_reader")),
            ),
            tokio::spawn(
                run_dispatcher(peer_rx, dispatcher, cancel.clone())
                    .instrument(info_span!("tool_dispatcher")),
            ),
        ];
        lock(&self.tasks).extend(handles);
        *lock(&self.link) = Some(Link {
            correlator,
            outbound,
            cancel,
        });

        let params = initialize_params(
            self.config.capabilities,
            &self.config.workspace_root,
            &self.config.model,
        );
        self.call(METHOD_INITIALIZE, params).await?;
        self.ready.store(true, Ordering::SeqCst);

        info!(
            model = self.config.model.as_str(),
            workspace = %self.config.workspace_root.display(),
            "engine: handshake complete"
        );
        self.audit(
            AuditEntry::new(AuditEventType::SessionStart)
                .with_session(self.state.session_id().await)
                .with_payload(json!({
                    "model": self.config.model,
                    "workspace": self.config.workspace_root.to_string_lossy(),
                })),
        );
        Ok(())
    }

    /// Send one user prompt and wait for the agent's turn to finish.
    ///
    /// Creates the agent session first if none exists. The `Prompt`
    /// history entry is appended once the prompt reached the transport.
    /// Tool calls the agent makes during the turn are served concurrently.
    ///
    /// Returns the `session/prompt` result (typically `{stopReason}`).
    ///
    /// # Errors
    ///
    /// - `AppError::Acp` if the handshake has not completed or the agent
    ///   returns an error.
    /// - `AppError::Transport` if the prompt cannot be written or the
    ///   connection closes before the response arrives.
    pub async fn send_prompt(&self, text: &str) -> Result<Value> {
        let _turn = self.turn.lock().await;
        if !self.ready.load(Ordering::SeqCst) {
            return Err(AppError::Acp("session not started".into()));
        }

        let session_id = match self.state.session_id().await {
            Some(id) => id,
            None => self.create_session().await?,
        };

        let span = info_span!("prompt", session_id = session_id.as_str());
        async {
            let reply = self
                .submit(METHOD_SESSION_PROMPT, prompt_params(&session_id, text))
                .await?;

            let payload = json!({ "text": text });
            self.state
                .append(HistoryKind::Prompt, payload.clone())
                .await;
            self.audit(
                AuditEntry::new(AuditEventType::PromptSent)
                    .with_session(Some(session_id.clone()))
                    .with_payload(payload),
            );
            debug!("engine: prompt delivered");

            self.await_reply(METHOD_SESSION_PROMPT, reply).await
        }
        .instrument(span)
        .await
    }

    /// Replace local state with a stored session.
    ///
    /// The history is not replayed to the agent.
    ///
    /// # Errors
    ///
    /// - `AppError::Config` if no store is attached.
    /// - `AppError::NotFound` if the store has no such session.
    /// - `AppError::Db` if the load fails.
    pub async fn resume_session(&self, session_id: &str) -> Result<Session> {
        let _turn = self.turn.lock().await;
        let store = self
            .state
            .store()
            .ok_or_else(|| AppError::Config("no session store configured".into()))?;

        let session = store
            .load(session_id)
            .await
            .inspect_err(|err| warn!(%err, session_id, "engine: session load failed"))?
            .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))?;

        self.state.replace(session.clone()).await;
        info!(
            session_id,
            entries = session.history.len(),
            "engine: session resumed locally, history not replayed to agent"
        );
        self.audit(
            AuditEntry::new(AuditEventType::SessionResume)
                .with_session(Some(session.id.clone()))
                .with_payload(json!({ "entries": session.history.len() })),
        );
        Ok(session)
    }

    /// Copy of the current session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.state.snapshot().await
    }

    /// Identifiers of stored sessions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` without a store, `AppError::Db` on failure.
    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        self.store()?.list().await
    }

    /// Delete a stored session; `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` without a store, `AppError::Db` on failure.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        self.store()?.delete(session_id).await
    }

    /// `true` while the handshake is complete and the connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
            && lock(&self.link)
                .as_ref()
                .is_some_and(|link| !link.cancel.is_cancelled())
    }

    /// Wait until the connection closes. Returns immediately if it never
    /// opened.
    pub async fn closed(&self) {
        let cancel = lock(&self.link).as_ref().map(|link| link.cancel.clone());
        if let Some(cancel) = cancel {
            cancel.cancelled().await;
        }
    }

    /// Close the connection and wait for the background tasks to exit.
    ///
    /// Pending requests are abandoned. Safe to call more than once.
    pub async fn shutdown(&self) {
        let link = lock(&self.link).take();
        let Some(link) = link else {
            return;
        };
        self.ready.store(false, Ordering::SeqCst);
        link.cancel.cancel();
        link.correlator.abandon_all();

        let handles: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(%err, "engine: background task ended abnormally");
            }
        }

        info!("engine: connection closed");
        self.audit(
            AuditEntry::new(AuditEventType::SessionEnd).with_session(self.state.session_id().await),
        );
    }

    async fn create_session(&self) -> Result<String> {
        let result = self
            .call(
                METHOD_SESSION_NEW,
                new_session_params(&self.config.workspace_root, &self.config.model),
            )
            .await?;
        let session_id = parse_session_id(&result)?;
        self.state
            .install(Session::new(
                session_id.clone(),
                self.config.model.clone(),
                self.config.workspace_root.clone(),
            ))
            .await;
        info!(session_id = session_id.as_str(), "engine: session created");
        Ok(session_id)
    }

    /// Request/response round trip.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let reply = self.submit(method, params).await?;
        self.await_reply(method, reply).await
    }

    /// Register and write a request; resolves once the frame is written.
    async fn submit(&self, method: &str, params: Value) -> Result<oneshot::Receiver<Outcome>> {
        let link = lock(&self.link)
            .clone()
            .ok_or_else(|| AppError::Transport("not connected".into()))?;

        let (id, reply) = link.correlator.submit(method);
        let delivered = link
            .outbound
            .enqueue(Message::request(id, method, params))
            .delivered()
            .await;
        if !delivered {
            link.correlator.abandon(id);
            return Err(AppError::Transport(format!("{method}: request not delivered")));
        }
        Ok(reply)
    }

    async fn await_reply(&self, method: &str, reply: oneshot::Receiver<Outcome>) -> Result<Value> {
        match reply.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(AppError::Acp(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            ))),
            Err(_) => Err(AppError::Transport(format!(
                "{method}: connection closed before response"
            ))),
        }
    }

    fn store(&self) -> Result<&SessionRepo> {
        self.state
            .store()
            .ok_or_else(|| AppError::Config("no session store configured".into()))
    }

    fn audit(&self, entry: AuditEntry) {
        audit::record(self.audit.as_deref(), entry);
    }
}

impl Drop for SessionEngine {
    fn drop(&mut self) {
        let link = self
            .link
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(link) = link {
            link.cancel.cancel();
        }
    }
}

fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
