use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::api::{Action, Command, Reply};
use crate::browser::open_browser;
use crate::config::Config;
use crate::context::WorkerContext;
use crate::control::{task_id, BatchId, ControlToken};
use crate::error::{AppResult, CommandError};
use crate::models::{load_form_specs, DocumentStore, FormSpecs, JsonFileStore, MemoryStore};
use crate::orchestrator::{
    check_macro_status, collect_macro_ids, create_assets, edit_macros, validate_report, CheckMode,
};
use crate::services::{spawn_writer, OutputChannel};
use crate::utils::logging::{log_shutdown, log_startup, log_task_end, log_task_start};

/// Command loop of the worker
pub struct App {
    ctx: WorkerContext,
    writer: JoinHandle<()>,
    tasks: JoinSet<()>,
}

enum Flow {
    Continue,
    Close(JsonValue),
}

/// A long-running action with its parameters checked
#[derive(Debug, Clone)]
struct TaskRequest {
    action: Action,
    command_id: JsonValue,
    report_id: String,
    batch_id: BatchId,
    tabs: usize,
    macro_count: usize,
    macro_data: JsonValue,
}

impl TaskRequest {
    fn from_command(action: Action, command: &Command, ctx: &WorkerContext) -> Result<Self, CommandError> {
        let report_id = command
            .report_id()
            .ok_or(CommandError::MissingParameter("reportId"))?;
        let macro_count = match action {
            Action::CreateAssets => command
                .macro_count()
                .ok_or(CommandError::InvalidParameter { name: "macroCount" })?,
            _ => 0,
        };
        Ok(Self {
            action,
            command_id: command.command_id.clone(),
            batch_id: command.batch_id().unwrap_or_else(|| BatchId::new(&report_id)),
            tabs: ctx.tabs_or_default(command.tabs()),
            report_id,
            macro_count,
            macro_data: command.macro_data.clone(),
        })
    }
}

impl App {
    /// Open the browser, the store and the output writer
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let browser = open_browser(&config).await.context("cannot open browser")?;

        let store: Arc<dyn DocumentStore> = match &config.store_dir {
            Some(dir) => Arc::new(JsonFileStore::open(dir.clone()).await?),
            None => Arc::new(MemoryStore::new()),
        };

        let forms = match &config.form_spec_path {
            Some(path) => load_form_specs(path).await?,
            None => FormSpecs::default(),
        };

        let (output, rx) = OutputChannel::new();
        let writer = spawn_writer(rx, tokio::io::stdout());

        let ctx = WorkerContext::new(config, Arc::new(browser), store, output, forms);
        info!("✓ worker ready, waiting for commands");
        Ok(Self::with_context(ctx, writer))
    }

    /// Build around an existing context; `writer` drains `ctx.output`.
    pub fn with_context(ctx: WorkerContext, writer: JoinHandle<()>) -> Self {
        Self {
            ctx,
            writer,
            tasks: JoinSet::new(),
        }
    }

    /// Read commands until `close` or end of input, then shut down.
    pub async fn run<R>(mut self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut close_command = None;

        while let Some(line) = lines.next_line().await.context("cannot read command input")? {
            self.reap_finished();
            match self.handle_line(&line).await {
                Flow::Continue => {}
                Flow::Close(command_id) => {
                    close_command = Some(command_id);
                    break;
                }
            }
        }
        if close_command.is_none() {
            info!("command input closed");
        }

        self.shutdown(close_command).await
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("rejected input line: {}", e);
                self.reply(Reply::invalid_json(e, line));
                return Flow::Continue;
            }
        };
        debug!("command received: {}", command.action);

        let Some(action) = command.action() else {
            self.reply(Reply::unknown_action(&command.command_id, &command.action));
            return Flow::Continue;
        };

        match action {
            Action::Ping => self.reply(Reply::success(&command.command_id, "pong")),
            Action::Close => return Flow::Close(command.command_id),
            action if action.is_control() => {
                let reply = self.control(action, &command).await;
                self.reply(reply);
            }
            _ => {
                if let Err(e) = self.spawn_task(action, &command) {
                    self.reply(Reply::failed(&command.command_id, e));
                }
            }
        }
        Flow::Continue
    }

    async fn control(&self, action: Action, command: &Command) -> Reply {
        let Some(batch_id) = command.batch_id() else {
            return Reply::failed(&command.command_id, CommandError::MissingParameter("batchId"));
        };
        info!("control command: {} for batch {}", action.as_str(), batch_id);

        let Some(token) = self.ctx.registry.lookup_by_batch(&batch_id) else {
            return Reply::failed(
                &command.command_id,
                CommandError::TaskNotFound(batch_id.to_string()),
            );
        };

        let (status, message) = match action {
            Action::Pause => {
                token.pause();
                ("PAUSED", "Task paused")
            }
            Action::Resume => {
                token.resume();
                ("RESUMED", "Task resumed")
            }
            _ => {
                // a queued task owns no tabs yet
                let driving = self.ctx.tab_lease.is_held_by(&token);
                token.stop();
                if driving {
                    match self.ctx.browser.close_secondary_tabs().await {
                        Ok(0) => {}
                        Ok(n) => info!("closed {} additional tabs", n),
                        Err(e) => warn!("error closing tabs: {}", e),
                    }
                }
                ("STOPPED", "Task stopped")
            }
        };
        Reply::new(status, &command.command_id)
            .with("message", message)
            .with("batchId", batch_id.as_str())
    }

    fn spawn_task(&mut self, action: Action, command: &Command) -> Result<(), CommandError> {
        let request = TaskRequest::from_command(action, command, &self.ctx)?;
        let id = task_id(action.as_str(), &request.report_id, &request.batch_id);
        let guard = self.ctx.registry.register(id, request.batch_id.clone())?;
        let ctx = self.ctx.clone();

        self.tasks.spawn(async move {
            log_task_start(guard.task_id(), &request.report_id, request.tabs);
            let lease = ctx.tab_lease.acquire(guard.token()).await;
            let result = match &lease {
                Ok(_) => run_action(&ctx, &request, guard.token()).await,
                Err(stop) => Err((*stop).into()),
            };
            let reply = match result {
                Ok(reply) => reply,
                Err(e) => {
                    if e.is_stopped() {
                        info!("[TASK {}] stopped", guard.task_id());
                    } else {
                        error!("[TASK {}] failed: {}", guard.task_id(), e);
                    }
                    Reply::from_error(&request.command_id, &e).with("reportId", request.report_id.as_str())
                }
            };
            log_task_end(guard.task_id(), &reply.status);
            ctx.output.send_serialized(&reply);
            drop(lease);
            drop(guard);
        });
        Ok(())
    }

    fn reply(&self, reply: Reply) {
        self.ctx.output.send_serialized(&reply);
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(e) = joined {
                error!("task handler aborted: {}", e);
            }
        }
    }

    async fn shutdown(mut self, close_command: Option<JsonValue>) -> Result<()> {
        let stopped = self.ctx.registry.stop_all();
        log_shutdown(stopped);

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                error!("task handler aborted: {}", e);
            }
        }
        self.ctx.registry.clear();

        if let Err(e) = self.ctx.browser.shutdown().await {
            warn!("browser shutdown failed: {}", e);
        }
        if let Some(command_id) = close_command {
            self.reply(Reply::success(&command_id, "Browser closed successfully"));
        }

        let Self { ctx, writer, .. } = self;
        drop(ctx);
        writer.await.context("output writer failed")?;
        Ok(())
    }
}

async fn run_action(ctx: &WorkerContext, request: &TaskRequest, token: &ControlToken) -> AppResult<Reply> {
    let id = &request.command_id;
    let report_id = request.report_id.as_str();
    let tabs = request.tabs;

    let reply = match request.action {
        Action::GrabMacroIds => {
            Reply::from_payload(id, &collect_macro_ids(ctx, report_id, tabs, token).await?)?
        }
        Action::CheckMacroStatus => Reply::from_payload(
            id,
            &check_macro_status(ctx, report_id, tabs, CheckMode::Full, token).await?,
        )?,
        Action::HalfCheckMacroStatus => Reply::from_payload(
            id,
            &check_macro_status(ctx, report_id, tabs, CheckMode::Half, token).await?,
        )?,
        Action::EditMacros => Reply::from_payload(id, &edit_macros(ctx, report_id, tabs, token).await?)?,
        Action::CreateAssets => Reply::from_payload(
            id,
            &create_assets(ctx, report_id, request.macro_count, &request.macro_data, tabs, token).await?,
        )?,
        Action::ValidateReport => Reply::from_payload(id, &validate_report(ctx, report_id, token).await?)?,
        other => return Err(CommandError::UnknownAction(other.as_str().to_string()).into()),
    };
    Ok(reply.with("reportId", report_id))
}
