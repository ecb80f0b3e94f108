//! TaskZen MCP Server
//!
//! Serves the TaskZen task assistant over MCP stdio: task management, a chat
//! front end that proposes confirmable plans, and panic-mode triage.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use rmcp::{
    ErrorData, RoleServer, ServerHandler, ServiceExt,
    model::{
        CallToolRequestParams, CallToolResult, Content, InitializeResult, ListToolsResult,
        PaginatedRequestParams, ServerCapabilities,
    },
    service::RequestContext,
    transport::io::stdio,
};
use serde_json::{Value, json};
use std::sync::Arc;
use taskzen::cli::{Cli, Command, triage};
use taskzen::config::{Config, ConfigLoader, Prompts, ProviderKind};
use taskzen::error::ToolError;
use taskzen::gateway::{DisabledGateway, OpenAiGateway, TextGenerator};
use taskzen::logging::{LogLevelFilter, LogTarget, Logger, init_tracing};
use taskzen::prompts;
use taskzen::session::Session;
use taskzen::store::TaskStore;
use taskzen::tools::{ToolContext, ToolHandler};
use tracing::{debug, info, warn};

/// MCP server handler.
#[derive(Clone)]
struct TaskZenServer {
    tool_handler: Arc<ToolHandler>,
    prompts: Arc<Prompts>,
    /// Atomic level filter for logging (client can adjust via logging/setLevel).
    level_filter: Arc<LogLevelFilter>,
}

impl TaskZenServer {
    fn new(tool_handler: ToolHandler, prompts: Arc<Prompts>, level_filter: Arc<LogLevelFilter>) -> Self {
        Self {
            tool_handler: Arc::new(tool_handler),
            prompts,
            level_filter,
        }
    }
}

/// Default server instructions when no prompts.yaml is present.
const DEFAULT_INSTRUCTIONS: &str = "\
Personal task assistant. Use chat for natural-language requests; a plan it proposes changes nothing on its own. Call confirm_plan(message_id) to apply the plan, or cancel_plan(message_id) to discard it.
Use list_tasks / add_task / update_task / toggle_task / delete_task for direct edits, panic for a triage plan.";

/// Markdown results go out as plain text, everything else as JSON.
fn result_text(result: Value) -> String {
    match result {
        Value::Object(mut map) if map.get("format") == Some(&json!("markdown")) => {
            match map.remove("content") {
                Some(Value::String(md)) => md,
                other => other.unwrap_or_default().to_string(),
            }
        }
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}

impl ServerHandler for TaskZenServer {
    fn get_info(&self) -> InitializeResult {
        let instructions = self
            .prompts
            .instructions
            .clone()
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string());

        InitializeResult {
            protocol_version: Default::default(),
            server_info: rmcp::model::Implementation {
                name: "taskzen".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            capabilities: ServerCapabilities {
                tools: Some(rmcp::model::ToolsCapability::default()),
                logging: Some(Default::default()),
                ..Default::default()
            },
            instructions: Some(instructions),
        }
    }

    async fn set_level(
        &self,
        request: rmcp::model::SetLevelRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<(), ErrorData> {
        self.level_filter.set(request.level);
        tracing::info!(level = ?request.level, "Logging level updated via MCP");
        Ok(())
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: self.tool_handler.get_tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let tool_name = request.name.clone();
        let start = std::time::Instant::now();

        let logger = Logger::new(format!("tool:{}", tool_name))
            .with_peer(context.peer.clone())
            .with_level_filter(Arc::clone(&self.level_filter));
        let tool_ctx = ToolContext::new(logger);

        let args = Value::Object(request.arguments.unwrap_or_default());
        match self.tool_handler.call_tool(&tool_name, args, &tool_ctx).await {
            Ok(result) => {
                debug!(tool = %tool_name, duration_ms = start.elapsed().as_millis() as u64, "Tool call succeeded");
                Ok(CallToolResult {
                    content: vec![Content::text(result_text(result))],
                    is_error: None,
                    meta: None,
                    structured_content: None,
                })
            }
            Err(e) => {
                let tool_err = ToolError::from(e);
                warn!(
                    tool = %tool_name,
                    error_code = ?tool_err.code,
                    error_message = %tool_err.message,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool call failed"
                );
                let error_json = serde_json::to_string(&tool_err)
                    .unwrap_or_else(|_| json!({ "error": tool_err.to_string() }).to_string());
                Ok(CallToolResult {
                    content: vec![Content::text(error_json)],
                    is_error: Some(true),
                    meta: None,
                    structured_content: None,
                })
            }
        }
    }
}

/// Pick the generation backend. Without an API key every flow takes its
/// fallback path.
fn build_generator(config: &Config) -> Arc<dyn TextGenerator> {
    let generation = &config.generation;
    if generation.provider == ProviderKind::Disabled {
        info!("Text generation disabled by config");
        return Arc::new(DisabledGateway);
    }
    let settings = generation.openai_settings();
    if settings.api_key.is_none() {
        warn!(env = %generation.api_key_env, "No API key set; text generation disabled");
        return Arc::new(DisabledGateway);
    }
    match OpenAiGateway::new(settings) {
        Ok(gateway) => {
            info!(model = %generation.model, base_url = %generation.base_url, "Text generation enabled");
            Arc::new(gateway)
        }
        Err(e) => {
            warn!(error = %e, "Failed to build HTTP client; text generation disabled");
            Arc::new(DisabledGateway)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&LogTarget::parse(&cli.log), cli.verbose)?;

    // If explicit config path given, set it as env var for ConfigLoader to pick up
    // SAFETY: This is safe at program startup before any other threads are spawned
    if let Some(config_path) = &cli.config {
        unsafe {
            std::env::set_var("TASKZEN_CONFIG_PATH", config_path);
        }
    }
    let mut loader = ConfigLoader::load()?;
    let prompts = Arc::new(loader.load_prompts());
    if let Some(path) = loader.config_path() {
        info!(path = %path.display(), "Using config file");
    }

    // CLI overrides
    let config = loader.config_mut();
    if let Some(model) = &cli.model {
        config.generation.model = model.clone();
    }
    if cli.sample_data {
        config.store.seed_sample_data = true;
    }
    let config = loader.into_config();

    let generator = build_generator(&config);

    if let Some(Command::Triage(args)) = &cli.command {
        let output = triage::run(args, generator.as_ref(), prompts::template("triage", &prompts)).await?;
        println!("{}", output);
        return Ok(());
    }

    let today = Local::now().date_naive();
    let store = if config.store.seed_sample_data {
        TaskStore::with_sample_data(today)
    } else {
        TaskStore::new()
    };
    info!(tasks = store.tasks().len(), tags = store.tags().len(), "Task store ready");

    info!(generator = generator.name(), "Text generator selected");
    let session = Arc::new(Session::new(store, generator, (*prompts).clone()));
    let tool_handler = ToolHandler::new(session, Arc::clone(&prompts))
        .with_default_format(config.server.default_format)
        .with_history_limit(config.server.history_limit);
    let level_filter = Arc::new(LogLevelFilter::default());
    let server = TaskZenServer::new(tool_handler, prompts, level_filter);

    info!("Starting TaskZen MCP server");
    server.serve(stdio()).await?.waiting().await?;

    Ok(())
}
