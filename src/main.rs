use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use banter_core::client::SamplingConfig;
use banter_core::events::ChatEvent;
use banter_core::ids::ConversationKey;
use banter_engine::{EngineConfig, InboundMessage, Outcome, SessionEngine};
use banter_llm::OpenAiClient;
use banter_store::Database;
use banter_telemetry::{init_telemetry, TelemetryConfig};

/// The single designated conversation channel for the console harness.
const CHANNEL: &str = "console";

const GENERIC_FAILURE_REPLY: &str =
    "Sorry, something went wrong on my end. Try again in a moment.";

/// Admin command surface. Maps 1:1 to the engine's admin operations.
#[derive(Debug, PartialEq, Eq)]
enum AdminCommand {
    Clear,
    SetPrompt(String),
    GetPrompt,
    ResetPrompt,
    Unknown,
}

fn parse_admin(line: &str) -> Option<AdminCommand> {
    let rest = line.strip_prefix("/chat")?.trim_start();
    Some(match rest.split_once(char::is_whitespace) {
        Some(("set_system_prompt", text)) if !text.trim().is_empty() => {
            AdminCommand::SetPrompt(text.trim().to_string())
        }
        None if rest == "clear" => AdminCommand::Clear,
        None if rest == "get_system_prompt" => AdminCommand::GetPrompt,
        None if rest == "reset_system_prompt_to_default" => AdminCommand::ResetPrompt,
        _ => AdminCommand::Unknown,
    })
}

async fn run_admin(engine: &SessionEngine, key: &ConversationKey, cmd: AdminCommand) -> String {
    let result = match cmd {
        AdminCommand::Clear => engine
            .clear_history(key)
            .await
            .map(|()| "History cleared.".to_string()),
        AdminCommand::SetPrompt(text) => engine
            .set_system_prompt(key, &text)
            .await
            .map(|()| "System prompt updated; history cleared.".to_string()),
        AdminCommand::GetPrompt => engine.system_prompt(key).await,
        AdminCommand::ResetPrompt => engine
            .reset_system_prompt(key)
            .await
            .map(|()| "System prompt reset to default; history cleared.".to_string()),
        AdminCommand::Unknown => {
            return "Usage: /chat clear | set_system_prompt <text> | get_system_prompt | reset_system_prompt_to_default".to_string();
        }
    };

    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, kind = e.error_kind(), "admin command failed");
        GENERIC_FAILURE_REPLY.to_string()
    })
}

#[tokio::main]
async fn main() {
    init_telemetry(&TelemetryConfig::default());

    let Ok(api_key) = std::env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY is not set");
        std::process::exit(1);
    };

    let mut sampling = SamplingConfig::default();
    if let Ok(model) = std::env::var("BANTER_MODEL") {
        sampling.model = model;
    }
    let client = OpenAiClient::new(api_key, sampling).expect("Failed to build completion client");

    let db_path = data_dir().join("banter.db");
    let db = Database::open(&db_path).expect("Failed to open database");

    // Operator surface: failed cycles land in the error log.
    let (event_tx, mut event_rx) = broadcast::channel::<ChatEvent>(1024);
    let _observer = tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            if let ChatEvent::CycleFailed { key, error_kind } = event {
                tracing::error!(%key, error_kind, "session cycle failed");
            }
        }
    });

    let engine = Arc::new(SessionEngine::new(
        Arc::new(client),
        db,
        EngineConfig::for_channel(CHANNEL),
        event_tx,
    ));
    let key = ConversationKey::from_raw(CHANNEL);

    let display_name = std::env::var("USER").unwrap_or_else(|_| "you".to_string());
    tracing::info!(channel = CHANNEL, "banter console ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(cmd) = parse_admin(line) {
            println!("{}", run_admin(&engine, &key, cmd).await);
            continue;
        }

        let msg = InboundMessage {
            author_display_name: display_name.clone(),
            author_is_bot: false,
            channel: CHANNEL.to_string(),
            content: line.to_string(),
        };

        match engine.handle_message(&msg).await {
            Ok(Outcome::Replied(reply)) => println!("{reply}"),
            Ok(Outcome::Refused(reply)) => println!("{reply}"),
            Ok(Outcome::Ignored) => {}
            Err(e) => {
                tracing::error!(error = %e, kind = e.error_kind(), "session cycle failed");
                println!("{GENERIC_FAILURE_REPLY}");
            }
        }
    }
}

fn data_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(".banter")
}
