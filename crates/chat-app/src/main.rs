use std::process::ExitCode;
use std::sync::Arc;

use chatline::app::ChatShell;
use chatline::clipboard::ArboardClipboard;
use chatline::settings::SettingsStore;
use chatline_chat::{ChatController, Clipboard, MemoryClipboard};
use chatline_llm::create_service;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so the transcript on stdout stays readable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let store = SettingsStore::load();
    let settings = store.settings();
    tracing::info!(
        path = ?store.config_path(),
        backend = %settings.backend,
        "loaded settings"
    );
    if let Err(error) = store.write_defaults_if_missing() {
        tracing::warn!(error = %error, "could not write the default settings file");
    }

    let service = match create_service(settings.to_service_config()) {
        Ok(service) => service,
        Err(error) => {
            tracing::error!(error = %error, "failed to create chat service");
            eprintln!("chatline: {error}");
            return ExitCode::FAILURE;
        }
    };

    let clipboard: Arc<dyn Clipboard> = match ArboardClipboard::new() {
        Ok(clipboard) => Arc::new(clipboard),
        Err(error) => {
            tracing::warn!(error = %error, "system clipboard unavailable, copies stay in memory");
            Arc::new(MemoryClipboard::new())
        }
    };

    let controller = ChatController::new(service, clipboard, settings.controller_config());
    let mut shell = ChatShell::new(controller, std::io::stdout());

    if let Err(error) = shell.run(BufReader::new(tokio::io::stdin())).await {
        tracing::error!(error = %error, "terminal session failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
