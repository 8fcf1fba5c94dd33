use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tavern_core::{
    Config, CustomPromptRegistry, FileStore, KeyValueStore, Message, MessageRole, PromptPatch,
    RegistryError, SettingsRegistry,
};
use tavern_gateway::providers::openrouter::OpenRouterClient;
use tavern_gateway::session::{RejectReason, SendOutcome};
use tavern_gateway::shell::{HELP, ShellCommand};
use tavern_gateway::state::{AppState, Profile, SessionEvent};

type CommandResult = Result<bool, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize tracing (stdout belongs to the chat)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.settings.logging.level.clone().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let connection = &config.settings.connection;
    info!(
        "Configuration loaded (model: {}, endpoint: {})",
        connection.model_id, connection.base_url
    );
    if !config.secrets.has_default_credential() {
        warn!("OPENROUTER_API_KEY is not set; use /set credential <key> or requests will fail");
    }

    // Custom prompt templates
    let data_dir = config.data_dir()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&data_dir));
    let prompts = CustomPromptRegistry::load(store)?;
    info!(
        "Loaded {} custom prompts from {}",
        prompts.list().len(),
        data_dir.display()
    );

    let client = OpenRouterClient::new(
        Some(connection.base_url.clone()),
        connection.http_referer.clone(),
        connection.app_name.clone(),
    )?
    .with_dump_queries(config.settings.logging.dump_queries);

    let profile = Profile {
        prompt: config.settings.prompt.clone(),
        character: config.settings.character.clone(),
        persona: config.settings.persona.clone(),
    };
    let state = Arc::new(AppState::new(
        SettingsRegistry::new(config.settings.generation_settings()),
        prompts,
        profile,
        Arc::new(client),
        config.default_credential().map(str::to_string),
    ));

    spawn_typing_indicator(&state);

    println!("{}", HELP);
    println!();
    let character = state.profile().await.character.display_name().to_string();
    for message in state.snapshot().await.visible() {
        print_message(&character, message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match ShellCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match handle(&state, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("Error: {}", e),
        }
    }

    info!("Shutting down");
    Ok(())
}

/// The turn to show for a finished send. Rejected and discarded sends stay silent.
fn printable_reply(outcome: SendOutcome) -> Option<Message> {
    match outcome {
        SendOutcome::Replied(reply) => Some(reply),
        SendOutcome::Recovered { reply, error } => {
            warn!("Reply failed: {}", error);
            Some(reply)
        }
        SendOutcome::Rejected(RejectReason::AwaitingResponse) => {
            debug!("Send ignored while a reply is pending");
            None
        }
        SendOutcome::Rejected(RejectReason::BlankInput) | SendOutcome::Discarded => None,
    }
}

/// Run one shell command. Returns `false` to quit.
async fn handle(state: &Arc<AppState>, command: ShellCommand) -> CommandResult {
    match command {
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::Quit => return Ok(false),
        ShellCommand::Send(text) => {
            // Sends run in the background so the shell stays responsive
            let state = Arc::clone(state);
            tokio::spawn(async move {
                let character = state.profile().await.character.display_name().to_string();
                if let Some(reply) = printable_reply(state.send(&text).await) {
                    print_message(&character, &reply);
                }
            });
        }
        ShellCommand::NewSession => {
            let snapshot = state.new_session().await;
            let character = state.profile().await.character.display_name().to_string();
            println!("-- new session --");
            for message in snapshot.visible() {
                print_message(&character, message);
            }
        }
        ShellCommand::Apply => {
            state.apply_prompt().await;
            println!("System prompt recomposed.");
        }
        ShellCommand::ShowSystemPrompt => println!("{}", state.system_prompt().await),
        ShellCommand::ShowSettings => {
            let settings = state.settings().await;
            let s = settings.snapshot();
            let credential = if s.credential.trim().is_empty() {
                "(default)"
            } else {
                "(set)"
            };
            println!("credential         {}", credential);
            println!("model_id           {}", s.model_id);
            println!("temperature        {}", s.temperature);
            println!("max_tokens         {}", s.max_tokens);
            println!("context_window     {}", s.context_window);
            println!("repetition_penalty {}", s.repetition_penalty);
            println!("frequency_penalty  {}", s.frequency_penalty);
            println!("presence_penalty   {}", s.presence_penalty);
            println!("top_p              {}", s.top_p);
        }
        ShellCommand::Set { field, value } => {
            state.settings_mut().await.set_from_str(field, &value)?;
            println!("{} updated.", field);
        }
        ShellCommand::ResetSettings => {
            state.settings_mut().await.reset_to_defaults();
            println!("Sampling settings reset.");
        }
        ShellCommand::ListPrompts => {
            let prompts = state.prompts().await;
            if prompts.list().is_empty() {
                println!("No custom prompts.");
            }
            for template in prompts.list() {
                let marker = if prompts.active_id() == Some(template.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{} {}  {}", marker, template.id, template.name);
            }
        }
        ShellCommand::SavePrompt { name, content } => {
            let mut prompts = state.prompts().await;
            if !prompts.is_form_open() {
                prompts.new_prompt()?;
            }
            prompts.set_form_data(PromptPatch {
                name: Some(name),
                content: Some(content),
            });
            match prompts.save_form() {
                Ok(saved) => {
                    prompts.close_form()?;
                    println!("Saved prompt {} ({})", saved.name, saved.id);
                }
                Err(RegistryError::Validation(errors)) => {
                    for (field, message) in &errors {
                        println!("{}: {}", field, message);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        ShellCommand::EditPrompt(id) => {
            let mut prompts = state.prompts().await;
            prompts.select(&id)?;
            prompts.open_form();
            let form = prompts.form();
            println!("Editing {}: {}", form.name, form.content);
            println!("Save with /prompt <name> | <content>");
        }
        ShellCommand::Activate(id) => {
            state.prompts().await.activate(&id)?;
            println!("Prompt activated. Use /apply or /new to use it.");
        }
        ShellCommand::Deactivate => {
            state.prompts().await.deactivate()?;
            println!("Prompt deactivated. Use /apply or /new to use the default prompt.");
        }
        ShellCommand::Delete(id) => match state.prompts().await.delete(&id)? {
            Some(removed) => println!("Deleted {}", removed.name),
            None => println!("No prompt with id {}", id),
        },
        ShellCommand::Preview => match state.preview_active().await {
            Some(preview) => println!("{}", preview),
            None => println!("No active prompt."),
        },
    }
    Ok(true)
}

fn spawn_typing_indicator(state: &Arc<AppState>) {
    let mut events = state.subscribe();
    let state = Arc::clone(state);
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::AwaitingResponse(true)) => {
                    let character = state.profile().await.character.display_name().to_string();
                    println!("({} is typing...)", character);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn print_message(character: &str, message: &Message) {
    match message.role {
        MessageRole::Assistant => println!("{}: {}", character, message.content),
        MessageRole::User => println!("you: {}", message.content),
        MessageRole::System => {}
    }
}
