//! Line commands for the terminal front end.

use tavern_core::SettingField;

/// Shell commands
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Help,
    Quit,
    NewSession,
    Apply,
    ShowSystemPrompt,
    ShowSettings,
    Set { field: SettingField, value: String },
    ResetSettings,
    ListPrompts,
    SavePrompt { name: String, content: String },
    EditPrompt(String),
    Activate(String),
    Deactivate,
    Delete(String),
    Preview,
    /// Anything that is not a known command is chat input.
    Send(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShellError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown setting '{0}'")]
    UnknownField(String),
}

pub const HELP: &str = "\
Commands:
  /help                      Show this help
  /quit                      Exit
  /new                       Start a new session
  /apply                     Recompose the system prompt of this session
  /system                    Show the current system prompt
  /settings                  Show generation settings
  /set <field> <value>       Change a generation setting
  /defaults                  Reset sampling settings to defaults
  /prompts                   List custom prompt templates
  /prompt <name> | <content> Save the prompt form (new, or the one being edited)
  /edit <id>                 Load a template into the prompt form
  /activate <id>             Make a template active
  /deactivate                Clear the active template
  /delete <id>               Delete a template
  /preview                   Show the active template with placeholders resolved
Anything else is sent to the character.";

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Self, ShellError> {
        let trimmed = line.trim();
        let Some(body) = trimmed.strip_prefix('/') else {
            return Ok(ShellCommand::Send(line.to_string()));
        };

        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };

        let command = match name {
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            "new" => ShellCommand::NewSession,
            "apply" => ShellCommand::Apply,
            "system" => ShellCommand::ShowSystemPrompt,
            "settings" => ShellCommand::ShowSettings,
            "defaults" => ShellCommand::ResetSettings,
            "prompts" => ShellCommand::ListPrompts,
            "deactivate" => ShellCommand::Deactivate,
            "preview" => ShellCommand::Preview,
            "set" => {
                let (field, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(ShellError::Usage("/set <field> <value>"))?;
                let field = field
                    .parse::<SettingField>()
                    .map_err(|_| ShellError::UnknownField(field.to_string()))?;
                ShellCommand::Set {
                    field,
                    value: value.trim().to_string(),
                }
            }
            "prompt" => {
                let (name, content) = rest
                    .split_once('|')
                    .ok_or(ShellError::Usage("/prompt <name> | <content>"))?;
                ShellCommand::SavePrompt {
                    name: name.trim().to_string(),
                    content: content.trim().to_string(),
                }
            }
            "edit" => ShellCommand::EditPrompt(required(rest, "/edit <id>")?),
            "activate" => ShellCommand::Activate(required(rest, "/activate <id>")?),
            "delete" => ShellCommand::Delete(required(rest, "/delete <id>")?),
            _ => ShellCommand::Send(line.to_string()),
        };
        Ok(command)
    }
}

fn required(arg: &str, usage: &'static str) -> Result<String, ShellError> {
    if arg.is_empty() {
        Err(ShellError::Usage(usage))
    } else {
        Ok(arg.to_string())
    }
}
