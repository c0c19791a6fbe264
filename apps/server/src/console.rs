//! Line commands accepted by the operator console.

use serde_json::Value;

#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    Help,
    Stats,
    Token { user_id: String },
    Revoke { token: String },
    Notify { user_id: String, data: Value },
    Broadcast { content: Value },
    Quit,
}

impl ConsoleCommand {
    pub const HELP: &'static str = "\
Available commands:
  /help, /h                   - Show this help
  /stats, /s                  - Print a hub snapshot
  /token <user>               - Issue a session token for <user>
  /revoke <token>             - Revoke a session token
  /notify <user> <json|text>  - Push a notification to <user>
  /broadcast <json|text>      - Broadcast to every client
  /quit, /exit, /q            - Stop the server";

    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name {
            "/help" | "/h" => ConsoleCommand::Help,
            "/stats" | "/s" => ConsoleCommand::Stats,
            "/quit" | "/exit" | "/q" => ConsoleCommand::Quit,
            "/token" => ConsoleCommand::Token {
                user_id: single_word(rest, "usage: /token <user>")?,
            },
            "/revoke" => ConsoleCommand::Revoke {
                token: single_word(rest, "usage: /revoke <token>")?,
            },
            "/notify" => {
                let (user_id, payload) = rest
                    .split_once(char::is_whitespace)
                    .ok_or("usage: /notify <user> <json|text>")?;
                ConsoleCommand::Notify {
                    user_id: user_id.to_string(),
                    data: payload_value(payload),
                }
            }
            "/broadcast" if !rest.is_empty() => ConsoleCommand::Broadcast {
                content: payload_value(rest),
            },
            "/broadcast" => return Err("usage: /broadcast <json|text>".into()),
            other => {
                return Err(format!(
                    "Unknown command: {other}\nType '/help' for available commands"
                ))
            }
        };
        Ok(Some(command))
    }
}

fn single_word(rest: &str, usage: &str) -> Result<String, String> {
    match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
        [word] => Ok((*word).to_string()),
        _ => Err(usage.to_string()),
    }
}

/// JSON if it parses, otherwise the raw text as a string.
fn payload_value(raw: &str) -> Value {
    let raw = raw.trim();
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
