//! WebSocket client session management.

use futures_util::{SinkExt, StreamExt};
use lounge_server::{infrastructure::dto::websocket::InboundChatFrame, ui::CLOSE_AUTH_FAILED};
use lounge_shared::time::get_utc_timestamp;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use super::{error::ClientError, formatter::MessageFormatter, ui::redisplay_prompt};

/// Where to connect and as whom
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, e.g. `ws://127.0.0.1:8080`
    pub url: String,
    pub room: String,
    /// Access token sent as the `token` query parameter
    pub token: String,
    /// Author id put into every outbound frame
    pub user_id: i64,
}

impl ClientConfig {
    pub fn chat_url(&self) -> String {
        format!(
            "{}/ws/chat/{}/?token={}",
            self.url.trim_end_matches('/'),
            self.room,
            self.token
        )
    }

    fn prompt(&self) -> String {
        format!("{}> ", self.room)
    }
}

/// Run the WebSocket client session until the user exits or the connection
/// ends.
pub async fn run_client_session(config: &ClientConfig) -> Result<(), ClientError> {
    let (ws_stream, _response) = connect_async(config.chat_url())
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;

    tracing::info!("Connected to chat server!");
    println!(
        "\nYou are in room '{}'. Type messages and press Enter to send. Press Ctrl+C to exit.\n",
        config.room
    );

    let (mut write, mut read) = ws_stream.split();
    let prompt = config.prompt();

    // Spawn a task to handle incoming messages
    let prompt_for_read = prompt.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    print!("{}", MessageFormatter::format_frame(text.as_str()));
                    redisplay_prompt(&prompt_for_read);
                }
                Ok(Message::Binary(data)) => {
                    print!("{}", MessageFormatter::format_binary_message(data.len()));
                    redisplay_prompt(&prompt_for_read);
                }
                Ok(Message::Close(frame)) => {
                    let code = frame.as_ref().map(|frame| u16::from(frame.code));
                    tracing::info!("Server closed the connection (code {:?})", code);
                    if code == Some(CLOSE_AUTH_FAILED) {
                        let reason = frame
                            .map(|frame| frame.reason.as_str().to_string())
                            .unwrap_or_default();
                        return Err(ClientError::AuthenticationFailed(reason));
                    }
                    return Err(ClientError::ConnectionLost { code });
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    return Err(ClientError::ConnectionLost { code: None });
                }
                _ => {}
            }
        }

        Err::<(), _>(ClientError::ConnectionLost { code: None })
    });

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let prompt_for_readline = prompt.clone();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt_for_readline) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            // Channel closed, exit thread
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    // Spawn a task to handle stdin input and send to WebSocket
    let user_id = config.user_id;
    let mut write_task = tokio::spawn(async move {
        while let Some(line) = input_rx.recv().await {
            let frame = InboundChatFrame {
                message: line,
                user_id,
            };

            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                    continue;
                }
            };

            if let Err(e) = write.send(Message::Text(json.into())).await {
                tracing::warn!("Failed to send message: {}", e);
                return Err(ClientError::ConnectionLost { code: None });
            }

            print!("\n{}", MessageFormatter::format_sent_confirmation(get_utc_timestamp()));
            redisplay_prompt(&prompt);
        }

        // Input ended (Ctrl+C / Ctrl+D): leave the room cleanly
        let _ = write.send(Message::Close(None)).await;
        Ok(())
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        read_result = &mut read_task => {
            write_task.abort();
            read_result.unwrap_or(Err(ClientError::ConnectionLost { code: None }))
        }
        write_result = &mut write_task => {
            read_task.abort();
            write_result.unwrap_or(Err(ClientError::ConnectionLost { code: None }))
        }
    }
}
