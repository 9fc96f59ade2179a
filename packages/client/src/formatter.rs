//! Message formatting utilities for client display.

use lounge_server::infrastructure::dto::websocket::OutboundFrame;
use lounge_shared::time::timestamp_to_clock_time;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format any text frame received from the server.
    ///
    /// Frames that are not part of the protocol are shown raw.
    pub fn format_frame(text: &str) -> String {
        match OutboundFrame::decode(text) {
            Ok(OutboundFrame::Chat(chat)) => Self::format_chat_message(&chat.username, &chat.message),
            Ok(OutboundFrame::OnlineUsersCount(frame)) => Self::format_online_users_count(frame.count),
            Err(_) => Self::format_raw_message(text),
        }
    }

    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `username` - The sender's username
    /// * `message` - The message content
    pub fn format_chat_message(username: &str, message: &str) -> String {
        format!("\n[{}] {}\n", username, message)
    }

    pub fn format_online_users_count(count: u64) -> String {
        format!("\n* {} online\n", count)
    }

    /// Format a confirmation message after sending
    ///
    /// # Arguments
    ///
    /// * `sent_at` - Unix timestamp when the message was sent (milliseconds)
    pub fn format_sent_confirmation(sent_at: i64) -> String {
        format!("sent at {}\n", timestamp_to_clock_time(sent_at))
    }

    pub fn format_binary_message(byte_count: usize) -> String {
        format!("\n← Received {} bytes of binary data\n", byte_count)
    }

    /// Format a raw text message (when parsing fails)
    pub fn format_raw_message(text: &str) -> String {
        format!("\n← Received: {}\n", text)
    }
}
