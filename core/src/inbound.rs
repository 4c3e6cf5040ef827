//! Inbound WhatsApp commands.
//!
//! Subscription keywords update the store; a message starting with the news
//! prefix is broadcast to everyone through the same pipeline as scheduled runs.
//! The pipeline runs in the background: the sender gets an immediate receipt,
//! and the final result arrives later through the [`Notifier`].

use crate::capabilities::{Notifier, SubscriptionStore};
use crate::service::BroadcastService;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const NEWS_PREFIX: &str = "malaria news update";

const UNSUBSCRIBE_WORDS: &[&str] = &["STOP", "STOPALL", "UNSUBSCRIBE", "CANCEL", "END", "QUIT"];
const SUBSCRIBE_WORDS: &[&str] = &["START", "UNSTOP", "JOIN"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    Unsubscribe,
    Subscribe,
    /// Text after the news prefix, trimmed; may be empty
    NewsUpdate(String),
    Chatter,
}

pub fn parse_command(body: &str) -> InboundCommand {
    let body = body.trim();
    let upper = body.to_uppercase();
    if UNSUBSCRIBE_WORDS.contains(&upper.as_str()) {
        return InboundCommand::Unsubscribe;
    }
    if SUBSCRIBE_WORDS.contains(&upper.as_str()) {
        return InboundCommand::Subscribe;
    }
    match body.get(..NEWS_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(NEWS_PREFIX) => {
            InboundCommand::NewsUpdate(body[NEWS_PREFIX.len()..].trim().to_string())
        }
        _ => InboundCommand::Chatter,
    }
}

pub const RECEIVED_REPLY: &str =
    "Thank you. Your update was received and is being broadcast; we will confirm when it is done.";

pub struct InboundHandler {
    store: Arc<dyn SubscriptionStore>,
    service: Arc<BroadcastService>,
    notifier: Option<Arc<dyn Notifier>>,
    app_name: String,
}

impl InboundHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, service: Arc<BroadcastService>) -> Self {
        Self {
            store,
            service,
            notifier: None,
            app_name: "MalariaPHIS-Hausa".to_string(),
        }
    }

    /// Where the outcome of a news update is reported back to its sender
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Apply one inbound message and return the reply for the sender
    pub async fn handle(&self, sender: &str, body: &str) -> String {
        let command = parse_command(body);
        info!(target: "inbound", sender = %sender, command = ?command, "Inbound message");

        match command {
            InboundCommand::Unsubscribe => {
                if let Err(e) = self.store.mark_unsubscribed(sender).await {
                    warn!(target: "inbound", sender = %sender, error = %e, "Failed to unsubscribe");
                    return "Sorry, we could not process your request. Please try again.".into();
                }
                "You have been unsubscribed.".into()
            }
            InboundCommand::Subscribe => {
                if let Err(e) = self.store.record_activity(sender).await {
                    warn!(target: "inbound", sender = %sender, error = %e, "Failed to subscribe");
                    return "Sorry, we could not process your request. Please try again.".into();
                }
                format!("Welcome! You are now subscribed to {} updates.", self.app_name)
            }
            InboundCommand::NewsUpdate(content) => {
                self.touch(sender).await;
                if content.is_empty() {
                    return format!("Please provide the news content after '{}'.", NEWS_PREFIX);
                }
                self.spawn_update(sender, content);
                RECEIVED_REPLY.into()
            }
            InboundCommand::Chatter => {
                self.touch(sender).await;
                "OK".into()
            }
        }
    }

    /// Run the user broadcast off the request path and acknowledge it when done
    pub fn spawn_update(&self, sender: &str, content: String) -> JoinHandle<String> {
        let service = Arc::clone(&self.service);
        let notifier = self.notifier.clone();
        let sender = sender.to_string();
        tokio::spawn(async move {
            let outcome = service.run_user(&content, &sender).await;
            let ack = if outcome.success() {
                "Your update has been broadcast to subscribers.".to_string()
            } else {
                format!(
                    "Your update could not be broadcast (failed at {}). Please try again later.",
                    outcome.stage_reached()
                )
            };
            match notifier {
                Some(notifier) => {
                    if let Err(e) = notifier.notify(&sender, &ack).await {
                        warn!(target: "inbound", sender = %sender, error = %e, "Acknowledgment not sent");
                    }
                }
                None => debug!(target: "inbound", sender = %sender, "No notifier; acknowledgment dropped"),
            }
            ack
        })
    }

    async fn touch(&self, sender: &str) {
        if let Err(e) = self.store.record_activity(sender).await {
            warn!(target: "inbound", sender = %sender, error = %e, "Failed to record activity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_keywords() {
        assert_eq!(parse_command("stop"), InboundCommand::Unsubscribe);
        assert_eq!(parse_command("  Quit "), InboundCommand::Unsubscribe);
        assert_eq!(parse_command("STOPALL"), InboundCommand::Unsubscribe);
        assert_eq!(parse_command("start"), InboundCommand::Subscribe);
        assert_eq!(parse_command("Join"), InboundCommand::Subscribe);
    }

    #[test]
    fn test_news_prefix() {
        assert_eq!(
            parse_command("Malaria News Update  Free nets at the clinic on Monday"),
            InboundCommand::NewsUpdate("Free nets at the clinic on Monday".into())
        );
        assert_eq!(
            parse_command("malaria news update"),
            InboundCommand::NewsUpdate(String::new())
        );
    }

    #[test]
    fn test_chatter() {
        assert_eq!(parse_command("hello"), InboundCommand::Chatter);
        assert_eq!(parse_command("stop please"), InboundCommand::Chatter);
        assert_eq!(parse_command("ƙƙƙ"), InboundCommand::Chatter);
        assert_eq!(parse_command(""), InboundCommand::Chatter);
    }
}
