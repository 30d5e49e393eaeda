//! Conversion of Socket Mode push events into dispatchable command events.

use slack_morphism::prelude::{SlackEventCallbackBody, SlackPushEventCallback};
use tracing::debug;

use crate::dispatch::CommandEvent;

/// Reduce a push event to a [`CommandEvent`] if it is a plain user message.
///
/// Bot-authored messages, message subtypes (edits, deletions, joins), and
/// events missing a user, channel, or text are ignored so the dispatch loop
/// only ever sees ordinary chat messages.
#[must_use]
pub fn command_event(push: SlackPushEventCallback) -> Option<CommandEvent> {
    let SlackEventCallbackBody::Message(message) = push.event else {
        debug!("non-message push event ignored");
        return None;
    };

    if message.sender.bot_id.is_some() || message.subtype.is_some() {
        return None;
    }

    let user = message.sender.user?;
    let channel = message.origin.channel?;
    let text = message.content.and_then(|content| content.text)?;
    if text.trim().is_empty() {
        return None;
    }

    Some(CommandEvent {
        user,
        channel,
        ts: message.origin.ts,
        text,
    })
}
