//! Slack Block Kit message builders.

use slack_morphism::prelude::{SlackBlock, SlackBlockText, SlackSectionBlock};

/// Build a plain markdown section block.
#[must_use]
pub fn text_section(message: &str) -> SlackBlock {
    SlackBlock::Section(
        SlackSectionBlock::new().with_text(SlackBlockText::MarkDown(message.to_owned().into())),
    )
}

/// Build the startup announcement listing the supported commands.
#[must_use]
pub fn command_menu_blocks(menu: &[(&str, &str)]) -> Vec<SlackBlock> {
    let mut blocks = vec![text_section(
        ":tomato: *Pomodoro timer is online.* Send one of:",
    )];

    for (command, description) in menu {
        blocks.push(text_section(&format!("`{command}`: {description}")));
    }

    blocks
}
