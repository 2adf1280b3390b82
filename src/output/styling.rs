use std::fmt::Display;

use console::{style, StyledObject};

/// Terminal styles, named by the role the text plays.
pub fn title(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

pub fn heading(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn label(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn name(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

/// Counts, and phases still in progress.
pub fn highlight(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn done(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}
