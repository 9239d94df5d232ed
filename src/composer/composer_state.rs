use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use utoipa::ToSchema;

/// How long the typing flag stays up after the last keystroke.
pub const TYPING_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ComposerView {
    pub text: String,
    pub cursor: Option<usize>,
    pub emoji_picker_open: bool,
    pub attach_menu_open: bool,
    pub is_typing: bool,
}

/// Draft text and menu state of the message composer. The typing flag is
/// local to this client and never leaves it.
#[derive(Debug, Default)]
pub struct ComposerState {
    text: String,
    cursor: Option<usize>,
    emoji_picker_open: bool,
    attach_menu_open: bool,
    typing_until: Option<Instant>,
}

impl ComposerState {
    pub fn input(&mut self, text: String) {
        self.cursor = None;
        self.text = text;
        self.typing_until = Some(Instant::now() + TYPING_DEBOUNCE);
    }

    pub fn is_typing(&self) -> bool {
        self.typing_until
            .is_some_and(|deadline| Instant::now() < deadline)
    }

    pub fn toggle_emoji_picker(&mut self) {
        self.emoji_picker_open = !self.emoji_picker_open;
    }

    pub fn toggle_attach_menu(&mut self) {
        self.attach_menu_open = !self.attach_menu_open;
    }

    /// Inserts at a character position (end of text when absent or past the
    /// end), closes the picker and leaves the cursor after the emoji.
    pub fn insert_emoji(&mut self, emoji: &str, cursor: Option<usize>) -> usize {
        let len = self.text.chars().count();
        let at = cursor.unwrap_or(len).min(len);
        let byte = self
            .text
            .char_indices()
            .nth(at)
            .map(|(index, _)| index)
            .unwrap_or(self.text.len());

        self.text.insert_str(byte, emoji);
        self.emoji_picker_open = false;

        let next = at + emoji.chars().count();
        self.cursor = Some(next);
        next
    }

    /// Attachments are not uploaded anywhere; picking one only closes the menu.
    pub fn choose_attachment(&mut self, kind: AttachmentKind) {
        tracing::debug!(?kind, "attachment chosen");
        self.attach_menu_open = false;
    }

    /// Takes the draft for sending, clearing it and the typing flag. Blank
    /// drafts stay put and yield nothing.
    pub fn take_message(&mut self) -> Option<String> {
        if self.text.trim().is_empty() {
            return None;
        }
        self.cursor = None;
        self.typing_until = None;
        Some(std::mem::take(&mut self.text))
    }

    pub fn view(&self) -> ComposerView {
        ComposerView {
            text: self.text.clone(),
            cursor: self.cursor,
            emoji_picker_open: self.emoji_picker_open,
            attach_menu_open: self.attach_menu_open,
            is_typing: self.is_typing(),
        }
    }
}
