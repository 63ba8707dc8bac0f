//! Terminal palette for the portal CLI.
//!
//! Rendering code asks for styles by meaning (`status`, `time`, `code`) and never
//! picks colors itself. `console` drops the escape codes when stdout is not a
//! terminal, so piped output stays plain.

use console::Style;
use once_cell::sync::Lazy;
use portalapp::commands::MessageLevel;
use portalapp::model::Status;

pub struct Palette {
    pub regular: Style,
    pub muted: Style,
    pub faint: Style,
    pub title: Style,
    pub time: Style,
    pub code: Style,
    pub upload: Style,
    pub favorite: Style,
    pub error: Style,
    pub warning: Style,
    pub success: Style,
    pub info: Style,
    pub approved: Style,
    pub draft: Style,
    pub obsolete: Style,
}

impl Palette {
    pub fn message(&self, level: MessageLevel) -> &Style {
        match level {
            MessageLevel::Error => &self.error,
            MessageLevel::Warning => &self.warning,
            MessageLevel::Success => &self.success,
            MessageLevel::Info => &self.info,
        }
    }

    pub fn status(&self, status: Status) -> &Style {
        match status {
            Status::Approved => &self.approved,
            Status::Draft => &self.draft,
            Status::Obsolete => &self.obsolete,
        }
    }
}

pub static PALETTE: Lazy<Palette> = Lazy::new(|| {
    let muted = Style::new().color256(246);
    Palette {
        regular: Style::new(),
        faint: Style::new().color256(241),
        title: Style::new().bold(),
        time: muted.clone().italic(),
        code: Style::new().color256(178).bold(),
        upload: Style::new().cyan(),
        favorite: Style::new().color256(220),
        error: Style::new().red().bold(),
        warning: Style::new().yellow().bold(),
        success: Style::new().green(),
        info: muted.clone(),
        approved: Style::new().green(),
        draft: Style::new().yellow(),
        obsolete: Style::new().red().dim(),
        muted,
    }
});
