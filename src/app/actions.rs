use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Viewer commands reachable from the main view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    ScrollLeft,
    ScrollRight,
    PageLeft,
    PageRight,
    ZoomIn,
    ZoomOut,
    FitAll,
    JumpStart,
    JumpEnd,
    SelectNext,
    SelectPrevious,
    OpenDetail,
    OpenTagFilter,
    ClearSelection,
}

pub fn action_for_key(key: KeyEvent) -> Option<Action> {
    let plain = !key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('q') if plain => Some(Action::Quit),
        KeyCode::Char('h') | KeyCode::Left if plain => Some(Action::ScrollLeft),
        KeyCode::Char('l') | KeyCode::Right if plain => Some(Action::ScrollRight),
        KeyCode::Char('H') | KeyCode::PageUp => Some(Action::PageLeft),
        KeyCode::Char('L') | KeyCode::PageDown => Some(Action::PageRight),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::ZoomIn),
        KeyCode::Char('-') => Some(Action::ZoomOut),
        KeyCode::Char('0') => Some(Action::FitAll),
        KeyCode::Char('g') | KeyCode::Home if plain => Some(Action::JumpStart),
        KeyCode::Char('G') | KeyCode::End => Some(Action::JumpEnd),
        KeyCode::Tab => Some(Action::SelectNext),
        KeyCode::BackTab => Some(Action::SelectPrevious),
        KeyCode::Enter => Some(Action::OpenDetail),
        KeyCode::Char('f') if plain => Some(Action::OpenTagFilter),
        KeyCode::Esc => Some(Action::ClearSelection),
        _ => None,
    }
}
