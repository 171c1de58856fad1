use crate::engine::{ItemId, SelectionOrigin};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilterOverlay {
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailOverlay {
    pub item: ItemId,
    /// Screen cell the selection came from; `None` centers the popup.
    pub anchor: Option<(u16, u16)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayState {
    TagFilter(TagFilterOverlay),
    Detail(DetailOverlay),
}

/// Pointer drag in progress, in screen columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragState {
    pub last_column: u16,
    pub moved: bool,
}

/// Viewer state that is not owned by the engine.
#[derive(Debug, Clone)]
pub struct AppState {
    pub title: String,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
    pub drag: Option<DragState>,
}

impl AppState {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status_message: None,
            overlay: None,
            drag: None,
        }
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn open_tag_filter(&mut self) {
        self.overlay = Some(OverlayState::TagFilter(TagFilterOverlay { cursor: 0 }));
    }

    pub fn open_detail(&mut self, item: ItemId, origin: SelectionOrigin) {
        let anchor = match origin {
            SelectionOrigin::Pointer { x, y } => Some((to_cell(x), to_cell(y))),
            SelectionOrigin::Keyboard => None,
        };
        self.overlay = Some(OverlayState::Detail(DetailOverlay { item, anchor }));
    }

    pub fn tag_filter_mut(&mut self) -> Option<&mut TagFilterOverlay> {
        match self.overlay.as_mut() {
            Some(OverlayState::TagFilter(overlay)) => Some(overlay),
            _ => None,
        }
    }

    /// Moves the filter cursor within `len` entries, wrapping at both ends.
    pub fn move_tag_cursor(&mut self, delta: isize, len: usize) {
        if let Some(overlay) = self.tag_filter_mut() {
            if len == 0 {
                overlay.cursor = 0;
                return;
            }
            let len = len as isize;
            let next = (overlay.cursor as isize + delta).rem_euclid(len);
            overlay.cursor = next as usize;
        }
    }
}

fn to_cell(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, u16::MAX as f64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn tag_cursor_wraps() {
        let mut state = AppState::new("Demo Timeline");
        state.open_tag_filter();
        state.move_tag_cursor(-1, 3);
        assert_matches!(state.overlay(), Some(OverlayState::TagFilter(TagFilterOverlay { cursor: 2 })));
        state.move_tag_cursor(1, 3);
        assert_matches!(state.overlay(), Some(OverlayState::TagFilter(TagFilterOverlay { cursor: 0 })));
    }

    #[test]
    fn pointer_selection_anchors_detail() {
        let mut state = AppState::new("Demo Timeline");
        state.open_detail(ItemId::new("x"), SelectionOrigin::Pointer { x: 12.4, y: 7.0 });
        assert_matches!(
            state.overlay(),
            Some(OverlayState::Detail(DetailOverlay { anchor: Some((12, 7)), .. }))
        );
        state.open_detail(ItemId::new("x"), SelectionOrigin::Keyboard);
        assert_matches!(
            state.overlay(),
            Some(OverlayState::Detail(DetailOverlay { anchor: None, .. }))
        );
    }
}
