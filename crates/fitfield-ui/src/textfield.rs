use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use fitfield_core::{Color, Size, UiQueue};

use crate::editor::LiveEditor;

/// Default font pixel size when the host sets none.
pub const TF_FONT_PX: f32 = 16.0;

/// Seam between the widget and the text stack, so tests can measure with a
/// deterministic fixed advance instead of system fonts.
pub trait Measure {
    /// Single-line advance width; wrapping never applies.
    fn line_width(&self, text: &str, px: f32) -> f32;
    /// Default single-line height for the font size.
    fn line_height(&self, px: f32) -> f32;
}

/// Production measurer backed by the shared shaping engine.
pub struct EngineMeasure;

impl Measure for EngineMeasure {
    fn line_width(&self, text: &str, px: f32) -> f32 {
        fitfield_text::line_width(text, px)
    }

    fn line_height(&self, px: f32) -> f32 {
        fitfield_text::line_height(px)
    }
}

/// A single-line text field whose preferred width tracks its content.
///
/// The field caches the last measured content size and the placeholder size,
/// and recomputes its preferred size whenever content, placeholder, or
/// editing state changes. Editing is an explicit state entered on user intent
/// (double-click, force click, `begin_editing`) and left asynchronously: the
/// flip back to idle is posted to the host's `UiQueue` because the host
/// toolkit may still be unwinding its edit-session teardown when the trigger
/// arrives.
pub struct FittingTextField {
    content: String,
    placeholder: Option<String>,
    font_px: f32,
    text_color: Color,

    editable: bool,
    is_editing: bool,
    wants_focus: bool,

    placeholder_size: Option<Size>,
    last_content_size: Size,
    editor: Option<LiveEditor>,

    // Bumped by every begin_editing; a deferred teardown only applies while
    // the epoch it captured is still current (last-writer-wins).
    edit_epoch: u64,

    measure: Rc<dyn Measure>,
    on_commit: Option<Rc<dyn Fn(String)>>,
    on_editing_ended: Option<Rc<dyn Fn()>>,
}

impl FittingTextField {
    pub fn new() -> Self {
        Self::with_measure(Rc::new(EngineMeasure))
    }

    pub fn with_measure(measure: Rc<dyn Measure>) -> Self {
        Self {
            content: String::new(),
            placeholder: None,
            font_px: TF_FONT_PX,
            text_color: Color::BLACK,
            editable: false,
            is_editing: false,
            wants_focus: false,
            placeholder_size: None,
            last_content_size: Size::default(),
            editor: None,
            edit_epoch: 0,
            measure,
            on_commit: None,
            on_editing_ended: None,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    pub fn is_editing(&self) -> bool {
        self.is_editing
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn font_px(&self) -> f32 {
        self.font_px
    }

    pub fn last_content_size(&self) -> Size {
        self.last_content_size
    }

    pub fn placeholder_size(&self) -> Option<Size> {
        self.placeholder_size
    }

    /// The live edit-session text, if a session is attached.
    pub fn live_text(&self) -> Option<&str> {
        self.editor.as_ref().map(|e| e.buffer())
    }

    pub fn editor(&self) -> Option<&LiveEditor> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut LiveEditor> {
        self.editor.as_mut()
    }

    pub fn set_font_px(&mut self, px: f32) {
        self.font_px = px;
        // Cached sizes were measured with the old font.
        if !self.is_editing {
            let content = self.content.clone();
            self.last_content_size = self.measure_size(&content).ceiled();
        }
        if let Some(p) = self.placeholder.clone() {
            self.placeholder_size = Some(self.measure_size(&p).ceiled());
        }
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.text_color = color;
    }

    pub fn set_on_commit(&mut self, cb: impl Fn(String) + 'static) {
        self.on_commit = Some(Rc::new(cb));
    }

    /// Host hook fired after a deferred end-editing completes; the host
    /// releases focus here.
    pub fn set_on_editing_ended(&mut self, cb: impl Fn() + 'static) {
        self.on_editing_ended = Some(Rc::new(cb));
    }

    /// Store new content. Outside an edit session the content size cache is
    /// refreshed immediately; during one, the live measurement path owns it.
    pub fn set_content(&mut self, text: impl Into<String>) {
        self.content = text.into();
        if self.is_editing {
            return;
        }
        let content = self.content.clone();
        self.last_content_size = self.measure_size(&content).ceiled();
        log::trace!(
            "field: content set, cached size {:?}",
            self.last_content_size
        );
    }

    pub fn set_placeholder(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.placeholder_size = Some(self.measure_size(&text).ceiled());
        self.placeholder = Some(text);
    }

    /// Enter editing: attach a live editor seeded with the content, mark the
    /// field editable, and raise a focus request for the host to grant.
    ///
    /// The caret is recolored transparent until the next content measurement
    /// restores it; otherwise the toolkit draws it at the pre-reflow
    /// position. Calling this while a deferred end-editing is pending cancels
    /// that teardown.
    pub fn begin_editing(&mut self) {
        self.edit_epoch += 1;
        if self.is_editing {
            return;
        }
        log::debug!("field: begin editing");
        self.is_editing = true;
        self.editable = true;
        self.wants_focus = true;

        let mut editor = LiveEditor::new(self.content.clone());
        editor.set_caret_color(Color::TRANSPARENT);
        self.editor = Some(editor);
    }

    /// True once per granted request; the host polls this after dispatch and
    /// moves input focus to the field.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.wants_focus)
    }

    /// Preferred size reported to the host layout pass.
    ///
    /// Idle fields answer from the caches; an attached edit session is
    /// measured live, with the result ceil-rounded and cached. Measuring
    /// non-empty live text also restores the caret color hidden by
    /// [`begin_editing`](Self::begin_editing).
    pub fn intrinsic_size(&mut self) -> Size {
        let height = self.measure.line_height(self.font_px).ceil();
        // While an edit session is attached its buffer is the field's current
        // text; the committed content is stale until the session ends.
        let text_is_empty = match self.editor.as_ref() {
            Some(ed) if self.is_editing => ed.is_empty(),
            _ => self.content.is_empty(),
        };
        let min_width = if text_is_empty {
            self.placeholder_size.map_or(0.0, |s| s.width)
        } else {
            self.last_content_size.width
        };
        let min = Size::new(min_width.ceil(), height);

        if !self.is_editing {
            return min;
        }
        let text_color = self.text_color;
        let font_px = self.font_px;
        let Some(editor) = self.editor.as_mut() else {
            return min;
        };

        if editor.is_empty() {
            self.last_content_size = min;
            return min;
        }

        editor.set_caret_color(text_color);

        let width = self.measure.line_width(editor.buffer(), font_px).ceil();
        let size = Size::new(width, height);
        self.last_content_size = size;
        size
    }

    // -- live editor routing (host-invoked while editing) --

    pub fn insert_text(&mut self, text: &str) {
        if let Some(ed) = self.editor.as_mut() {
            ed.insert_text(text);
        }
    }

    pub fn delete_backward(&mut self) {
        if let Some(ed) = self.editor.as_mut() {
            ed.delete_backward();
        }
    }

    pub fn delete_forward(&mut self) {
        if let Some(ed) = self.editor.as_mut() {
            ed.delete_forward();
        }
    }

    pub fn move_cursor(&mut self, delta: isize, extend_selection: bool) {
        if let Some(ed) = self.editor.as_mut() {
            ed.move_cursor(delta, extend_selection);
        }
    }

    pub fn set_composition(&mut self, text: String, cursor: Option<(usize, usize)>) {
        if let Some(ed) = self.editor.as_mut() {
            ed.set_composition(text, cursor);
        }
    }

    pub fn commit_composition(&mut self, text: String) {
        if let Some(ed) = self.editor.as_mut() {
            ed.commit_composition(text);
        }
    }

    pub fn cancel_composition(&mut self) {
        if let Some(ed) = self.editor.as_mut() {
            ed.cancel_composition();
        }
    }

    // -- internals --

    fn measure_size(&self, text: &str) -> Size {
        Size::new(
            self.measure.line_width(text, self.font_px),
            self.measure.line_height(self.font_px),
        )
    }

    fn commit_live_buffer(&mut self) {
        let Some(editor) = self.editor.as_ref() else {
            return;
        };
        let text = editor.buffer().to_string();
        self.content = text.clone();
        self.last_content_size = self.measure_size(&text).ceiled();
        if let Some(cb) = &self.on_commit {
            cb(text);
        }
    }

    fn finish_end_editing(&mut self) -> Option<Rc<dyn Fn()>> {
        log::debug!("field: end editing complete");
        self.is_editing = false;
        self.editable = false;
        self.editor = None;
        self.on_editing_ended.clone()
    }
}

impl Default for FittingTextField {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle the host keeps; cheap to clone into gesture callbacks and
/// deferred tasks.
#[derive(Clone)]
pub struct FieldHandle(Rc<RefCell<FittingTextField>>);

impl FieldHandle {
    pub fn new(field: FittingTextField) -> Self {
        Self(Rc::new(RefCell::new(field)))
    }

    pub fn field(&self) -> Ref<'_, FittingTextField> {
        self.0.borrow()
    }

    pub fn field_mut(&self) -> RefMut<'_, FittingTextField> {
        self.0.borrow_mut()
    }

    pub fn begin_editing(&self) {
        self.0.borrow_mut().begin_editing();
    }

    /// End the edit session: the live buffer is committed now, but the state
    /// flip back to idle runs after the current event dispatch completes.
    /// The toolkit is often mid-way through tearing the session down when the
    /// trigger (Escape, outside click, Return) arrives, and flipping
    /// synchronously there leaves the field in an inconsistent editable
    /// state.
    pub fn end_editing(&self, queue: &UiQueue) {
        let epoch = {
            let mut f = self.0.borrow_mut();
            if !f.is_editing {
                return;
            }
            f.commit_live_buffer();
            f.edit_epoch
        };
        log::debug!("field: end editing requested, flip deferred");

        let field = Rc::clone(&self.0);
        queue.post(move || {
            let ended = {
                let mut f = field.borrow_mut();
                if f.edit_epoch != epoch {
                    log::debug!("field: pending end-editing superseded by a new session");
                    return;
                }
                f.finish_end_editing()
            };
            // Invoked outside the borrow: the host may call back into the field.
            if let Some(cb) = ended {
                cb();
            }
        });
    }

    pub fn intrinsic_size(&self) -> Size {
        self.0.borrow_mut().intrinsic_size()
    }

    pub fn is_editing(&self) -> bool {
        self.0.borrow().is_editing
    }

    pub fn is_editable(&self) -> bool {
        self.0.borrow().editable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic measurer: every grapheme-ish char advances by a fixed
    /// fractional width so ceil-rounding is actually exercised.
    struct FixedAdvance {
        advance: f32,
    }

    impl Measure for FixedAdvance {
        fn line_width(&self, text: &str, _px: f32) -> f32 {
            text.chars().count() as f32 * self.advance
        }

        fn line_height(&self, px: f32) -> f32 {
            px * 1.25
        }
    }

    fn field() -> FittingTextField {
        FittingTextField::with_measure(Rc::new(FixedAdvance { advance: 7.3 }))
    }

    const H: f32 = 20.0; // ceil(16.0 * 1.25)

    #[test]
    fn test_placeholder_drives_size_when_content_empty() {
        let mut f = field();
        f.set_placeholder("Search…");
        // 7 chars * 7.3 = 51.1 -> 52
        assert_eq!(f.placeholder_size(), Some(Size::new(52.0, H)));
        assert_eq!(f.intrinsic_size(), Size::new(52.0, H));
    }

    #[test]
    fn test_set_content_updates_cache_immediately_when_idle() {
        let mut f = field();
        f.set_content("Hello");
        // 5 * 7.3 = 36.5 -> 37
        assert_eq!(f.last_content_size(), Size::new(37.0, H));
        assert_eq!(f.intrinsic_size(), Size::new(37.0, H));
    }

    #[test]
    fn test_intrinsic_size_is_idempotent() {
        let mut f = field();
        f.set_placeholder("Search…");
        f.set_content("Hello");
        let a = f.intrinsic_size();
        let b = f.intrinsic_size();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_placeholder_no_content_measures_zero_width() {
        let mut f = field();
        assert_eq!(f.intrinsic_size(), Size::new(0.0, H));
    }

    #[test]
    fn test_set_content_while_editing_leaves_cache_alone() {
        let mut f = field();
        f.set_content("Hi");
        let cached = f.last_content_size();

        f.begin_editing();
        f.set_content("a much longer replacement");
        assert_eq!(f.last_content_size(), cached);
    }

    #[test]
    fn test_live_measurement_caches_and_grows() {
        let mut f = field();
        f.begin_editing();
        f.insert_text("Hello");
        // 5 * 7.3 = 36.5 -> 37
        assert_eq!(f.intrinsic_size(), Size::new(37.0, H));
        assert_eq!(f.last_content_size(), Size::new(37.0, H));

        f.insert_text("!");
        // 6 * 7.3 = 43.8 -> 44
        assert_eq!(f.intrinsic_size(), Size::new(44.0, H));
    }

    #[test]
    fn test_cleared_live_buffer_collapses_to_cached_minimum() {
        let mut f = field();
        f.set_placeholder("Search…");
        f.begin_editing();
        f.insert_text("query");
        f.intrinsic_size();

        for _ in 0.."query".len() {
            f.delete_backward();
        }
        let min = f.intrinsic_size();
        assert_eq!(min, Size::new(52.0, H));
        assert_eq!(f.last_content_size(), min);
    }

    #[test]
    fn test_clearing_session_seeded_with_content_collapses_to_placeholder() {
        let mut f = field();
        f.set_placeholder("Search…");
        // 19 chars * 7.3 = 138.7 -> 139, well past the placeholder's 52
        f.set_content("longer initial text");
        assert_eq!(f.intrinsic_size(), Size::new(139.0, H));

        f.begin_editing();
        if let Some(ed) = f.editor_mut() {
            ed.select_all();
            ed.delete_backward();
        }

        // The stale committed content must not hold the width up.
        let min = f.intrinsic_size();
        assert_eq!(min, Size::new(52.0, H));
        assert_eq!(f.last_content_size(), min);
    }

    #[test]
    fn test_caret_hidden_until_first_live_measurement() {
        let mut f = field();
        f.set_text_color(Color::BLACK);
        f.begin_editing();
        assert!(f.editor().unwrap().caret_color().is_transparent());

        // Empty buffer: minimum path, caret stays parked
        f.intrinsic_size();
        assert!(f.editor().unwrap().caret_color().is_transparent());

        f.insert_text("x");
        f.intrinsic_size();
        assert_eq!(f.editor().unwrap().caret_color(), Color::BLACK);
    }

    #[test]
    fn test_begin_editing_requests_focus_once() {
        let mut f = field();
        f.begin_editing();
        assert!(f.take_focus_request());
        assert!(!f.take_focus_request());
    }

    #[test]
    fn test_end_editing_flips_state_on_next_turn() {
        use std::cell::Cell;

        let queue = UiQueue::new();
        let handle = FieldHandle::new(field());
        let focus_released = Rc::new(Cell::new(false));
        {
            let released = focus_released.clone();
            handle
                .field_mut()
                .set_on_editing_ended(move || released.set(true));
        }

        handle.begin_editing();
        handle.field_mut().insert_text("typed");
        handle.end_editing(&queue);

        // Synchronously after the call the session is still winding down.
        assert!(handle.is_editing());
        assert_eq!(handle.field().content(), "typed");
        assert!(!focus_released.get());

        queue.drain();
        assert!(!handle.is_editing());
        assert!(!handle.is_editable());
        assert!(handle.field().editor().is_none());
        assert!(focus_released.get());
    }

    #[test]
    fn test_commit_fires_on_commit_callback() {
        use std::cell::RefCell;

        let queue = UiQueue::new();
        let handle = FieldHandle::new(field());
        let committed = Rc::new(RefCell::new(None));
        {
            let committed = committed.clone();
            handle
                .field_mut()
                .set_on_commit(move |text| *committed.borrow_mut() = Some(text));
        }

        handle.begin_editing();
        handle.field_mut().insert_text("done");
        handle.end_editing(&queue);
        assert_eq!(committed.borrow().as_deref(), Some("done"));
    }

    #[test]
    fn test_begin_during_pending_end_cancels_teardown() {
        let queue = UiQueue::new();
        let handle = FieldHandle::new(field());

        handle.begin_editing();
        handle.end_editing(&queue);

        // A new double-click lands before the deferred flip runs.
        handle.begin_editing();
        queue.drain();

        // Last writer wins: the field is still editing.
        assert!(handle.is_editing());
        assert!(handle.is_editable());
        assert!(handle.field().editor().is_some());
    }

    #[test]
    fn test_end_editing_while_idle_is_a_no_op() {
        let queue = UiQueue::new();
        let handle = FieldHandle::new(field());
        handle.end_editing(&queue);
        assert!(queue.is_empty());
        assert!(!handle.is_editing());
    }

    #[test]
    fn test_font_change_remeasures_caches() {
        let mut f = field();
        f.set_placeholder("ab");
        f.set_content("abc");
        f.set_font_px(32.0);
        // FixedAdvance ignores px for width, but height doubles: 32 * 1.25
        assert_eq!(f.intrinsic_size().height, 40.0);
    }

    #[test]
    fn test_double_click_gesture_starts_editing() {
        use crate::gestures::{GestureArena, MULTI_CLICK_WINDOW};
        use fitfield_core::Vec2;
        use fitfield_core::input::{
            Modifiers, PointerButton, PointerEvent, PointerEventKind, PointerId, PointerKind,
        };
        use std::time::{Duration, Instant};

        let handle = FieldHandle::new(field());
        let mut arena = GestureArena::new();
        let single = arena.add_click(1, |_| {});
        let double = {
            let handle = handle.clone();
            arena.add_click(2, move |_| handle.begin_editing())
        };
        arena.require_failure(double, single).unwrap();

        let pe = |kind, t_ms: u64, t0: Instant| {
            (
                PointerEvent {
                    id: PointerId(0),
                    kind: PointerKind::Mouse,
                    event: kind,
                    position: Vec2 { x: 5.0, y: 5.0 },
                    pressure: 1.0,
                    modifiers: Modifiers::default(),
                },
                t0 + Duration::from_millis(t_ms),
            )
        };

        let t0 = Instant::now();
        for (ev, t) in [
            pe(PointerEventKind::Down(PointerButton::Primary), 0, t0),
            pe(PointerEventKind::Up(PointerButton::Primary), 50, t0),
            pe(PointerEventKind::Down(PointerButton::Primary), 150, t0),
            pe(PointerEventKind::Up(PointerButton::Primary), 200, t0),
        ] {
            arena.handle_pointer_at(&ev, t);
        }

        assert!(handle.is_editing());
        assert!(handle.field_mut().take_focus_request());

        // The held single click never fires editing on its own.
        arena.poll(t0 + Duration::from_millis(200) + MULTI_CLICK_WINDOW);
        assert!(handle.is_editing());
    }
}
