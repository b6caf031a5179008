use std::ops::Range;

use fitfield_core::Color;
use unicode_segmentation::UnicodeSegmentation;

/// The transient edit-session buffer a field owns only while it is being
/// edited (the "field editor"): in-progress text, a byte-range selection, an
/// optional IME composition range, and the caret color.
///
/// All edits land on grapheme boundaries; composition ranges coming from the
/// platform are clamped to char boundaries before splicing.
#[derive(Clone, Debug)]
pub struct LiveEditor {
    buffer: String,
    selection: Range<usize>,
    composition: Option<Range<usize>>,
    caret_color: Color,
}

impl LiveEditor {
    /// New session seeded with the field's committed content; caret at end.
    pub fn new(seed: String) -> Self {
        let end = seed.len();
        Self {
            buffer: seed,
            selection: end..end,
            composition: None,
            caret_color: Color::BLACK,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn selection(&self) -> Range<usize> {
        self.selection.clone()
    }

    pub fn composition(&self) -> Option<Range<usize>> {
        self.composition.clone()
    }

    pub fn caret_color(&self) -> Color {
        self.caret_color
    }

    pub fn set_caret_color(&mut self, color: Color) {
        self.caret_color = color;
    }

    pub fn insert_text(&mut self, text: &str) {
        let start = self.selection.start.min(self.buffer.len());
        let end = self.selection.end.min(self.buffer.len());

        self.buffer.replace_range(start..end, text);
        let new_pos = start + text.len();
        self.selection = new_pos..new_pos;
    }

    pub fn delete_backward(&mut self) {
        if self.selection.start == self.selection.end {
            let pos = self.selection.start.min(self.buffer.len());
            if pos > 0 {
                let prev = prev_grapheme_boundary(&self.buffer, pos);
                self.buffer.replace_range(prev..pos, "");
                self.selection = prev..prev;
            }
        } else {
            self.insert_text("");
        }
    }

    pub fn delete_forward(&mut self) {
        if self.selection.start == self.selection.end {
            let pos = self.selection.start.min(self.buffer.len());
            if pos < self.buffer.len() {
                let next = next_grapheme_boundary(&self.buffer, pos);
                self.buffer.replace_range(pos..next, "");
            }
        } else {
            self.insert_text("");
        }
    }

    pub fn move_cursor(&mut self, delta: isize, extend_selection: bool) {
        let mut pos = self.selection.end.min(self.buffer.len());
        if delta < 0 {
            for _ in 0..delta.unsigned_abs() {
                pos = prev_grapheme_boundary(&self.buffer, pos);
            }
        } else if delta > 0 {
            for _ in 0..(delta as usize) {
                pos = next_grapheme_boundary(&self.buffer, pos);
            }
        }
        if extend_selection {
            self.selection.end = pos;
        } else {
            self.selection = pos..pos;
        }
    }

    pub fn select_all(&mut self) {
        self.selection = 0..self.buffer.len();
    }

    /// Replace (or start) the IME composition span with `text`. An empty
    /// `text` removes any active composition.
    pub fn set_composition(&mut self, text: String, cursor: Option<(usize, usize)>) {
        if text.is_empty() {
            if let Some(range) = self.composition.take() {
                let s = clamp_to_char_boundary(&self.buffer, range.start.min(self.buffer.len()));
                let e = clamp_to_char_boundary(&self.buffer, range.end.min(self.buffer.len()));
                if s <= e {
                    self.buffer.replace_range(s..e, "");
                    self.selection = s..s;
                }
            }
            return;
        }

        let anchor_start;
        if let Some(r) = self.composition.take() {
            let mut s = clamp_to_char_boundary(&self.buffer, r.start.min(self.buffer.len()));
            let mut e = clamp_to_char_boundary(&self.buffer, r.end.min(self.buffer.len()));
            if e < s {
                std::mem::swap(&mut s, &mut e);
            }
            self.buffer.replace_range(s..e, &text);
            anchor_start = s;
        } else {
            let pos =
                clamp_to_char_boundary(&self.buffer, self.selection.start.min(self.buffer.len()));
            self.buffer.insert_str(pos, &text);
            anchor_start = pos;
        }

        self.composition = Some(anchor_start..(anchor_start + text.len()));

        // IME cursor arrives in char indices of `text`; map to byte offsets
        // relative to the composition anchor.
        if let Some((c0, c1)) = cursor {
            let b0 = char_to_byte(&text, c0);
            let b1 = char_to_byte(&text, c1);
            self.selection = (anchor_start + b0)..(anchor_start + b1);
        } else {
            let end = anchor_start + text.len();
            self.selection = end..end;
        }
    }

    pub fn commit_composition(&mut self, text: String) {
        if let Some(r) = self.composition.take() {
            let s = clamp_to_char_boundary(&self.buffer, r.start.min(self.buffer.len()));
            let e = clamp_to_char_boundary(&self.buffer, r.end.min(self.buffer.len()));
            self.buffer.replace_range(s..e, &text);
            let new_pos = s + text.len();
            self.selection = new_pos..new_pos;
        } else {
            // No active composition: insert at caret
            let pos =
                clamp_to_char_boundary(&self.buffer, self.selection.end.min(self.buffer.len()));
            self.buffer.insert_str(pos, &text);
            let new_pos = pos + text.len();
            self.selection = new_pos..new_pos;
        }
    }

    pub fn cancel_composition(&mut self) {
        if let Some(r) = self.composition.take() {
            let s = clamp_to_char_boundary(&self.buffer, r.start.min(self.buffer.len()));
            let e = clamp_to_char_boundary(&self.buffer, r.end.min(self.buffer.len()));
            if s <= e {
                self.buffer.replace_range(s..e, "");
                self.selection = s..s;
            }
        }
    }
}

fn prev_grapheme_boundary(text: &str, byte: usize) -> usize {
    let mut last = 0usize;
    for (i, _) in text.grapheme_indices(true) {
        if i >= byte {
            break;
        }
        last = i;
    }
    last
}

fn next_grapheme_boundary(text: &str, byte: usize) -> usize {
    for (i, _) in text.grapheme_indices(true) {
        if i > byte {
            return i;
        }
    }
    text.len()
}

fn clamp_to_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    if s.is_char_boundary(i) {
        return i;
    }
    let mut j = i;
    while j > 0 && !s.is_char_boundary(j) {
        j -= 1;
    }
    j
}

fn char_to_byte(s: &str, ci: usize) -> usize {
    if ci == 0 {
        0
    } else {
        s.char_indices().nth(ci).map(|(i, _)| i).unwrap_or(s.len())
    }
}
