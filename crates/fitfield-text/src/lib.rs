//! Single-line text measurement on top of cosmic-text.
//!
//! The fitting text field only ever needs two numbers from the text stack:
//! the advance width of a string laid out on one unbounded line, and the
//! default single-line height for a font size. Shaping runs through a global
//! `FontSystem` retained for the process lifetime; per-call buffers are
//! transient.

use cosmic_text::{Attrs, Buffer, FontSystem, Metrics, Shaping};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

/// Line height factor applied over the font pixel size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.3;

struct Engine {
    fs: FontSystem,
}

static ENGINE: OnceCell<Mutex<Engine>> = OnceCell::new();

fn engine() -> &'static Mutex<Engine> {
    ENGINE.get_or_init(|| {
        log::debug!("initializing font system");
        Mutex::new(Engine {
            fs: FontSystem::new(),
        })
    })
}

/// Advance width of `text` shaped on a single unbounded line.
///
/// Wrapping never applies: the buffer is given no size, so the result is the
/// full single-line extent regardless of how the text would be presented.
pub fn line_width(text: &str, px: f32) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let mut eng = engine().lock();
    let mut buf = Buffer::new(&mut eng.fs, Metrics::new(px, px * LINE_HEIGHT_FACTOR));
    {
        let mut b = buf.borrow_with(&mut eng.fs);
        b.set_size(None, None);
        b.set_text(text, &Attrs::new(), Shaping::Advanced, None);
        b.shape_until_scroll(true);
    }

    let mut w = 0.0f32;
    for run in buf.layout_runs() {
        for g in run.glyphs {
            w = w.max(g.x + g.w); // right edge in LTR
        }
    }
    w
}

/// Default single-line height for a font pixel size.
pub fn line_height(px: f32) -> f32 {
    px * LINE_HEIGHT_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_zero_width() {
        assert_eq!(line_width("", 16.0), 0.0);
    }

    #[test]
    fn test_width_is_non_negative() {
        // May be 0 on hosts without fonts installed; never negative.
        assert!(line_width("Hello", 16.0) >= 0.0);
    }

    #[test]
    fn test_line_height_scales_with_px() {
        assert_eq!(line_height(16.0), 16.0 * LINE_HEIGHT_FACTOR);
        assert!(line_height(20.0) > line_height(16.0));
    }
}
