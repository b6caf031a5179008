use std::rc::Rc;
use std::time::{Duration, Instant};

use fitfield_core::Vec2;
use fitfield_core::input::{PointerButton, PointerEvent, PointerEventKind};
use thiserror::Error;

/// A press must release within this long (and within [`TAP_SLOP`]) to count
/// as a click.
pub const CLICK_HOLD_MAX: Duration = Duration::from_millis(200);
/// Consecutive clicks within this window belong to one multi-click sequence.
pub const MULTI_CLICK_WINDOW: Duration = Duration::from_millis(300);
pub const TAP_SLOP: f32 = 10.0;
/// Deepest pressure stage reported by force-press capable devices.
pub const FORCE_CLICK_STAGE: i64 = 2;

#[derive(Debug, Error)]
pub enum GestureError {
    #[error("unknown recognizer id {0:?}")]
    UnknownRecognizer(RecognizerId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecognizerId(u64);

struct ClickRecognizer {
    id: RecognizerId,
    clicks_required: u32,
    on_recognized: Rc<dyn Fn(Vec2)>,
}

struct PendingFire {
    recognizer: usize,
    position: Vec2,
    deadline: Instant,
}

/// Click and pressure recognition over one hit target, with explicit
/// disambiguation between competing recognizers.
///
/// Recognizers are registered with the click count they need. Two recognizers
/// joined by [`require_failure`](GestureArena::require_failure) compete over
/// the same click sequence: the one needing fewer clicks is held back until
/// the other can no longer match (the multi-click window lapses), so a
/// double-click is never delivered as two single clicks.
///
/// The arena only observes pointer events; it never withholds them from the
/// widget the host is routing to.
pub struct GestureArena {
    next_id: u64,
    clicks: Vec<ClickRecognizer>,
    exclusions: Vec<(RecognizerId, RecognizerId)>,
    on_force_press: Option<Rc<dyn Fn(Vec2)>>,

    click_count: u32,
    last_click: Option<Instant>,
    press: Option<(Instant, Vec2)>,
    pending: Option<PendingFire>,
    pressure_stage: i64,
}

impl GestureArena {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            clicks: Vec::new(),
            exclusions: Vec::new(),
            on_force_press: None,
            click_count: 0,
            last_click: None,
            press: None,
            pending: None,
            pressure_stage: 0,
        }
    }

    /// Register a recognizer firing on exactly `clicks_required` clicks.
    pub fn add_click(
        &mut self,
        clicks_required: u32,
        on_recognized: impl Fn(Vec2) + 'static,
    ) -> RecognizerId {
        let id = RecognizerId(self.next_id);
        self.next_id += 1;
        self.clicks.push(ClickRecognizer {
            id,
            clicks_required,
            on_recognized: Rc::new(on_recognized),
        });
        id
    }

    /// Declare that `recognizer` and `of` compete over the same click
    /// sequence: whichever needs more clicks wins, and the other is held
    /// back until the winner has failed.
    pub fn require_failure(
        &mut self,
        recognizer: RecognizerId,
        of: RecognizerId,
    ) -> Result<(), GestureError> {
        for id in [recognizer, of] {
            if !self.clicks.iter().any(|c| c.id == id) {
                return Err(GestureError::UnknownRecognizer(id));
            }
        }
        self.exclusions.push((recognizer, of));
        Ok(())
    }

    pub fn on_force_press(&mut self, cb: impl Fn(Vec2) + 'static) {
        self.on_force_press = Some(Rc::new(cb));
    }

    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        self.handle_pointer_at(event, Instant::now());
    }

    pub fn handle_pointer_at(&mut self, event: &PointerEvent, now: Instant) {
        match event.event {
            PointerEventKind::Down(PointerButton::Primary) => {
                self.press = Some((now, event.position));
            }
            PointerEventKind::Up(PointerButton::Primary) => {
                if let Some((start, pos)) = self.press.take() {
                    let distance = ((event.position.x - pos.x).powi(2)
                        + (event.position.y - pos.y).powi(2))
                    .sqrt();
                    if now - start <= CLICK_HOLD_MAX && distance < TAP_SLOP {
                        self.register_click(event.position, now);
                    }
                }
            }
            PointerEventKind::Cancel => {
                self.press = None;
                self.pending = None;
                self.click_count = 0;
                self.last_click = None;
            }
            PointerEventKind::Pressure { stage } => {
                // Fire only on the transition into the deepest stage.
                if stage >= FORCE_CLICK_STAGE && self.pressure_stage < FORCE_CLICK_STAGE {
                    log::debug!("gesture: force press at {:?}", event.position);
                    if let Some(cb) = &self.on_force_press {
                        cb(event.position);
                    }
                }
                self.pressure_stage = stage;
            }
            _ => {}
        }
    }

    fn register_click(&mut self, pos: Vec2, now: Instant) {
        let in_window = self
            .last_click
            .is_some_and(|last| now - last <= MULTI_CLICK_WINDOW);
        self.click_count = if in_window { self.click_count + 1 } else { 1 };
        self.last_click = Some(now);

        // A continued sequence supersedes whatever was waiting on it.
        self.pending = None;

        let n = self.click_count;
        let Some(idx) = self.clicks.iter().position(|c| c.clicks_required == n) else {
            return;
        };

        if self.has_live_competitor(self.clicks[idx].id, n) {
            log::trace!("gesture: {n}-click held for competing recognizer");
            self.pending = Some(PendingFire {
                recognizer: idx,
                position: pos,
                deadline: now + MULTI_CLICK_WINDOW,
            });
        } else {
            log::debug!("gesture: {n}-click recognized at {pos:?}");
            (self.clicks[idx].on_recognized)(pos);
            // The sequence is consumed; further clicks start a new one.
            self.click_count = 0;
            self.last_click = None;
        }
    }

    /// Does some excluded competitor still accept a longer click sequence?
    fn has_live_competitor(&self, id: RecognizerId, clicks_so_far: u32) -> bool {
        self.exclusions
            .iter()
            .filter_map(|&(a, b)| {
                if a == id {
                    Some(b)
                } else if b == id {
                    Some(a)
                } else {
                    None
                }
            })
            .any(|other| {
                self.clicks
                    .iter()
                    .any(|c| c.id == other && c.clicks_required > clicks_so_far)
            })
    }

    /// Fire any held recognizer whose competitors have failed. Hosts call
    /// this when the wakeup scheduled from [`next_deadline`](Self::next_deadline)
    /// arrives.
    pub fn poll(&mut self, now: Instant) {
        if self.pending.as_ref().is_none_or(|p| now < p.deadline) {
            return;
        }
        if let Some(p) = self.pending.take() {
            let rec = &self.clicks[p.recognizer];
            log::debug!(
                "gesture: held {}-click released at {:?}",
                rec.clicks_required,
                p.position
            );
            (rec.on_recognized)(p.position);
            self.click_count = 0;
            self.last_click = None;
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }
}

impl Default for GestureArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitfield_core::input::{Modifiers, PointerId, PointerKind};
    use std::cell::RefCell;

    fn pe(kind: PointerEventKind, x: f32, y: f32) -> PointerEvent {
        PointerEvent {
            id: PointerId(0),
            kind: PointerKind::Mouse,
            event: kind,
            position: Vec2 { x, y },
            pressure: 1.0,
            modifiers: Modifiers::default(),
        }
    }

    fn click(arena: &mut GestureArena, t: Instant, offset_ms: u64) -> Instant {
        let down = t + Duration::from_millis(offset_ms);
        let up = down + Duration::from_millis(50);
        arena.handle_pointer_at(&pe(PointerEventKind::Down(PointerButton::Primary), 5.0, 5.0), down);
        arena.handle_pointer_at(&pe(PointerEventKind::Up(PointerButton::Primary), 5.0, 5.0), up);
        up
    }

    #[test]
    fn test_lone_single_click_fires_immediately() {
        let mut arena = GestureArena::new();
        let fired = Rc::new(RefCell::new(0));
        let f = fired.clone();
        arena.add_click(1, move |_| *f.borrow_mut() += 1);

        let t0 = Instant::now();
        click(&mut arena, t0, 0);
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_double_click_wins_over_excluded_single() {
        let mut arena = GestureArena::new();
        let singles = Rc::new(RefCell::new(0));
        let doubles = Rc::new(RefCell::new(0));
        let s = singles.clone();
        let d = doubles.clone();
        let single = arena.add_click(1, move |_| *s.borrow_mut() += 1);
        let double = arena.add_click(2, move |_| *d.borrow_mut() += 1);
        arena.require_failure(double, single).unwrap();

        let t0 = Instant::now();
        click(&mut arena, t0, 0);
        // First click is held while the double could still match.
        assert_eq!(*singles.borrow(), 0);

        let last = click(&mut arena, t0, 150);
        assert_eq!(*doubles.borrow(), 1);
        assert_eq!(*singles.borrow(), 0);

        // The held single never fires afterwards.
        arena.poll(last + Duration::from_millis(500));
        assert_eq!(*singles.borrow(), 0);
    }

    #[test]
    fn test_held_single_fires_after_window_lapses() {
        let mut arena = GestureArena::new();
        let singles = Rc::new(RefCell::new(0));
        let s = singles.clone();
        let single = arena.add_click(1, move |_| *s.borrow_mut() += 1);
        let double = arena.add_click(2, |_| {});
        arena.require_failure(double, single).unwrap();

        let t0 = Instant::now();
        let up = click(&mut arena, t0, 0);
        assert_eq!(*singles.borrow(), 0);
        assert_eq!(arena.next_deadline(), Some(up + MULTI_CLICK_WINDOW));

        arena.poll(up + MULTI_CLICK_WINDOW);
        assert_eq!(*singles.borrow(), 1);
        assert_eq!(arena.next_deadline(), None);
    }

    #[test]
    fn test_clicks_outside_window_are_separate_sequences() {
        let mut arena = GestureArena::new();
        let doubles = Rc::new(RefCell::new(0));
        let d = doubles.clone();
        arena.add_click(2, move |_| *d.borrow_mut() += 1);

        let t0 = Instant::now();
        click(&mut arena, t0, 0);
        click(&mut arena, t0, 1000); // too late: a new sequence
        assert_eq!(*doubles.borrow(), 0);

        click(&mut arena, t0, 1100); // second click of the new sequence
        assert_eq!(*doubles.borrow(), 1);
    }

    #[test]
    fn test_slop_and_hold_reject_click() {
        let mut arena = GestureArena::new();
        let fired = Rc::new(RefCell::new(0));
        let f = fired.clone();
        arena.add_click(1, move |_| *f.borrow_mut() += 1);

        let t0 = Instant::now();
        // Drag: release far from press
        arena.handle_pointer_at(&pe(PointerEventKind::Down(PointerButton::Primary), 5.0, 5.0), t0);
        arena.handle_pointer_at(
            &pe(PointerEventKind::Up(PointerButton::Primary), 50.0, 5.0),
            t0 + Duration::from_millis(50),
        );
        assert_eq!(*fired.borrow(), 0);

        // Long hold
        arena.handle_pointer_at(&pe(PointerEventKind::Down(PointerButton::Primary), 5.0, 5.0), t0);
        arena.handle_pointer_at(
            &pe(PointerEventKind::Up(PointerButton::Primary), 5.0, 5.0),
            t0 + Duration::from_millis(600),
        );
        assert_eq!(*fired.borrow(), 0);
    }

    #[test]
    fn test_force_press_fires_on_stage_transition_only() {
        let mut arena = GestureArena::new();
        let fired = Rc::new(RefCell::new(0));
        let f = fired.clone();
        arena.on_force_press(move |_| *f.borrow_mut() += 1);

        let t0 = Instant::now();
        arena.handle_pointer_at(&pe(PointerEventKind::Pressure { stage: 1 }, 5.0, 5.0), t0);
        assert_eq!(*fired.borrow(), 0);

        arena.handle_pointer_at(&pe(PointerEventKind::Pressure { stage: 2 }, 5.0, 5.0), t0);
        assert_eq!(*fired.borrow(), 1);

        // Staying at the deepest stage does not refire
        arena.handle_pointer_at(&pe(PointerEventKind::Pressure { stage: 2 }, 5.0, 5.0), t0);
        assert_eq!(*fired.borrow(), 1);

        // Releasing and pressing deep again does
        arena.handle_pointer_at(&pe(PointerEventKind::Pressure { stage: 0 }, 5.0, 5.0), t0);
        arena.handle_pointer_at(&pe(PointerEventKind::Pressure { stage: 2 }, 5.0, 5.0), t0);
        assert_eq!(*fired.borrow(), 2);
    }

    #[test]
    fn test_back_to_back_double_clicks_both_fire() {
        let mut arena = GestureArena::new();
        let doubles = Rc::new(RefCell::new(0));
        let d = doubles.clone();
        let single = arena.add_click(1, |_| {});
        let double = arena.add_click(2, move |_| *d.borrow_mut() += 1);
        arena.require_failure(double, single).unwrap();

        let t0 = Instant::now();
        click(&mut arena, t0, 0);
        click(&mut arena, t0, 150);
        assert_eq!(*doubles.borrow(), 1);

        // A second pair close behind the first must start a fresh sequence,
        // not count as clicks three and four of the consumed one.
        click(&mut arena, t0, 400);
        click(&mut arena, t0, 550);
        assert_eq!(*doubles.borrow(), 2);
    }

    #[test]
    fn test_require_failure_rejects_unknown_id() {
        let mut arena = GestureArena::new();
        let known = arena.add_click(1, |_| {});
        let unknown = RecognizerId(99);

        assert!(matches!(
            arena.require_failure(known, unknown),
            Err(GestureError::UnknownRecognizer(_))
        ));
    }
}
