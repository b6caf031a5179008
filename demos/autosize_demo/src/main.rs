//! Demo host for the fitting text field.
//!
//! A winit event loop hosting a single field inside a taffy layout tree.
//! Double-click (or force click) makes the field editable and starts an edit
//! session; Escape, Return, Tab, or a click outside the field ends it. The
//! host owns the deferred task queue and drains it after every event
//! dispatch, which is where the asynchronous end-editing flip runs. Nothing
//! is painted; layout results and the debug framing rect are logged.

use taffy::prelude::TaffyMaxContent;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use fitfield_core::input::{
    ImeEvent, InputEvent, Key, KeyEvent, Modifiers, PointerButton, PointerEvent, PointerEventKind,
    PointerId, PointerKind, TextInputEvent,
};
use fitfield_core::{Color, Rect, UiQueue, Vec2};
use fitfield_ui::gestures::GestureArena;
use fitfield_ui::textfield::{FieldHandle, FittingTextField};

use taffy::prelude::{AvailableSpace, NodeId, Style, TaffyTree, length};
use taffy::style::LengthPercentage;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Ime, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{ImePurpose, Window, WindowAttributes};

const FIELD_ID: u64 = 1;
const FIELD_PADDING: f32 = 24.0;

struct DemoHost {
    window: Option<Window>,
    field: FieldHandle,
    arena: GestureArena,
    queue: Rc<UiQueue>,
    // Shared with the field's editing-ended hook, which releases focus.
    focused: Rc<Cell<Option<u64>>>,
    last_focus: Option<u64>,

    layout: TaffyTree<()>,
    root_node: NodeId,
    field_node: NodeId,
    field_rect: Rect,

    mouse_pos: Vec2,
    modifiers: Modifiers,
    ime_preedit: bool,
    frame_color: Color,
}

impl DemoHost {
    fn new() -> anyhow::Result<Self> {
        let queue = Rc::new(UiQueue::new());
        let focused = Rc::new(Cell::new(None));

        let mut field = FittingTextField::new();
        field.set_placeholder("Double-click to edit…");
        field.set_text_color(Color::from_hex("#E0E0E0"));
        field.set_on_commit(|text| log::info!("committed: {text:?}"));
        {
            let focused = Rc::clone(&focused);
            field.set_on_editing_ended(move || {
                log::info!("editing ended, focus released");
                focused.set(None);
            });
        }
        let field = FieldHandle::new(field);

        let mut arena = GestureArena::new();
        let single = arena.add_click(1, |pos| log::debug!("single click at {pos:?}"));
        let double = {
            let field = field.clone();
            arena.add_click(2, move |_| field.begin_editing())
        };
        // Without this a double-click would be misdelivered as two singles.
        arena.require_failure(double, single)?;
        {
            let field = field.clone();
            arena.on_force_press(move |_| {
                if !field.is_editing() {
                    field.begin_editing();
                }
            });
        }

        let mut layout: TaffyTree<()> = TaffyTree::new();
        let field_node = layout.new_leaf(Style::default())?;
        let pad: LengthPercentage = length(FIELD_PADDING);
        let root_node = layout.new_with_children(
            Style {
                padding: taffy::Rect {
                    left: pad,
                    right: pad,
                    top: pad,
                    bottom: pad,
                },
                ..Default::default()
            },
            &[field_node],
        )?;

        Ok(Self {
            window: None,
            field,
            arena,
            queue,
            focused,
            last_focus: None,
            layout,
            root_node,
            field_node,
            field_rect: Rect::default(),
            mouse_pos: Vec2::default(),
            modifiers: Modifiers::default(),
            ime_preedit: false,
            frame_color: Color::from_hex("#FF0000").with_alpha(128),
        })
    }

    fn pe_mouse(&self, event: PointerEventKind) -> PointerEvent {
        PointerEvent {
            id: PointerId(0),
            kind: PointerKind::Mouse,
            event,
            position: self.mouse_pos,
            pressure: 1.0,
            modifiers: self.modifiers,
        }
    }

    /// Map a winit key press into the input model. Named editing keys become
    /// [`Key`] events; anything printable becomes a text event unless an IME
    /// composition or a command modifier owns it.
    fn translate_key(&self, key_event: &winit::event::KeyEvent) -> Option<InputEvent> {
        let key = match key_event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => Some(Key::Escape),
            PhysicalKey::Code(KeyCode::Enter) => Some(Key::Enter),
            PhysicalKey::Code(KeyCode::Tab) => Some(Key::Tab),
            PhysicalKey::Code(KeyCode::Backspace) => Some(Key::Backspace),
            PhysicalKey::Code(KeyCode::Delete) => Some(Key::Delete),
            PhysicalKey::Code(KeyCode::ArrowLeft) => Some(Key::ArrowLeft),
            PhysicalKey::Code(KeyCode::ArrowRight) => Some(Key::ArrowRight),
            _ => None,
        };
        if let Some(key) = key {
            return Some(InputEvent::Key(KeyEvent {
                key,
                modifiers: self.modifiers,
                is_repeat: key_event.repeat,
            }));
        }

        if self.ime_preedit || self.modifiers.ctrl || self.modifiers.alt || self.modifiers.meta {
            return None;
        }
        let raw = key_event.text.as_deref()?;
        let text: String = raw.chars().filter(|c| !c.is_control()).collect();
        if text.is_empty() {
            None
        } else {
            Some(InputEvent::Text(TextInputEvent { text }))
        }
    }

    /// Consume a translated input event. Pointer events go through hit
    /// testing and the gesture arena; key, text, and IME events drive the
    /// edit session.
    fn dispatch_input(&mut self, input: InputEvent) {
        match input {
            InputEvent::Pointer(pe) => match pe.event {
                PointerEventKind::Down(PointerButton::Primary) => {
                    if self.field_rect.contains(pe.position) {
                        self.arena.handle_pointer(&pe);
                    } else if self.field.is_editing() {
                        // Click outside the field bounds ends the edit session.
                        self.field.end_editing(&self.queue);
                    }
                }
                PointerEventKind::Pressure { .. } => {
                    if self.field_rect.contains(pe.position) {
                        self.arena.handle_pointer(&pe);
                    }
                }
                _ => self.arena.handle_pointer(&pe),
            },
            InputEvent::Key(key) => {
                if !self.field.is_editing() {
                    return;
                }
                match key.key {
                    Key::Escape | Key::Enter | Key::Tab => self.field.end_editing(&self.queue),
                    Key::Backspace => self.field.field_mut().delete_backward(),
                    Key::Delete => self.field.field_mut().delete_forward(),
                    Key::ArrowLeft => {
                        self.field.field_mut().move_cursor(-1, key.modifiers.shift);
                    }
                    Key::ArrowRight => {
                        self.field.field_mut().move_cursor(1, key.modifiers.shift);
                    }
                }
            }
            InputEvent::Text(TextInputEvent { text }) => {
                if self.field.is_editing() {
                    self.field.field_mut().insert_text(&text);
                }
            }
            InputEvent::Ime(ime) => match ime {
                ImeEvent::Start => {}
                ImeEvent::Update { text, cursor } => {
                    self.field.field_mut().set_composition(text, cursor);
                }
                ImeEvent::Commit(text) => self.field.field_mut().commit_composition(text),
                ImeEvent::Cancel => self.field.field_mut().cancel_composition(),
            },
        }
    }

    /// Runs after every dispatch: deferred tasks, focus changes, relayout.
    fn after_dispatch(&mut self) {
        self.queue.drain();

        if self.field.field_mut().take_focus_request() {
            self.focused.set(Some(FIELD_ID));
        }
        let focus = self.focused.get();
        if focus != self.last_focus {
            if let Some(win) = &self.window {
                let editing = focus == Some(FIELD_ID);
                win.set_ime_allowed(editing);
                if editing {
                    win.set_ime_purpose(ImePurpose::Normal);
                }
            }
            log::debug!("focus moved: {:?} -> {:?}", self.last_focus, focus);
            self.last_focus = focus;
        }

        self.relayout();
    }

    fn relayout(&mut self) {
        if let Err(e) = self.try_relayout() {
            log::error!("layout failed: {e}");
        }
    }

    fn try_relayout(&mut self) -> taffy::TaffyResult<()> {
        self.layout.mark_dirty(self.field_node)?;

        let field = self.field.clone();
        let field_node = self.field_node;
        self.layout.compute_layout_with_measure(
            self.root_node,
            taffy::Size::MAX_CONTENT,
            |_known, _available: taffy::Size<AvailableSpace>, node, _ctx, _style| {
                if node == field_node {
                    let s = field.intrinsic_size();
                    taffy::Size {
                        width: s.width,
                        height: s.height,
                    }
                } else {
                    taffy::Size::ZERO
                }
            },
        )?;

        let l = self.layout.layout(self.field_node)?;
        let rect = Rect {
            x: l.location.x,
            y: l.location.y,
            w: l.size.width,
            h: l.size.height,
        };
        if rect != self.field_rect {
            self.field_rect = rect;
            log::info!("field preferred size {}x{}", rect.w, rect.h);
            log::debug!("debug frame {:?} around {rect:?}", self.frame_color);
        }
        Ok(())
    }
}

impl ApplicationHandler<()> for DemoHost {
    fn resumed(&mut self, el: &ActiveEventLoop) {
        if self.window.is_none() {
            match el.create_window(
                WindowAttributes::default()
                    .with_title("Fitting Field Demo")
                    .with_inner_size(PhysicalSize::new(800, 240)),
            ) {
                Ok(win) => {
                    self.window = Some(win);
                    self.relayout();
                }
                Err(e) => {
                    log::error!("Failed to create window: {e:?}");
                    el.exit();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        el: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Window close requested");
                el.exit();
            }
            WindowEvent::Resized(size) => {
                log::debug!("window resized to {}x{}", size.width, size.height);
            }
            WindowEvent::ModifiersChanged(new_mods) => {
                self.modifiers.shift = new_mods.state().shift_key();
                self.modifiers.ctrl = new_mods.state().control_key();
                self.modifiers.alt = new_mods.state().alt_key();
                self.modifiers.meta = new_mods.state().super_key();
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_pos = Vec2::new(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                let pe = self.pe_mouse(PointerEventKind::Down(PointerButton::Primary));
                self.dispatch_input(InputEvent::Pointer(pe));
            }
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } => {
                let pe = self.pe_mouse(PointerEventKind::Up(PointerButton::Primary));
                self.dispatch_input(InputEvent::Pointer(pe));
            }
            WindowEvent::TouchpadPressure { stage, .. } => {
                let pe = self.pe_mouse(PointerEventKind::Pressure { stage });
                self.dispatch_input(InputEvent::Pointer(pe));
            }
            WindowEvent::KeyboardInput {
                event: key_event, ..
            } => {
                if key_event.state == ElementState::Pressed {
                    if let Some(input) = self.translate_key(&key_event) {
                        self.dispatch_input(input);
                    }
                }
            }
            WindowEvent::Ime(ime) => {
                let input = match ime {
                    Ime::Enabled => {
                        self.ime_preedit = false;
                        InputEvent::Ime(ImeEvent::Start)
                    }
                    Ime::Preedit(text, cursor) => {
                        self.ime_preedit = !text.is_empty();
                        InputEvent::Ime(ImeEvent::Update { text, cursor })
                    }
                    Ime::Commit(text) => {
                        self.ime_preedit = false;
                        InputEvent::Ime(ImeEvent::Commit(text))
                    }
                    Ime::Disabled => {
                        self.ime_preedit = false;
                        InputEvent::Ime(ImeEvent::Cancel)
                    }
                };
                self.dispatch_input(input);
            }
            _ => {}
        }

        self.after_dispatch();
    }

    fn about_to_wait(&mut self, el: &ActiveEventLoop) {
        // Held gestures time out here (their window wakeup lands below).
        self.arena.poll(Instant::now());
        self.after_dispatch();

        match self.arena.next_deadline() {
            Some(deadline) => el.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => el.set_control_flow(ControlFlow::Wait),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = DemoHost::new()?;
    event_loop.run_app(&mut app)?;
    Ok(())
}
