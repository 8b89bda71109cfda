//! In-memory stand-in for the CAD application
//!
//! Implements `Automation` over a tiny model of the page: a login form, a
//! project list, a canvas holding axis-aligned rectangles, a selection tool
//! with a context menu, a property panel and an undo stack. Selectors are the
//! same strings the page object sends to Playwright.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use rectangle_e2e::automation::{
    Automation, AutomationLauncher, BoundingBox, MouseButton, WaitState,
};
use rectangle_e2e::canvas::PageSettings;
use rectangle_e2e::config::{Credentials, Modifier, SuiteConfig};
use rectangle_e2e::format::{format_property_value, parse_property_value};
use rectangle_e2e::locators::{self, PropertyField};
use rectangle_e2e::{E2eError, E2eResult};

/// Metres per pixel
pub const SCALE: f64 = 0.05;

/// Pixel tolerance when grabbing a resize handle
const HANDLE_TOLERANCE: f64 = 4.0;

pub const PROJECT: &str = r#"//div[@id="project-card-TEST01"]"#;
pub const EMAIL: &str = "qa@example.com";
pub const PASSWORD: &str = "correct horse";

pub fn credentials() -> Credentials {
    Credentials {
        email: EMAIL.into(),
        password: PASSWORD.into(),
    }
}

pub fn settings() -> PageSettings {
    PageSettings {
        base_url: "https://cad.test".into(),
        action_timeout: Duration::from_millis(200),
        property_timeout: Duration::from_millis(200),
        settle: Duration::ZERO,
        safe_y_offset: 150.0,
        modifier: Modifier::Control,
    }
}

pub fn suite_config() -> SuiteConfig {
    SuiteConfig {
        base_url: "https://cad.test".into(),
        project_selector: PROJECT.into(),
        credentials: credentials(),
        action_timeout_ms: 200,
        property_timeout_ms: 200,
        settle_ms: 0,
        modifier: Modifier::Control,
        ..Default::default()
    }
}

/// Knobs for misbehaving applications
#[derive(Debug, Clone)]
pub struct FakeOptions {
    pub default_shape: bool,
    pub new_plan_controls: usize,
    pub canvas_ready: bool,
    pub undo_works: bool,
    pub format_properties: bool,
    pub resize_works: bool,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            default_shape: true,
            new_plan_controls: 1,
            canvas_ready: true,
            undo_works: true,
            format_properties: true,
            resize_works: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            left: a.0.min(b.0),
            top: a.1.min(b.1),
            right: a.0.max(b.0),
            bottom: a.1.max(b.1),
        }
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    pub fn width_m(&self) -> f64 {
        (self.right - self.left) * SCALE
    }

    pub fn length_m(&self) -> f64 {
        (self.bottom - self.top) * SCALE
    }

    pub fn area_m2(&self) -> f64 {
        self.width_m() * self.length_m()
    }

    fn normalized(self) -> Self {
        Self::from_corners((self.left, self.top), (self.right, self.bottom))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Handle {
    Top,
    Right,
    Bottom,
    Left,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Handle {
    fn is_corner(self) -> bool {
        matches!(
            self,
            Handle::TopLeft | Handle::TopRight | Handle::BottomLeft | Handle::BottomRight
        )
    }

    fn locate(rect: &Rect, x: f64, y: f64) -> Option<Handle> {
        let near = |a: f64, b: f64| (a - b).abs() <= HANDLE_TOLERANCE;
        let mid_x = (rect.left + rect.right) / 2.0;
        let mid_y = (rect.top + rect.bottom) / 2.0;
        let candidates = [
            (Handle::TopLeft, rect.left, rect.top),
            (Handle::TopRight, rect.right, rect.top),
            (Handle::BottomLeft, rect.left, rect.bottom),
            (Handle::BottomRight, rect.right, rect.bottom),
            (Handle::Top, mid_x, rect.top),
            (Handle::Right, rect.right, mid_y),
            (Handle::Bottom, mid_x, rect.bottom),
            (Handle::Left, rect.left, mid_y),
        ];
        candidates
            .iter()
            .find(|(_, hx, hy)| near(x, *hx) && near(y, *hy))
            .map(|(handle, _, _)| *handle)
    }

    fn apply(self, rect: Rect, dx: f64, dy: f64) -> Rect {
        let mut r = rect;
        match self {
            Handle::Top => r.top += dy,
            Handle::Right => r.right += dx,
            Handle::Bottom => r.bottom += dy,
            Handle::Left => r.left += dx,
            Handle::TopLeft => {
                r.left += dx;
                r.top += dy;
            }
            Handle::TopRight => {
                r.right += dx;
                r.top += dy;
            }
            Handle::BottomLeft => {
                r.left += dx;
                r.bottom += dy;
            }
            Handle::BottomRight => {
                r.right += dx;
                r.bottom += dy;
            }
        }
        r.normalized()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Blank,
    Login,
    Projects,
    Editor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    Select,
    Rectangle,
}

#[derive(Debug)]
struct AppState {
    options: FakeOptions,
    screen: Screen,
    email: String,
    password: String,
    tool: Tool,
    design_edit: bool,
    pending_corner: Option<(f64, f64)>,
    shapes: Vec<Rect>,
    selected: Option<usize>,
    context_menu: Option<usize>,
    deleted: Vec<(usize, Rect)>,
    mouse: (f64, f64),
    drag: Option<(Handle, (f64, f64))>,
    edit_buffer: Option<(PropertyField, String)>,
    select_all: bool,
    plans_opened: usize,
    closed: bool,
    calls: Vec<String>,
}

impl AppState {
    fn canvas(&self) -> BoundingBox {
        BoundingBox { x: 0.0, y: 120.0, width: 1000.0, height: 600.0 }
    }

    fn property_selector(selector: &str) -> Option<PropertyField> {
        [PropertyField::Width, PropertyField::Length]
            .into_iter()
            .find(|field| field.selector() == selector)
    }

    fn visible(&self, selector: &str) -> bool {
        let editor = self.screen == Screen::Editor;
        if selector == PROJECT {
            return self.screen == Screen::Projects;
        }
        if Self::property_selector(selector).is_some() {
            return editor && self.selected.is_some();
        }
        match selector {
            locators::EMAIL_INPUT | locators::PASSWORD_INPUT | locators::SUBMIT_BUTTON => {
                self.screen == Screen::Login
            }
            locators::CANVAS => editor && self.options.canvas_ready,
            locators::NEW_PLAN_BUTTON => editor && self.options.new_plan_controls > 0,
            locators::RECTANGLE_TOOL | locators::SELECT_TOOL | locators::DESIGN_EDIT_TOOL => editor,
            locators::DELETE_BUTTON => self.context_menu.is_some(),
            locators::BASELINE_MARKER => editor && self.selected.is_none(),
            locators::AREA_TEXT => editor && self.selected.is_some(),
            _ => false,
        }
    }

    fn ensure_visible(&self, selector: &str) -> E2eResult<()> {
        if self.visible(selector) {
            Ok(())
        } else {
            Err(E2eError::Timeout(format!("{} to be visible", selector)))
        }
    }

    fn hit(&self, x: f64, y: f64) -> Option<usize> {
        self.shapes.iter().rposition(|shape| shape.contains(x, y))
    }

    fn display(&self, field: PropertyField, rect: &Rect) -> String {
        let value = match field {
            PropertyField::Width => rect.width_m(),
            PropertyField::Length => rect.length_m(),
        };
        if self.options.format_properties {
            format_property_value(value)
        } else {
            format!("{}", value)
        }
    }

    fn open_plan(&mut self) {
        self.plans_opened += 1;
        self.shapes.clear();
        self.deleted.clear();
        self.selected = None;
        self.context_menu = None;
        if self.options.default_shape {
            let canvas = self.canvas();
            let (cx, cy) = canvas.to_viewport(canvas.center());
            self.shapes
                .push(Rect::from_corners((cx - 100.0, cy - 100.0), (cx + 100.0, cy + 100.0)));
        }
    }

    fn commit_edit(&mut self) {
        let Some((field, text)) = self.edit_buffer.take() else {
            return;
        };
        let (Some(index), Some(value)) = (self.selected, parse_property_value(&text)) else {
            return;
        };
        let rect = &mut self.shapes[index];
        match field {
            PropertyField::Width => rect.right = rect.left + value / SCALE,
            PropertyField::Length => rect.bottom = rect.top + value / SCALE,
        }
    }
}

/// Shared handle to one simulated browser page
#[derive(Clone)]
pub struct FakeApp {
    state: Arc<Mutex<AppState>>,
}

impl FakeApp {
    pub fn new(options: FakeOptions) -> Self {
        let state = AppState {
            options,
            screen: Screen::Blank,
            email: String::new(),
            password: String::new(),
            tool: Tool::Select,
            design_edit: false,
            pending_corner: None,
            shapes: Vec::new(),
            selected: None,
            context_menu: None,
            deleted: Vec::new(),
            mouse: (0.0, 0.0),
            drag: None,
            edit_buffer: None,
            select_all: false,
            plans_opened: 0,
            closed: false,
            calls: Vec::new(),
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// A page already past login with an empty plan open
    pub fn in_editor(options: FakeOptions) -> Self {
        let app = Self::new(options);
        {
            let mut state = app.state.lock().unwrap();
            state.screen = Screen::Editor;
            state.open_plan();
        }
        app
    }

    pub fn shapes(&self) -> Vec<Rect> {
        self.state.lock().unwrap().shapes.clone()
    }

    pub fn selected(&self) -> Option<Rect> {
        let state = self.state.lock().unwrap();
        state.selected.map(|i| state.shapes[i])
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn plans_opened(&self) -> usize {
        self.state.lock().unwrap().plans_opened
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn with<T>(&self, call: String, f: impl FnOnce(&mut AppState) -> E2eResult<T>) -> E2eResult<T> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(E2eError::Playwright(format!("{}: page closed", call)));
        }
        state.calls.push(call);
        f(&mut state)
    }
}

#[async_trait]
impl Automation for FakeApp {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.with(format!("goto:{}", url), |s| {
            s.screen = Screen::Login;
            Ok(())
        })
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.with(format!("fill:{}", selector), |s| {
            s.ensure_visible(selector)?;
            match selector {
                locators::EMAIL_INPUT => s.email = value.to_string(),
                locators::PASSWORD_INPUT => s.password = value.to_string(),
                _ => {
                    if let Some(field) = AppState::property_selector(selector) {
                        s.edit_buffer = Some((field, value.to_string()));
                    }
                }
            }
            Ok(())
        })
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.with(format!("click:{}", selector), |s| {
            s.ensure_visible(selector)?;
            if selector == PROJECT {
                s.screen = Screen::Editor;
                return Ok(());
            }
            match selector {
                locators::SUBMIT_BUTTON => {
                    if s.email == EMAIL && s.password == PASSWORD {
                        s.screen = Screen::Projects;
                    }
                }
                locators::NEW_PLAN_BUTTON => s.open_plan(),
                locators::RECTANGLE_TOOL => {
                    s.tool = Tool::Rectangle;
                    s.design_edit = false;
                    s.pending_corner = None;
                    s.context_menu = None;
                }
                locators::SELECT_TOOL => {
                    s.tool = Tool::Select;
                    s.design_edit = false;
                    s.context_menu = None;
                }
                locators::DESIGN_EDIT_TOOL => s.design_edit = s.selected.is_some(),
                locators::DELETE_BUTTON => {
                    if let Some(index) = s.context_menu.take() {
                        let rect = s.shapes.remove(index);
                        s.deleted.push((index, rect));
                        s.selected = None;
                    }
                }
                _ => {
                    if let Some(field) = AppState::property_selector(selector) {
                        let shown = s.display(field, &s.shapes[s.selected.unwrap()]);
                        s.edit_buffer = Some((field, shown));
                        s.select_all = false;
                    }
                }
            }
            Ok(())
        })
    }

    async fn press(&self, selector: Option<&str>, key: &str) -> E2eResult<()> {
        self.with(format!("press:{}", key), |s| {
            match selector {
                Some(selector) => {
                    s.ensure_visible(selector)?;
                    match key {
                        "Control+a" | "Meta+a" => s.select_all = true,
                        "Backspace" => {
                            if let Some((_, text)) = s.edit_buffer.as_mut() {
                                if s.select_all {
                                    text.clear();
                                } else {
                                    text.pop();
                                }
                            }
                            s.select_all = false;
                        }
                        "Enter" => s.commit_edit(),
                        _ => {}
                    }
                }
                None => {
                    if (key == "Control+z" || key == "Meta+z") && s.options.undo_works {
                        if let Some((index, rect)) = s.deleted.pop() {
                            let index = index.min(s.shapes.len());
                            s.shapes.insert(index, rect);
                        }
                    }
                }
            }
            Ok(())
        })
    }

    async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        _timeout: Duration,
    ) -> E2eResult<()> {
        self.with(format!("wait:{}", selector), |s| {
            let visible = s.visible(selector);
            let satisfied = match state {
                WaitState::Visible | WaitState::Attached => visible,
                WaitState::Hidden | WaitState::Detached => !visible,
            };
            if satisfied {
                Ok(())
            } else {
                Err(E2eError::Timeout(format!("{} to be {:?}", selector, state)))
            }
        })
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        self.with(format!("count:{}", selector), |s| {
            if selector == locators::NEW_PLAN_BUTTON {
                return Ok(if s.screen == Screen::Editor { s.options.new_plan_controls } else { 0 });
            }
            Ok(usize::from(s.visible(selector)))
        })
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        self.with(format!("is_visible:{}", selector), |s| Ok(s.visible(selector)))
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        self.with(format!("text_content:{}", selector), |s| {
            s.ensure_visible(selector)?;
            if selector == locators::AREA_TEXT {
                if let Some(index) = s.selected {
                    let area = s.shapes[index].area_m2();
                    return Ok(Some(format!("{} m²", format_property_value(area))));
                }
            }
            Ok(None)
        })
    }

    async fn input_value(&self, selector: &str) -> E2eResult<String> {
        self.with(format!("input_value:{}", selector), |s| {
            s.ensure_visible(selector)?;
            let field = AppState::property_selector(selector)
                .ok_or_else(|| E2eError::Playwright(format!("{} is not an input", selector)))?;
            if let Some((editing, text)) = &s.edit_buffer {
                if *editing == field {
                    return Ok(text.clone());
                }
            }
            let index = s.selected.unwrap();
            Ok(s.display(field, &s.shapes[index]))
        })
    }

    async fn bounding_box(&self, selector: &str) -> E2eResult<Option<BoundingBox>> {
        self.with(format!("bounding_box:{}", selector), |s| {
            if selector == locators::CANVAS && s.visible(selector) {
                Ok(Some(s.canvas()))
            } else {
                Ok(None)
            }
        })
    }

    async fn mouse_click(&self, x: f64, y: f64, button: MouseButton) -> E2eResult<()> {
        self.with(format!("mouse_click:{:?}", button), |s| {
            s.mouse = (x, y);
            s.edit_buffer = None;
            match (s.tool, button) {
                (Tool::Rectangle, MouseButton::Left) => match s.pending_corner.take() {
                    None => s.pending_corner = Some((x, y)),
                    Some(first) => {
                        s.shapes.push(Rect::from_corners(first, (x, y)));
                        s.selected = Some(s.shapes.len() - 1);
                    }
                },
                (Tool::Select, MouseButton::Left) => {
                    s.selected = s.hit(x, y);
                    s.context_menu = None;
                }
                (Tool::Select, MouseButton::Right) => {
                    s.selected = s.hit(x, y);
                    s.context_menu = s.selected;
                }
                _ => {}
            }
            Ok(())
        })
    }

    async fn mouse_move(&self, x: f64, y: f64) -> E2eResult<()> {
        self.with("mouse_move".to_string(), |s| {
            s.mouse = (x, y);
            Ok(())
        })
    }

    async fn mouse_down(&self) -> E2eResult<()> {
        self.with("mouse_down".to_string(), |s| {
            let (x, y) = s.mouse;
            s.drag = s
                .selected
                .and_then(|index| Handle::locate(&s.shapes[index], x, y))
                .filter(|handle| handle.is_corner() || s.design_edit)
                .map(|handle| (handle, (x, y)));
            Ok(())
        })
    }

    async fn mouse_up(&self) -> E2eResult<()> {
        self.with("mouse_up".to_string(), |s| {
            if let (Some((handle, start)), Some(index)) = (s.drag.take(), s.selected) {
                if s.options.resize_works {
                    let (dx, dy) = (s.mouse.0 - start.0, s.mouse.1 - start.1);
                    s.shapes[index] = handle.apply(s.shapes[index], dx, dy);
                }
            }
            Ok(())
        })
    }

    async fn close(&self) -> E2eResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.closed {
            state.calls.push("close".to_string());
            state.closed = true;
        }
        Ok(())
    }
}

/// Hands out a fresh `FakeApp` per scenario and remembers every one
pub struct FakeLauncher {
    options: FakeOptions,
    pub launched: Mutex<Vec<FakeApp>>,
    pub fail_launch: bool,
}

impl FakeLauncher {
    pub fn new(options: FakeOptions) -> Self {
        Self {
            options,
            launched: Mutex::new(Vec::new()),
            fail_launch: false,
        }
    }

    pub fn apps(&self) -> Vec<FakeApp> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationLauncher for FakeLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn Automation>> {
        if self.fail_launch {
            return Err(E2eError::PlaywrightNotFound);
        }
        let app = FakeApp::new(self.options.clone());
        self.launched.lock().unwrap().push(app.clone());
        Ok(Box::new(app))
    }
}
