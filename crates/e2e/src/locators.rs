//! Selectors for the application under test
//!
//! These strings are the contract with the remote page. Nothing outside the
//! facade should reference them.

pub const EMAIL_INPUT: &str = r#"//input[@type="email"]"#;
pub const PASSWORD_INPUT: &str = r#"//input[@type="password"]"#;
pub const SUBMIT_BUTTON: &str = r#"//button[@type="submit"]"#;

pub const CANVAS: &str = "canvas";
pub const RECTANGLE_TOOL: &str = r#"//div[@id="div-top-menu-bar-rectangle"]"#;
pub const SELECT_TOOL: &str = r#"//img[@alt="pointer"]"#;
pub const DESIGN_EDIT_TOOL: &str = r#"//img[@id="img-top-menu-bar-design-edit"]"#;
pub const DELETE_BUTTON: &str = r#"//img[@alt="new delete"]"#;

pub const AREA_TEXT: &str = "#insideTextMiddle";

/// Shown once the surface is back to its base state
pub const BASELINE_MARKER: &str = "text=Site";

/// The save-view button inside the header row labelled "Plans"
pub const NEW_PLAN_BUTTON: &str =
    r#"div.flex.items-center.justify-between:has(h5:has-text("Plans")) button#save-view-button"#;

/// Numeric inputs in the property panel of the selected shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyField {
    Width,
    Length,
}

impl PropertyField {
    pub fn property_id(&self) -> &'static str {
        match self {
            PropertyField::Width => "width-property",
            PropertyField::Length => "length-property",
        }
    }

    pub fn selector(&self) -> String {
        format!(r#"div[data-property-id="{}"] input"#, self.property_id())
    }
}

impl std::fmt::Display for PropertyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyField::Width => write!(f, "width"),
            PropertyField::Length => write!(f, "length"),
        }
    }
}
