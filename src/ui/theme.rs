use ratatui::style::Color;

pub const BG_PRIMARY: Color = Color::Rgb(0, 0, 0);
pub const BG_PANEL: Color = Color::Rgb(12, 12, 12);
pub const FG_PRIMARY: Color = Color::Rgb(190, 190, 190);
pub const FG_DIM: Color = Color::Rgb(128, 128, 128);

pub const BAR_BG: Color = Color::Rgb(23, 52, 127);
pub const BAR_TEXT: Color = Color::Rgb(235, 240, 255);
pub const BAR_BUSY_BG: Color = Color::Rgb(127, 84, 23);

pub const BORDER_IDLE: Color = Color::Rgb(61, 120, 120);
pub const BORDER_FOCUS: Color = Color::Rgb(187, 94, 0);
pub const SELECTION_BG: Color = Color::Rgb(60, 60, 60);

pub const USER_LABEL: Color = Color::Cyan;
pub const ASSISTANT_LABEL: Color = Color::White;
pub const FAILED: Color = Color::LightRed;
