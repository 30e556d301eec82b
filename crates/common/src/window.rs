//! Window description and the headless window stub.
//!
//! Platform windows live outside this workspace. Headless targets (CI,
//! offline rendering, the CLI) use [`HeadlessWindow`], which accepts every
//! call and never opens anything.

use crate::flags::WindowFlags;
use glam::UVec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDesc {
    pub title: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub flags: WindowFlags,
}

impl Default for WindowDesc {
    fn default() -> Self {
        Self {
            title: "lumen".into(),
            x: 0,
            y: 0,
            width: 1280,
            height: 720,
            flags: WindowFlags::DEFAULT,
        }
    }
}

/// Window that does nothing. `create` always reports failure so callers fall
/// back to offscreen rendering.
#[derive(Debug, Clone, Default)]
pub struct HeadlessWindow {
    desc: WindowDesc,
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the description and returns `false`: no native window exists.
    pub fn create(&mut self, desc: WindowDesc) -> bool {
        self.desc = desc;
        false
    }

    pub fn close(&mut self) {}

    pub fn desc(&self) -> &WindowDesc {
        &self.desc
    }

    pub fn update_desc(&mut self, _desc: &WindowDesc) {}

    pub fn set_title(&mut self, _title: &str) {}

    pub fn set_position(&mut self, _x: u32, _y: u32) {}

    pub fn set_mouse_position(&mut self, _x: u32, _y: u32) {}

    pub fn show_mouse(&mut self, _show: bool) {}

    pub fn set_size(&mut self, _width: u32, _height: u32) {}

    pub fn set_progress(&mut self, _progress: f32) {}

    pub fn current_display_size(&self) -> UVec2 {
        UVec2::ZERO
    }

    pub fn current_display_position(&self) -> UVec2 {
        UVec2::ZERO
    }
}
