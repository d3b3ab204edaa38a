use plotters::style::RGBColor;

use crate::types::ContributionLevel;

/// Colours of a rendered calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTheme {
    pub background_color: RGBColor,
    pub text_color: RGBColor,
    /// Indexed by [`ContributionLevel::as_u8`]
    pub level_colors: [RGBColor; 5],
    pub today_outline: RGBColor,
}

impl CalendarTheme {
    pub fn light() -> Self {
        Self {
            background_color: RGBColor(255, 255, 255),
            text_color: RGBColor(36, 41, 47),
            level_colors: [
                RGBColor(235, 237, 240),
                RGBColor(155, 233, 168),
                RGBColor(64, 196, 99),
                RGBColor(48, 161, 78),
                RGBColor(33, 110, 57),
            ],
            today_outline: RGBColor(9, 105, 218),
        }
    }

    pub fn dark() -> Self {
        Self {
            background_color: RGBColor(13, 17, 23),
            text_color: RGBColor(201, 209, 217),
            level_colors: [
                RGBColor(22, 27, 34),
                RGBColor(14, 68, 41),
                RGBColor(0, 109, 50),
                RGBColor(38, 166, 65),
                RGBColor(57, 211, 83),
            ],
            today_outline: RGBColor(88, 166, 255),
        }
    }

    pub fn level_color(&self, level: ContributionLevel) -> RGBColor {
        self.level_colors[level.as_u8() as usize]
    }
}

impl Default for CalendarTheme {
    fn default() -> Self {
        Self::light()
    }
}

/// Calendar geometry, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarStyle {
    pub cell_size: u32,
    pub cell_gap: u32,
    pub margin: u32,
    pub font_size: u32,
    /// Month labels above the grid plus the caption and legend below it
    pub draw_labels: bool,
}

impl Default for CalendarStyle {
    fn default() -> Self {
        Self {
            cell_size: 11,
            cell_gap: 3,
            margin: 10,
            font_size: 10,
            draw_labels: true,
        }
    }
}

impl CalendarStyle {
    pub(crate) fn pitch(&self) -> u32 {
        self.cell_size + self.cell_gap
    }

    pub(crate) fn label_band(&self) -> u32 {
        if self.draw_labels {
            self.font_size + 6
        } else {
            0
        }
    }
}
