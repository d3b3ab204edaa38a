//! SVG rendering of calendar grids.

mod chart;
mod styles;

pub use chart::{calendar_dimensions, render_calendar_svg, save_calendar_svg, PlotError};
pub use styles::{CalendarStyle, CalendarTheme};
