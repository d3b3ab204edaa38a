use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::error::Error;
use std::path::Path;
use tracing::debug;

use super::styles::{CalendarStyle, CalendarTheme};
use crate::types::{CalendarGrid, ContributionLevel, DAYS_PER_WEEK};

pub type PlotError = Box<dyn Error + Send + Sync>;

fn wrap_err<E>(e: E) -> PlotError
where
    E: Into<Box<dyn Error + Send + Sync>>,
{
    e.into()
}

/// Pixel size of the image [`render_calendar_svg`] produces for a grid of `weeks` columns.
pub fn calendar_dimensions(weeks: usize, style: &CalendarStyle) -> (u32, u32) {
    let pitch = style.pitch();
    let width = 2 * style.margin + weeks as u32 * pitch;
    let height = 2 * style.margin + DAYS_PER_WEEK as u32 * pitch + 2 * style.label_band();
    (width, height)
}

/// Render the grid as an SVG document. One square per day, weeks as columns
/// with the oldest on the left, today outlined.
pub fn render_calendar_svg(
    grid: &CalendarGrid,
    theme: &CalendarTheme,
    style: &CalendarStyle,
) -> Result<String, PlotError> {
    let size = calendar_dimensions(grid.weeks.len(), style);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        draw_calendar(&root, grid, theme, style)?;
        root.present().map_err(wrap_err)?;
    }
    debug!(bytes = svg.len(), width = size.0, height = size.1, "rendered calendar");
    Ok(svg)
}

pub fn save_calendar_svg(
    path: &Path,
    grid: &CalendarGrid,
    theme: &CalendarTheme,
    style: &CalendarStyle,
) -> Result<(), PlotError> {
    let svg = render_calendar_svg(grid, theme, style)?;
    std::fs::write(path, svg)?;
    Ok(())
}

fn draw_calendar<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    grid: &CalendarGrid,
    theme: &CalendarTheme,
    style: &CalendarStyle,
) -> Result<(), PlotError>
where
    DB::ErrorType: 'static,
{
    root.fill(&theme.background_color).map_err(wrap_err)?;

    let pitch = style.pitch() as i32;
    let cell = style.cell_size as i32;
    let left = style.margin as i32;
    let top = (style.margin + style.label_band()) as i32;
    let font = ("sans-serif", style.font_size)
        .into_font()
        .color(&theme.text_color);

    if style.draw_labels {
        let anchored = font.pos(Pos::new(HPos::Left, VPos::Top));
        for label in &grid.month_labels {
            let x = left + label.week_index as i32 * pitch;
            root.draw(&Text::new(label.month, (x, style.margin as i32), anchored.clone()))
                .map_err(wrap_err)?;
        }
    }

    for (week_index, week) in grid.weeks.iter().enumerate() {
        let x = left + week_index as i32 * pitch;
        for (day_index, day) in week.iter().enumerate() {
            let y = top + day_index as i32 * pitch;
            let color = theme.level_color(day.level);
            root.draw(&Rectangle::new([(x, y), (x + cell, y + cell)], color.filled()))
                .map_err(wrap_err)?;
            if day.is_today {
                root.draw(&Rectangle::new(
                    [(x, y), (x + cell, y + cell)],
                    theme.today_outline.stroke_width(1),
                ))
                .map_err(wrap_err)?;
            }
        }
    }

    if style.draw_labels {
        let baseline = top + DAYS_PER_WEEK as i32 * pitch + 4;
        let caption = format!(
            "{} contributions in the last year",
            grid.total_contributions
        );
        root.draw(&Text::new(
            caption,
            (left, baseline),
            font.pos(Pos::new(HPos::Left, VPos::Top)),
        ))
        .map_err(wrap_err)?;

        let grid_right = left + grid.weeks.len() as i32 * pitch;
        root.draw(&Text::new(
            "More",
            (grid_right, baseline),
            font.pos(Pos::new(HPos::Right, VPos::Top)),
        ))
        .map_err(wrap_err)?;
        let legend_right = grid_right - 3 * style.font_size as i32;
        let legend_left = legend_right - ContributionLevel::ALL.len() as i32 * pitch;
        for (i, level) in ContributionLevel::ALL.iter().enumerate() {
            let x = legend_left + i as i32 * pitch;
            root.draw(&Rectangle::new(
                [(x, baseline), (x + cell, baseline + cell)],
                theme.level_color(*level).filled(),
            ))
            .map_err(wrap_err)?;
        }
        root.draw(&Text::new(
            "Less",
            (legend_left - 4, baseline),
            font.pos(Pos::new(HPos::Right, VPos::Top)),
        ))
        .map_err(wrap_err)?;
    }

    Ok(())
}
