//! Loss-curve reporting.
//!
//! Renders the per-epoch losses the training loop actually recorded as a
//! Train/Validation line chart in the terminal.

use trueno_viz::output::{TerminalEncoder, TerminalMode};
use trueno_viz::plots::{LossCurve, MetricSeries};
use trueno_viz::prelude::Rgba;
use trueno_viz::prelude::WithDimensions;

/// Chart width in terminal cells.
const CHART_WIDTH: u32 = 80;
/// Chart height in pixels (terminal rows cover two pixels each).
const CHART_HEIGHT: u32 = 24;

/// Render train/validation loss curves to a terminal string.
///
/// Needs at least two recorded epochs to draw a line; below that it returns
/// a placeholder note instead of a chart.
#[must_use]
pub fn render_loss_chart(train_losses: &[f32], val_losses: &[f32]) -> String {
    if train_losses.len() < 2 {
        return format!(
            "(loss chart needs at least 2 epochs; recorded {})",
            train_losses.len()
        );
    }

    let mut curve = match LossCurve::new()
        .add_series(MetricSeries::new("Train", Rgba::rgb(66, 133, 244)))
        .add_series(MetricSeries::new("Validation", Rgba::rgb(255, 128, 0)))
        .dimensions(CHART_WIDTH, CHART_HEIGHT)
        .margin(2)
        .best_markers(true)
        .lower_is_better(true)
        .build()
    {
        Ok(curve) => curve,
        Err(_) => return String::from("(loss chart unavailable)"),
    };

    for &loss in train_losses {
        curve.push(0, loss);
    }
    for &loss in val_losses {
        curve.push(1, loss);
    }

    let Ok(framebuffer) = curve.to_framebuffer() else {
        return String::from("(loss chart unavailable)");
    };

    TerminalEncoder::new()
        .mode(TerminalMode::UnicodeHalfBlock)
        .width(CHART_WIDTH)
        .height(CHART_HEIGHT / 2)
        .render(&framebuffer)
}

/// Print the chart with a title line.
pub fn print_loss_chart(train_losses: &[f32], val_losses: &[f32]) {
    println!("Training vs Validation Loss");
    println!("{}", render_loss_chart(train_losses, val_losses));
}
