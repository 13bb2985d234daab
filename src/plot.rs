use log::info;
use ndarray::ArrayView2;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

use crate::error::Result;

/// Default canvas for single-panel figures.
pub const FIGURE_SIZE: (u32, u32) = (640, 480);

pub const SERIES_COLORS: [RGBColor; 6] = [BLUE, RED, GREEN, MAGENTA, CYAN, BLACK];

/// Renders a figure into a PNG file. The drawing area handed to `draw` is
/// already filled white and is presented after `draw` returns.
pub fn render_png<P, F>(output_path: P, size: (u32, u32), draw: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<()>,
{
    let path = output_path.as_ref();
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    draw(&root)?;
    root.present()?;
    info!("figure written to {}", path.display());
    Ok(())
}

/// Renders a figure into an in-memory SVG document.
pub fn render_svg<F>(size: (u32, u32), draw: F) -> Result<String>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>,
{
    let mut buffer = String::new();
    {
        let root = SVGBackend::with_string(&mut buffer, size).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }
    Ok(buffer)
}

/// Grey colormap: low values white, high values black.
pub fn greys(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let level = (255.0 * (1.0 - t)).round() as u8;
    RGBColor(level, level, level)
}

/// Widens an empty or inverted interval so it can back an axis.
pub fn padded_range(lo: f64, hi: f64) -> (f64, f64) {
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi > lo {
        (lo, hi)
    } else {
        let pad = if lo == 0.0 { 0.5 } else { lo.abs() * 0.05 };
        (lo - pad, lo + pad)
    }
}

/// Data range of `values` with a 5% margin on both sides.
pub fn axis_range<I>(values: I) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
{
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    if span == 0.0 {
        return padded_range(lo, hi);
    }
    (lo - 0.05 * span, hi + 0.05 * span)
}

/// Axis tick text: fixed point for ordinary magnitudes, scientific otherwise.
pub fn format_tick(v: &f64) -> String {
    let a = v.abs();
    if a == 0.0 {
        "0".to_string()
    } else if !(1e-2..1e4).contains(&a) {
        format!("{:.1e}", v)
    } else {
        format!("{:.3}", v)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

/// Outline of a step histogram, closed down to zero at both ends.
pub fn step_path(edges: &[f64], heights: &[f64]) -> Vec<(f64, f64)> {
    let mut points = Vec::with_capacity(2 * heights.len() + 2);
    if heights.is_empty() || edges.len() != heights.len() + 1 {
        return points;
    }
    points.push((edges[0], 0.0));
    for (i, h) in heights.iter().enumerate() {
        points.push((edges[i], *h));
        points.push((edges[i + 1], *h));
    }
    points.push((edges[heights.len()], 0.0));
    points
}

pub struct Series {
    pub label: Option<String>,
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
}

pub struct HLine {
    pub y: f64,
    pub label: Option<String>,
    pub color: RGBColor,
}

/// Line chart with optional horizontal reference lines and a legend when any
/// series is labelled.
pub fn draw_line_chart<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: Option<&str>,
    x_desc: &str,
    y_desc: &str,
    series: &[Series],
    hlines: &[HLine],
) -> Result<()> {
    let (x_min, x_max) = padded_range(
        series.iter().flat_map(|s| s.points.iter().map(|p| p.0)).fold(f64::INFINITY, f64::min),
        series.iter().flat_map(|s| s.points.iter().map(|p| p.0)).fold(f64::NEG_INFINITY, f64::max),
    );
    let (y_min, y_max) = axis_range(
        series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.1))
            .chain(hlines.iter().map(|h| h.y)),
    );

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(70);
    if let Some(title) = title {
        builder.caption(title, ("sans-serif", 20));
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .x_max_light_lines(0)
        .y_max_light_lines(0)
        .axis_style(BLACK.stroke_width(1))
        .label_style(("sans-serif", 14))
        .y_label_formatter(&format_tick)
        .draw()?;

    let mut labelled = false;
    for s in series {
        let color = s.color;
        let drawn = chart.draw_series(LineSeries::new(s.points.iter().copied(), color.stroke_width(1)))?;
        if let Some(label) = &s.label {
            labelled = true;
            drawn
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
    }

    for h in hlines {
        let color = h.color.mix(0.5);
        let drawn = chart.draw_series(DashedLineSeries::new(
            vec![(x_min, h.y), (x_max, h.y)],
            8,
            5,
            color.stroke_width(1),
        ))?;
        if let Some(label) = &h.label {
            labelled = true;
            drawn
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
    }

    if labelled {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", 14))
            .draw()?;
    }
    Ok(())
}

pub struct StepHist {
    pub label: Option<String>,
    pub edges: Vec<f64>,
    pub heights: Vec<f64>,
    pub color: RGBColor,
}

pub struct VLine {
    pub x: f64,
    pub label: Option<String>,
    pub color: RGBColor,
}

/// Step (unfilled) histograms sharing one set of axes.
pub fn draw_step_histograms<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: Option<&str>,
    x_desc: &str,
    y_desc: &str,
    hists: &[StepHist],
    vlines: &[VLine],
) -> Result<()> {
    let (x_min, x_max) = padded_range(
        hists.iter().filter_map(|h| h.edges.first().copied()).fold(f64::INFINITY, f64::min),
        hists.iter().filter_map(|h| h.edges.last().copied()).fold(f64::NEG_INFINITY, f64::max),
    );
    let y_top = hists
        .iter()
        .flat_map(|h| h.heights.iter().copied())
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    let y_max = if y_top > 0.0 { y_top * 1.1 } else { 1.0 };

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60);
    if let Some(title) = title {
        builder.caption(title, ("sans-serif", 20));
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .x_max_light_lines(0)
        .y_max_light_lines(0)
        .axis_style(BLACK.stroke_width(1))
        .label_style(("sans-serif", 14))
        .draw()?;

    let mut labelled = false;
    for h in hists {
        let color = h.color;
        let drawn = chart.draw_series(LineSeries::new(
            step_path(&h.edges, &h.heights),
            color.stroke_width(1),
        ))?;
        if let Some(label) = &h.label {
            labelled = true;
            drawn
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
    }

    for v in vlines {
        let color = v.color;
        let drawn = chart.draw_series(DashedLineSeries::new(
            vec![(v.x, 0.0), (v.x, y_max)],
            8,
            5,
            color.mix(0.7).stroke_width(2),
        ))?;
        if let Some(label) = &v.label {
            labelled = true;
            drawn
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
    }

    if labelled {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", 14))
            .draw()?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub x: f64,
    pub y: f64,
    /// Half-width of the cross in pixels.
    pub size: u32,
}

pub struct ImagePanel<'img, 'txt> {
    pub image: ArrayView2<'img, f64>,
    pub vmin: f64,
    pub vmax: f64,
    pub title: &'txt str,
    pub xlim: [f64; 2],
    pub ylim: [f64; 2],
    pub markers: &'txt [Marker],
}

/// Draws a 2-D array with the origin at the lower left, one rectangle per
/// visible pixel, followed by a colorbar on the right.
pub fn draw_image_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &ImagePanel<'_, '_>,
) -> Result<()> {
    let (width, _) = area.dim_in_pixel();
    let colorbar_width = (width / 5).clamp(40, 90);
    let (image_area, colorbar_area) = area.split_horizontally(width.saturating_sub(colorbar_width));
    let (vmin, vmax) = padded_range(panel.vmin, panel.vmax);
    let [x0, x1] = panel.xlim;
    let [y0, y1] = panel.ylim;

    let mut chart = ChartBuilder::on(&image_area)
        .caption(panel.title, ("sans-serif", 13))
        .margin(5)
        .x_label_area_size(22)
        .y_label_area_size(32)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(5)
        .y_labels(5)
        .label_style(("sans-serif", 11))
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .draw()?;

    let (rows, cols) = panel.image.dim();
    let col_lo = (x0 + 0.5).floor().max(0.0) as usize;
    let col_hi = ((x1 + 0.5).ceil().max(0.0) as usize).min(cols);
    let row_lo = (y0 + 0.5).floor().max(0.0) as usize;
    let row_hi = ((y1 + 0.5).ceil().max(0.0) as usize).min(rows);
    let span = vmax - vmin;
    let image = panel.image;

    chart.draw_series(
        (row_lo..row_hi)
            .flat_map(|r| (col_lo..col_hi).map(move |c| (r, c)))
            .map(|(r, c)| {
                let x = c as f64;
                let y = r as f64;
                let color = greys((image[[r, c]] - vmin) / span);
                Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], color.filled())
            }),
    )?;

    chart.draw_series(
        panel
            .markers
            .iter()
            .filter(|m| m.x >= x0 && m.x <= x1 && m.y >= y0 && m.y <= y1)
            .map(|m| Cross::new((m.x, m.y), m.size, RED.stroke_width(1))),
    )?;

    draw_colorbar(&colorbar_area, vmin, vmax)
}

fn draw_colorbar<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, vmin: f64, vmax: f64) -> Result<()> {
    let mut colorbar = ChartBuilder::on(area)
        .margin_top(25)
        .margin_bottom(25)
        .set_label_area_size(LabelAreaPosition::Right, 45)
        .set_label_area_size(LabelAreaPosition::Left, 0)
        .build_cartesian_2d(0.0..1.0, vmin..vmax)?;

    let steps = 100;
    let step = (vmax - vmin) / steps as f64;
    colorbar.draw_series((0..steps).map(|i| {
        let value = i as f64 / (steps - 1) as f64;
        let lo = vmin + i as f64 * step;
        Rectangle::new([(0.0, lo), (1.0, lo + step)], greys(value).filled())
    }))?;

    colorbar
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .disable_x_axis()
        .y_labels(5)
        .y_label_style(("sans-serif", 10))
        .y_label_formatter(&|v| format!("{:.1e}", v))
        .draw()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greys_maps_low_to_white() {
        assert_eq!(greys(0.0).rgb(), (255, 255, 255));
        assert_eq!(greys(1.0).rgb(), (0, 0, 0));
        assert_eq!(greys(2.0).rgb(), (0, 0, 0));
        assert_eq!(greys(f64::NAN).rgb(), (255, 255, 255));
    }

    #[test]
    fn step_path_closes_at_zero() {
        let path = step_path(&[0.0, 1.0, 2.0], &[3.0, 1.0]);
        assert_eq!(
            path,
            vec![(0.0, 0.0), (0.0, 3.0), (1.0, 3.0), (1.0, 1.0), (2.0, 1.0), (2.0, 0.0)]
        );
        assert!(step_path(&[0.0, 1.0], &[1.0, 2.0]).is_empty());
    }

    #[test]
    fn tick_labels_switch_to_scientific() {
        assert_eq!(format_tick(&0.0), "0");
        assert_eq!(format_tick(&2.5), "2.5");
        assert_eq!(format_tick(&100.0), "100");
        assert_eq!(format_tick(&0.005), "5.0e-3");
        assert_eq!(format_tick(&25000.0), "2.5e4");
    }

    #[test]
    fn degenerate_ranges_are_widened() {
        assert_eq!(padded_range(0.0, 0.0), (-0.5, 0.5));
        let (lo, hi) = padded_range(2.0, 2.0);
        assert!(lo < 2.0 && hi > 2.0);
        assert_eq!(axis_range(std::iter::empty()), (0.0, 1.0));
        let (lo, hi) = axis_range(vec![0.0, 10.0, f64::NAN]);
        assert!((lo + 0.5).abs() < 1e-12 && (hi - 10.5).abs() < 1e-12);
    }

    #[test]
    #[ignore = "needs system fonts"]
    fn reference_lines_are_dashed() {
        let hist = || StepHist {
            label: None,
            edges: vec![0.0, 1.0, 2.0, 3.0],
            heights: vec![2.0, 5.0, 1.0],
            color: BLUE,
        };
        let polylines = |vlines: &[VLine]| {
            render_svg(FIGURE_SIZE, |area| draw_step_histograms(area, None, "x", "N", &[hist()], vlines))
                .unwrap()
                .matches("<polyline")
                .count()
        };
        let bare = polylines(&[]);
        let marked = polylines(&[VLine {
            x: 1.5,
            label: None,
            color: RED,
        }]);
        // one solid line would add a single polyline
        assert!(marked > bare + 5, "{} vs {}", marked, bare);
    }
}
