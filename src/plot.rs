//! Waveform frame plots
//!
//! Frames are drawn as intensity images, channels along the horizontal axis
//! and time ticks along the vertical axis with the first tick at the bottom.
//! A red vertical line separates the induction (right) and collection (left)
//! channels.

use crate::{
    frames::{frame_key, Frame, FrameError, FrameStore},
    report::{Document, ReportError},
};
use indicatif::ProgressBar;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("failed to draw {1:?}: {0}")]
    Drawing(String, PathBuf),
    #[error("failed to read the frame")]
    Frame(#[from] FrameError),
    #[error("failed to assemble the document")]
    Report(#[from] ReportError),
}
type Result<T> = std::result::Result<T, PlotError>;

/// Frame page renderer
pub trait Render {
    /// Renders the frame stored under `key` into the image file `path`
    fn render(&self, key: &str, frame: &Frame, path: &Path) -> Result<()>;
}

const COLORBAR_WIDTH: u32 = 120;
const COLORBAR_STEPS: usize = 256;

/// Intensity image of a frame with a color bar
#[derive(Debug, Clone)]
pub struct Heatmap {
    aspect: f64,
    width: u32,
    annotate: bool,
}
impl Default for Heatmap {
    fn default() -> Self {
        Self {
            aspect: 1.,
            width: 800,
            annotate: true,
        }
    }
}
impl Heatmap {
    /// Height to width ratio of a sample cell
    pub fn aspect(self, aspect: f64) -> Self {
        Self { aspect, ..self }
    }
    /// Width of the image area in pixels
    pub fn width(self, width: u32) -> Self {
        Self { width, ..self }
    }
    /// Draws title, axes and color bar labels
    pub fn annotate(self, annotate: bool) -> Self {
        Self { annotate, ..self }
    }
    /// Figure size in pixels
    pub fn size(&self, frame: &Frame) -> (u32, u32) {
        let cell = self.width as f64 / frame.cols().max(1) as f64;
        let height = (frame.rows() as f64 * cell * self.aspect).round() as u32;
        let height = height.clamp(self.width / 4, self.width * 4);
        (self.width + COLORBAR_WIDTH, height)
    }
}
/// End points of the line separating the collection and induction channels
///
/// The line runs through the centers of column `cols/2`, from the first to the last tick.
fn midline(frame: &Frame) -> [(f64, f64); 2] {
    let x = (frame.cols() / 2) as f64 + 0.5;
    [(x, 0.5), (x, frame.rows().max(1) as f64 - 0.5)]
}

impl Render for Heatmap {
    fn render(&self, key: &str, frame: &Frame, path: &Path) -> Result<()> {
        let drawing = |e: &dyn std::fmt::Display| PlotError::Drawing(e.to_string(), path.to_path_buf());
        let (rows, cols) = (frame.rows(), frame.cols());
        let (min_value, max_value) = frame.minmax().unwrap_or((0., 0.));
        let range = max_value - min_value;
        let color = |value: f64| {
            let u = if range > 0. {
                (value - min_value) / range
            } else {
                0.5
            };
            let c = colorous::VIRIDIS.eval_continuous(u);
            RGBColor(c.r, c.g, c.b)
        };
        let label_size = if self.annotate { 40 } else { 0 };

        let size = self.size(frame);
        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(|e| drawing(&e))?;
        let (image_area, bar_area) = root.split_horizontally(size.0 - COLORBAR_WIDTH);

        let mut builder = ChartBuilder::on(&image_area);
        builder
            .margin(10)
            .set_label_area_size(LabelAreaPosition::Left, label_size)
            .set_label_area_size(LabelAreaPosition::Bottom, label_size);
        if self.annotate {
            builder.caption(key, ("sans-serif", 16));
        }
        let mut chart = builder
            .build_cartesian_2d(0f64..cols.max(1) as f64, 0f64..rows.max(1) as f64)
            .map_err(|e| drawing(&e))?;
        if self.annotate {
            chart
                .configure_mesh()
                .disable_mesh()
                .x_desc("Channel")
                .y_desc("Tick")
                .draw()
                .map_err(|e| drawing(&e))?;
        }
        let samples = frame.samples();
        chart
            .draw_series(
                (0..rows)
                    .flat_map(|i| (0..cols).map(move |j| (i, j)))
                    .map(|(i, j)| {
                        let (x, y) = (j as f64, i as f64);
                        Rectangle::new([(x, y), (x + 1., y + 1.)], color(samples[(i, j)]).filled())
                    }),
            )
            .map_err(|e| drawing(&e))?;
        chart
            .draw_series(LineSeries::new(midline(frame), &RED))
            .map_err(|e| drawing(&e))?;

        let (lo, hi) = if range > 0. {
            (min_value, max_value)
        } else {
            (min_value - 0.5, min_value + 0.5)
        };
        let mut bar = ChartBuilder::on(&bar_area)
            .margin(10)
            .margin_top(if self.annotate { 36 } else { 10 })
            .margin_bottom(10 + label_size)
            .set_label_area_size(LabelAreaPosition::Right, label_size + 20)
            .build_cartesian_2d(0f64..1f64, lo..hi)
            .map_err(|e| drawing(&e))?;
        if self.annotate {
            bar.configure_mesh()
                .disable_mesh()
                .disable_x_axis()
                .draw()
                .map_err(|e| drawing(&e))?;
        }
        let step = (hi - lo) / COLORBAR_STEPS as f64;
        bar.draw_series((0..COLORBAR_STEPS).map(|k| {
            let y = lo + k as f64 * step;
            Rectangle::new([(0., y), (1., y + step)], color(y + 0.5 * step).filled())
        }))
        .map_err(|e| drawing(&e))?;

        root.present().map_err(|e| drawing(&e))?;
        Ok(())
    }
}

fn render_page<S, R>(store: &mut S, key: &str, renderer: &R, document: &mut Document) -> Result<PathBuf>
where
    S: FrameStore,
    R: Render,
{
    let frame = store.fetch(key)?;
    log::info!("{key}: {}x{}", frame.rows(), frame.cols());
    let page = document.next_page()?;
    renderer.render(key, &frame, &page)?;
    Ok(page)
}

/// Renders the frames stored under `keys`, one page per frame
///
/// Nothing is written if any of the frames fails to render.
pub fn plot_frames<S, R>(store: &mut S, keys: &[String], renderer: &R, output: &Path) -> Result<usize>
where
    S: FrameStore,
    R: Render,
{
    let mut document = Document::new(output)?;
    let pb = ProgressBar::new(keys.len() as u64);
    for key in keys {
        match render_page(store, key, renderer, &mut document) {
            Ok(page) => document.push(page),
            Err(e) => {
                pb.abandon();
                document.discard()?;
                return Err(e);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(document.save()?)
}

/// Plots the frame of a given tag and trigger
pub fn plot_one<S, R>(store: &mut S, tag: &str, trigger: u32, renderer: &R, output: &Path) -> Result<usize>
where
    S: FrameStore,
    R: Render,
{
    let key = frame_key(tag, trigger);
    if !store.keys().contains(&key) {
        return Err(FrameError::MissingKey(key).into());
    }
    plot_frames(store, &[key], renderer, output)
}

/// Plots all the frames in the store, in store order
pub fn plot_many<S, R>(store: &mut S, renderer: &R, output: &Path) -> Result<usize>
where
    S: FrameStore,
    R: Render,
{
    let keys = store.keys();
    log::info!("{:?}", keys);
    let frame_keys = store.frame_keys();
    plot_frames(store, &frame_keys, renderer, output)
}
