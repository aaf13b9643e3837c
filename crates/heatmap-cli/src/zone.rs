//! Offline zone checks: replay a click sequence through the capture flow and
//! show the polygon the server would store.

use anyhow::{bail, Context};
use clap::Subcommand;
use heatmap_core::{point_in_polygon, CanvasPoint, CanvasSize, Resolution, ZoneCapture};

#[derive(Debug, Subcommand)]
pub enum ZoneCommands {
    /// Validate a canvas click sequence and transform it to video pixels
    Check {
        /// Clicked points as `x,y;x,y;...` in canvas pixels
        #[arg(long)]
        points: String,
        /// Drawing surface as `WIDTHxHEIGHT`
        #[arg(long, default_value = "640x480")]
        canvas: String,
        /// Camera resolution as `WIDTHxHEIGHT`; omitted means canvas-sized video
        #[arg(long)]
        resolution: Option<String>,
        /// Video-space point `x,y` to test for containment
        #[arg(long)]
        probe: Option<String>,
    },
}

fn parse_pair(raw: &str) -> anyhow::Result<(f64, f64)> {
    let (x, y) = raw
        .split_once(',')
        .with_context(|| format!("expected `x,y`, got '{raw}'"))?;
    let x: f64 = x.trim().parse().with_context(|| format!("bad x in '{raw}'"))?;
    let y: f64 = y.trim().parse().with_context(|| format!("bad y in '{raw}'"))?;
    Ok((x, y))
}

pub(crate) fn parse_points(raw: &str) -> anyhow::Result<Vec<CanvasPoint>> {
    raw.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| parse_pair(p).map(|(x, y)| CanvasPoint { x, y }))
        .collect()
}

pub(crate) fn parse_dimensions(raw: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .with_context(|| format!("expected `WIDTHxHEIGHT`, got '{raw}'"))?;
    let w: u32 = w.trim().parse().with_context(|| format!("bad width in '{raw}'"))?;
    let h: u32 = h.trim().parse().with_context(|| format!("bad height in '{raw}'"))?;
    if w == 0 || h == 0 {
        bail!("dimensions must be positive, got '{raw}'");
    }
    Ok((w, h))
}

pub(crate) fn run_zone_check(
    points: &str,
    canvas: &str,
    resolution: Option<&str>,
    probe: Option<&str>,
) -> anyhow::Result<()> {
    let (cw, ch) = parse_dimensions(canvas)?;
    let canvas = CanvasSize::new(f64::from(cw), f64::from(ch))?;
    let resolution = resolution
        .map(parse_dimensions)
        .transpose()?
        .map(|(width, height)| Resolution { width, height });

    let mut capture = ZoneCapture::new(canvas);
    for point in parse_points(points)? {
        if !capture.push(point)? {
            println!("ignored repeated click at ({}, {})", point.x, point.y);
        }
    }
    let polygon = capture.close()?;
    let video = polygon.to_video(resolution)?;

    println!("valid polygon with {} vertices", video.len());
    let rendered: Vec<String> = video.iter().map(|p| format!("({}, {})", p.x, p.y)).collect();
    println!("video polygon: {}", rendered.join(" "));

    if let Some(raw) = probe {
        let point = parse_pair(raw)?;
        let inside = point_in_polygon(point, &video);
        println!(
            "point ({}, {}) is {}",
            point.0,
            point.1,
            if inside { "inside" } else { "outside" }
        );
    }
    Ok(())
}
