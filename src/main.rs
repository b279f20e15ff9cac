mod app;
mod frame;
mod scene;
mod util;

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use crate::scene::pipeline::{AntiAlias, RenderMode};

const USAGE: &str = "usage: tiny_rasterizer -p <scene.json> [-o output.png] [-d depth.png] \
                     [-m shaded|coverage] [-a none|ssaa] [-n samples] [-s seed] [-w]";

/// Value following a flag.
fn flag_value<'a>(args: &'a [String], i: usize) -> anyhow::Result<&'a str> {
    match args.get(i + 1) {
        Some(value) => return Ok(value.as_str()),
        None => bail!("missing value for {}\n{}", args[i], USAGE),
    }
}

fn parse_args(args: &[String]) -> anyhow::Result<app::Params> {
    // Default values.
    let mut params = app::Params {
        scene_path: PathBuf::new(),
        output_path: PathBuf::from("output.png"),
        depth_path: None,
        mode: None,
        antialias: None,
        samples_per_pixel: None,
        seed: None,
        preview: false,
    };

    let mut scene_path = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-p" => scene_path = Some(PathBuf::from(flag_value(args, i)?)),
            "-o" => params.output_path = PathBuf::from(flag_value(args, i)?),
            "-d" => params.depth_path = Some(PathBuf::from(flag_value(args, i)?)),
            "-m" => {
                params.mode = Some(match flag_value(args, i)? {
                    "shaded" => RenderMode::Shaded,
                    "coverage" => RenderMode::Coverage,
                    other => bail!("unknown render mode {}\n{}", other, USAGE),
                })
            }
            "-a" => {
                params.antialias = Some(match flag_value(args, i)? {
                    "none" => AntiAlias::None,
                    "ssaa" => AntiAlias::Ssaa,
                    other => bail!("unknown antialiasing {}\n{}", other, USAGE),
                })
            }
            "-n" => {
                let value = flag_value(args, i)?;
                params.samples_per_pixel = Some(value.parse().with_context(|| format!("bad sample count {}", value))?);
            }
            "-s" => {
                let value = flag_value(args, i)?;
                params.seed = Some(value.parse().with_context(|| format!("bad seed {}", value))?);
            }
            "-w" => {
                params.preview = true;
                i += 1;
                continue;
            }
            other => bail!("unknown argument {}\n{}", other, USAGE),
        }
        i += 2;
    }

    params.scene_path = match scene_path {
        Some(path) => path,
        None => bail!("scene file is required\n{}", USAGE),
    };
    return Ok(params);
}

#[show_image::main]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let params = parse_args(&args)?;
    app::run(params)?;

    return Ok(());
}
