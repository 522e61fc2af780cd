use anyhow::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::PathBuf;

mod config;
mod scene;

use scene::{PassReport, Scene, SceneRunner};

const USAGE: &str = "usage: nodeflow-app <scene.json> [--config <evaluator.toml>]";

struct Args {
    scene: PathBuf,
    config: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut scene = None;
        let mut config = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    config = Some(PathBuf::from(path));
                }
                "-h" | "--help" => {
                    println!("{}", USAGE);
                    std::process::exit(0);
                }
                _ if scene.is_none() => scene = Some(PathBuf::from(arg)),
                _ => bail!("unexpected argument '{}'\n{}", arg, USAGE),
            }
        }
        let scene = scene.with_context(|| USAGE.to_string())?;
        Ok(Self { scene, config })
    }
}

fn print_pass(pass: &PassReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(pass)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse(std::env::args().skip(1))?;

    let config = match &args.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config(),
    };

    let json = fs::read_to_string(&args.scene)
        .with_context(|| format!("reading scene {}", args.scene.display()))?;
    let scene: Scene = serde_json::from_str(&json)
        .with_context(|| format!("parsing scene {}", args.scene.display()))?;

    let mut runner = SceneRunner::build(&scene, config)?;
    let report = runner.evaluate()?;
    print_pass(&runner.pass_report("initial", &report))?;

    for edit in &scene.edits {
        info!("Applying edit: {}", edit);
        runner
            .apply(edit)
            .with_context(|| format!("applying edit '{}'", edit))?;
        let report = runner.evaluate()?;
        print_pass(&runner.pass_report(&edit.to_string(), &report))?;
    }
    Ok(())
}
