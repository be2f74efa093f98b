//! superpix - label local image elements with a trained model
//!
//! Reads a JSON list of elements (ellipse, bounding box, optional statistics)
//! and a JSON model, connects the elements into a graph, classifies them and
//! refines the labels with graph cuts. Labels are written as JSON.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use serde::Serialize;
use superpix_core::api::{RegionResult, SuperPixelClassification};
use superpix_core::classify::{SuperPixelClassifier, SuperPixelModel};
use superpix_core::connect::Connector;
use superpix_core::features::FEATURE_DIM;
use superpix_core::graph::PixelGraph;
use superpix_core::graphcut::{GraphCutParams, Smoothness, refine_orientations};
use superpix_core::params::LayoutParams;
use superpix_core::pixel::{LocalElement, PixelArena, PixelId, PixelSet};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Label local image elements with a trained superpixel model.
#[derive(Parser, Debug)]
#[command(name = "superpix")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with the element list
    elements: PathBuf,

    /// JSON model file
    #[arg(short = 'm', long)]
    model: PathBuf,

    /// JSON file with layout parameters
    #[arg(short = 'p', long)]
    params: Option<PathBuf>,

    /// JSON file with regions, each a list of element indices
    #[arg(short = 'r', long)]
    regions: Option<PathBuf>,

    /// Override a parameter, e.g. `-O connector=region` (repeatable)
    #[arg(short = 'O', long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,

    /// Smooth element orientations before classifying
    #[arg(long = "refine-orientations", action = ArgAction::SetTrue)]
    refine_orientations: bool,

    /// Path to file where output is written, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,
}

#[derive(Serialize)]
struct PixelOutput {
    id: PixelId,
    region: usize,
    label: String,
    label_id: u32,
    confidence: f64,
    classifier_label: String,
}

#[derive(Serialize)]
struct RegionOutput {
    pixels: usize,
    edges: usize,
    changed: usize,
    energy: Option<f64>,
    initial_energy: Option<f64>,
    sweeps: Option<usize>,
}

#[derive(Serialize)]
struct Output {
    regions: Vec<RegionOutput>,
    pixels: Vec<PixelOutput>,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(io::BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn build_params(args: &Args) -> Result<LayoutParams> {
    let mut params: LayoutParams = match &args.params {
        Some(path) => read_json(path)?,
        None => LayoutParams::default(),
    };
    for option in &args.options {
        let Some((name, value)) = option.split_once('=') else {
            bail!("option {option:?} is not of the form KEY=VALUE");
        };
        params.set_option(name, value)?;
    }
    params.validate()?;
    Ok(params)
}

fn build_regions(args: &Args, all: &PixelSet, num_pixels: usize) -> Result<Vec<PixelSet>> {
    let Some(path) = &args.regions else {
        return Ok(vec![all.clone()]);
    };
    let regions: Vec<Vec<usize>> = read_json(path)?;
    regions
        .into_iter()
        .enumerate()
        .map(|(r, members)| {
            members
                .into_iter()
                .map(|idx| {
                    if idx < num_pixels {
                        Ok(PixelId(idx))
                    } else {
                        bail!(
                            "region {r} refers to element {idx}, only {num_pixels} elements given"
                        )
                    }
                })
                .collect::<Result<PixelSet>>()
        })
        .collect()
}

fn smooth_orientations(
    arena: &mut PixelArena,
    regions: &[PixelSet],
    params: &LayoutParams,
) -> Result<()> {
    let connector = Connector::from_params(&params.connector, &params.dbscan);
    let graphcut = GraphCutParams {
        smoothness: Smoothness::Circular,
        ..params.graphcut.clone()
    };
    for set in regions {
        let graph = PixelGraph::build(arena, set.clone(), &connector)?;
        let refinement = refine_orientations(arena, &graph, &graphcut)?;
        debug!(
            pixels = set.len(),
            energy = refinement.energy,
            initial_energy = refinement.initial_energy,
            "orientations smoothed"
        );
    }
    Ok(())
}

fn render(results: &[RegionResult]) -> Output {
    let mut output = Output {
        regions: Vec::with_capacity(results.len()),
        pixels: Vec::new(),
    };
    for (region, result) in results.iter().enumerate() {
        let refinement = result.refinement();
        output.regions.push(RegionOutput {
            pixels: result.set().len(),
            edges: result.graph().num_edges(),
            changed: result.changed(),
            energy: refinement.map(|r| r.energy),
            initial_energy: refinement.map(|r| r.initial_energy),
            sweeps: refinement.map(|r| r.sweeps),
        });
        let rows = result.set().iter().zip(result.labels()).zip(result.predictions());
        for ((id, label), prediction) in rows {
            output.pixels.push(PixelOutput {
                id,
                region,
                label: label.label.name.to_string(),
                label_id: label.label.id,
                confidence: label.confidence,
                classifier_label: prediction.label.name.to_string(),
            });
        }
    }
    output
}

fn run(args: &Args) -> Result<()> {
    let params = build_params(args)?;

    let model_json = std::fs::read_to_string(&args.model)
        .with_context(|| format!("failed to read model {}", args.model.display()))?;
    let model = Arc::new(SuperPixelModel::from_json(&model_json)?);
    let classifier = SuperPixelClassifier::with_feature_dim(model, FEATURE_DIM)?;

    let elements: Vec<LocalElement> = read_json(&args.elements)?;
    let mut arena = PixelArena::with_capacity(elements.len());
    let all = arena.extend_elements(elements);
    let regions = build_regions(args, &all, arena.len())?;
    info!(pixels = arena.len(), regions = regions.len(), "loaded elements");

    if args.refine_orientations {
        smooth_orientations(&mut arena, &regions, &params)?;
    }

    let results =
        SuperPixelClassification::new(&arena, &classifier, &params).analyze_regions(&regions)?;

    let mut out: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile)
            .with_context(|| format!("failed to create output file {}", args.outfile))?;
        Box::new(BufWriter::new(file))
    };
    serde_json::to_writer_pretty(&mut out, &render(&results))?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(&args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
