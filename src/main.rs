use std::convert::Infallible;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use reid_utils::bbox::{iou, BoundingBox};
use reid_utils::checkpoint::{
    load_checkpoint, CheckpointRecord, CheckpointStore, ModelHandle, StateDict,
};
use reid_utils::config::{parse_bool_flag, AppConfig};
use reid_utils::curve::TrainingCurve;
use reid_utils::data::{DatasetLayout, LoaderPlan, ReidDataset};

type Backend = NdArray<f32>;

/// Person re-identification training utilities.
#[derive(Parser)]
#[command(name = "reid-utils", version, about = "Person re-identification training utilities")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// IoU of two boxes given as xmin,ymin,xmax,ymax (inclusive pixels)
    Iou {
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        a: Vec<f32>,
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        b: Vec<f32>,
    },
    /// Print a checkpoint's training progress and parameter shapes
    Inspect { checkpoint: PathBuf },
    /// Restore a checkpoint into a freshly built classifier
    Transfer {
        checkpoint: PathBuf,

        /// Skip classifier-head parameters ("true" or "false")
        #[arg(long, value_parser = bool_flag)]
        eval_only: Option<bool>,

        /// Dataset layout JSON; its identity count sets the classifier width
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Write the restored model to the configured checkpoint directory
        #[arg(long)]
        save: bool,

        /// Also store the written checkpoint as the best one
        #[arg(long, requires = "save")]
        best: bool,
    },
    /// Print the data loader plan for a dataset layout as JSON
    Plan { layout: PathBuf },
    /// Summarize a saved training curve
    Curve { input: PathBuf },
    /// Print the default configuration as TOML
    DefaultConfig,
}

fn bool_flag(value: &str) -> Result<bool, Infallible> {
    Ok(parse_bool_flag(value))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Iou { a, b } => {
            let (a, b) = (to_box(&a)?, to_box(&b)?);
            println!("{:.6}", iou(&a, &b));
            Ok(())
        }
        Command::Inspect { checkpoint } => inspect(&checkpoint),
        Command::Transfer {
            checkpoint,
            eval_only,
            layout,
            save,
            best,
        } => {
            let app_config = load_config(&cli.config)?;
            transfer(&app_config, &checkpoint, eval_only, layout.as_deref(), save, best)
        }
        Command::Plan { layout } => {
            let app_config = load_config(&cli.config)?;
            let layout = DatasetLayout::load(&layout)?;
            let plan = LoaderPlan::build(&app_config.data, &layout)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Command::Curve { input } => {
            let curve = TrainingCurve::load(&input)
                .with_context(|| format!("loading curve from {}", input.display()))?;
            println!("{:>6} {:>10} {:>8}", "epoch", "loss", "prec");
            for p in curve.points() {
                println!("{:>6} {:>10.4} {:>7.2}%", p.epoch, p.loss, p.prec * 100.0);
            }
            if let Some(best) = curve.best() {
                println!("best: epoch {} ({:.2}%)", best.epoch, best.prec * 100.0);
            }
            Ok(())
        }
        Command::DefaultConfig => {
            print!("{}", AppConfig::default_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_or_default(path)
        .with_context(|| format!("loading config from {}", path.display()))
}

fn to_box(coords: &[f32]) -> Result<BoundingBox> {
    match coords {
        [xmin, ymin, xmax, ymax] => Ok(BoundingBox::new(*xmin, *ymin, *xmax, *ymax)),
        _ => bail!(
            "expected 4 comma-separated coordinates (xmin,ymin,xmax,ymax), got {}",
            coords.len()
        ),
    }
}

fn inspect(path: &Path) -> Result<()> {
    let record = CheckpointRecord::load(path)
        .with_context(|| format!("reading checkpoint {}", path.display()))?;
    println!("epoch:     {}", record.epoch);
    println!("best_top1: {:.4}", record.best_top1);
    println!("parameters ({}):", record.state_dict.len());
    for (name, data) in &record.state_dict {
        println!("  {name:<40} {:?}", data.shape);
    }
    Ok(())
}

fn transfer(
    app_config: &AppConfig,
    checkpoint: &Path,
    eval_only: Option<bool>,
    layout: Option<&Path>,
    save: bool,
    best: bool,
) -> Result<()> {
    let mut options = app_config.transfer.clone();
    if let Some(eval_only) = eval_only {
        options.eval_only = eval_only;
    }

    let layout = layout.map(DatasetLayout::load).transpose()?;
    let num_classes = app_config
        .model
        .class_count(layout.as_ref().map(|l| l as &dyn ReidDataset));
    if num_classes == 0 {
        bail!("classifier width is 0; set model.num_classes or pass a non-empty --layout");
    }

    let device = NdArrayDevice::Cpu;
    let model = app_config
        .model
        .classifier(num_classes)
        .init::<Backend>(&device);

    let restored = load_checkpoint(ModelHandle::Plain(model), checkpoint, &options)
        .with_context(|| format!("restoring checkpoint {}", checkpoint.display()))?;

    println!(
        "start_epoch: {}  best_top1: {:.4}",
        restored.start_epoch, restored.best_top1
    );
    println!("loaded ({}):", restored.report.loaded.len());
    for key in &restored.report.loaded {
        println!("  {key}");
    }
    if !restored.report.excluded.is_empty() {
        println!("excluded ({}):", restored.report.excluded.len());
        for key in &restored.report.excluded {
            println!("  {key}");
        }
    }
    if !restored.report.unknown.is_empty() {
        println!("ignored ({}):", restored.report.unknown.len());
        for key in &restored.report.unknown {
            println!("  {key}");
        }
    }

    if save {
        let store = CheckpointStore::new(app_config.checkpoint.clone());
        let record = CheckpointRecord {
            state_dict: restored.model.into_module().state_dict(),
            epoch: restored.start_epoch,
            best_top1: restored.best_top1,
        };
        let path = store.save(&record, best)?;
        info!(path = %path.display(), best, "saved restored model");
    }

    Ok(())
}
