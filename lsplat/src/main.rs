use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use glam::{Quat, Vec3};
use lsplat_lib::{
    decode, decode_async, encode_async, encode_with_layout, Category, ClassifierConfig,
    RowLayout, SplatData,
};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    /// 32-byte rows.
    Standard,
    /// 56-byte rows with six similarity channels.
    Extended,
}

impl From<LayoutArg> for RowLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Standard => RowLayout::Standard,
            LayoutArg::Extended => RowLayout::Extended,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "Splat Row Transformer",
    version = "1.0",
    author = "Denis Avvakumov",
    about = "Transforms and recolors splat row files (standard or extended layout)"
)]
struct Cli {
    #[arg(
        short = 'i',
        long = "input",
        value_name = "INPUT",
        required = true,
        help = "Path to the input file."
    )]
    input: PathBuf,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "OUTPUT",
        required = true,
        help = "Path to the output file."
    )]
    output: PathBuf,

    #[arg(
        short = 'l',
        long = "layout",
        value_enum,
        default_value = "standard",
        help = "Row layout of the input file."
    )]
    layout: LayoutArg,

    #[arg(
        short = 'L',
        long = "output-layout",
        value_enum,
        help = "Row layout of the output file. Defaults to the input layout."
    )]
    output_layout: Option<LayoutArg>,

    #[arg(
        short = 't',
        long = "translate",
        value_name = "X,Y,Z",
        value_parser = parse_vec3,
        help = "Translate every splat."
    )]
    translate: Option<Vec3>,

    #[arg(
        short = 's',
        long = "scale",
        value_name = "X,Y,Z",
        value_parser = parse_vec3,
        help = "Scale positions and splat sizes component-wise."
    )]
    scale: Option<Vec3>,

    #[arg(
        short = 'r',
        long = "rotate",
        value_name = "W,X,Y,Z",
        value_parser = parse_quat,
        help = "Rotate about the origin by a quaternion."
    )]
    rotate: Option<Quat>,

    #[arg(
        short = 'c',
        long = "classify",
        value_name = "CATEGORY",
        help = "Highlight splats of a category: car, house, tree, grass, road or lamp."
    )]
    classify: Option<String>,

    #[arg(
        long = "config",
        value_name = "CONFIG",
        help = "JSON file with classifier settings."
    )]
    config: Option<PathBuf>,

    #[arg(
        long = "threshold",
        value_name = "THRESHOLD",
        help = "Similarity threshold for highlighting (overrides the config file)."
    )]
    threshold: Option<f32>,

    #[arg(
        short = 'a',
        long = "async",
        default_value = "false",
        help = "Enable asynchronous read/write mode."
    )]
    async_mode: bool,
}

fn parse_floats<const N: usize>(s: &str) -> Result<[f32; N], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f32>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<Result<Vec<_>, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<f32>| format!("expected {} comma separated values, got {}", N, v.len()))
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    parse_floats::<3>(s).map(Vec3::from_array)
}

fn parse_quat(s: &str) -> Result<Quat, String> {
    let [w, x, y, z] = parse_floats::<4>(s)?;
    Ok(Quat::from_xyzw(x, y, z, w))
}

fn load_config(cli: &Cli) -> anyhow::Result<ClassifierConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ClassifierConfig::default(),
    };
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    Ok(config)
}

/// Runs the requested edits in scale, rotate, translate, classify order. Returns how many splats
/// were highlighted when a category was given.
fn apply(cli: &Cli, config: &ClassifierConfig, store: &mut SplatData) -> Option<usize> {
    if let Some(scale) = cli.scale {
        log::info!("Scaling {} splats by {}", store.vertex_count(), scale);
        store.scale(scale);
    }
    if let Some(rotation) = cli.rotate {
        log::info!("Rotating {} splats by {}", store.vertex_count(), rotation);
        store.rotate(rotation);
    }
    if let Some(translation) = cli.translate {
        log::info!("Translating {} splats by {}", store.vertex_count(), translation);
        store.translate(translation);
    }
    let name = cli.classify.as_deref()?;
    let category = Category::from_name(name);
    if store.similarity().is_none() {
        log::warn!(
            "Input has no similarity channels, '{}' highlighting does nothing",
            category
        );
    }
    Some(store.classify_with(category, config))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let input_layout = RowLayout::from(cli.layout);
    let output_layout = cli.output_layout.map_or(input_layout, RowLayout::from);
    if output_layout == RowLayout::Extended && input_layout == RowLayout::Standard {
        bail!("--output-layout extended needs an extended input (similarity channels)");
    }
    let config = load_config(&cli)?;

    let mode = if cli.async_mode {
        "Asynchronous"
    } else {
        "Synchronous"
    };

    // Print the header info.
    println!(
        "Mode: {}\nInput: {} ({}) | Output: {} ({})",
        mode,
        cli.input.display(),
        input_layout,
        cli.output.display(),
        output_layout
    );

    let start = Instant::now();

    if cli.async_mode {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        rt.block_on(async {
            let mut input = tokio::fs::File::open(&cli.input)
                .await
                .with_context(|| format!("opening {}", cli.input.display()))?;
            let mut store = decode_async(&mut input, input_layout).await?;
            apply(&cli, &config, &mut store);
            let mut output = tokio::fs::File::create(&cli.output)
                .await
                .with_context(|| format!("creating {}", cli.output.display()))?;
            encode_async(&store, output_layout, &mut output).await?;
            anyhow::Ok(())
        })?;
    } else {
        let raw_data = fs::read(&cli.input)
            .with_context(|| format!("reading {}", cli.input.display()))?;
        let mut store = decode(&raw_data, input_layout)?;
        apply(&cli, &config, &mut store);
        let result = encode_with_layout(&store, output_layout)?;
        fs::write(&cli.output, &result)
            .with_context(|| format!("writing {}", cli.output.display()))?;
    }

    let elapsed = start.elapsed().as_millis();
    println!("Time: {} ms", elapsed);
    println!("Successfully wrote to '{}'.", cli.output.display());

    Ok(())
}
