use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use label_print::calibrate::calibration_sheet;
use label_print::config::{load_dispatch_rows, load_settings_or_default, load_template, Dimension, Settings};
use label_print::labels::{OutputNames, SCRAP_FILENAME};
use label_print::{
    render_dispatch, render_scrap, render_template, resolve, DispatchLabel, FieldSet, LabelFont, ProductType,
    ScrapRange,
};

/// Print dispatch and scrap labels onto PDF label templates.
#[derive(Parser, Debug)]
#[command(name = "label_print")]
#[command(about = "Print dispatch and scrap labels onto PDF label templates.", long_about = None)]
struct Args {
    /// Directory containing the template PDFs and optional settings.json.
    /// Output files are written here unless --output is given
    #[arg(short, long, default_value = ".")]
    target_dir: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill a dispatch label sheet with one product's details
    Dispatch {
        #[arg(long)]
        customer: String,
        #[arg(long)]
        product: String,
        #[arg(long, default_value = "")]
        litho_number: String,
        #[arg(long, default_value = "")]
        po_number: String,
        /// DEO or "AIR FRESHENER"; selects the background sheet
        #[arg(long, value_parser = parse_product_type)]
        product_type: ProductType,
        #[arg(long, value_enum, default_value_t = FieldSet::Full)]
        fields: FieldSet,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Number scrap labels from START to END, four per sheet
    Scrap {
        #[arg(long)]
        start: u32,
        #[arg(long)]
        end: u32,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render one dispatch PDF per row of a CSV file
    Batch {
        /// CSV with customer, product, litho_number, po_number, product_type columns
        #[arg(long, default_value = "data.csv")]
        data: PathBuf,
        #[arg(long, value_enum, default_value_t = FieldSet::Full)]
        fields: FieldSet,
    },
    /// Draw values into any registered template over an arbitrary background
    Overlay {
        /// Template name: dispatch-4, dispatch-2 or scrap
        #[arg(long)]
        template: String,
        #[arg(long)]
        background: PathBuf,
        /// Values in slot order; repeat the flag for each value
        #[arg(long = "value", required = true)]
        values: Vec<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print a template's slot positions on plain A4 for checking against a real sheet
    Calibrate {
        #[arg(long)]
        template: String,
        /// Grid spacing, e.g. "10 mm" (defaults to settings.json)
        #[arg(long)]
        grid: Option<Dimension>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_product_type(s: &str) -> Result<ProductType, String> {
    s.parse().map_err(|e: label_print::ValidationError| e.to_string())
}

/// Everything a render needs that comes from the target directory
struct Workspace {
    dir: PathBuf,
    settings: Settings,
    font: LabelFont,
}

impl Workspace {
    fn open(dir: PathBuf) -> Result<Self> {
        // Verify the target directory exists
        if !dir.exists() {
            return Err(anyhow!("Target directory not found: {:?}", dir));
        }
        if !dir.is_dir() {
            return Err(anyhow!("Target path is not a directory: {:?}", dir));
        }

        let settings = load_settings_or_default(&dir)?;
        let font = LabelFont::from_setting(&settings.font, &dir).with_context(|| "Failed to load label font")?;
        Ok(Self { dir, settings, font })
    }

    fn background(&self, file: &Path) -> Result<lopdf::Document> {
        let path = self.dir.join(file);
        log::info!("Loading template {:?}", path);
        load_template(&path).with_context(|| format!("Failed to load template {:?}", path))
    }

    fn output_path(&self, output: Option<PathBuf>, default_name: &str) -> PathBuf {
        output.unwrap_or_else(|| self.dir.join(default_name))
    }
}

fn write_pdf(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("Failed to write output file: {}", path.display()))?;
    println!("Successfully wrote {}", path.display());
    Ok(())
}

fn dispatch(
    workspace: &Workspace,
    label: &DispatchLabel,
    product_type: ProductType,
    fields: FieldSet,
    output: Option<PathBuf>,
) -> Result<()> {
    label.validate(fields)?;
    let background = workspace.background(workspace.settings.templates.for_product(product_type))?;
    let bytes = render_dispatch(label, fields, &background, &workspace.font)
        .with_context(|| format!("Failed to render {} label for {:?}", product_type, label.product))?;
    let path = workspace.output_path(output, &label.output_filename(product_type));
    write_pdf(&path, &bytes)
}

fn batch(workspace: &Workspace, data: &Path, fields: FieldSet) -> Result<()> {
    let data_path = workspace.dir.join(data);
    log::info!("Loading rows from {:?}", data_path);
    let rows = load_dispatch_rows(&data_path)?;
    println!("Found {} rows in {}", rows.len(), data_path.display());

    let mut names = OutputNames::new();
    let mut failed = 0;
    for (i, row) in rows.into_iter().enumerate() {
        let result = row
            .into_label()
            .map_err(anyhow::Error::from)
            .and_then(|(label, product_type)| {
                let name = names.claim(label.output_filename(product_type), i + 1);
                dispatch(workspace, &label, product_type, fields, Some(workspace.dir.join(name)))
            });
        if let Err(e) = result {
            eprintln!("Row {}: {:#}", i + 1, e);
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} row(s) failed", failed);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let workspace = Workspace::open(args.target_dir)?;

    match args.command {
        Command::Dispatch {
            customer,
            product,
            litho_number,
            po_number,
            product_type,
            fields,
            output,
        } => {
            let label = DispatchLabel {
                customer,
                product,
                litho_number,
                po_number,
            };
            dispatch(&workspace, &label, product_type, fields, output)
        }
        Command::Scrap { start, end, output } => {
            let range = ScrapRange::new(start, end)?;
            let background = workspace.background(&workspace.settings.templates.scrap)?;
            let bytes = render_scrap(&range, &background, &workspace.font)
                .with_context(|| format!("Failed to render scrap numbers {}-{}", start, end))?;
            write_pdf(&workspace.output_path(output, SCRAP_FILENAME), &bytes)
        }
        Command::Batch { data, fields } => batch(&workspace, &data, fields),
        Command::Overlay {
            template,
            background,
            values,
            output,
        } => {
            let template = resolve(&template)?;
            let background = workspace.background(&background)?;
            let bytes = render_template(template, &values, &background, &workspace.font)
                .with_context(|| format!("Failed to render template '{}'", template.name))?;
            write_pdf(&output, &bytes)
        }
        Command::Calibrate { template, grid, output } => {
            let template = resolve(&template)?;
            let grid = grid.unwrap_or(workspace.settings.calibration_grid);
            let bytes = calibration_sheet(template, grid)?;
            let default_name = format!("calibration_{}.pdf", template.name);
            write_pdf(&workspace.output_path(output, &default_name), &bytes)
        }
    }
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
