use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use fusim::config::{SimulationConfig, check_rpkm_cutoff};
use fusim::input::{BamSourceFactory, open_reference};
use fusim::output::{OutputCollector, OutputFormat, check_formats, schema, write_depth_tsv, write_fasta, write_txt};
use fusim::pipeline::{FusionSimulator, SimulationResult};
use fusim::sim::{
    BackgroundSelector, FusionType, GeneModelSource, GeneSelector, ReadDepthEstimator, SelectionMethod,
    StaticSelector,
};
use fusim::utils::time::format_elapsed;
use fusim::{Error, Result};

#[derive(Parser)]
#[command(name = "fusim", version)]
#[command(
    about = "FUSion SIMulator",
    long_about = "Simulates fusion gene transcripts from a refFlat gene model for benchmarking fusion detection tools."
)]
struct Cli {
    /// Log verbosity level
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,
    /// Write log output to a file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<String>,
    /// Append to log file instead of truncating
    #[arg(long, global = true)]
    append_log: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate fusion genes
    Simulate {
        /// Gene model in UCSC refFlat format.
        #[arg(short, long, required = true)]
        gene_model: String,
        /// Background BAM for depth-weighted gene selection. Must have an associated .bai index file.
        #[arg(short, long)]
        bam: Option<String>,
        /// Reference genome FASTA, required for fasta output. Must be indexed with 'samtools faidx'.
        #[arg(short, long)]
        reference: Option<String>,
        /// Prefix for output files (e.g., "results/sim1"). Files are named <prefix>.fusions.txt,
        /// <prefix>.fusions.fa and <prefix>.result.json.
        #[arg(short, long, required = true)]
        out_prefix: String,
        /// Output formats (comma-separated).
        #[arg(short = 't', long = "format", value_delimiter = ',', default_value = "txt")]
        formats: Vec<OutputFormat>,
        /// Simulation configuration JSON. Flags below override its values.
        #[arg(long)]
        config: Option<String>,
        #[command(flatten)]
        overrides: SimulationOverrides,
        /// Force overwrite of existing output files.
        #[arg(short, long)]
        force: bool,
    },
    /// Compute per-transcript RPKM against a BAM
    Depth {
        /// Gene model in UCSC refFlat format.
        #[arg(short, long, required = true)]
        gene_model: String,
        /// Sorted and indexed BAM file.
        #[arg(short, long, required = true)]
        bam: String,
        /// Output TSV path.
        #[arg(short, long, required = true)]
        out: String,
        /// Number of threads (one is reserved for reading the gene model).
        #[arg(long, default_value_t = 1)]
        threads: usize,
        /// Only report transcripts scoring above this RPKM.
        #[arg(long, default_value_t = 0.0)]
        rpkm_cutoff: f64,
        /// Force overwrite of an existing output file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the JSON Schema of the result document
    Schema {
        /// Write the schema to this file instead of stdout.
        #[arg(short, long)]
        out: Option<String>,
    },
}

/// Command-line values that take precedence over the configuration file.
#[derive(Args)]
struct SimulationOverrides {
    /// Number of hybrid fusions (two genes).
    #[arg(short = 'n', long)]
    hybrid: Option<usize>,
    /// Number of self fusions (one gene with itself).
    #[arg(short = 'x', long)]
    self_fusion: Option<usize>,
    /// Number of tri-fusions (three genes).
    #[arg(short = 'k', long)]
    tri_fusion: Option<usize>,
    /// Number of intra-chromosome fusions.
    #[arg(short = 'a', long)]
    intra_chromosome: Option<usize>,
    /// Number of read-through fusions between neighbouring genes.
    #[arg(short = 'i', long)]
    read_through: Option<usize>,
    /// Gene selection method.
    #[arg(short = 'm', long)]
    method: Option<SelectionMethod>,
    /// Reverse-complement partners on the opposite strand of gene 1.
    #[arg(long)]
    auto_correct_orientation: bool,
    /// Only break within coding exons.
    #[arg(short = 'c', long)]
    cds_only: bool,
    /// Prefer exons whose length is a multiple of 3 when splitting.
    #[arg(long)]
    symmetrical_exons: bool,
    /// Allow fusions that shift the reading frame.
    #[arg(long)]
    out_of_frame: bool,
    /// Insert random bases at each junction.
    #[arg(long)]
    foreign_insertion: bool,
    /// Longest foreign insertion.
    #[arg(long)]
    foreign_insertion_max_len: Option<usize>,
    /// Break only at in-frame exon boundaries.
    #[arg(short = 'e', long)]
    keep_exon_boundary: bool,
    /// RPKM cutoff for background selection.
    #[arg(long)]
    rpkm_cutoff: Option<f64>,
    /// Threads for background depth estimation.
    #[arg(short = 'p', long)]
    threads: Option<usize>,
    /// Random seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
    /// Genes, transcripts or chromosomes allowed in the first slot (comma-separated).
    #[arg(long, value_delimiter = ',')]
    gene1: Option<Vec<String>>,
    /// Genes, transcripts or chromosomes allowed in the second slot.
    #[arg(long, value_delimiter = ',')]
    gene2: Option<Vec<String>>,
    /// Genes, transcripts or chromosomes allowed in the third slot.
    #[arg(long, value_delimiter = ',')]
    gene3: Option<Vec<String>>,
}

impl SimulationOverrides {
    fn apply(&self, config: &mut SimulationConfig) {
        let counts = [
            (FusionType::Hybrid, self.hybrid),
            (FusionType::SelfFusion, self.self_fusion),
            (FusionType::TriFusion, self.tri_fusion),
            (FusionType::IntraChromosome, self.intra_chromosome),
            (FusionType::ReadThrough, self.read_through),
        ];
        for (fusion_type, n) in counts {
            if let Some(n) = n {
                config.events.set(fusion_type, n);
            }
        }
        if let Some(m) = self.method {
            config.method = m;
        }

        let opts = &mut config.options;
        opts.auto_correct_orientation |= self.auto_correct_orientation;
        opts.cds_only |= self.cds_only;
        opts.symmetrical_exons |= self.symmetrical_exons;
        opts.out_of_frame |= self.out_of_frame;
        opts.foreign_insertion |= self.foreign_insertion;
        opts.keep_exon_boundary |= self.keep_exon_boundary;

        if let Some(n) = self.foreign_insertion_max_len {
            config.foreign_insertion_max_len = n;
        }
        if let Some(c) = self.rpkm_cutoff {
            config.rpkm_cutoff = c;
        }
        if let Some(t) = self.threads {
            config.threads = t;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        for (slot, filter) in [(&mut config.gene1, &self.gene1), (&mut config.gene2, &self.gene2), (&mut config.gene3, &self.gene3)] {
            if let Some(keys) = filter {
                *slot = keys.clone();
            }
        }
    }
}

fn check_output_paths(prefix: &str, suffixes: &[String], force: bool) -> Result<()> {
    let path = Path::new(prefix);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        info!("Creating output directory: {:?}", parent);
        std::fs::create_dir_all(parent)?;
    }

    if !force {
        for suffix in suffixes {
            let p = format!("{}{}", prefix, suffix);
            if Path::new(&p).exists() {
                return Err(Error::Config(format!(
                    "Output file {} already exists. Use --force to overwrite.",
                    p
                )));
            }
        }
    }
    Ok(())
}

struct StepTimer {
    total_start: std::time::Instant,
    step_start: std::time::Instant,
}

impl StepTimer {
    fn new() -> Self {
        let now = std::time::Instant::now();
        Self { total_start: now, step_start: now }
    }
    fn start(&mut self, name: &str) {
        info!("===== [STAGE] {} =====", name);
        self.step_start = std::time::Instant::now();
    }
    fn end(&self) {
        let now = std::time::Instant::now();
        info!("----- Stage Time: {} -----", format_elapsed(now.duration_since(self.step_start).as_secs_f64()));
        info!("----- Total Time: {} -----", format_elapsed(now.duration_since(self.total_start).as_secs_f64()));
    }
}

struct SimulateArgs<'a> {
    gene_model: &'a str,
    bam: Option<&'a str>,
    reference: Option<&'a str>,
    out_prefix: &'a str,
    formats: &'a [OutputFormat],
    config: Option<&'a str>,
    overrides: &'a SimulationOverrides,
    force: bool,
}

fn run_simulation<S: GeneSelector + ?Sized>(
    selector: &S,
    config: &SimulationConfig,
    rng: &mut StdRng,
) -> Result<SimulationResult> {
    FusionSimulator::new(selector, config).run(rng)
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let mut timer = StepTimer::new();

    let mut config = match args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    args.overrides.apply(&mut config);
    config.validate()?;
    check_formats(args.formats, args.reference)?;
    let suffixes: Vec<String> = args.formats.iter().map(|f| format!(".{}", f.suffix())).collect();
    check_output_paths(args.out_prefix, &suffixes, args.force)?;

    let mut reference = args.reference.map(open_reference).transpose()?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!("------------------------------------------------------------------------");
    info!("Gene model: {}", args.gene_model);
    if let Some(bam) = args.bam {
        info!("Background BAM: {}", bam);
    }
    info!("Requested fusions: {}", config.events.total());
    info!("Selection method: {}", config.method);
    info!("Options: {}", config.options);
    info!("------------------------------------------------------------------------");

    timer.start("Simulation");
    let source = GeneModelSource::Path(args.gene_model.to_string());
    let mut result = match args.bam {
        Some(bam) => {
            let factory = BamSourceFactory::new(bam)?;
            let estimator = ReadDepthEstimator::new(config.threads, config.rpkm_cutoff);
            let selector = BackgroundSelector::new(source, factory, estimator);
            run_simulation(&selector, &config, &mut rng)?
        }
        None => run_simulation(&StaticSelector::new(source), &config, &mut rng)?,
    };
    timer.end();

    timer.start("Writing output");
    if let Some(src) = reference.as_mut() {
        for f in result.fusions.iter_mut() {
            f.assemble_sequence(src)?;
        }
    }
    for format in args.formats {
        let path = format!("{}.{}", args.out_prefix, format.suffix());
        match format {
            OutputFormat::Txt => write_txt(BufWriter::new(File::create(&path)?), &result.fusions)?,
            OutputFormat::Fasta => {
                let src = reference
                    .as_mut()
                    .ok_or_else(|| Error::Config("fasta output requires a reference genome".into()))?;
                write_fasta(BufWriter::new(File::create(&path)?), &mut result.fusions, src)?;
            }
            OutputFormat::Json => {
                OutputCollector::new()
                    .with_inputs(args.gene_model, args.bam, args.reference)
                    .with_parameters(&config)
                    .with_result(&result)
                    .write_json(&path)?;
            }
        }
        info!("Wrote {}", path);
    }
    timer.end();
    Ok(())
}

fn depth(gene_model: &str, bam: &str, out: &str, threads: usize, rpkm_cutoff: f64, force: bool) -> Result<()> {
    if threads == 0 {
        return Err(Error::Config("threads must be at least 1".into()));
    }
    check_rpkm_cutoff(rpkm_cutoff)?;
    if !force && Path::new(out).exists() {
        return Err(Error::Config(format!("Output file {} already exists. Use --force to overwrite.", out)));
    }
    let mut timer = StepTimer::new();
    timer.start("Read depth");
    let selector = BackgroundSelector::new(
        GeneModelSource::Path(gene_model.to_string()),
        BamSourceFactory::new(bam)?,
        ReadDepthEstimator::new(threads, rpkm_cutoff),
    );
    let scored = selector.select()?;
    write_depth_tsv(BufWriter::new(File::create(out)?), scored)?;
    info!("Wrote {} transcripts to {}", scored.len(), out);
    timer.end();
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let mut log_builder = env_logger::Builder::from_default_env();
    log_builder
        .filter_level(cli.log_level.to_level_filter())
        .format_module_path(false);
    if let Some(ref path) = cli.log_file {
        let file = if cli.append_log {
            File::options().create(true).append(true).open(path)
        } else {
            File::create(path)
        };
        match file {
            Ok(f) => {
                log_builder.target(env_logger::Target::Pipe(Box::new(f)));
            }
            Err(e) => {
                eprintln!("Could not open log file '{}': {}", path, e);
                std::process::exit(1);
            }
        }
    }
    log_builder.init();

    let outcome = match &cli.command {
        Commands::Simulate {
            gene_model,
            bam,
            reference,
            out_prefix,
            formats,
            config,
            overrides,
            force,
        } => simulate(SimulateArgs {
            gene_model,
            bam: bam.as_deref(),
            reference: reference.as_deref(),
            out_prefix,
            formats,
            config: config.as_deref(),
            overrides,
            force: *force,
        }),
        Commands::Depth { gene_model, bam, out, threads, rpkm_cutoff, force } => {
            depth(gene_model, bam, out, *threads, *rpkm_cutoff, *force)
        }
        Commands::Schema { out } => match out {
            Some(path) => std::fs::write(path, schema::schema_json_pretty()).map_err(Error::from),
            None => {
                println!("{}", schema::schema_json_pretty());
                Ok(())
            }
        },
    };

    if let Err(e) = outcome {
        error!("{}", e);
        std::process::exit(1);
    }
}
