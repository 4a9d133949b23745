// Melody codec CLI.
//
// Stages mirror the dataset pipeline and the generator:
//
//   melody preprocess --scores scores/ --pieces dataset/ --corpus corpus.txt --mapping mapping.json
//   melody train      --corpus corpus.txt --mapping mapping.json --model model.json
//   melody generate   --mapping mapping.json --model model.json --output mel.mid [--seed N]
//   melody decode     corpus.txt [--step-duration 0.25]
//
// Parameters default from `PipelineConfig` (optionally loaded with
// `--config`), and flags override the loaded values.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use melody_codec::config::PipelineConfig;
use melody_codec::corpus::windows;
use melody_codec::dataset::{
    corpus_to_ids, create_mapping, create_single_file_dataset, load_corpus, preprocess,
};
use melody_codec::logging::{LogFormat, init_logging};
use melody_codec::markov::MarkovPredictor;
use melody_codec::midi::{MidiRenderer, Renderer};
use melody_codec::score::ScoreDirectory;
use melody_codec::symbol::join_symbols;
use melody_codec::{Event, MelodyGenerator, Vocabulary, decode};
use melody_prng::MelodyRng;
use std::path::{Path, PathBuf};
use tracing::info;

/// Opening phrase used when no seed melody is given.
const DEFAULT_SEED_MELODY: &str = "67 _ _ _ _ _ 67 _ 69 _ _ _ 67 _ _ _ 67 _ _ _ _ _ 67 _ 65 _ _ _ 64 _ _ _";

#[derive(Debug, Parser)]
#[command(name = "melody")]
#[command(author, version, about = "Encode folk melodies and generate new ones", long_about = None)]
struct Cli {
    /// Pipeline configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encode scores, assemble the corpus, and write the mapping table
    Preprocess {
        /// Directory of JSON scores
        #[arg(long)]
        scores: PathBuf,

        /// Directory for the per-piece encoded files
        #[arg(long, default_value = "dataset")]
        pieces: PathBuf,

        /// Corpus output file
        #[arg(long, default_value = "file_dataset")]
        corpus: PathBuf,

        /// Mapping table output file
        #[arg(long, default_value = "mapping.json")]
        mapping: PathBuf,

        /// Boundary markers between pieces
        #[arg(long)]
        sequence_length: Option<usize>,
    },

    /// Fit the Markov predictor on the corpus
    Train {
        #[arg(long, default_value = "file_dataset")]
        corpus: PathBuf,

        #[arg(long, default_value = "mapping.json")]
        mapping: PathBuf,

        /// Model output file
        #[arg(long, default_value = "model.json")]
        model: PathBuf,

        /// Longest context the model conditions on
        #[arg(long)]
        order: Option<usize>,
    },

    /// Generate a melody and write it as MIDI
    Generate {
        #[arg(long, default_value = "mapping.json")]
        mapping: PathBuf,

        #[arg(long, default_value = "model.json")]
        model: PathBuf,

        /// Seed melody, whitespace-separated symbols
        #[arg(long, default_value = DEFAULT_SEED_MELODY)]
        seed_melody: String,

        /// MIDI output file
        #[arg(short, long, default_value = "mel.mid")]
        output: PathBuf,

        #[arg(long)]
        num_steps: Option<usize>,

        #[arg(long)]
        max_sequence_length: Option<usize>,

        #[arg(long)]
        temperature: Option<f64>,

        /// Random seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        tempo: Option<u16>,
    },

    /// Decode a token file into notes and rests
    Decode {
        /// File of whitespace-separated symbols
        input: PathBuf,

        #[arg(long)]
        step_duration: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Preprocess {
            scores,
            pieces,
            corpus,
            mapping,
            sequence_length,
        } => {
            if let Some(n) = sequence_length {
                config.sequence_length = n;
            }
            config.validate()?;
            run_preprocess(&config, &scores, &pieces, &corpus, &mapping)
                .context("preprocessing failed")?;
        }
        Commands::Train {
            corpus,
            mapping,
            model,
            order,
        } => {
            if let Some(order) = order {
                config.markov_order = order;
            }
            config.validate()?;
            run_train(&config, &corpus, &mapping, &model).context("training failed")?;
        }
        Commands::Generate {
            mapping,
            model,
            seed_melody,
            output,
            num_steps,
            max_sequence_length,
            temperature,
            seed,
            tempo,
        } => {
            let g = &mut config.generation;
            if let Some(v) = num_steps {
                g.num_steps = v;
            }
            if let Some(v) = max_sequence_length {
                g.max_sequence_length = v;
            }
            if let Some(v) = temperature {
                g.temperature = v;
            }
            if let Some(v) = tempo {
                g.tempo_bpm = v;
            }
            if seed.is_some() {
                g.seed = seed;
            }
            config.validate()?;
            run_generate(&config, &mapping, &model, &seed_melody, &output)
                .context("generation failed")?;
        }
        Commands::Decode {
            input,
            step_duration,
        } => {
            let step = step_duration.unwrap_or(config.generation.step_duration);
            run_decode(&input, step).context("decoding failed")?;
        }
    }

    Ok(())
}

fn run_preprocess(
    config: &PipelineConfig,
    scores: &Path,
    pieces: &Path,
    corpus_path: &Path,
    mapping_path: &Path,
) -> Result<()> {
    let report = preprocess(&ScoreDirectory::new(scores), pieces, config)?;
    if report.encoded == 0 {
        bail!(
            "none of the {} scores in {} passed the duration filter",
            report.loaded,
            scores.display()
        );
    }
    let corpus = create_single_file_dataset(pieces, corpus_path, config.sequence_length)?;
    create_mapping(&corpus, mapping_path)?;
    Ok(())
}

fn run_train(
    config: &PipelineConfig,
    corpus_path: &Path,
    mapping_path: &Path,
    model_path: &Path,
) -> Result<()> {
    let corpus = load_corpus(corpus_path)?;
    let vocabulary = Vocabulary::load(mapping_path)?;
    let ids = corpus_to_ids(&corpus, &vocabulary)?;
    let model = MarkovPredictor::train(
        windows(&ids, config.sequence_length)?,
        vocabulary.len(),
        config.markov_order,
    )?;
    model.save(model_path)?;
    info!(path = %model_path.display(), "saved model");
    Ok(())
}

fn run_generate(
    config: &PipelineConfig,
    mapping_path: &Path,
    model_path: &Path,
    seed_melody: &str,
    output: &Path,
) -> Result<()> {
    let vocabulary = Vocabulary::load(mapping_path)?;
    let model = MarkovPredictor::load(model_path)?;
    if model.vocab_len != vocabulary.len() {
        bail!(
            "model was trained on {} symbols but {} has {}",
            model.vocab_len,
            mapping_path.display(),
            vocabulary.len()
        );
    }

    let g = &config.generation;
    let (mut rng, seed) = match g.seed {
        Some(seed) => (MelodyRng::new(seed), seed),
        None => MelodyRng::from_clock(),
    };
    info!(seed, temperature = g.temperature, num_steps = g.num_steps, "generating");

    let generator = MelodyGenerator::new(model, &vocabulary, config.sequence_length)?;
    let melody = generator.generate(seed_melody, g.params(), &mut rng)?;
    println!("{}", join_symbols(&melody.symbols));
    info!(symbols = melody.symbols.len(), stop = ?melody.stop, "melody complete");

    let events = decode(&melody.symbols, g.step_duration)?;
    let renderer = MidiRenderer {
        tempo_bpm: g.tempo_bpm,
        ..Default::default()
    };
    renderer.render(&events, g.step_duration, output)?;
    Ok(())
}

fn run_decode(input: &Path, step_duration: f64) -> Result<()> {
    let symbols = load_corpus(input)?;
    for event in decode(&symbols, step_duration)? {
        match event {
            Event::Note { pitch, duration } => println!("note {pitch} {duration}"),
            Event::Rest { duration } => println!("rest {duration}"),
        }
    }
    Ok(())
}
