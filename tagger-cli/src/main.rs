//! Command-line surface for the sequential token labeler.
//!
//! Grounded on `huntag/argparser.py` (flag set) and `huntag/__main__.py`
//! (task dispatch).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tagger_core::config::FeatureConfig;
use tagger_core::engine::FeatureEngine;
use tagger_core::features::FeatureRegistry;
use tagger_core::tagger::{self, TaggerModel, Trainer};
use tagger_core::token::{read_header, FieldNames, SentenceIterator};
use tagger_core::transition::{ModelOrder, TransitionModel};
use tagger_core::{BookKeeper, Classifier};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum Task {
    TransmodelTrain,
    Train,
    TrainFeaturize,
    MostInformativeFeatures,
    Tag,
    TagFeaturize,
    PrintWeights,
}

/// Trains and tags sequential token labels over a tabular corpus.
#[derive(Debug, Parser)]
#[command(name = "tagger", about = "Sequential token labeler: training and tagging")]
struct Cli {
    /// Which task to run.
    task: Task,

    /// Feature-configuration YAML file (required for every task but
    /// `print-weights`).
    #[arg(short = 'c', long = "config-file")]
    config_file: Option<PathBuf>,

    /// Model path prefix; concatenated with the `--*-ext` flags to derive
    /// each artifact's filename, exactly as the reference implementation
    /// does.
    #[arg(short = 'm', long = "model", required = true)]
    model: PathBuf,

    #[arg(long = "model-ext", default_value = ".model")]
    model_ext: String,

    #[arg(long = "trans-model-ext", default_value = ".transmodel")]
    trans_model_ext: String,

    #[arg(long = "trans-model-order", default_value_t = 3)]
    trans_model_order: u8,

    #[arg(long = "feat-num-ext", default_value = ".featureNumbers.gz")]
    feat_num_ext: String,

    #[arg(long = "label-num-ext", default_value = ".labelNumbers.gz")]
    label_num_ext: String,

    #[arg(long = "language-model-weight", default_value_t = 1.0)]
    language_model_weight: f64,

    #[arg(short = 'O', long = "cutoff", default_value_t = 1)]
    cutoff: u32,

    /// Training hyperparameters, "epochs,learning_rate,l2,batch_size".
    #[arg(short = 'p', long = "parameters")]
    parameters: Option<String>,

    #[arg(short = 'u', long = "used-feats")]
    used_feats: Option<PathBuf>,

    #[arg(short = 'g', long = "gold-tag-field")]
    gold_tag_field: Option<String>,

    #[arg(short = 'l', long = "label-tag-field", default_value = "label")]
    label_tag_field: String,

    #[arg(long = "input-featurized", default_value_t = false)]
    input_featurized: bool,

    #[arg(short = 'w', long = "num-weights", default_value_t = 100)]
    num_weights: usize,

    #[arg(short = 'd', long = "input-dir")]
    input_dir: Option<PathBuf>,
}

fn model_path(cli: &Cli, ext: &str) -> PathBuf {
    let mut s = cli.model.clone().into_os_string();
    s.push(ext);
    PathBuf::from(s)
}

fn trans_order(n: u8) -> Result<ModelOrder> {
    match n {
        2 => Ok(ModelOrder::Bigram),
        3 => Ok(ModelOrder::Trigram),
        other => bail!("--trans-model-order must be 2 or 3, got {other}"),
    }
}

fn load_feature_engine(cli: &Cli, field_names: &FieldNames) -> Result<FeatureEngine> {
    let config_path = cli.config_file.as_ref().context("--config-file is required for this task")?;
    let registry = FeatureRegistry::with_builtins();
    let config = FeatureConfig::load(config_path, &registry)?;
    // Lexicon file paths (kind=lex declarations) are resolved relative to the
    // feature-config file's own directory, so a config and its lexicon files
    // can be shipped together.
    let lexicon_dir = config_path.parent();
    Ok(FeatureEngine::bind(config.declarations, field_names, lexicon_dir, registry)?)
}

/// Loads the `--used-feats` whitelist: one feature string per non-blank
/// line, accepted once at the start of training.
fn load_used_feats(cli: &Cli) -> Result<Option<std::collections::HashSet<String>>> {
    let Some(path) = &cli.used_feats else {
        return Ok(None);
    };
    let file = File::open(path).with_context(|| format!("opening used-feats file {}", path.display()))?;
    let whitelist: std::collections::HashSet<String> = BufReader::new(file)
        .lines()
        .filter_map(|line| line.ok())
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    Ok(Some(whitelist))
}

fn build_trainer<'a>(cli: &Cli, engine: &'a FeatureEngine) -> Result<Trainer<'a>> {
    Ok(match load_used_feats(cli)? {
        Some(whitelist) => Trainer::with_used_feats(engine, whitelist),
        None => Trainer::new(engine),
    })
}

fn save_model(cli: &Cli, model: &TaggerModel) -> Result<()> {
    model.feature_book.save(model_path(cli, &cli.feat_num_ext))?;
    model.label_book.save(model_path(cli, &cli.label_num_ext))?;

    let classifier_json = serde_json::to_string(&model.classifier)?;
    std::fs::write(model_path(cli, &cli.model_ext), classifier_json)?;

    std::fs::write(model_path(cli, &cli.trans_model_ext), model.transitions.to_json()?)?;
    Ok(())
}

fn load_model(cli: &Cli) -> Result<TaggerModel> {
    let feature_book = BookKeeper::load(model_path(cli, &cli.feat_num_ext))?;
    let label_book = BookKeeper::load(model_path(cli, &cli.label_num_ext))?;
    let classifier_json = std::fs::read_to_string(model_path(cli, &cli.model_ext))?;
    let classifier: Classifier = serde_json::from_str(&classifier_json)?;
    let trans_json = std::fs::read_to_string(model_path(cli, &cli.trans_model_ext))?;
    let transitions = TransitionModel::from_json(&trans_json)?;
    Ok(TaggerModel { feature_book, label_book, classifier, transitions })
}

fn parse_train_params(raw: Option<&str>) -> tagger_core::classifier::TrainParams {
    let Some(raw) = raw else {
        return tagger_core::classifier::TrainParams::default();
    };
    let parts: Vec<f64> = raw.split(',').filter_map(|p| p.trim().parse().ok()).collect();
    let defaults = tagger_core::classifier::TrainParams::default();
    tagger_core::classifier::TrainParams {
        epochs: parts.first().map(|&v| v as usize).unwrap_or(defaults.epochs),
        learning_rate: parts.get(1).copied().unwrap_or(defaults.learning_rate),
        l2: parts.get(2).copied().unwrap_or(defaults.l2),
        batch_size: parts.get(3).map(|&v| v as usize).unwrap_or(defaults.batch_size),
    }
}

fn open_input(cli: &Cli) -> Result<Box<dyn BufRead>> {
    if let Some(dir) = &cli.input_dir {
        bail!(
            "--input-dir ({}) is only valid for the tag task; this task reads a single stream from stdin",
            dir.display()
        );
    }
    Ok(Box::new(BufReader::new(std::io::stdin())))
}

fn run_train(cli: &Cli, build_transmodel: bool) -> Result<()> {
    let reader = open_input(cli)?;
    let (field_names, reader) = read_header(reader)?;
    let gold_field_name = cli.gold_tag_field.clone().unwrap_or_else(|| cli.label_tag_field.clone());
    let gold_field = field_names
        .index_of(&gold_field_name)
        .with_context(|| format!("header has no gold column named \"{gold_field_name}\""))?;

    let engine = load_feature_engine(cli, &field_names)?;
    let mut trainer = build_trainer(cli, &engine)?;

    let mut sentence_count = 0u64;
    for result in SentenceIterator::new(reader) {
        let (sentence, _comment) = result?;
        trainer.add_sentence(&sentence, gold_field)?;
        sentence_count += 1;
    }
    info!(sentence_count, "training sentences read");

    let order = trans_order(cli.trans_model_order)?;
    let params = parse_train_params(cli.parameters.as_deref());
    let model = trainer.finish(cli.cutoff, order, params)?;

    if build_transmodel {
        std::fs::write(model_path(cli, &cli.trans_model_ext), model.transitions.to_json()?)?;
        info!("transition model written");
    } else {
        save_model(cli, &model)?;
        info!("model artifacts written");
    }
    Ok(())
}

fn run_train_featurize(cli: &Cli) -> Result<()> {
    let reader = open_input(cli)?;
    let (field_names, reader) = read_header(reader)?;
    let gold_field_name = cli.gold_tag_field.clone().unwrap_or_else(|| cli.label_tag_field.clone());
    let gold_field = field_names
        .index_of(&gold_field_name)
        .with_context(|| format!("header has no gold column named \"{gold_field_name}\""))?;

    let engine = load_feature_engine(cli, &field_names)?;
    let trainer = build_trainer(cli, &engine)?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for result in SentenceIterator::new(reader) {
        let (sentence, _comment) = result?;
        trainer.write_featurized(&sentence, gold_field, &mut out)?;
    }
    out.flush()?;
    Ok(())
}

fn run_most_informative_features(cli: &Cli) -> Result<()> {
    let reader = open_input(cli)?;
    let (field_names, reader) = read_header(reader)?;
    let gold_field_name = cli.gold_tag_field.clone().unwrap_or_else(|| cli.label_tag_field.clone());
    let gold_field = field_names
        .index_of(&gold_field_name)
        .with_context(|| format!("header has no gold column named \"{gold_field_name}\""))?;

    let engine = load_feature_engine(cli, &field_names)?;
    let mut trainer = build_trainer(cli, &engine)?;
    for result in SentenceIterator::new(reader) {
        let (sentence, _comment) = result?;
        trainer.add_sentence(&sentence, gold_field)?;
    }

    for (name, ratio, max_label, min_label) in trainer.most_informative_features(cli.num_weights) {
        println!("{name}\t{ratio:.6}\t{max_label}/{min_label}");
    }
    Ok(())
}

/// Tags every sentence read from `reader` and writes the tagged tabular
/// stream (header, then one blank-line-separated sentence per input
/// sentence) to `out`.
fn tag_stream<R: BufRead, W: Write>(cli: &Cli, model: &TaggerModel, reader: R, mut out: W) -> Result<()> {
    let (mut field_names, reader) = read_header(reader)?;
    let label_field = field_names.push(&cli.label_tag_field);
    let engine = load_feature_engine(cli, &field_names)?;

    writeln!(out, "{}", field_names.header_line())?;
    for result in SentenceIterator::new(reader) {
        let (mut sentence, comment) = result?;
        if let Some(comment) = comment {
            writeln!(out, "{comment}")?;
        }
        let labels = tagger::tag_sentence(model, &engine, &sentence, cli.language_model_weight)?;
        for (token, label) in sentence.iter_mut().zip(labels) {
            token.resize(label_field, String::new());
            token.push(label);
            writeln!(out, "{}", token.join("\t"))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// `--input-dir`: tags every file in the directory independently, rebinding
/// the feature engine's header per file as `tag_dir` does in the reference
/// implementation. Per-file tagging is embarrassingly parallel (no shared
/// mutable state beyond the read-only model), so files are farmed out to
/// the `rayon` thread pool and written out as each finishes.
fn run_tag_dir(cli: &Cli, model: &TaggerModel, dir: &std::path::Path) -> Result<()> {
    use rayon::prelude::*;

    let mut paths: Vec<PathBuf> =
        std::fs::read_dir(dir)?.filter_map(|e| e.ok().map(|e| e.path())).filter(|p| p.is_file()).collect();
    paths.sort();

    let outputs: Vec<Result<Vec<u8>>> = paths
        .par_iter()
        .map(|path| {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let mut buf = Vec::new();
            tag_stream(cli, model, BufReader::new(file), &mut buf)
                .with_context(|| format!("tagging {}", path.display()))?;
            Ok(buf)
        })
        .collect();

    for (path, output) in paths.iter().zip(outputs) {
        let output = output?;
        let out_path = path.with_extension("tagged");
        std::fs::write(&out_path, output)?;
        info!(file = %out_path.display(), "tagged");
    }
    Ok(())
}

fn run_tag(cli: &Cli) -> Result<()> {
    let model = load_model(cli)?;
    if let Some(dir) = cli.input_dir.clone() {
        return run_tag_dir(cli, &model, &dir);
    }
    let reader = open_input(cli)?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    tag_stream(cli, &model, reader, &mut out)?;
    out.flush()?;
    Ok(())
}

fn run_tag_featurize(cli: &Cli) -> Result<()> {
    let model = load_model(cli)?;
    let reader = open_input(cli)?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            if rows.is_empty() {
                continue;
            }
            let labels = tagger::tag_featurized_sentence(&model, &rows, cli.language_model_weight)?;
            for label in labels {
                writeln!(out, "{label}")?;
            }
            writeln!(out)?;
            rows.clear();
        } else {
            let feats: Vec<String> = line.split('\t').skip(1).map(|s| s.to_string()).collect();
            rows.push(feats);
        }
    }
    out.flush()?;
    Ok(())
}

fn run_print_weights(cli: &Cli) -> Result<()> {
    let model = load_model(cli)?;
    print!("{}", tagger::format_top_weights(&model, cli.num_weights));
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    match cli.task {
        Task::TransmodelTrain => run_train(&cli, true),
        Task::Train => run_train(&cli, false),
        Task::TrainFeaturize => run_train_featurize(&cli),
        Task::MostInformativeFeatures => run_most_informative_features(&cli),
        Task::Tag => run_tag(&cli),
        Task::TagFeaturize => run_tag_featurize(&cli),
        Task::PrintWeights => run_print_weights(&cli),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_params_defaults_and_overrides() {
        let defaults = parse_train_params(None);
        assert_eq!(defaults.epochs, 20);

        let custom = parse_train_params(Some("5,0.2,0.01,16"));
        assert_eq!(custom.epochs, 5);
        assert_eq!(custom.learning_rate, 0.2);
        assert_eq!(custom.batch_size, 16);
    }

    #[test]
    fn test_trans_order_validates_range() {
        assert!(trans_order(2).is_ok());
        assert!(trans_order(3).is_ok());
        assert!(trans_order(4).is_err());
    }
}
