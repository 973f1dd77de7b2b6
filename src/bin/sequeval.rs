//! Profile a MovieLens ratings file, split it into training and test
//! sequences and evaluate the baseline recommenders on it.
#[macro_use]
extern crate log;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use sequeval::data::{Builder, Sequence, Splitter};
use sequeval::datasets::load_movielens;
use sequeval::evaluation::{Evaluator, Metrics};
use sequeval::models::{
    BigramRecommender, MostPopularRecommender, RandomRecommender, UnigramRecommender,
};
use sequeval::profiler::Profiler;
use sequeval::similarity::CosineSimilarity;
use sequeval::Recommender;

/// Offline evaluation of sequence-aware recommenders.
#[derive(Parser, Debug)]
#[command(name = "sequeval", version)]
struct Args {
    /// MovieLens ratings file with header `userId,movieId,rating,timestamp`.
    file: PathBuf,

    /// Minimum number of ratings per user and per item.
    #[arg(long, default_value_t = 5)]
    ratings: usize,

    /// Largest gap between two ratings of the same sequence, e.g. `8 hours` or `30min`.
    #[arg(long, default_value = "8 hours", value_parser = humantime::parse_duration)]
    delta: Duration,

    /// Split sequences at random instead of by timestamp.
    #[arg(long)]
    random: bool,

    /// Share of sequences held out for testing.
    #[arg(long, default_value_t = 0.2)]
    ratio: f64,

    /// Number of items each recommender is asked for.
    #[arg(long, default_value_t = 5)]
    k: usize,

    /// Seed for the split and the randomized baselines.
    #[arg(long)]
    seed: Option<u64>,

    /// Print the metrics as JSON instead of a tab-separated table.
    #[arg(long)]
    json: bool,
}

fn evaluate_all(
    evaluator: &Evaluator,
    recommenders: &[Box<dyn Recommender>],
    similarity: &CosineSimilarity,
) -> Vec<Metrics> {
    let mut results = Vec::with_capacity(recommenders.len());

    for recommender in recommenders {
        info!("Evaluating {}.", recommender.name());

        match evaluator.evaluate(recommender.as_ref(), similarity) {
            Ok(metrics) => results.push(metrics),
            Err(error) => error!("Skipping {}: {}", recommender.name(), error),
        }
    }

    results
}

fn split_summary(training: &[Sequence], test: &[Sequence]) -> String {
    format!("Training set: {}\nTest set: {}", training.len(), test.len())
}

fn main() -> Result<(), failure::Error> {
    env_logger::init();

    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(rand::random);
    info!("Using seed {}.", seed);

    let ratings = load_movielens(&args.file, args.ratings)?;
    let (sequences, items) = Builder::new(args.delta)?.build(&ratings)?;

    let profiler = Profiler::new(&sequences);
    println!("# Profiler");
    println!("Users: {}", profiler.users());
    println!("Items: {}", profiler.items());
    println!("Ratings: {}", profiler.ratings());
    println!("Sequences: {}", profiler.sequences());
    println!("Sparsity: {:.6}", profiler.sparsity());
    println!("Length: {:.6}", profiler.sequence_length());
    println!();

    let splitter = if args.random {
        println!("# Random splitter");
        Splitter::random(args.ratio)?
    } else {
        println!("# Timestamp splitter");
        Splitter::timestamp(args.ratio)?
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let (training, test) = splitter.split(&sequences, &mut rng)?;
    println!("{}", split_summary(&training, &test));
    println!();

    let evaluator = Evaluator::new(&training, &test, &items, args.k)?;
    let cosine = CosineSimilarity::new(&training, &items);

    let recommenders: Vec<Box<dyn Recommender>> = vec![
        Box::new(MostPopularRecommender::new(&training, &items)),
        Box::new(RandomRecommender::new(&items, seed)),
        Box::new(UnigramRecommender::new(&training, &items, seed)),
        Box::new(BigramRecommender::new(&training, &items)),
    ];

    let results = evaluate_all(&evaluator, &recommenders, &cosine);

    println!("# Evaluator");
    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(io::stdout());
        for metrics in &results {
            writer.serialize(metrics)?;
        }
        writer.flush()?;
    }

    Ok(())
}
