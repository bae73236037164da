//! Train a Character-Level RNN on a Text File
//!
//! ## Usage
//!
//! ```bash
//! # One training run
//! cargo run --release --example train -- cat.txt \
//!     --seq-length 25 --hidden-size 100 --num-epochs 100 --lr 0.1
//!
//! # Log every sampling checkpoint to CSV and save the trained model
//! cargo run --release --example train -- cat.txt --log run.csv --save cat.ckpt
//!
//! # Try hidden sizes 50, 100 and 150 and report the best
//! cargo run --release --example train -- cat.txt --sweep
//! ```

use char_rnn::{sweep_hidden_sizes, Trainer, TrainingConfig, TrainingLogger};
use clap::Parser;
use std::fs;

/// Hidden sizes tried by `--sweep`
const SWEEP_HIDDEN_SIZES: [usize; 3] = [50, 100, 150];

#[derive(Parser)]
#[command(
    name = "train",
    about = "Train a character-level vanilla RNN with truncated BPTT and Adagrad"
)]
struct Args {
    /// Path to a plain text training file
    input_file: String,

    /// Characters per training window (BPTT truncation length)
    #[arg(long, default_value = "25")]
    seq_length: usize,

    /// Hidden units
    #[arg(long, default_value = "100")]
    hidden_size: usize,

    /// Passes over the corpus
    #[arg(long, default_value = "100")]
    num_epochs: usize,

    /// Adagrad learning rate
    #[arg(long, default_value = "0.1")]
    lr: f32,

    /// Seed for weight initialization
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Sample and score the model every N epochs
    #[arg(long, default_value = "10")]
    sample_every: usize,

    /// Characters generated per sample
    #[arg(long, default_value = "100")]
    sample_length: usize,

    /// Write sampling checkpoints to this CSV file
    #[arg(long)]
    log: Option<String>,

    /// Train once per hidden size in 50, 100, 150 (ignores --hidden-size)
    #[arg(long)]
    sweep: bool,

    /// Save the trained model to this checkpoint file
    #[arg(long)]
    save: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let text = fs::read_to_string(&args.input_file)
        .map_err(|e| format!("{}: {}", args.input_file, e))?;

    let config = TrainingConfig {
        hidden_size: args.hidden_size,
        seq_length: args.seq_length,
        num_epochs: args.num_epochs,
        learning_rate: args.lr,
        seed: args.seed,
        sample_every: args.sample_every,
        sample_length: args.sample_length,
    };
    config.validate()?;

    println!("\n{}", "=".repeat(70));
    println!("  Character-level RNN");
    println!("{}", "=".repeat(70));
    println!();

    if args.sweep {
        if args.log.is_some() || args.save.is_some() {
            println!("Note: --log and --save are ignored with --sweep\n");
        }
        let sweep = sweep_hidden_sizes(&text, config, &SWEEP_HIDDEN_SIZES)?;

        println!("\n{}", "=".repeat(70));
        println!("  Sweep results");
        println!("{}", "=".repeat(70));
        for report in &sweep.reports {
            println!(
                "  hidden {:>4} | best score {:>6} | smooth loss {:.4}",
                report.hidden_size,
                report
                    .best_score
                    .map_or_else(|| "n/a".to_string(), |s| s.to_string()),
                report.smooth_loss
            );
        }
        match (sweep.best_score, sweep.best_hidden_size) {
            (Some(score), Some(hidden)) => println!("\n{} hidden: {}", score, hidden),
            _ => println!("\nNo sampling checkpoint ran; raise --num-epochs or lower --sample-every"),
        }
        return Ok(());
    }

    let mut trainer = Trainer::new(&text, config)?;
    let stats = trainer.vocab().stats();
    println!(
        "data has {} characters, {} unique ({} alphabetic, {} whitespace, {} non-ASCII)",
        text.chars().count(),
        stats.vocab_size,
        stats.alphabetic,
        stats.whitespace,
        stats.non_ascii
    );
    println!(
        "Model: hidden {} | {} parameters | seq_length {} | lr {}",
        config.hidden_size,
        trainer.params().num_parameters(),
        config.seq_length,
        config.learning_rate
    );
    println!();

    if let Some(ref log_path) = args.log {
        trainer = trainer.with_logger(TrainingLogger::new(log_path)?);
        println!("Logging checkpoints to {}\n", log_path);
    }

    let report = trainer.train()?;
    println!(
        "\nTrained {} windows over {} epochs, smooth loss {:.4}",
        report.iterations, report.epochs, report.smooth_loss
    );

    if let Some(ref path) = args.save {
        trainer.to_checkpoint().save(path)?;
    }

    Ok(())
}
