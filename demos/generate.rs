//! Generate Text from a Saved Checkpoint
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example generate -- cat.ckpt --seed-char T --length 200
//! ```

use char_rnn::{sample, Checkpoint};
use clap::Parser;

#[derive(Parser)]
#[command(name = "generate", about = "Greedy text generation from a trained char-rnn")]
struct Args {
    /// Checkpoint written by `train --save`
    checkpoint: String,

    /// First input character (defaults to the first vocabulary character)
    #[arg(long)]
    seed_char: Option<char>,

    /// Characters to generate
    #[arg(long, default_value = "100")]
    length: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let checkpoint = Checkpoint::load(&args.checkpoint)?;
    let vocab = &checkpoint.vocab;
    let meta = &checkpoint.metadata;
    println!(
        "Loaded {} ({} parameters, {} iterations, {} epochs, smooth loss {:.4})",
        args.checkpoint,
        checkpoint.params.num_parameters(),
        meta.iterations,
        meta.epochs,
        meta.smooth_loss
    );

    let seed_index = match args.seed_char {
        Some(c) => vocab.encode(&c.to_string())?[0],
        None => 0,
    };
    let seed_char = vocab.index_to_char(seed_index).unwrap_or_default();

    let hidden = vec![0.0; checkpoint.params.hidden_size()];
    let ids = sample(&hidden, seed_index, args.length, &checkpoint.params);

    println!("----\n{}{}\n----", seed_char, vocab.decode(&ids));
    Ok(())
}
