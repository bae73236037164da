//! Training Logger
//!
//! Records every sampling checkpoint of a training run, to a CSV file and to
//! the console.
//!
//! ## Example
//!
//! ```rust,no_run
//! use char_rnn::TrainingLogger;
//!
//! let mut logger = TrainingLogger::new("training_log.csv")
//!     .expect("Failed to create logger");
//!
//! // Log a sampling checkpoint
//! logger.log(10, 40, 3.21, 87, Some(87), "the cat sat on the mat")
//!     .expect("Failed to log");
//! ```
//!
//! ## CSV Format
//!
//! - `epoch`: Epoch counter when the sample was taken
//! - `iteration`: Windows trained so far
//! - `elapsed_seconds`: Time since the logger was created
//! - `smooth_loss`: Exponentially smoothed window loss
//! - `score`: Edit distance between the sample and the corpus
//! - `best_score`: Best (lowest) score so far
//! - `sample`: Generated text, quoted

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// CSV + console logger for sampling checkpoints
pub struct TrainingLogger {
    log_file: File,
    start_time: Instant,
    last_log_time: Instant,
}

impl TrainingLogger {
    /// Create the CSV file and write its header
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use char_rnn::TrainingLogger;
    /// let logger = TrainingLogger::new("training_log.csv")?;
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn new<P: AsRef<Path>>(log_path: P) -> std::io::Result<Self> {
        let mut log_file = File::create(log_path)?;

        writeln!(
            log_file,
            "epoch,iteration,elapsed_seconds,smooth_loss,score,best_score,sample"
        )?;

        let now = Instant::now();
        Ok(Self {
            log_file,
            start_time: now,
            last_log_time: now,
        })
    }

    /// Log one sampling checkpoint
    ///
    /// Appends a CSV row, flushes it, and prints the checkpoint with timing
    /// information.
    ///
    /// # Arguments
    ///
    /// * `epoch` - Epoch counter at the checkpoint
    /// * `iteration` - Windows trained so far
    /// * `smooth_loss` - Current smoothed loss
    /// * `score` - Edit distance of this sample
    /// * `best_score` - Lowest score so far (including this one)
    /// * `sample` - The generated text
    pub fn log(
        &mut self,
        epoch: usize,
        iteration: usize,
        smooth_loss: f32,
        score: usize,
        best_score: Option<usize>,
        sample: &str,
    ) -> std::io::Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f32();

        // CSV quoting: double any embedded quote
        let sample_escaped = sample.replace('"', "\"\"");
        let best = best_score.map(|b| b.to_string()).unwrap_or_default();

        writeln!(
            self.log_file,
            "{},{},{:.2},{:.6},{},{},\"{}\"",
            epoch, iteration, elapsed, smooth_loss, score, best, sample_escaped
        )?;

        // Keep the row even if training is interrupted
        self.log_file.flush()?;

        let since_last = self.last_log_time.elapsed().as_secs_f32();
        println!(
            "Epoch {:4} | Time: {:7.1}s (+{:.1}s)",
            epoch, elapsed, since_last
        );
        print_checkpoint(iteration, smooth_loss, score, sample);

        self.last_log_time = Instant::now();
        Ok(())
    }
}

/// Print a sampling checkpoint to the console
///
/// ```text
/// ----
///  <sample>
/// ----
/// iter 40, loss: 3.210000, score: 87
/// ```
pub fn print_checkpoint(iteration: usize, smooth_loss: f32, score: usize, sample: &str) {
    println!("----\n {} \n----", sample);
    println!(
        "iter {}, loss: {:.6}, score: {}",
        iteration, smooth_loss, score
    );
}
