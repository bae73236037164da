//! Checkpoint Save/Load
//!
//! A checkpoint is everything needed to sample from (or inspect) a trained
//! model: the five parameters, the five Adagrad accumulators, the vocabulary
//! and a little training metadata.
//!
//! ## File Format
//!
//! Little-endian throughout:
//!
//! ```text
//! "CHRNN_CKPT"                      10-byte magic
//! version: u8                       currently 1
//! config:  u32 len + JSON           {"hidden_size": H, "vocab_size": V}
//! 5 parameter tensors               Wxh, Whh, Why, bh, by
//! 5 Adagrad accumulators            same order and shapes
//! vocab:   u32 len + JSON           characters in index order
//! meta:    u32 len + JSON           {iterations, epochs, smooth_loss, best_score}
//!
//! tensor:  u32 rank | u32 dims... | u32 len | f32 values...
//! ```
//!
//! Every tensor's shape is checked against the config before its data is
//! read, and tensor storage only grows with the bytes actually present, so a
//! corrupt header fails with [`CharRnnError::InvalidCheckpoint`] (or an IO
//! error for a short file) instead of allocating garbage.

use crate::error::{CharRnnError, Result};
use crate::model::{ParameterSet, RnnConfig};
use crate::optimizer::{Adagrad, ADAGRAD_EPSILON};
use crate::tensor::Tensor;
use crate::vocab::CharVocab;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 10] = b"CHRNN_CKPT";
const VERSION: u8 = 1;

/// Training progress stored alongside the weights
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub iterations: usize,
    pub epochs: usize,
    pub smooth_loss: f32,
    pub best_score: Option<usize>,
}

/// A serializable training snapshot
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub params: ParameterSet,
    pub optimizer: Adagrad,
    pub vocab: CharVocab,
    pub metadata: CheckpointMetadata,
}

impl Checkpoint {
    /// Write the checkpoint to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        println!("Saving checkpoint to {}...", path.display());

        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;

        println!(
            "Checkpoint saved ({} parameters, {} characters in vocabulary)",
            self.params.num_parameters(),
            self.vocab.vocab_size()
        );
        Ok(())
    }

    /// Read a checkpoint written by [`Checkpoint::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&[VERSION])?;

        write_json(writer, &self.params.config())?;

        for tensor in self.params.tensors() {
            write_tensor(writer, tensor)?;
        }
        for tensor in self.optimizer.memories() {
            write_tensor(writer, tensor)?;
        }

        write_json(writer, &self.vocab)?;
        write_json(writer, &self.metadata)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; 10];
        reader.read_exact(&mut header)?;
        if &header != MAGIC {
            return Err(CharRnnError::InvalidCheckpoint(
                "bad header, expected CHRNN_CKPT".to_string(),
            ));
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != VERSION {
            return Err(CharRnnError::InvalidCheckpoint(format!(
                "unsupported version {}",
                version[0]
            )));
        }

        let config: RnnConfig = read_json(reader)?;
        let RnnConfig {
            hidden_size,
            vocab_size,
        } = RnnConfig::new(config.hidden_size, config.vocab_size)
            .map_err(|e| CharRnnError::InvalidCheckpoint(e.to_string()))?;

        let shapes = [
            vec![hidden_size, vocab_size],
            vec![hidden_size, hidden_size],
            vec![vocab_size, hidden_size],
            vec![hidden_size],
            vec![vocab_size],
        ];

        let [wxh, whh, why, bh, by] = read_tensors(reader, &shapes)?;
        let params = ParameterSet {
            wxh,
            whh,
            why,
            bh,
            by,
        };

        let [mem_wxh, mem_whh, mem_why, mem_bh, mem_by] = read_tensors(reader, &shapes)?;

        let vocab: CharVocab = read_json(reader)?;
        if vocab.vocab_size() != vocab_size {
            return Err(CharRnnError::InvalidCheckpoint(format!(
                "vocabulary has {} characters, config says {}",
                vocab.vocab_size(),
                vocab_size
            )));
        }

        let metadata: CheckpointMetadata = read_json(reader)?;
        let optimizer = Adagrad {
            mem_wxh,
            mem_whh,
            mem_why,
            mem_bh,
            mem_by,
            epsilon: ADAGRAD_EPSILON,
            step: metadata.iterations,
        };

        Ok(Self {
            params,
            optimizer,
            vocab,
            metadata,
        })
    }
}

fn write_u32<W: Write>(writer: &mut W, value: usize) -> Result<()> {
    let value = u32::try_from(value)
        .map_err(|_| CharRnnError::InvalidCheckpoint(format!("{} does not fit in u32", value)))?;
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<usize> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes) as usize)
}

fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value)?;
    write_u32(writer, json.len())?;
    writer.write_all(&json)?;
    Ok(())
}

fn read_json<R: Read, T: for<'de> Deserialize<'de>>(reader: &mut R) -> Result<T> {
    let len = read_u32(reader)?;
    let mut bytes = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(CharRnnError::InvalidCheckpoint("truncated JSON section".to_string()));
    }
    serde_json::from_slice(&bytes).map_err(|e| CharRnnError::InvalidCheckpoint(e.to_string()))
}

fn write_tensor<W: Write>(writer: &mut W, tensor: &Tensor) -> Result<()> {
    write_u32(writer, tensor.shape.len())?;
    for &dim in &tensor.shape {
        write_u32(writer, dim)?;
    }
    write_u32(writer, tensor.data.len())?;
    for &val in &tensor.data {
        writer.write_all(&val.to_le_bytes())?;
    }
    Ok(())
}

fn read_tensor<R: Read>(reader: &mut R, expected_shape: &[usize]) -> Result<Tensor> {
    let rank = read_u32(reader)?;
    if rank != expected_shape.len() {
        return Err(CharRnnError::InvalidCheckpoint(format!(
            "tensor rank {}, expected shape {:?}",
            rank, expected_shape
        )));
    }

    let mut shape = Vec::with_capacity(rank);
    for _ in 0..rank {
        shape.push(read_u32(reader)?);
    }
    if shape != expected_shape {
        return Err(CharRnnError::InvalidCheckpoint(format!(
            "tensor shape {:?}, expected {:?}",
            shape, expected_shape
        )));
    }

    let len = read_u32(reader)?;
    let expected_len = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&n| n == len);
    if expected_len.is_none() {
        return Err(CharRnnError::InvalidCheckpoint(format!(
            "tensor of shape {:?} declares {} values",
            shape, len
        )));
    }

    // Grow with the bytes actually present rather than trusting `len`
    let byte_len = len as u64 * 4;
    let mut bytes = Vec::new();
    reader.by_ref().take(byte_len).read_to_end(&mut bytes)?;
    if bytes.len() as u64 != byte_len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("tensor data truncated: {} of {} bytes", bytes.len(), byte_len),
        )
        .into());
    }

    let data = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(Tensor::new(data, shape))
}

fn read_tensors<R: Read>(reader: &mut R, shapes: &[Vec<usize>; 5]) -> Result<[Tensor; 5]> {
    Ok([
        read_tensor(reader, &shapes[0])?,
        read_tensor(reader, &shapes[1])?,
        read_tensor(reader, &shapes[2])?,
        read_tensor(reader, &shapes[3])?,
        read_tensor(reader, &shapes[4])?,
    ])
}
