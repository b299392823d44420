//! DCT perceptual hashing.
//!
//! The hash keeps the low-frequency structure of a grayscale thumbnail: the
//! image is shrunk to `4·n` square, transformed with a 2-D DCT-II, and the
//! top-left `n × n` coefficients are thresholded against their median.
//! Robust to resizing and recompression, not to crops or color shifts.

use std::f64::consts::PI;
use std::fmt;

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::FeatureError;

/// Minimum supported hash side length
pub const MIN_HASH_SIZE: u32 = 4;

/// Maximum supported hash side length
pub const MAX_HASH_SIZE: u32 = 64;

/// Thumbnail side is this many times the hash side
const HIGHFREQ_FACTOR: u32 = 4;

/// Fixed-length perceptual hash.
///
/// Bits are stored row-major over the low-frequency DCT block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PerceptualHash {
    words: Vec<u64>,
    bits: usize,
}

impl PerceptualHash {
    /// Build a hash from individual bits.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut words = vec![0u64; bits.len().div_ceil(64)];
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                words[i / 64] |= 1u64 << (i % 64);
            }
        }
        Self {
            words,
            bits: bits.len(),
        }
    }

    /// Number of bits in the hash
    pub fn len(&self) -> usize {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Value of bit `i`
    pub fn bit(&self, i: usize) -> bool {
        i < self.bits && (self.words[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Number of differing bits.
    pub fn hamming(&self, other: &PerceptualHash) -> Result<u32, FeatureError> {
        if self.bits != other.bits {
            return Err(FeatureError::DimensionMismatch {
                expected: self.bits,
                actual: other.bits,
            });
        }
        Ok(self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum())
    }

    /// Hex encoding: the bit string read as a big-endian integer, zero-padded
    /// to `ceil(bits / 4)` digits.
    pub fn to_hex(&self) -> String {
        let width = self.bits.div_ceil(4);
        let pad = width * 4 - self.bits;

        let mut out = String::with_capacity(width);
        let mut nibble = 0u32;
        for pos in 0..width * 4 {
            let bit = pos >= pad && self.bit(pos - pad);
            nibble = (nibble << 1) | bit as u32;
            if pos % 4 == 3 {
                // nibble is always < 16
                out.push(char::from_digit(nibble, 16).unwrap_or('0'));
                nibble = 0;
            }
        }
        out
    }

    /// Parse a hex string produced by [`PerceptualHash::to_hex`].
    pub fn from_hex(hex: &str, bits: usize) -> Result<Self, FeatureError> {
        let width = bits.div_ceil(4);
        if hex.len() != width {
            return Err(FeatureError::InvalidHash(format!(
                "expected {} hex digits for {} bits, got {}",
                width,
                bits,
                hex.len()
            )));
        }

        let mut all = Vec::with_capacity(width * 4);
        for c in hex.chars() {
            let digit = c
                .to_digit(16)
                .ok_or_else(|| FeatureError::InvalidHash(format!("not a hex digit: {c:?}")))?;
            for shift in (0..4).rev() {
                all.push((digit >> shift) & 1 == 1);
            }
        }

        let pad = width * 4 - bits;
        if all[..pad].iter().any(|&b| b) {
            return Err(FeatureError::InvalidHash(format!(
                "value does not fit in {bits} bits"
            )));
        }

        Ok(Self::from_bits(&all[pad..]))
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Computes DCT perceptual hashes of a fixed size.
#[derive(Debug, Clone)]
pub struct PerceptualHasher {
    hash_size: u32,
    /// cos(pi * k * (2i + 1) / 2N) for k < hash_size, i < N
    cosines: Vec<Vec<f64>>,
}

impl PerceptualHasher {
    /// Create a hasher producing `hash_size²`-bit hashes.
    pub fn new(hash_size: u32) -> Result<Self, FeatureError> {
        if !(MIN_HASH_SIZE..=MAX_HASH_SIZE).contains(&hash_size) {
            return Err(FeatureError::InvalidInput(format!(
                "hash_size must be between {MIN_HASH_SIZE} and {MAX_HASH_SIZE}, got {hash_size}"
            )));
        }

        let n = (hash_size * HIGHFREQ_FACTOR) as usize;
        let cosines = (0..hash_size as usize)
            .map(|k| {
                (0..n)
                    .map(|i| (PI * k as f64 * (2 * i + 1) as f64 / (2 * n) as f64).cos())
                    .collect()
            })
            .collect();

        Ok(Self { hash_size, cosines })
    }

    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    /// Total bits per hash; also the maximum Hamming distance.
    pub fn bit_len(&self) -> usize {
        (self.hash_size * self.hash_size) as usize
    }

    /// Hash a decoded image.
    pub fn hash(&self, image: &DynamicImage) -> PerceptualHash {
        let h = self.hash_size as usize;
        let n = h * HIGHFREQ_FACTOR as usize;

        let thumb = image
            .grayscale()
            .resize_exact(n as u32, n as u32, FilterType::Lanczos3)
            .to_luma8();
        let pixels: Vec<f64> = thumb.pixels().map(|p| p[0] as f64).collect();

        // DCT-II down the columns, keeping the first h frequencies: h x n
        let mut cols = vec![0f64; h * n];
        for k in 0..h {
            let cos_k = &self.cosines[k];
            for j in 0..n {
                let mut acc = 0.0;
                for (i, c) in cos_k.iter().enumerate() {
                    acc += pixels[i * n + j] * c;
                }
                cols[k * n + j] = 2.0 * acc;
            }
        }

        // DCT-II along the rows: h x h low-frequency block
        let mut block = vec![0f64; h * h];
        for k in 0..h {
            for l in 0..h {
                let row = &cols[k * n..(k + 1) * n];
                let acc: f64 = row.iter().zip(self.cosines[l].iter()).map(|(v, c)| v * c).sum();
                block[k * h + l] = 2.0 * acc;
            }
        }

        let med = median(&block);
        let bits: Vec<bool> = block.iter().map(|&v| v > med).collect();
        PerceptualHash::from_bits(&bits)
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
