//! Filesystem-monitor dirty-set extension (FSMN).
//!
//! Persists the set of index entries the fsmonitor provider has not yet
//! vouched for as unchanged, plus the token the provider issued them
//! relative to. The set is stored as a run-length-compressed (EWAH) bitmap
//! over live (non-removed) entry positions.
//!
//! On-disk layout (big-endian throughout):
//! ```text
//! version:  u32            (1 or 2)
//! token:    u64             if version == 1 (nanosecond timestamp)
//!           NUL-terminated   if version == 2 (opaque bytes)
//! ewah_size: u32
//! ewah:     bit_size(u32) word_count(u32) [u64; word_count]
//! ```
//!
//! Writers always emit version 2; version 1 is accepted on read for
//! compatibility with indices written before the opaque-token format.

use bstr::BString;

use crate::IndexError;

const SIG: &str = "FSMN";

/// A run-length-compressed bitset, one bit per live index entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EwahBitmap {
    bit_size: u32,
    /// Encoded words: sequences of (header, literals...) exactly as laid out on disk.
    words: Vec<u64>,
}

impl EwahBitmap {
    /// An empty bitmap over zero bits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bitmap of `bit_size` bits with the given sorted, deduplicated
    /// positions set.
    pub fn from_positions(bit_size: u32, positions: &[u32]) -> Self {
        let word_len = bit_size.div_ceil(64) as usize;
        let mut raw = vec![0u64; word_len];
        for &pos in positions {
            if pos < bit_size {
                raw[(pos / 64) as usize] |= 1u64 << (pos % 64);
            }
        }
        Self {
            bit_size,
            words: encode_words(&raw),
        }
    }

    /// Number of bits this bitmap covers.
    pub fn bit_size(&self) -> u32 {
        self.bit_size
    }

    /// Number of bits set (the bitmap's "rank").
    pub fn rank(&self) -> usize {
        self.iter_set_bits().count()
    }

    /// Iterate over the positions of set bits, in ascending order.
    pub fn iter_set_bits(&self) -> impl Iterator<Item = u32> + '_ {
        decode_words(&self.words, self.bit_size).into_iter()
    }

    /// Is the bit at `pos` set?
    pub fn is_set(&self, pos: u32) -> bool {
        if pos >= self.bit_size {
            return false;
        }
        // Cheap path: only decode once per query site in practice (reconcile visits
        // each position once), so a full decode-and-scan is acceptable here.
        self.iter_set_bits().any(|p| p == pos)
    }

    /// Parse an EWAH blob starting at `data[0]`. Returns the bitmap and the
    /// number of bytes consumed.
    fn parse(data: &[u8]) -> Result<(Self, usize), IndexError> {
        if data.len() < 8 {
            return Err(IndexError::InvalidExtension {
                sig: SIG.into(),
                reason: "truncated EWAH header".into(),
            });
        }
        let bit_size = read_u32(&data[0..4]);
        let word_count = read_u32(&data[4..8]) as usize;
        let mut cursor = 8;
        let mut words = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            if cursor + 8 > data.len() {
                return Err(IndexError::InvalidExtension {
                    sig: SIG.into(),
                    reason: "truncated EWAH word".into(),
                });
            }
            words.push(read_u64(&data[cursor..cursor + 8]));
            cursor += 8;
        }
        // Validate the word stream actually parses as a consistent header/literal
        // sequence; this catches a corrupt word_count that happens to fit.
        validate_words(&words)?;
        Ok((Self { bit_size, words }, cursor))
    }

    /// Serialize to the on-disk EWAH blob form.
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.words.len() * 8);
        buf.extend_from_slice(&self.bit_size.to_be_bytes());
        buf.extend_from_slice(&(self.words.len() as u32).to_be_bytes());
        for w in &self.words {
            buf.extend_from_slice(&w.to_be_bytes());
        }
        buf
    }
}

/// Encode a flat bit-vector (one `u64` per 64 bits, last word zero-padded)
/// into the header/literal word stream.
fn encode_words(raw: &[u64]) -> Vec<u64> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let word = raw[i];
        if word == 0 || word == u64::MAX {
            let mut run = 1u64;
            while i + (run as usize) < raw.len() && raw[i + run as usize] == word {
                run += 1;
            }
            let fill_bit = if word == u64::MAX { 1u64 } else { 0u64 };
            out.push(fill_bit | (run << 1));
            i += run as usize;
        } else {
            let start = i;
            let mut count = 0u64;
            while i < raw.len() && raw[i] != 0 && raw[i] != u64::MAX {
                count += 1;
                i += 1;
            }
            out.push(count << 33);
            out.extend_from_slice(&raw[start..start + count as usize]);
        }
    }
    out
}

/// Walk the header/literal stream and return the set-bit positions, capped at `bit_size`.
fn decode_words(words: &[u64], bit_size: u32) -> Vec<u32> {
    let mut bits = Vec::new();
    let mut bit_pos: u32 = 0;
    let mut i = 0;
    while i < words.len() {
        let rlw = words[i];
        i += 1;
        let fill_bit = (rlw & 1) != 0;
        let run_length = ((rlw >> 1) & 0xFFFF_FFFF) as u32;
        let literal_count = (rlw >> 33) as u32;

        if fill_bit {
            for _ in 0..run_length.saturating_mul(64) {
                if bit_pos < bit_size {
                    bits.push(bit_pos);
                }
                bit_pos += 1;
            }
        } else {
            bit_pos = bit_pos.saturating_add(run_length.saturating_mul(64));
        }

        for _ in 0..literal_count {
            if i >= words.len() {
                break;
            }
            let word = words[i];
            i += 1;
            for bit in 0..64 {
                if word & (1u64 << bit) != 0 && bit_pos < bit_size {
                    bits.push(bit_pos);
                }
                bit_pos += 1;
            }
        }
    }
    bits
}

/// Walk the word stream purely to confirm every header's literal_count is
/// backed by enough trailing words, without materializing bit positions.
fn validate_words(words: &[u64]) -> Result<(), IndexError> {
    let mut i = 0;
    while i < words.len() {
        let rlw = words[i];
        i += 1;
        let literal_count = (rlw >> 33) as usize;
        if i + literal_count > words.len() {
            return Err(IndexError::InvalidExtension {
                sig: SIG.into(),
                reason: "EWAH literal count exceeds remaining words".into(),
            });
        }
        i += literal_count;
    }
    Ok(())
}

fn read_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

fn read_u64(data: &[u8]) -> u64 {
    u64::from_be_bytes([
        data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
    ])
}

/// The FSMN extension: a token plus the dirty bitmap relative to it.
#[derive(Debug, Clone)]
pub struct FsmonitorExt {
    pub token: BString,
    pub bitmap: EwahBitmap,
}

impl FsmonitorExt {
    pub const SIGNATURE: &'static [u8; 4] = b"FSMN";

    /// Parse a FSMN extension from raw data.
    pub fn parse(data: &[u8]) -> Result<Self, IndexError> {
        if data.len() < 9 {
            return Err(IndexError::InvalidExtension {
                sig: SIG.into(),
                reason: "extension shorter than minimum header".into(),
            });
        }
        let version = read_u32(&data[0..4]);
        let mut cursor = 4;

        let token = match version {
            1 => {
                if cursor + 8 > data.len() {
                    return Err(IndexError::InvalidExtension {
                        sig: SIG.into(),
                        reason: "truncated v1 timestamp token".into(),
                    });
                }
                let nanos = read_u64(&data[cursor..cursor + 8]);
                cursor += 8;
                BString::from(nanos.to_string().into_bytes())
            }
            2 => {
                let nul_pos = data[cursor..]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| IndexError::InvalidExtension {
                        sig: SIG.into(),
                        reason: "missing NUL after v2 token".into(),
                    })?;
                let token = BString::from(&data[cursor..cursor + nul_pos]);
                cursor += nul_pos + 1;
                token
            }
            other => {
                return Err(IndexError::InvalidExtension {
                    sig: SIG.into(),
                    reason: format!("unsupported fsmonitor extension version {other}"),
                });
            }
        };

        if cursor + 4 > data.len() {
            return Err(IndexError::InvalidExtension {
                sig: SIG.into(),
                reason: "missing EWAH size".into(),
            });
        }
        let ewah_size = read_u32(&data[cursor..cursor + 4]) as usize;
        cursor += 4;

        if cursor + ewah_size > data.len() {
            return Err(IndexError::InvalidExtension {
                sig: SIG.into(),
                reason: "EWAH blob exceeds extension bounds".into(),
            });
        }
        let (bitmap, consumed) = EwahBitmap::parse(&data[cursor..cursor + ewah_size])?;
        if consumed != ewah_size {
            return Err(IndexError::InvalidExtension {
                sig: SIG.into(),
                reason: "trailing bytes after EWAH bitmap".into(),
            });
        }

        Ok(FsmonitorExt { token, bitmap })
    }

    /// Serialize to raw bytes for writing. Always emits version 2.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf.extend_from_slice(&self.token);
        buf.push(0);

        let ewah = self.bitmap.serialize();
        buf.extend_from_slice(&(ewah.len() as u32).to_be_bytes());
        buf.extend_from_slice(&ewah);
        buf
    }
}
