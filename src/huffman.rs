//! Static Huffman codec over 16-bit sample symbols.
//!
//! The tree lives in an arena: one contiguous node array of `2L - 1` entries
//! for `L` distinct symbols, children referenced by index. Construction is
//! fully deterministic: leaves are sorted by (frequency, symbol) and ties
//! always place the smaller symbol on the left, so an encoder and a decoder
//! that build from the same frequency table assign byte-for-byte identical
//! codes.

use std::collections::{BTreeMap, HashMap};

use crate::bitio::{BitReader, BitWriter};
use crate::error::WibError;

const NIL: u32 = u32::MAX;

// Longest code the encoder can emit; far beyond anything a per-fragment
// sample histogram produces.
const MAX_CODE_BITS: u8 = 64;

/// Whether symbols are modeled directly or as differences from the previous
/// sample. Slowly-varying waveforms concentrate the delta histogram near
/// zero and code much shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingMode {
    Direct,
    DeltaPrevious,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    freq: u64,
    // For leaves the coded symbol; for internal nodes the smallest symbol
    // underneath, which is what makes tie-breaking total.
    symbol: u16,
    left: u32,
    right: u32,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.left == NIL
    }

    fn key(&self) -> (u64, u16) {
        (self.freq, self.symbol)
    }
}

/// Prefix-code model built from a symbol frequency table.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    root: u32,
    codes: HashMap<u16, (u64, u8)>,
}

impl HuffmanTree {
    /// Build the tree and assign canonical codes.
    ///
    /// Leaves are sorted by (frequency, symbol); the two lowest unparented
    /// nodes merge until one root remains, the smaller-keyed node becoming
    /// the left child. Codes extend with bit 0 to the left and 1 to the
    /// right. A single-symbol model gets the 1-bit code `0`.
    pub fn build(frequencies: &BTreeMap<u16, u64>) -> Result<HuffmanTree, WibError> {
        let mut nodes: Vec<Node> = frequencies
            .iter()
            .filter(|&(_, &freq)| freq > 0)
            .map(|(&symbol, &freq)| Node { freq, symbol, left: NIL, right: NIL })
            .collect();
        if nodes.is_empty() {
            return Err(WibError::EmptyModel);
        }
        nodes.sort_by_key(Node::key);
        nodes.reserve(nodes.len() - 1);

        // Unparented arena indices, kept sorted by (frequency, symbol).
        let mut live: Vec<u32> = (0..nodes.len() as u32).collect();
        while live.len() > 1 {
            let a = live.remove(0);
            let b = live.remove(0);
            let merged = Node {
                freq: nodes[a as usize].freq + nodes[b as usize].freq,
                symbol: nodes[a as usize].symbol.min(nodes[b as usize].symbol),
                left: a,
                right: b,
            };
            let idx = nodes.len() as u32;
            let at = live.partition_point(|&i| nodes[i as usize].key() <= merged.key());
            nodes.push(merged);
            live.insert(at, idx);
        }
        let root = live[0];

        let mut codes = HashMap::with_capacity(frequencies.len());
        if nodes[root as usize].is_leaf() {
            codes.insert(nodes[root as usize].symbol, (0u64, 1u8));
        } else {
            let mut stack: Vec<(u32, u64, u8)> = vec![(root, 0, 0)];
            while let Some((idx, code, len)) = stack.pop() {
                let node = nodes[idx as usize];
                if node.is_leaf() {
                    codes.insert(node.symbol, (code, len));
                } else {
                    if len == MAX_CODE_BITS {
                        return Err(WibError::Unsupported("huffman code longer than 64 bits"));
                    }
                    stack.push((node.right, (code << 1) | 1, len + 1));
                    stack.push((node.left, code << 1, len + 1));
                }
            }
        }

        Ok(HuffmanTree { nodes, root, codes })
    }

    /// Build from observed samples (after any delta transform).
    pub fn from_symbols(symbols: &[u16]) -> Result<HuffmanTree, WibError> {
        let mut freqs = BTreeMap::new();
        for &s in symbols {
            *freqs.entry(s).or_insert(0u64) += 1;
        }
        HuffmanTree::build(&freqs)
    }

    /// Number of distinct symbols in the model.
    pub fn leaf_count(&self) -> usize {
        self.codes.len()
    }

    /// `(code, length)` for a symbol, if it is in the model.
    pub fn code(&self, symbol: u16) -> Option<(u64, u8)> {
        self.codes.get(&symbol).copied()
    }

    /// All `(symbol, code length)` pairs; test hook for the Kraft check.
    pub fn code_lengths(&self) -> Vec<(u16, u8)> {
        let mut v: Vec<(u16, u8)> = self.codes.iter().map(|(&s, &(_, len))| (s, len)).collect();
        v.sort_unstable();
        v
    }

    /// Append the prefix codes for `symbols` to the writer.
    pub fn encode_into(&self, symbols: &[u16], w: &mut BitWriter) -> Result<(), WibError> {
        for &s in symbols {
            let (code, len) = self
                .code(s)
                .ok_or(WibError::InvalidInput("symbol missing from the huffman model"))?;
            if len > 32 {
                w.write_bits_u32((code >> 32) as u32, len as usize - 32);
                w.write_bits_u32(code as u32, 32);
            } else {
                w.write_bits_u32(code as u32, len as usize);
            }
        }
        Ok(())
    }

    /// Decode exactly `count` symbols from the reader.
    pub fn decode_from(&self, r: &mut BitReader<'_>, count: usize) -> Result<Vec<u16>, WibError> {
        let mut out = Vec::with_capacity(count);
        let root = &self.nodes[self.root as usize];
        if root.is_leaf() {
            // Degenerate model: one symbol, 1-bit code 0.
            for _ in 0..count {
                if r.read_bit()? {
                    return Err(WibError::Format("invalid huffman code"));
                }
                out.push(root.symbol);
            }
            return Ok(out);
        }
        for _ in 0..count {
            let mut idx = self.root;
            loop {
                let node = &self.nodes[idx as usize];
                if node.is_leaf() {
                    out.push(node.symbol);
                    break;
                }
                idx = if r.read_bit()? { node.right } else { node.left };
            }
        }
        Ok(out)
    }
}

fn delta_transform(samples: &[u16]) -> Vec<u16> {
    let mut out = Vec::with_capacity(samples.len());
    let mut prev = 0u16;
    for &s in samples {
        out.push(s.wrapping_sub(prev));
        prev = s;
    }
    out
}

fn delta_restore(symbols: &mut [u16]) {
    let mut prev = 0u16;
    for s in symbols.iter_mut() {
        *s = s.wrapping_add(prev);
        prev = *s;
    }
}

// Self-describing blob: the frequency table travels with the bitstream so a
// fragment decodes without out-of-band state.
//
//   [mode: u8][count: u32][nsyms: u16][(symbol: u16, freq: u32) x nsyms]
//   [prefix-code bitstream, zero-padded to a byte]
//
// All fields little-endian.

/// Compress samples into a self-describing blob.
pub fn compress(samples: &[u16], mode: CodingMode) -> Result<Vec<u8>, WibError> {
    if samples.is_empty() {
        return Err(WibError::EmptyModel);
    }
    if samples.len() > u32::MAX as usize {
        return Err(WibError::InvalidInput("fragment too large for a huffman blob"));
    }

    let symbols = match mode {
        CodingMode::Direct => samples.to_vec(),
        CodingMode::DeltaPrevious => delta_transform(samples),
    };

    let mut freqs = BTreeMap::new();
    for &s in &symbols {
        *freqs.entry(s).or_insert(0u64) += 1;
    }
    let tree = HuffmanTree::build(&freqs)?;

    let mut header = Vec::with_capacity(9 + 6 * freqs.len());
    header.push(match mode {
        CodingMode::Direct => 0u8,
        CodingMode::DeltaPrevious => 1u8,
    });
    header.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    header.extend_from_slice(&(freqs.len() as u16).to_le_bytes());
    for (&sym, &freq) in &freqs {
        header.extend_from_slice(&sym.to_le_bytes());
        header.extend_from_slice(&(freq as u32).to_le_bytes());
    }

    let mut w = BitWriter::from_bytes(header);
    tree.encode_into(&symbols, &mut w)?;
    Ok(w.finish())
}

/// Decompress a blob produced by [`compress`].
pub fn decompress(bytes: &[u8]) -> Result<Vec<u16>, WibError> {
    if bytes.len() < 7 {
        return Err(WibError::Format("huffman blob shorter than its header"));
    }
    let mode = match bytes[0] {
        0 => CodingMode::Direct,
        1 => CodingMode::DeltaPrevious,
        _ => return Err(WibError::Format("unknown huffman blob mode")),
    };
    let count = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    let nsyms = u16::from_le_bytes([bytes[5], bytes[6]]) as usize;

    let table_end = 7 + 6 * nsyms;
    if bytes.len() < table_end {
        return Err(WibError::Format("huffman blob truncated in the frequency table"));
    }
    let mut freqs = BTreeMap::new();
    for i in 0..nsyms {
        let at = 7 + 6 * i;
        let sym = u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let freq =
            u32::from_le_bytes([bytes[at + 2], bytes[at + 3], bytes[at + 4], bytes[at + 5]]);
        freqs.insert(sym, freq as u64);
    }
    let tree = HuffmanTree::build(&freqs)?;

    let mut r = BitReader::new_at(bytes, table_end * 8);
    let mut symbols = tree.decode_from(&mut r, count)?;
    if mode == CodingMode::DeltaPrevious {
        delta_restore(&mut symbols);
    }
    Ok(symbols)
}
