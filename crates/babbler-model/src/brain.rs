//! Binary snapshots ("brains") of a [`Model`].
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic      7 bytes   b"BABLBRN"
//! version    u16       FORMAT_VERSION
//! order      u8
//! words      u32       dictionary entries, sentinels included
//!   len      u8        } repeated `words` times,
//!   bytes    len       } in allocation order
//! forward    tree
//! backward   tree
//!
//! tree: pre-order, per node
//!   symbol u16, usage u32, count u16, child_count u16
//! ```
//!
//! Loading builds a brand-new [`Model`]; nothing is handed back unless the
//! whole stream parsed and validated.

use std::io::{self, Read, Write};

use babbler_dict::{Dictionary, MAX_SYMBOLS, Symbol, Word};
use babbler_trie::{NodeRecord, Tree};
use log::info;
use thiserror::Error;

use crate::Model;

/// File identifier written at the start of every brain.
pub const MAGIC: &[u8; 7] = b"BABLBRN";

/// Bumped whenever the layout changes. Other versions are rejected.
pub const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum BrainError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not a brain file (bad magic)")]
    BadMagic,

    #[error("unsupported brain version {found} (expected {expected})")]
    VersionMismatch { found: u16, expected: u16 },

    #[error("brain file is truncated")]
    Truncated,

    #[error("malformed brain: {0}")]
    Malformed(String),
}

/// Write `model` to `out`.
pub fn save<W: Write + ?Sized>(model: &Model, out: &mut W) -> Result<(), BrainError> {
    out.write_all(MAGIC)?;
    out.write_all(&FORMAT_VERSION.to_le_bytes())?;
    out.write_all(&[model.order])?;

    out.write_all(&(model.dictionary.len() as u32).to_le_bytes())?;
    for (_, word) in model.dictionary.iter() {
        out.write_all(&[word.len() as u8])?;
        out.write_all(word.as_bytes())?;
    }

    write_tree(&model.forward, out)?;
    write_tree(&model.backward, out)?;
    out.flush()?;
    Ok(())
}

/// Serialize `model` into a fresh buffer.
pub fn to_bytes(model: &Model) -> Vec<u8> {
    let mut buf = Vec::new();
    save(model, &mut buf).expect("writing to a Vec cannot fail");
    buf
}

/// Read a model from `input`. The stream must end exactly after the
/// backward tree.
pub fn load<R: Read>(input: R) -> Result<Model, BrainError> {
    let mut r = BrainReader { inner: input };

    let mut magic = [0u8; MAGIC.len()];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(BrainError::BadMagic);
    }

    let version = r.u16()?;
    if version != FORMAT_VERSION {
        return Err(BrainError::VersionMismatch {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let order = r.u8()?;
    let dictionary = read_dictionary(&mut r)?;
    let forward = read_tree(&mut r, order, dictionary.len())?;
    let backward = read_tree(&mut r, order, dictionary.len())?;

    if !r.at_end()? {
        return Err(BrainError::Malformed("trailing bytes after backward tree".into()));
    }

    info!(
        "loaded brain: order {order}, {} words, {} + {} nodes",
        dictionary.word_count(),
        forward.len(),
        backward.len()
    );

    Ok(Model {
        order,
        forward,
        backward,
        dictionary,
    })
}

/// Parse a model from a byte slice.
pub fn from_bytes(bytes: &[u8]) -> Result<Model, BrainError> {
    load(bytes)
}

fn write_tree<W: Write + ?Sized>(tree: &Tree, out: &mut W) -> io::Result<()> {
    for node in tree.pre_order() {
        let rec = tree.record(node);
        out.write_all(&rec.symbol.as_u16().to_le_bytes())?;
        out.write_all(&rec.usage.to_le_bytes())?;
        out.write_all(&rec.count.to_le_bytes())?;
        out.write_all(&rec.child_count.to_le_bytes())?;
    }
    Ok(())
}

fn read_dictionary<R: Read>(r: &mut BrainReader<R>) -> Result<Dictionary, BrainError> {
    let count = r.u32()? as usize;
    if !(2..=MAX_SYMBOLS).contains(&count) {
        return Err(BrainError::Malformed(format!(
            "dictionary size {count} out of range"
        )));
    }

    let mut dictionary = Dictionary::new();
    for i in 0..count {
        let len = r.u8()? as usize;
        let mut bytes = vec![0u8; len];
        r.read_exact(&mut bytes)?;
        let word = Word::from_bytes(&bytes);

        if i < 2 {
            let expected = dictionary.text_of(Symbol::from_usize(i));
            if expected.as_bytes() != word.as_bytes() {
                return Err(BrainError::Malformed(format!(
                    "sentinel {i} is {word:?}, expected {expected:?}"
                )));
            }
            continue;
        }

        let sym = dictionary
            .intern(word)
            .map_err(|e| BrainError::Malformed(e.to_string()))?;
        if sym.as_usize() != i {
            return Err(BrainError::Malformed(format!(
                "entry {i} duplicates symbol {}",
                sym.as_u16()
            )));
        }
    }
    Ok(dictionary)
}

fn read_tree<R: Read>(
    r: &mut BrainReader<R>,
    order: u8,
    dictionary_len: usize,
) -> Result<Tree, BrainError> {
    let max_depth = order as usize + 1;
    Tree::from_pre_order(
        || {
            Ok(NodeRecord {
                symbol: Symbol(r.u16()?),
                usage: r.u32()?,
                count: r.u16()?,
                child_count: r.u16()?,
            })
        },
        |rec, depth| {
            if depth > max_depth {
                return Err(BrainError::Malformed(format!(
                    "tree deeper than order {order} allows"
                )));
            }
            if depth == 0 && rec.symbol != Symbol::ERROR {
                return Err(BrainError::Malformed("tree root is not the error sentinel".into()));
            }
            if depth > 0 && (rec.symbol == Symbol::ERROR || rec.symbol.as_usize() >= dictionary_len) {
                return Err(BrainError::Malformed(format!(
                    "node symbol {} outside dictionary",
                    rec.symbol.as_u16()
                )));
            }
            Ok(())
        },
        |symbol| {
            BrainError::Malformed(format!(
                "children out of order at symbol {}",
                symbol.as_u16()
            ))
        },
    )
}

/// Little-endian reader that reports a short stream as [`BrainError::Truncated`].
struct BrainReader<R> {
    inner: R,
}

impl<R: Read> BrainReader<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), BrainError> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => BrainError::Truncated,
            _ => BrainError::Io(e),
        })
    }

    fn u8(&mut self) -> Result<u8, BrainError> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn u16(&mut self) -> Result<u16, BrainError> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    fn u32(&mut self) -> Result<u32, BrainError> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn at_end(&mut self) -> Result<bool, BrainError> {
        let mut b = [0u8; 1];
        loop {
            match self.inner.read(&mut b) {
                Ok(n) => return Ok(n == 0),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
