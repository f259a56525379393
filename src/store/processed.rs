//! Binary layout for processed `(row id, col id, amount)` arrays.
//!
//! Little-endian: magic `RGTR`, `u64` count, then all rows (`u32`),
//! all cols (`u32`) and all amounts (`f64`).

use std::io::{Cursor, Read, Write};

use anyhow::{Context, Result, ensure};

const MAGIC: &[u8; 4] = b"RGTR";

/// Geomap-id triples ready for sparse matrix assembly.
pub type Triples = Vec<(u32, u32, f64)>;

pub(crate) fn write_triples_bytes(triples: &[(u32, u32, f64)]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(12 + triples.len() * 16);
    write_triples(&mut out, triples)?;
    Ok(out)
}

pub(crate) fn read_triples_bytes(bytes: &[u8]) -> Result<Triples> {
    let mut reader = Cursor::new(bytes);
    read_triples(&mut reader)
}

fn write_triples<W: Write>(writer: &mut W, triples: &[(u32, u32, f64)]) -> Result<()> {
    writer.write_all(MAGIC)
        .context("[store::processed] Failed to write magic bytes")?;
    writer.write_all(&(triples.len() as u64).to_le_bytes())
        .context("[store::processed] Failed to write count")?;

    for &(row, _, _) in triples {
        writer.write_all(&row.to_le_bytes())
            .context("[store::processed] Failed to write rows")?;
    }
    for &(_, col, _) in triples {
        writer.write_all(&col.to_le_bytes())
            .context("[store::processed] Failed to write cols")?;
    }
    for &(_, _, amount) in triples {
        writer.write_all(&amount.to_le_bytes())
            .context("[store::processed] Failed to write amounts")?;
    }

    Ok(())
}

fn read_triples<R: Read>(reader: &mut R) -> Result<Triples> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)
        .context("[store::processed] Failed to read magic bytes")?;
    ensure!(&magic == MAGIC, "[store::processed] Invalid magic: expected 'RGTR'");

    let mut b8 = [0u8; 8];
    reader.read_exact(&mut b8)
        .context("[store::processed] Failed to read count")?;
    let n = u64::from_le_bytes(b8) as usize;

    let mut b4 = [0u8; 4];
    let mut rows = Vec::with_capacity(n);
    for _ in 0..n {
        reader.read_exact(&mut b4)
            .context("[store::processed] Failed to read rows")?;
        rows.push(u32::from_le_bytes(b4));
    }
    let mut cols = Vec::with_capacity(n);
    for _ in 0..n {
        reader.read_exact(&mut b4)
            .context("[store::processed] Failed to read cols")?;
        cols.push(u32::from_le_bytes(b4));
    }
    let mut triples = Vec::with_capacity(n);
    for (row, col) in rows.into_iter().zip(cols) {
        reader.read_exact(&mut b8)
            .context("[store::processed] Failed to read amounts")?;
        triples.push((row, col, f64::from_le_bytes(b8)));
    }

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    ensure!(rest.is_empty(), "[store::processed] {} trailing bytes after {} triples", rest.len(), n);

    Ok(triples)
}
