//! Device-ID file handling.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::Rng;

/// IDs are uniform random 40-bit values, rendered as zero-padded lowercase
/// hex. Zero is excluded so no device ever reports an all-zero identity.
const ID_MAX: u64 = 0xff_ffff_ffff;

/// Read the ID file, one device per line, preserving file order.
pub fn load(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read ID file {}", path.display()))?;
    let ids: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    if ids.is_empty() {
        bail!("ID file {} contains no device IDs", path.display());
    }
    Ok(ids)
}

/// Write `count` fresh device IDs, replacing the file.
pub fn generate(path: &Path, count: usize) -> Result<()> {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(count * 11);
    for _ in 0..count {
        let id: u64 = rng.gen_range(1..=ID_MAX);
        out.push_str(&format!("{id:010x}\n"));
    }
    fs::write(path, out).with_context(|| format!("failed to write ID file {}", path.display()))
}
