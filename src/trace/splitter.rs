//! Splits oversized emission traces into independently parseable chunks
//!
//! Splitting is line based and only ever happens right after a line that
//! closes a `<timestep>`, so no snapshot is cut in half. Every chunk is a
//! well-formed document: the root element is closed at the end of one chunk
//! and reopened at the start of the next.

use super::TraceError;
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Trace files at or above this size are split before parsing (256 MiB)
pub const DEFAULT_SAFE_PARSE_BYTES: u64 = 1 << 28;
/// Target chunk size (128 MiB)
pub const DEFAULT_CHUNK_BYTES: u64 = 1 << 27;
pub const DEFAULT_CHUNK_DIR: &str = "splitEmission";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceChunk {
    pub index: usize,
    pub path: PathBuf,
    pub size_bytes: u64,
}

pub fn needs_split(path: &Path, safe_parse_bytes: u64) -> Result<bool, TraceError> {
    Ok(fs::metadata(path)?.len() >= safe_parse_bytes)
}

/// `<chunk_dir>/<source stem>_<index>.xml`
pub fn chunk_path(chunk_dir: &Path, source: &Path, index: usize) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "trace".to_string());
    chunk_dir.join(format!("{}_{}.xml", stem, index))
}

/// Split `source` into chunks of roughly `chunk_bytes` under `chunk_dir`
///
/// Re-running on the same input produces the same chunk names; stale
/// higher-numbered chunks from an earlier run are removed.
pub fn split_trace(
    source: &Path,
    chunk_bytes: u64,
    chunk_dir: &Path,
) -> Result<Vec<TraceChunk>, TraceError> {
    fs::create_dir_all(chunk_dir)?;
    log::info!(
        "✂️  Splitting {} into ~{} byte chunks under {}",
        source.display(),
        chunk_bytes,
        chunk_dir.display()
    );

    let root = root_element_name(source)?;
    let mut input = BufReader::new(File::open(source)?);
    let mut chunks = Vec::new();
    let mut line = String::new();

    let mut index = 0;
    let mut path = chunk_path(chunk_dir, source, index);
    let mut out = BufWriter::new(File::create(&path)?);
    let mut written: u64 = 0;

    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        out.write_all(line.as_bytes())?;
        written += line.len() as u64;

        if written > chunk_bytes && closes_timestep(&line) {
            if let Some(root) = root.as_deref() {
                let closing = format!("</{}>\n", root);
                out.write_all(closing.as_bytes())?;
                written += closing.len() as u64;
                out.flush()?;
                chunks.push(TraceChunk {
                    index,
                    path: path.clone(),
                    size_bytes: written,
                });

                index += 1;
                path = chunk_path(chunk_dir, source, index);
                out = BufWriter::new(File::create(&path)?);
                let opening = format!("<{}>\n", root);
                out.write_all(opening.as_bytes())?;
                written = opening.len() as u64;
            }
        }
    }

    out.flush()?;
    chunks.push(TraceChunk {
        index,
        path,
        size_bytes: written,
    });

    let mut stale = index + 1;
    loop {
        let stale_path = chunk_path(chunk_dir, source, stale);
        if !stale_path.exists() {
            break;
        }
        fs::remove_file(&stale_path)?;
        stale += 1;
    }

    log::info!("✅ Split {} into {} chunks", source.display(), chunks.len());
    Ok(chunks)
}

/// Name of the document's root element
///
/// Declarations, comments and doctypes ahead of the root are skipped, so the
/// `<configuration>` echoed inside SUMO's generated header is never taken.
fn root_element_name(source: &Path) -> Result<Option<String>, TraceError> {
    let mut reader = XmlReader::from_reader(BufReader::new(File::open(source)?));
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| TraceError::Xml(e.to_string()))?
        {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(Some(String::from_utf8_lossy(e.name().as_ref()).to_string()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn closes_timestep(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.ends_with("</timestep>")
        || (trimmed.starts_with("<timestep") && trimmed.ends_with("/>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::SnapshotReader;
    use tempfile::tempdir;

    const SUMO_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<!-- generated on 2024-03-01 10:00:00 by Eclipse SUMO sumo Version 1.19.0\n\
<configuration xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n\
    <input>\n\
        <net-file value=\"city.net.xml\"/>\n\
    </input>\n\
    <output>\n\
        <emission-output value=\"emission.xml\"/>\n\
    </output>\n\
</configuration>\n\
-->\n\n";

    fn write_trace(path: &Path, steps: usize) {
        write_trace_with_header(path, steps, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    }

    fn write_trace_with_header(path: &Path, steps: usize, header: &str) {
        let mut out = String::from(header);
        out.push_str("<emission-export>\n");
        for step in 0..steps {
            out.push_str(&format!("    <timestep time=\"{}.00\">\n", step));
            out.push_str(&format!(
                "        <vehicle id=\"v{}\" CO2=\"1\" CO=\"1\" HC=\"1\" NOx=\"1\" PMx=\"1\" fuel=\"1\" lane=\"E1_0\"/>\n",
                step
            ));
            out.push_str("    </timestep>\n");
        }
        out.push_str("</emission-export>\n");
        fs::write(path, out).unwrap();
    }

    fn count_snapshots(path: &Path) -> usize {
        let mut reader = SnapshotReader::new(BufReader::new(File::open(path).unwrap()));
        let mut count = 0;
        while reader.next_snapshot().unwrap().is_some() {
            count += 1;
        }
        count
    }

    #[test]
    fn test_root_element_name_skips_generated_header() {
        let dir = tempdir().unwrap();
        let trace = dir.path().join("trace.xml");
        write_trace_with_header(&trace, 2, SUMO_HEADER);

        assert_eq!(
            root_element_name(&trace).unwrap().as_deref(),
            Some("emission-export")
        );
    }

    #[test]
    fn test_split_trace_with_generated_header() {
        let dir = tempdir().unwrap();
        let trace = dir.path().join("trace.xml");
        let chunk_dir = dir.path().join("chunks");
        write_trace_with_header(&trace, 40, SUMO_HEADER);

        let chunks = split_trace(&trace, 800, &chunk_dir).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks[1..] {
            let text = fs::read_to_string(&chunk.path).unwrap();
            assert!(text.starts_with("<emission-export>\n"));
            assert!(text.ends_with("</emission-export>\n"));
        }
        let total: usize = chunks.iter().map(|c| count_snapshots(&c.path)).sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn test_needs_split() {
        let dir = tempdir().unwrap();
        let trace = dir.path().join("trace.xml");
        write_trace(&trace, 3);

        assert!(needs_split(&trace, 10).unwrap());
        assert!(!needs_split(&trace, DEFAULT_SAFE_PARSE_BYTES).unwrap());
    }

    #[test]
    fn test_split_at_timestep_boundaries() {
        let dir = tempdir().unwrap();
        let trace = dir.path().join("trace.xml");
        let chunk_dir = dir.path().join("chunks");
        write_trace(&trace, 20);

        let chunks = split_trace(&trace, 400, &chunk_dir).unwrap();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.path, chunk_dir.join(format!("trace_{}.xml", i)));
            assert_eq!(chunk.size_bytes, fs::metadata(&chunk.path).unwrap().len());
        }

        let total: usize = chunks.iter().map(|c| count_snapshots(&c.path)).sum();
        assert_eq!(total, 20);
    }

    #[test]
    fn test_split_is_deterministic() {
        let dir = tempdir().unwrap();
        let trace = dir.path().join("trace.xml");
        let chunk_dir = dir.path().join("chunks");
        write_trace(&trace, 20);

        let first = split_trace(&trace, 400, &chunk_dir).unwrap();
        let contents: Vec<String> = first
            .iter()
            .map(|c| fs::read_to_string(&c.path).unwrap())
            .collect();
        let second = split_trace(&trace, 400, &chunk_dir).unwrap();

        assert_eq!(first, second);
        for (chunk, before) in second.iter().zip(contents) {
            assert_eq!(fs::read_to_string(&chunk.path).unwrap(), before);
        }
    }

    #[test]
    fn test_stale_chunks_removed() {
        let dir = tempdir().unwrap();
        let trace = dir.path().join("trace.xml");
        let chunk_dir = dir.path().join("chunks");
        write_trace(&trace, 20);

        let many = split_trace(&trace, 200, &chunk_dir).unwrap();
        let few = split_trace(&trace, 100_000, &chunk_dir).unwrap();

        assert_eq!(few.len(), 1);
        assert!(many.len() > 1);
        assert!(!chunk_path(&chunk_dir, &trace, 1).exists());
    }
}
