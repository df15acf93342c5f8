//! A minimal concrete `SymbolAnalyser` that reads a debug-symbol
//! sidecar file from disk.
//!
//! Real symbol sidecars (the detailed analyser's input) carry far more
//! than this engine needs; this reader decodes exactly the two record
//! kinds spec.md §4.2 specifies and nothing else, stored in a small
//! private binary layout analogous to the one `cov-metadata` uses for
//! the module container itself.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::analyser::{MethodKey, SymbolAnalyser};
use crate::types::{BranchPoint, SequencePoint};

const MAGIC: [u8; 4] = *b"SYM1";

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < n {
            bail!("unexpected end of symbol sidecar data");
        }
        let (lo, hi) = self.bytes.split_at(n);
        self.bytes = hi;
        Ok(lo)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        Ok(String::from_utf8(self.take(len)?.to_vec())?)
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Default)]
struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.bytes.push(v);
    }
    fn u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }
    fn i32(&mut self, v: i32) {
        self.u32(v as u32);
    }
    fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }
    fn string(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.bytes.extend_from_slice(s.as_bytes());
    }
}

struct MethodRecord {
    sequence_points: Vec<SequencePoint>,
    branch_points: Vec<BranchPoint>,
}

/// Reads a sidecar file produced by `SidecarBuilder` and answers
/// `SymbolAnalyser` queries from its in-memory contents.
pub struct SidecarAnalyser {
    methods: HashMap<MethodKey, MethodRecord>,
}

impl SidecarAnalyser {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading symbol sidecar {}", path.display()))?;
        Self::parse(&bytes)
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader { bytes };
        let magic = [r.u8()?, r.u8()?, r.u8()?, r.u8()?];
        if magic != MAGIC {
            bail!("not a recognized symbol sidecar (bad magic)");
        }

        let method_count = r.u32()?;
        let mut methods = HashMap::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let declaring_type = r.string()?;
            let method_name = r.string()?;

            let sp_count = r.u32()?;
            let mut sequence_points = Vec::with_capacity(sp_count as usize);
            for _ in 0..sp_count {
                sequence_points.push(SequencePoint {
                    offset: r.u32()?,
                    document_url: r.string()?,
                    start_line: r.u32()?,
                    end_line: r.u32()?,
                    is_hidden: r.bool()?,
                });
            }

            let bp_count = r.u32()?;
            let mut branch_points = Vec::with_capacity(bp_count as usize);
            for _ in 0..bp_count {
                let document = if r.bool()? { Some(r.string()?) } else { None };
                let offset = r.u32()?;
                let end_offset = r.u32()?;
                let start_line = r.i32()?;
                let path_len = r.u32()?;
                let mut path = Vec::with_capacity(path_len as usize);
                for _ in 0..path_len {
                    path.push(r.u32()?);
                }
                let ordinal = r.u32()?;
                branch_points.push(BranchPoint {
                    document,
                    offset,
                    end_offset,
                    start_line,
                    path,
                    ordinal,
                });
            }

            methods.insert(
                MethodKey::new(declaring_type, method_name),
                MethodRecord {
                    sequence_points,
                    branch_points,
                },
            );
        }

        if !r.is_empty() {
            bail!("trailing data after symbol sidecar");
        }

        Ok(Self { methods })
    }
}

impl SymbolAnalyser for SidecarAnalyser {
    fn sequence_points(&self, method: &MethodKey) -> Result<Vec<SequencePoint>> {
        Ok(self.methods.get(method).map(|m| m.sequence_points.clone()).unwrap_or_default())
    }

    fn branch_points(&self, method: &MethodKey) -> Result<Vec<BranchPoint>> {
        Ok(self.methods.get(method).map(|m| m.branch_points.clone()).unwrap_or_default())
    }
}

/// Builds a sidecar file in memory, for use by tests and by
/// `covtool`'s demo fixtures. Mirrors the shape `SidecarAnalyser`
/// parses, one method record at a time.
#[derive(Default)]
pub struct SidecarBuilder {
    methods: Vec<(MethodKey, MethodRecord)>,
}

impl SidecarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_method(&mut self, key: MethodKey, sequence_points: Vec<SequencePoint>, branch_points: Vec<BranchPoint>) -> &mut Self {
        self.methods.push((
            key,
            MethodRecord {
                sequence_points,
                branch_points,
            },
        ));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut w = Writer::default();
        w.u8(MAGIC[0]);
        w.u8(MAGIC[1]);
        w.u8(MAGIC[2]);
        w.u8(MAGIC[3]);
        w.u32(self.methods.len() as u32);

        for (key, record) in &self.methods {
            w.string(&key.declaring_type);
            w.string(&key.method_name);

            w.u32(record.sequence_points.len() as u32);
            for sp in &record.sequence_points {
                w.u32(sp.offset);
                w.string(&sp.document_url);
                w.u32(sp.start_line);
                w.u32(sp.end_line);
                w.bool(sp.is_hidden);
            }

            w.u32(record.branch_points.len() as u32);
            for bp in &record.branch_points {
                w.bool(bp.document.is_some());
                if let Some(doc) = &bp.document {
                    w.string(doc);
                }
                w.u32(bp.offset);
                w.u32(bp.end_offset);
                w.i32(bp.start_line);
                w.u32(bp.path.len() as u32);
                for p in &bp.path {
                    w.u32(*p);
                }
                w.u32(bp.ordinal);
            }
        }

        w.bytes
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.build()).with_context(|| format!("writing symbol sidecar {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_sidecar_format() {
        let mut builder = SidecarBuilder::new();
        builder.add_method(
            MethodKey::new("App.Widget", "DoWork"),
            vec![SequencePoint {
                offset: 0,
                document_url: "widget.rs".into(),
                start_line: 10,
                end_line: 10,
                is_hidden: false,
            }],
            vec![BranchPoint {
                document: Some("widget.rs".into()),
                offset: 5,
                end_offset: 10,
                start_line: 20,
                path: vec![0],
                ordinal: 0,
            }],
        );

        let bytes = builder.build();
        let analyser = SidecarAnalyser::parse(&bytes).expect("parses");

        let key = MethodKey::new("App.Widget", "DoWork");
        let sps = analyser.sequence_points(&key).unwrap();
        assert_eq!(sps.len(), 1);
        assert_eq!(sps[0].start_line, 10);

        let bps = analyser.branch_points(&key).unwrap();
        assert_eq!(bps.len(), 1);
        assert_eq!(bps[0].end_offset, 10);
    }

    #[test]
    fn unknown_method_yields_empty_lists() {
        let builder = SidecarBuilder::new();
        let analyser = SidecarAnalyser::parse(&builder.build()).unwrap();
        let key = MethodKey::new("App.Widget", "Missing");
        assert!(analyser.sequence_points(&key).unwrap().is_empty());
        assert!(analyser.branch_points(&key).unwrap().is_empty());
    }
}
