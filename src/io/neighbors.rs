//! Reader/writer for the neighbor-file format (`spec.md` §6):
//! `<id>: <nbr1> <nbr2> ... <nbrK>`, one agent per line, trailing empty
//! list allowed. Grounded on `examples/original_source/sim.py`'s
//! `cluster_nbrs_path` reading loop (`line.split(':')`, whitespace-split
//! neighbor ids) and `gengraph.py`'s `write_nbrs`.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::io::{BufRead, Write};

use crate::error::{Error, Result};
use crate::neighbors::NeighborMap;
use crate::AgentId;

/// Parse a neighbor file from any `BufRead` source.
pub fn read<R: BufRead>(reader: R) -> Result<NeighborMap> {
    let mut edges: HashMap<AgentId, HashSet<AgentId>> = HashMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let (id_part, nbrs_part) = line.split_once(':').ok_or_else(|| {
            Error::GraphInconsistent(format!("line {}: missing ':' separator", lineno + 1))
        })?;
        let id: AgentId = id_part.trim().parse().map_err(|_| {
            Error::GraphInconsistent(format!("line {}: invalid agent id {id_part:?}", lineno + 1))
        })?;
        let mut nbrs = HashSet::new();
        for tok in nbrs_part.split_whitespace() {
            let nbr: AgentId = tok.parse().map_err(|_| {
                Error::GraphInconsistent(format!("line {}: invalid neighbor id {tok:?}", lineno + 1))
            })?;
            nbrs.insert(nbr);
        }
        edges.entry(id).or_default().extend(nbrs);
    }
    NeighborMap::from_edges(edges)
}

/// Write a neighbor map in ascending id order, matching `gengraph.py`'s
/// `write_nbrs` (ids sorted, neighbors space-separated).
pub fn write<W: Write>(map: &NeighborMap, mut writer: W) -> Result<()> {
    let mut ids: Vec<AgentId> = map.keys().collect();
    ids.sort_unstable();
    for id in ids {
        let mut nbrs: Vec<AgentId> = map.neighbors(id).collect();
        nbrs.sort_unstable();
        let mut line = format!("{id}: ");
        for (i, nbr) in nbrs.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            let _ = write!(line, "{nbr}");
        }
        line.push('\n');
        writer.write_all(line.as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_symmetry() {
        let mut map = NeighborMap::new();
        map.add_edge(0, 1);
        map.add_edge(1, 2);
        map.ensure_node(3);

        let mut buf = Vec::new();
        write(&map, &mut buf).unwrap();
        let parsed = read(buf.as_slice()).unwrap();

        assert!(parsed.contains(0));
        assert!(parsed.contains(3));
        assert!(parsed.neighbors(0).any(|n| n == 1));
        assert!(parsed.neighbors(1).any(|n| n == 0));
        assert!(parsed.neighbors(1).any(|n| n == 2));
        assert_eq!(parsed.neighbors(3).count(), 0);
    }

    #[test]
    fn rejects_line_without_colon() {
        let data = b"not a valid line\n".as_slice();
        assert!(read(data).is_err());
    }
}
