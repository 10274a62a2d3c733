use std::fs;
use std::path::Path;

use ahash::AHashSet;
use anyhow::{anyhow, Context};

use crate::runtime::base::ObjId;
use crate::runtime::collector::CycleCollector;

/// Write a Graphviz rendering of the reference graph under `obj` to `path`.
///
/// Side diagnostic for staring at a captured cycle; the tracking engine
/// never calls it and its output has no effect on any verdict.
pub fn dump_ref_graph(
    gc: &CycleCollector,
    obj: ObjId,
    max_depth: usize,
    path: &Path,
) -> anyhow::Result<()> {
    if !gc.is_alive(obj) {
        return Err(anyhow!("object {} is not alive", obj));
    }

    let mut out = String::from("digraph refs {\n");
    let mut seen: AHashSet<ObjId> = AHashSet::new();
    let mut frontier = vec![obj];

    for _ in 0..=max_depth {
        if frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for id in std::mem::take(&mut frontier) {
            if !seen.insert(id) {
                continue;
            }
            let label = match (gc.cls_of(id), gc.address_of(id)) {
                (Some(cls), Some(addr)) => {
                    format!("{} 0x{:x}", gc.qualified_name(cls), addr)
                }
                _ => continue,
            };
            out.push_str(&format!("  o{} [label=\"{}\"];\n", id, label));
            for child in gc.children_of(id) {
                out.push_str(&format!("  o{} -> o{};\n", id, child));
                if !seen.contains(&child) {
                    next.push(child);
                }
            }
        }
        frontier = next;
    }

    out.push_str("}\n");
    fs::write(path, out)
        .with_context(|| anyhow!("Failed to write graph file: {}", path.display()))?;
    Ok(())
}
