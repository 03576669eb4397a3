// purpose-atlas/src/tree_view.rs

use crate::{
    entry::EntryRecord,
    util::cmp_rel_paths,
};

/// Folder tree lines, depth-first in path order.
///
/// Output format (example):
/// ```text
/// . - Project root
/// src/ - Library code
///   nested/ - Helpers
/// ```
pub fn folder_tree(folders: &[EntryRecord]) -> Vec<String> {
    let mut sorted: Vec<&EntryRecord> = folders.iter().collect();
    sorted.sort_by(|a, b| cmp_rel_paths(&a.path, &b.path));
    sorted.into_iter().map(tree_line).collect()
}

fn tree_line(rec: &EntryRecord) -> String {
    let summary = rec.display_summary();
    if rec.path == "." {
        return format!(". - {summary}");
    }
    let depth = rec.path.matches('/').count();
    let name = rec.path.rsplit('/').next().unwrap_or(&rec.path);
    format!("{}{}/ - {}", "  ".repeat(depth), name, summary)
}
