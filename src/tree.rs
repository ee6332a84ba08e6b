//! Flattening of remote folder trees into leaf file records

use crate::error::TraversalError;
use crate::sanitize::sanitize_name;
use crate::types::{FileNode, FileRecord, NodeKind};
use tracing::debug;

/// One open folder on the worklist
struct Frame<'a> {
    children: std::slice::Iter<'a, FileNode>,
    segment: Option<String>,
    folder_id: Option<&'a str>,
}

/// How a node takes part in the traversal
enum Shape<'a> {
    Leaf,
    Folder(&'a [FileNode]),
    Ignored,
}

fn shape(node: &FileNode) -> Shape<'_> {
    match (&node.kind, &node.children, &node.files) {
        (Some(NodeKind::File), _, _) => Shape::Leaf,
        (Some(NodeKind::Folder), Some(children), _) => Shape::Folder(children),
        (_, _, Some(files)) => Shape::Folder(files),
        _ => Shape::Ignored,
    }
}

/// Flatten a file listing into leaf records, depth-first and in listed order
///
/// Each record's `relative_path` holds the sanitized names of its ancestor
/// folders followed by its own sanitized name. Objects carrying a `files`
/// array are treated as folders; nodes that are neither files nor folders are
/// dropped.
///
/// The traversal uses an explicit stack. Folders nested deeper than
/// `max_depth`, or a folder whose id repeats one of its ancestors, reject the
/// whole listing.
///
/// # Examples
///
/// ```
/// use pdm_backup::tree::flatten;
/// use pdm_backup::types::FileNode;
///
/// let nodes = vec![
///     FileNode::file("1", "top.step"),
///     FileNode::folder("2", "Parts", vec![FileNode::file("3", "bolt.step")]),
/// ];
///
/// let records = flatten(&nodes, 64).unwrap();
/// assert_eq!(records[1].relative_path, vec!["Parts", "bolt.step"]);
/// ```
pub fn flatten(nodes: &[FileNode], max_depth: usize) -> Result<Vec<FileRecord>, TraversalError> {
    let mut records = Vec::new();
    let mut stack = vec![Frame {
        children: nodes.iter(),
        segment: None,
        folder_id: None,
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(node) = frame.children.next() else {
            stack.pop();
            continue;
        };

        match shape(node) {
            Shape::Leaf => {
                let name = node.name.clone().unwrap_or_default();
                let mut relative_path = current_path(&stack);
                relative_path.push(sanitize_name(&name));
                records.push(FileRecord {
                    id: node.id.clone().unwrap_or_default(),
                    name,
                    relative_path,
                });
            }
            Shape::Folder(children) => {
                let segment = node.name.as_deref().map(sanitize_name);
                let folder_id = node.id.as_deref().filter(|id| !id.is_empty());

                let depth = stack.len();
                if depth > max_depth {
                    return Err(TraversalError::DepthExceeded {
                        max_depth,
                        path: display_with(&stack, segment.as_deref()),
                    });
                }

                if let Some(id) = folder_id
                    && stack.iter().any(|f| f.folder_id == Some(id))
                {
                    return Err(TraversalError::Cycle {
                        folder_id: id.to_string(),
                        path: display_with(&stack, segment.as_deref()),
                    });
                }

                stack.push(Frame {
                    children: children.iter(),
                    segment,
                    folder_id,
                });
            }
            Shape::Ignored => {
                debug!(node_id = ?node.id, name = ?node.name, "ignoring node that is neither file nor folder");
            }
        }
    }

    Ok(records)
}

fn current_path(stack: &[Frame<'_>]) -> Vec<String> {
    stack.iter().filter_map(|f| f.segment.clone()).collect()
}

fn display_with(stack: &[Frame<'_>], segment: Option<&str>) -> String {
    let mut path = current_path(stack);
    path.extend(segment.map(str::to_string));
    path.join("/")
}
