//! Heavy-path decomposition (§4.6.3 step 1), shared by both sides of the
//! fast engine: the replicate uses it to build the Heavy-Path Tree, the
//! reference uses it to drive the leaf-by-leaf marking walk.

use crate::tree::{NodeId, Tree};

/// Result of decomposing a tree into heavy paths.
///
/// Each heavy path is a top-to-bottom chain of real tree nodes connected by
/// heavy-child edges, always ending at a leaf. Every node belongs to
/// exactly one path.
pub struct Decomposition {
    /// `paths[path_id]` is that path's nodes, root-end first.
    pub paths: Vec<Vec<NodeId>>,
    /// `path_of[node]` = the path id that node belongs to.
    pub path_of: Vec<u32>,
    /// `pos_in_path[node]` = that node's index within its path's node list.
    pub pos_in_path: Vec<u32>,
    /// `child_paths_at[node]` = path ids of the heavy paths rooted at each
    /// of `node`'s *light* children (empty for leaves; at most one entry
    /// for an ordinary binary node, up to two for a ternary root).
    pub child_paths_at: Vec<Vec<u32>>,
}

pub fn decompose(tree: &Tree) -> Decomposition {
    let n_nodes = tree.num_nodes();
    let mut paths: Vec<Vec<NodeId>> = Vec::new();
    let mut path_of = vec![u32::MAX; n_nodes];
    let mut pos_in_path = vec![0u32; n_nodes];
    let mut light_child_nodes: Vec<Vec<NodeId>> = vec![Vec::new(); n_nodes];

    let mut pending_starts = vec![tree.root()];
    while let Some(start) = pending_starts.pop() {
        let path_id = paths.len() as u32;
        let mut nodes_in_path = Vec::new();
        let mut cur = start;
        loop {
            path_of[cur as usize] = path_id;
            pos_in_path[cur as usize] = nodes_in_path.len() as u32;
            nodes_in_path.push(cur);

            let node = tree.node(cur);
            if node.is_leaf() {
                break;
            }
            let heavy_idx = node
                .heavy_child
                .expect("internal node must have a heavy child after seal()");
            for (idx, &child) in node.children.iter().enumerate() {
                if idx != heavy_idx {
                    pending_starts.push(child);
                    light_child_nodes[cur as usize].push(child);
                }
            }
            cur = node.children[heavy_idx];
        }
        paths.push(nodes_in_path);
    }

    let child_paths_at: Vec<Vec<u32>> = light_child_nodes
        .iter()
        .map(|children| children.iter().map(|&c| path_of[c as usize]).collect())
        .collect();

    Decomposition {
        paths,
        path_of,
        pos_in_path,
        child_paths_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxa::TaxonTable;
    use crate::tree::newick;

    fn sealed(newick_str: &str) -> Tree {
        let mut tree = newick::parse(newick_str).unwrap();
        let names: Vec<String> = tree
            .leaves()
            .map(|id| tree.node(id).name.clone().unwrap())
            .collect();
        let table = TaxonTable::from_names(names).unwrap();
        tree.bind_taxa(&table).unwrap();
        tree.seal().unwrap();
        tree
    }

    #[test]
    fn every_node_belongs_to_exactly_one_path() {
        let tree = sealed("((A:1,B:1):1,(C:1,(D:1,E:1):1):1);");
        let decomp = decompose(&tree);
        let total: usize = decomp.paths.iter().map(|p| p.len()).sum();
        assert_eq!(total, tree.num_nodes());
        for &node in &decomp.paths.concat() {
            assert!(decomp.path_of[node as usize] != u32::MAX);
        }
    }

    #[test]
    fn every_path_ends_at_a_leaf() {
        let tree = sealed("((A:1,B:1):1,(C:1,(D:1,E:1):1):1);");
        let decomp = decompose(&tree);
        for path in &decomp.paths {
            let last = *path.last().unwrap();
            assert!(tree.node(last).is_leaf());
        }
    }

    #[test]
    fn heavy_subtree_continues_same_path() {
        let tree = sealed("((A:1,B:1):1,(C:1,(D:1,E:1):1):1);");
        let decomp = decompose(&tree);
        let root = tree.root();
        let heavy_idx = tree.node(root).heavy_child.unwrap();
        let heavy_child = tree.node(root).children[heavy_idx];
        assert_eq!(
            decomp.path_of[root as usize],
            decomp.path_of[heavy_child as usize]
        );
    }
}
