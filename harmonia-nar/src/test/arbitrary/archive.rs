use proptest::collection::btree_map;
use proptest::prelude::*;

use super::{arb_byte_string, arb_filename, arb_symlink_target};
use crate::ByteString;
use crate::archive::NarNode;

pub fn arb_nar_file() -> impl Strategy<Value = NarNode> {
    (any::<bool>(), arb_byte_string())
        .prop_map(|(executable, contents)| NarNode::File {
            executable,
            contents,
        })
}

/// Trees up to `depth` levels deep with roughly `desired_size` nodes.
///
/// Entry names are distinct and sorted, so every generated tree has a
/// canonical encoding.
pub fn arb_nar_node(
    depth: u32,
    desired_size: u32,
    expected_branch_size: u32,
) -> impl Strategy<Value = NarNode> {
    let leaf = prop_oneof![
        4 => arb_nar_file(),
        1 => arb_symlink_target().prop_map(|target| NarNode::Symlink { target }),
    ];
    leaf.prop_recursive(depth, desired_size, expected_branch_size, move |inner| {
        btree_map(arb_filename(), inner, 0..expected_branch_size as usize).prop_map(|entries| {
            NarNode::Directory {
                entries: entries
                    .into_iter()
                    .map(|(name, node)| (ByteString::from(name), node))
                    .collect(),
            }
        })
    })
}
