//! Block tree assembly from the flat tag directory.
//!
//! FIFF nests data in blocks delimited by `FIFF_BLOCK_START` /
//! `FIFF_BLOCK_END` tags. [`make_dir_tree`] replays the directory against
//! an explicit stack and yields an owned tree whose nodes carry their own
//! slice of the directory.

use std::io::{Read, Seek};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::tag::{DirEntry, Tag};
use crate::types::FiffId;

/// One node of the block tree.
#[derive(Debug, Clone, Default)]
pub struct DirNode {
    /// Block type, or [`FIFFB_ROOT`] for the synthetic top node.
    pub block: i32,
    pub id: Option<FiffId>,
    pub parent_id: Option<FiffId>,
    /// Directory entries belonging directly to this block (children's
    /// entries live in the child nodes).
    pub directory: Vec<DirEntry>,
    pub children: Vec<DirNode>,
}

impl DirNode {
    /// All nodes of the given block type, in pre-order. The receiver
    /// itself is included when it matches.
    pub fn dir_tree_find(&self, block: i32) -> Vec<&DirNode> {
        let mut found = Vec::new();
        self.collect(block, &mut found);
        found
    }

    fn collect<'a>(&'a self, block: i32, found: &mut Vec<&'a DirNode>) {
        if self.block == block {
            found.push(self);
        }
        for child in &self.children {
            child.collect(block, found);
        }
    }

    /// Does this node's own directory carry a tag of the given kind?
    pub fn has_tag(&self, kind: i32) -> bool {
        self.directory.iter().any(|e| e.kind == kind)
    }

    /// Read the first tag of the given kind from this node's directory.
    pub fn find_tag<R: Read + Seek>(&self, reader: &mut R, kind: i32) -> Result<Option<Tag>> {
        match self.directory.iter().find(|e| e.kind == kind) {
            Some(entry) => Ok(Some(Tag::read_at(reader, entry.pos)?)),
            None => Ok(None),
        }
    }

    /// Number of directory entries directly in this block.
    pub fn nent(&self) -> usize {
        self.directory.len()
    }
}

/// Assemble the block tree from a flat directory.
///
/// Block start/end tags become tree structure and are dropped from the
/// node directories; block-id and parent-block-id tags populate the node
/// fields and stay in the directory as well.
pub fn make_dir_tree<R: Read + Seek>(reader: &mut R, directory: &[DirEntry]) -> Result<DirNode> {
    let root = DirNode {
        block: FIFFB_ROOT,
        ..DirNode::default()
    };
    let mut stack: Vec<DirNode> = vec![root];

    for entry in directory {
        match entry.kind {
            FIFF_BLOCK_START => {
                let tag = Tag::read_at(reader, entry.pos)?;
                let block = tag.to_i32()?;
                stack.push(DirNode {
                    block,
                    ..DirNode::default()
                });
            }
            FIFF_BLOCK_END => {
                if stack.len() < 2 {
                    return Err(Error::Structural(
                        "block end without matching block start".to_string(),
                    ));
                }
                let node = stack.pop().expect("stack is non-empty");
                stack.last_mut().expect("root remains").children.push(node);
            }
            FIFF_FILE_ID => {
                let tag = Tag::read_at(reader, entry.pos)?;
                let top = stack.last_mut().expect("root remains");
                if top.id.is_none() {
                    top.id = Some(tag.to_id()?);
                }
                top.directory.push(entry.clone());
            }
            FIFF_BLOCK_ID => {
                let tag = Tag::read_at(reader, entry.pos)?;
                let top = stack.last_mut().expect("root remains");
                top.id = Some(tag.to_id()?);
                top.directory.push(entry.clone());
            }
            FIFF_PARENT_BLOCK_ID | FIFF_PARENT_FILE_ID => {
                let tag = Tag::read_at(reader, entry.pos)?;
                let top = stack.last_mut().expect("root remains");
                top.parent_id = Some(tag.to_id()?);
                top.directory.push(entry.clone());
            }
            _ => {
                stack
                    .last_mut()
                    .expect("root remains")
                    .directory
                    .push(entry.clone());
            }
        }
    }

    // Tolerate truncated files with unclosed blocks.
    while stack.len() > 1 {
        log::warn!(
            "block {} not closed before end of directory",
            stack.last().expect("stack is non-empty").block
        );
        let node = stack.pop().expect("stack is non-empty");
        stack.last_mut().expect("root remains").children.push(node);
    }
    Ok(stack.pop().expect("root remains"))
}
