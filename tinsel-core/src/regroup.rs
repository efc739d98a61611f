//! Render-pass regrouping.
//!
//! A GPU pass cannot read the texture it is writing, so a render block
//! body is cut wherever the author asked for a synchronisation point: at
//! every `refresh` and around every nested render block. Each run of plain
//! statements between two cuts becomes its own single-iteration sub-block
//! with the parent's routing. Nested blocks are regrouped recursively but
//! never merged with their siblings.

use crate::expand::{ExpandedBlock, Item};

pub fn regroup(block: ExpandedBlock<'_>) -> ExpandedBlock<'_> {
    let cut = block
        .body
        .iter()
        .any(|item| matches!(item, Item::Refresh | Item::Block(_)));
    if !cut {
        return block;
    }

    let ExpandedBlock {
        once,
        in_num,
        out_num,
        loop_num,
        body,
    } = block;
    let io = (in_num, out_num);
    let mut groups = Vec::new();
    let mut run = Vec::new();
    for item in body {
        match item {
            Item::Stmt(_) => run.push(item),
            Item::Refresh => flush(&mut run, &mut groups, io),
            Item::Block(nested) => {
                flush(&mut run, &mut groups, io);
                groups.push(Item::Block(regroup(nested)));
            }
        }
    }
    flush(&mut run, &mut groups, io);

    ExpandedBlock {
        once,
        in_num,
        out_num,
        loop_num,
        body: groups,
    }
}

/// Close the current run of statements as a single-pass group.
fn flush<'a>(run: &mut Vec<Item<'a>>, groups: &mut Vec<Item<'a>>, (in_num, out_num): (u32, u32)) {
    if run.is_empty() {
        return;
    }
    groups.push(Item::Block(ExpandedBlock {
        once: false,
        in_num,
        out_num,
        loop_num: 1,
        body: std::mem::take(run),
    }));
}
