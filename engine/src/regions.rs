use std::collections::{BTreeMap, HashMap};

use crate::grid::{FactionIdx, GridResult};

/// Maximal run of same-winner cells in one row, columns inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strip {
    pub row: i64,
    pub start_col: i64,
    pub end_col: i64,
    pub faction: FactionIdx,
}

/// Rectangle of cells, rows and columns inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start_row: i64,
    pub end_row: i64,
    pub start_col: i64,
    pub end_col: i64,
    pub faction: FactionIdx,
}

impl Block {
    fn from_strip(strip: &Strip) -> Self {
        Self {
            start_row: strip.row,
            end_row: strip.row,
            start_col: strip.start_col,
            end_col: strip.end_col,
            faction: strip.faction,
        }
    }

    pub fn cell_count(&self) -> usize {
        ((self.end_row - self.start_row + 1) * (self.end_col - self.start_col + 1)) as usize
    }
}

/// Coalesce each row's consecutive same-faction cells. Rows ascending, strips
/// within a row ordered by column.
pub fn extract_strips(grid: &GridResult) -> Vec<Strip> {
    let mut strips = Vec::new();
    for (&row, cols) in &grid.winners {
        let mut current: Option<Strip> = None;
        for (&col, &faction) in cols {
            match current.as_mut() {
                Some(strip) if strip.faction == faction && strip.end_col + 1 == col => {
                    strip.end_col = col;
                }
                _ => {
                    strips.extend(current.take());
                    current = Some(Strip {
                        row,
                        start_col: col,
                        end_col: col,
                        faction,
                    });
                }
            }
        }
        strips.extend(current);
    }
    strips
}

/// Stack strips with identical faction and column bounds on contiguous rows
/// into blocks, grouped by faction. Factions without strips are absent.
pub fn extract_blocks(grid: &GridResult) -> BTreeMap<FactionIdx, Vec<Block>> {
    let mut blocks: Vec<Block> = Vec::new();
    // Blocks that ended on the previous row, keyed by (faction, start, end).
    let mut open: HashMap<(FactionIdx, i64, i64), usize> = HashMap::new();
    let mut open_row: Option<i64> = None;
    let mut next_open = HashMap::new();

    for strip in extract_strips(grid) {
        if open_row != Some(strip.row) {
            if let Some(previous) = open_row {
                open = std::mem::take(&mut next_open);
                if strip.row != previous + 1 {
                    open.clear();
                }
            }
            open_row = Some(strip.row);
        }

        let key = (strip.faction, strip.start_col, strip.end_col);
        let idx = match open.remove(&key) {
            Some(idx) => {
                blocks[idx].end_row = strip.row;
                idx
            }
            None => {
                blocks.push(Block::from_strip(&strip));
                blocks.len() - 1
            }
        };
        next_open.insert(key, idx);
    }

    let mut by_faction: BTreeMap<FactionIdx, Vec<Block>> = BTreeMap::new();
    for block in blocks {
        by_faction.entry(block.faction).or_default().push(block);
    }
    by_faction
}
