//! Position mapping through document changes

use serde::{Deserialize, Serialize};

/// One replaced range: `old_size` positions at `start` became `new_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacedRange {
    pub start: usize,
    pub old_size: usize,
    pub new_size: usize,
}

/// Result of mapping a single position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    /// The position was inside a replaced range
    pub deleted: bool,
}

/// Position changes made by one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMap {
    ranges: Vec<ReplacedRange>,
}

impl StepMap {
    pub fn new(ranges: Vec<ReplacedRange>) -> Self {
        Self { ranges }
    }

    pub fn replace(start: usize, old_size: usize, new_size: usize) -> Self {
        if old_size == 0 && new_size == 0 {
            return Self::default();
        }
        Self::new(vec![ReplacedRange {
            start,
            old_size,
            new_size,
        }])
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Map `pos`; `assoc < 0` keeps positions at an insertion point before it
    pub fn map_result(&self, pos: usize, assoc: i32) -> MapResult {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let start = range.start;
            if start > pos {
                break;
            }
            let end = start + range.old_size;
            if pos <= end {
                let side = if range.old_size == 0 {
                    assoc
                } else if pos == start {
                    -1
                } else if pos == end {
                    1
                } else {
                    assoc
                };
                let mapped = if side < 0 { start } else { start + range.new_size };
                let deleted = range.old_size > 0 && pos > start && pos < end;
                return MapResult {
                    pos: offset(mapped, diff),
                    deleted,
                };
            }
            diff += range.new_size as isize - range.old_size as isize;
        }
        MapResult {
            pos: offset(pos, diff),
            deleted: false,
        }
    }

    pub fn map(&self, pos: usize, assoc: i32) -> usize {
        self.map_result(pos, assoc).pos
    }
}

fn offset(pos: usize, diff: isize) -> usize {
    (pos as isize + diff).max(0) as usize
}

/// Ordered sequence of step maps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn is_empty(&self) -> bool {
        self.maps.iter().all(StepMap::is_empty)
    }

    pub fn map_result(&self, pos: usize, assoc: i32) -> MapResult {
        let mut deleted = false;
        let mut pos = pos;
        for map in &self.maps {
            let result = map.map_result(pos, assoc);
            deleted |= result.deleted;
            pos = result.pos;
        }
        MapResult { pos, deleted }
    }

    pub fn map(&self, pos: usize, assoc: i32) -> usize {
        self.map_result(pos, assoc).pos
    }
}
