//! Post-parse lookup structures: absolute data offsets per token and a
//! per-row record with coordinate-to-token resolution.
//!
//! Built once at finalization. Because the arena is in reading order and
//! row numbers are monotone over it, every row's tokens form a contiguous
//! arena range and data offsets are a prefix sum.

use crate::token::{TokenData, TokenId};
use crate::tree::{SyntaxTree, TokenRef};

#[derive(Debug, Clone, Copy)]
struct RowRecord {
    /// Arena range of the row's tokens; `first > last` marks a row
    /// without tokens (an empty row string).
    first: u32,
    last: u32,
    data_start: usize,
    data_end: usize,
}

#[derive(Debug)]
pub(crate) struct TokenIndex {
    data_starts: Vec<usize>,
    records: Vec<RowRecord>,
}

impl TokenIndex {
    pub(crate) fn build(rows: &[Box<str>], tokens: &[TokenData]) -> Self {
        let mut data_starts = Vec::with_capacity(tokens.len());
        let mut offset = 0;
        for token in tokens {
            data_starts.push(offset);
            offset += token.len();
        }

        let mut records = vec![
            RowRecord {
                first: 1,
                last: 0,
                data_start: 0,
                data_end: 0,
            };
            rows.len()
        ];
        // Skip the root: it is not located in any row.
        for (i, token) in tokens.iter().enumerate().skip(1) {
            let Some(record) = records.get_mut(token.row_no) else {
                continue;
            };
            if record.first > record.last {
                record.first = i as u32;
            }
            record.last = i as u32;
        }
        let mut offset = 0;
        for (record, row) in records.iter_mut().zip(rows) {
            record.data_start = offset;
            record.data_end = offset + row.len();
            offset = record.data_end;
        }

        Self {
            data_starts,
            records,
        }
    }

    #[inline]
    pub(crate) fn data_start(&self, id: TokenId) -> usize {
        self.data_starts[id.index()]
    }

    fn record(&self, row_no: usize) -> Option<&RowRecord> {
        self.records.get(row_no)
    }

    fn token_in_row_at(&self, tree: &SyntaxTree, record: &RowRecord, column: usize) -> Option<TokenId> {
        if record.first > record.last {
            return None;
        }
        for i in record.first..=record.last {
            let id = TokenId(i);
            if tree.data(id).col_end > column {
                return Some(id);
            }
        }
        None
    }

    pub(crate) fn token_at_coord(
        &self,
        tree: &SyntaxTree,
        row_no: usize,
        column: usize,
    ) -> Option<TokenId> {
        self.record(row_no)
            .and_then(|record| self.token_in_row_at(tree, record, column))
    }

    pub(crate) fn token_at_cursor(&self, tree: &SyntaxTree, offset: usize) -> Option<TokenId> {
        let record = self.records.iter().find(|r| r.data_end > offset)?;
        self.token_in_row_at(tree, record, offset - record.data_start)
    }

    pub(crate) fn row_info<'a>(&'a self, tree: &'a SyntaxTree, row_no: usize) -> Option<RowInfo<'a>> {
        self.record(row_no).map(|record| RowInfo {
            tree,
            row_no,
            record: *record,
        })
    }
}

/// Index record of one input row.
pub struct RowInfo<'a> {
    tree: &'a SyntaxTree,
    row_no: usize,
    record: RowRecord,
}

impl<'a> RowInfo<'a> {
    pub fn row_no(&self) -> usize {
        self.row_no
    }

    /// Absolute byte offset of the row start.
    pub fn data_start(&self) -> usize {
        self.record.data_start
    }

    /// Absolute byte offset just past the row.
    pub fn data_end(&self) -> usize {
        self.record.data_end
    }

    /// Row length in bytes.
    pub fn len_row(&self) -> usize {
        self.record.data_end - self.record.data_start
    }

    /// Tokens located in this row, in reading order.
    pub fn tokens(&self) -> impl Iterator<Item = TokenRef<'a>> + 'a {
        let tree = self.tree;
        let range = if self.record.first > self.record.last {
            0..0
        } else {
            self.record.first..self.record.last + 1
        };
        range.map(move |i| TokenRef {
            tree,
            id: TokenId(i),
        })
    }

    pub fn first_token(&self) -> Option<TokenRef<'a>> {
        self.tokens().next()
    }

    pub fn last_token(&self) -> Option<TokenRef<'a>> {
        if self.record.first > self.record.last {
            return None;
        }
        Some(TokenRef {
            tree: self.tree,
            id: TokenId(self.record.last),
        })
    }
}
