//! SQL text interleaved with the values it binds.
//!
//! Statements are assembled from fragments and rendered once at the end, so placeholders and
//! arguments are produced by the same pass and can never drift apart.

use crate::PlaceholderFormat;
use query_value::QueryValue;

/// Where a bound value comes from. Numbered placeholders are assigned in this order, values of
/// the same group keep the order they were added in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum ParamGroup {
    Data,
    Where,
    Filter,
    Computed,
    Join,
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Sql(String),
    Param(ParamGroup, QueryValue),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Fragment {
    pieces: Vec<Piece>,
}

impl Fragment {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn sql(sql: impl Into<String>) -> Self {
        let mut fragment = Self::new();
        fragment.push_str(&sql.into());
        fragment
    }

    pub(crate) fn param(group: ParamGroup, value: QueryValue) -> Self {
        Self {
            pieces: vec![Piece::Param(group, value)],
        }
    }

    pub(crate) fn push_str(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.pieces.last_mut() {
            Some(Piece::Sql(last)) => last.push_str(sql),
            _ => self.pieces.push(Piece::Sql(sql.to_owned())),
        }

        self
    }

    pub(crate) fn push_param(&mut self, group: ParamGroup, value: QueryValue) -> &mut Self {
        self.pieces.push(Piece::Param(group, value));
        self
    }

    pub(crate) fn append(&mut self, other: Fragment) -> &mut Self {
        for piece in other.pieces {
            match piece {
                Piece::Sql(sql) => {
                    self.push_str(&sql);
                }
                param => self.pieces.push(param),
            }
        }

        self
    }

    /// `<prefix><self><suffix>`
    pub(crate) fn wrap(self, prefix: &str, suffix: &str) -> Fragment {
        let mut wrapped = Fragment::sql(prefix);
        wrapped.append(self);
        wrapped.push_str(suffix);
        wrapped
    }

    pub(crate) fn join<I>(fragments: I, separator: &str) -> Fragment
    where
        I: IntoIterator<Item = Fragment>,
    {
        let mut joined = Fragment::new();

        for (idx, fragment) in fragments.into_iter().enumerate() {
            if idx > 0 {
                joined.push_str(separator);
            }
            joined.append(fragment);
        }

        joined
    }

    /// Renders the SQL text and the arguments in binding order.
    ///
    /// Numbered placeholders follow [`ParamGroup`] order, so arguments are sorted by group. Anonymous
    /// placeholders bind by position in the text and keep their textual order.
    pub(crate) fn render(self, format: PlaceholderFormat) -> (String, Vec<QueryValue>) {
        let groups: Vec<ParamGroup> = self
            .pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Param(group, _) => Some(*group),
                Piece::Sql(_) => None,
            })
            .collect();

        // numbers[i] is the 1-based placeholder number of the i-th parameter in the text.
        let mut order: Vec<usize> = (0..groups.len()).collect();
        if format.has_numbering {
            order.sort_by_key(|&idx| groups[idx]);
        }

        let mut numbers = vec![0; groups.len()];
        for (position, &idx) in order.iter().enumerate() {
            numbers[idx] = position + 1;
        }

        let mut sql = String::new();
        let mut args: Vec<Option<QueryValue>> = vec![None; groups.len()];
        let mut param_idx = 0;

        for piece in self.pieces {
            match piece {
                Piece::Sql(text) => sql.push_str(&text),
                Piece::Param(_, value) => {
                    let number = numbers[param_idx];
                    format.write(&mut sql, number);
                    args[number - 1] = Some(value);
                    param_idx += 1;
                }
            }
        }

        (sql, args.into_iter().flatten().collect())
    }
}
