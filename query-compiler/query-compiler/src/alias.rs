use std::fmt;

/// Aliases of table occurrences in reads with joins. `t0` is always the base table, joined
/// relations take `t1`, `t2`, ... from one counter, and the junction table of a many-to-many
/// include shares the number of its target (`j2` for `t2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Alias {
    Table(usize),
    Join(usize),
}

impl Alias {
    pub(crate) const BASE: Alias = Alias::Table(0);

    pub(crate) fn to_join_alias(self) -> Self {
        match self {
            Self::Table(index) | Self::Join(index) => Self::Join(index),
        }
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(index) => write!(f, "t{index}"),
            Self::Join(index) => write!(f, "j{index}"),
        }
    }
}

/// Hands out the next table alias. Shared by everything adding table occurrences to one
/// statement, so numbers are never reused.
#[derive(Debug, Clone)]
pub(crate) struct AliasCounter {
    last: usize,
}

impl Default for AliasCounter {
    fn default() -> Self {
        // t0 is taken by the base table.
        Self { last: 0 }
    }
}

impl AliasCounter {
    pub(crate) fn next_alias(&mut self) -> Alias {
        self.last += 1;
        Alias::Table(self.last)
    }
}

/// Names of relation-filter subqueries: `sub_<relation>`, then `sub_<relation>_1`, ... on collision
/// with any name already used in the statement.
#[derive(Debug, Clone, Default)]
pub(crate) struct SubqueryAliases {
    used: Vec<String>,
}

impl SubqueryAliases {
    pub(crate) fn reserve(&mut self, name: impl Into<String>) {
        self.used.push(name.into());
    }

    pub(crate) fn allocate(&mut self, base: &str) -> String {
        let mut candidate = base.to_owned();
        let mut suffix = 0;

        while self.used.iter().any(|used| used == &candidate) {
            suffix += 1;
            candidate = format!("{base}_{suffix}");
        }

        self.used.push(candidate.clone());
        candidate
    }
}
