use enumflags2::{BitFlags, bitflags};
use std::{fmt, str::FromStr};

/// Optional SQL features a dialect may support.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Capability {
    /// `INSERT/UPDATE ... RETURNING *`
    Returning,
    /// `ILIKE`
    InsensitiveLike,
    /// `COUNT(*) FILTER (WHERE ...)`
    AggregateFilter,
    /// `ORDER BY x NULLS FIRST|LAST`
    NullsOrdering,
}

/// How positional placeholders are rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaceholderFormat {
    pub prefix: &'static str,
    pub has_numbering: bool,
}

impl PlaceholderFormat {
    pub fn write(&self, sql: &mut String, placeholder_number: usize) {
        sql.push_str(self.prefix);

        if self.has_numbering {
            sql.push_str(&placeholder_number.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL and Supabase.
    Postgres,
    Mysql,
    Sqlite,
    /// Anything unrecognized: ANSI quoting, `?` placeholders and no optional features.
    Generic,
}

impl Dialect {
    /// Never fails, unknown names fall back to [`Dialect::Generic`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "supabase" => Dialect::Postgres,
            "mysql" => Dialect::Mysql,
            "sqlite" => Dialect::Sqlite,
            other => {
                tracing::debug!(dialect = other, "unknown dialect, using generic SQL");
                Dialect::Generic
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgresql",
            Dialect::Mysql => "mysql",
            Dialect::Sqlite => "sqlite",
            Dialect::Generic => "generic",
        }
    }

    pub fn capabilities(self) -> BitFlags<Capability> {
        match self {
            Dialect::Postgres => Capability::Returning
                | Capability::InsensitiveLike
                | Capability::AggregateFilter
                | Capability::NullsOrdering,
            Dialect::Mysql | Dialect::Sqlite | Dialect::Generic => BitFlags::empty(),
        }
    }

    pub fn has(self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }

    fn quote_char(self) -> char {
        match self {
            Dialect::Mysql | Dialect::Sqlite => '`',
            Dialect::Postgres | Dialect::Generic => '"',
        }
    }

    pub fn placeholder_format(self) -> PlaceholderFormat {
        match self {
            Dialect::Postgres => PlaceholderFormat {
                prefix: "$",
                has_numbering: true,
            },
            Dialect::Mysql | Dialect::Sqlite | Dialect::Generic => PlaceholderFormat {
                prefix: "?",
                has_numbering: false,
            },
        }
    }

    /// Quotes an identifier, doubling embedded quote characters.
    pub fn quote(self, ident: &str) -> String {
        let quote = self.quote_char();
        let mut out = String::with_capacity(ident.len() + 2);

        out.push(quote);
        for c in ident.chars() {
            if c == quote {
                out.push(quote);
            }
            out.push(c);
        }
        out.push(quote);

        out
    }

    /// `"alias"."column"`
    pub fn qualified(self, qualifier: &str, column: &str) -> String {
        format!("{}.{}", self.quote(qualifier), self.quote(column))
    }

    /// Statement prefix of an insert that silently skips conflicting rows.
    pub fn insert_ignore_prefix(self) -> &'static str {
        match self {
            Dialect::Mysql => "INSERT IGNORE INTO",
            Dialect::Sqlite => "INSERT OR IGNORE INTO",
            Dialect::Postgres | Dialect::Generic => "INSERT INTO",
        }
    }

    /// Statement suffix of an insert that silently skips conflicting rows.
    pub fn insert_ignore_suffix(self) -> Option<&'static str> {
        match self {
            Dialect::Postgres | Dialect::Generic => Some("ON CONFLICT DO NOTHING"),
            Dialect::Mysql | Dialect::Sqlite => None,
        }
    }

    /// What to render as `LIMIT` when only an offset is given, for dialects that require one.
    pub fn unbounded_limit(self) -> Option<&'static str> {
        match self {
            Dialect::Mysql => Some("18446744073709551615"),
            Dialect::Sqlite => Some("-1"),
            Dialect::Postgres | Dialect::Generic => None,
        }
    }

    /// An insert of a row without explicit values.
    pub fn default_values_insert(self) -> &'static str {
        match self {
            Dialect::Mysql => "() VALUES ()",
            Dialect::Postgres | Dialect::Sqlite | Dialect::Generic => "DEFAULT VALUES",
        }
    }
}

impl FromStr for Dialect {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Dialect::from_name(s))
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
