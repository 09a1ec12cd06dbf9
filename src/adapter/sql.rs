//! SQL inspection
//!
//! Parses query text with `sqlparser` and lists the tables a query reads, so
//! callers can resolve commitments without naming tables by hand.
//!
//! # Example
//!
//! ```rust
//! use posql_client::adapter::sql::QueryParser;
//!
//! let parser = QueryParser::new();
//! let tables = parser
//!     .referenced_tables("SELECT COUNT(*) FROM ethereum.transactions")
//!     .unwrap();
//! assert_eq!(tables[0].to_string(), "ETHEREUM.TRANSACTIONS");
//! ```

use crate::error::AdapterError;
use crate::types::TableRef;
use sqlparser::ast::{ObjectName, Query, Statement, Visit, Visitor};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;
use std::ops::ControlFlow;

/// SQL query parser
#[derive(Debug)]
pub struct QueryParser {
    dialect: GenericDialect,
}

impl QueryParser {
    /// Create a new query parser
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    /// Parse a single read-only query
    ///
    /// # Arguments
    /// * `query` - SQL text holding exactly one `SELECT` (or set operation)
    ///
    /// # Returns
    /// The parsed statement, or an error for invalid SQL, multiple
    /// statements, or anything that is not a query
    pub fn parse(&self, query: &str) -> Result<Statement, AdapterError> {
        let mut statements = Parser::parse_sql(&self.dialect, query)
            .map_err(|e| AdapterError::new(format!("failed to parse SQL query: {e}")))?;

        if statements.len() != 1 {
            return Err(AdapterError::new(format!(
                "expected exactly one SQL statement, found {}",
                statements.len()
            )));
        }

        match statements.pop() {
            Some(statement @ Statement::Query(_)) => Ok(statement),
            Some(other) => Err(AdapterError::new(format!(
                "only queries can be proven, got: {other}"
            ))),
            None => Err(AdapterError::new("empty SQL text")),
        }
    }

    /// Canonical text of a query
    pub fn normalize(&self, query: &str) -> Result<String, AdapterError> {
        Ok(self.parse(query)?.to_string())
    }

    /// Tables read by `query`, in order of first appearance
    ///
    /// Tables in joins, subqueries and set operations are included; names
    /// bound by `WITH` are not. Unqualified names fall into the default
    /// schema.
    pub fn referenced_tables(&self, query: &str) -> Result<Vec<TableRef>, AdapterError> {
        let statement = self.parse(query)?;
        let mut collector = RelationCollector::default();
        // The collector never breaks.
        let _ = statement.visit(&mut collector);

        let mut seen = HashSet::new();
        let mut tables = Vec::new();
        for relation in collector.relations {
            if collector.ctes.contains(&relation.to_uppercase()) {
                continue;
            }
            let table: TableRef = relation
                .parse()
                .map_err(|_| AdapterError::new(format!("unsupported table name {relation:?}")))?;
            if seen.insert(table.clone()) {
                tables.push(table);
            }
        }
        Ok(tables)
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct RelationCollector {
    relations: Vec<String>,
    ctes: HashSet<String>,
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.ctes.insert(cte.alias.name.value.to_uppercase());
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        self.relations.push(unquote(&relation.to_string()));
        ControlFlow::Continue(())
    }
}

fn unquote(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect()
}
