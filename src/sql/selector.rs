//! SELECT list entries

use crate::expr::{DataType, Expression};

/// What a selector projects
#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    /// Plain column reference
    Column(String),
    /// Computed expression
    Expression(Expression),
    /// Raw SQL emitted verbatim
    Text(String),
}

/// One entry of a SELECT list
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub column: SelectColumn,
    pub alias: Option<String>,
    pub data_type: Option<DataType>,
}

impl Selector {
    pub fn column(name: impl Into<String>) -> Self {
        Self::new(SelectColumn::Column(name.into()))
    }

    pub fn expression(expr: Expression) -> Self {
        Self::new(SelectColumn::Expression(expr))
    }

    pub fn text(raw: impl Into<String>) -> Self {
        Self::new(SelectColumn::Text(raw.into()))
    }

    fn new(column: SelectColumn) -> Self {
        Self {
            column,
            alias: None,
            data_type: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Name the selector is visible under in the result set
    pub fn output_name(&self) -> Option<&str> {
        match (&self.alias, &self.column) {
            (Some(alias), _) => Some(alias),
            (None, SelectColumn::Column(name)) => Some(name),
            (None, SelectColumn::Expression(expr)) => expr.as_identifier(),
            (None, SelectColumn::Text(_)) => None,
        }
    }

    /// Expression producing the selector's value, when it has one
    pub fn as_expression(&self) -> Option<Expression> {
        match &self.column {
            SelectColumn::Column(name) => Some(Expression::identifier(name.clone())),
            SelectColumn::Expression(expr) => Some(expr.clone()),
            SelectColumn::Text(_) => None,
        }
    }

    /// Declared type, falling back to the expression's own type
    pub fn data_type(&self) -> DataType {
        match (&self.data_type, &self.column) {
            (Some(t), _) => *t,
            (None, SelectColumn::Expression(expr)) => expr.data_type(),
            (None, _) => DataType::Any,
        }
    }
}

/// Ordered SELECT list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectorList {
    selectors: Vec<Selector>,
}

impl SelectorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, selector: Selector) {
        self.selectors.push(selector);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Selector> {
        self.selectors.iter()
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Find a selector by its output name
    pub fn find(&self, name: &str) -> Option<&Selector> {
        self.selectors.iter().find(|s| s.output_name() == Some(name))
    }

    /// Output names in order; unnamed raw selectors are skipped
    pub fn output_names(&self) -> Vec<&str> {
        self.selectors.iter().filter_map(Selector::output_name).collect()
    }
}

impl FromIterator<Selector> for SelectorList {
    fn from_iter<I: IntoIterator<Item = Selector>>(iter: I) -> Self {
        Self {
            selectors: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SelectorList {
    type Item = &'a Selector;
    type IntoIter = std::slice::Iter<'a, Selector>;

    fn into_iter(self) -> Self::IntoIter {
        self.selectors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;

    #[test]
    fn test_output_names_keep_order() {
        let list: SelectorList = [
            Selector::column("b"),
            Selector::column("a").with_alias("x"),
            Selector::text("1"),
            Selector::expression(Expression::binary(
                BinaryOp::Add,
                Expression::identifier("a"),
                Expression::long(1),
            ))
            .with_alias("a_plus"),
        ]
        .into_iter()
        .collect();

        assert_eq!(list.output_names(), vec!["b", "x", "a_plus"]);
        assert_eq!(list.find("a_plus").map(Selector::data_type), Some(DataType::Long));
        assert!(list.find("a").is_none());
    }
}
