//! Row view over the expression set
//!
//! A row is a lazy view: values are produced from the positioned
//! expressions only when the downstream asks for them.

use serde_json::Value;

use crate::expr::CollectorExpression;

/// One row of the scan's result schema.
pub trait Row {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of the column at `index`.
    fn get(&self, index: usize) -> Value;

    /// Copies all column values out of the view.
    fn materialize(&self) -> Vec<Value> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}

/// Lazy row over the collector's expressions, positioned on the current
/// document.
pub struct InputRow<'a> {
    expressions: &'a [Box<dyn CollectorExpression>],
}

impl<'a> InputRow<'a> {
    pub fn new(expressions: &'a [Box<dyn CollectorExpression>]) -> Self {
        Self { expressions }
    }
}

impl Row for InputRow<'_> {
    fn len(&self) -> usize {
        self.expressions.len()
    }

    fn get(&self, index: usize) -> Value {
        self.expressions[index].value()
    }
}
