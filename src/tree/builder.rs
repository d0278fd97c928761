//! Fluent construction of [`Element`] trees.
//!
//! Front-end dialect expected by the entity conversion:
//!
//! - declaration categories: `namespace`, `use`, `struct`, `interface`,
//!   `component`, `composition`, `method`, `using`, `enum`, `extern`,
//!   `expression`;
//! - nested bodies use the child groups `inheritance`, `config`, `interface`
//!   and `composition`;
//! - expressions carry a `fragments` sequence whose children are `value`,
//!   `symbol` or `operator` elements; symbol fragments hold `argument` and
//!   `template` sequences of expression elements;
//! - contracts attach to any declaration through the `contract` group, one
//!   element per contract with a `kind` attribute and `;`-joined `values`.

use smol_str::SmolStr;
use text_size::TextSize;

use super::Element;

/// Generic builder for any element category.
#[derive(Clone, Debug)]
pub struct ElementBuilder {
    el: Element,
}

impl ElementBuilder {
    pub fn new(category: &str) -> Self {
        Self {
            el: Element::new(category),
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<SmolStr>) -> Self {
        self.el.set_attr(name, value);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.el.set_offset(TextSize::new(offset));
        self
    }

    pub fn child(mut self, group: &str, child: impl Into<Element>) -> Self {
        self.el.push_child(group, child.into());
        self
    }

    pub fn children(mut self, group: &str, children: impl IntoIterator<Item = Element>) -> Self {
        for child in children {
            self.el.push_child(group, child);
        }
        self
    }

    pub fn contract(self, kind: &str, values: &[&str]) -> Self {
        let contract = ContractBuilder::new(kind).values(values).build();
        self.child("contract", contract)
    }

    pub fn build(self) -> Element {
        self.el
    }
}

impl From<ElementBuilder> for Element {
    fn from(builder: ElementBuilder) -> Self {
        builder.build()
    }
}

/// Builder for contract elements.
#[derive(Clone, Debug)]
pub struct ContractBuilder {
    el: Element,
}

impl ContractBuilder {
    pub fn new(kind: &str) -> Self {
        Self {
            el: Element::new("contract"),
        }
        .kind(kind)
    }

    fn kind(mut self, kind: &str) -> Self {
        self.el.set_attr("kind", kind);
        self
    }

    pub fn values(mut self, values: &[&str]) -> Self {
        if !values.is_empty() {
            self.el.set_attr("values", values.join(";"));
        }
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.el.set_attr("comment", comment);
        self
    }

    pub fn build(self) -> Element {
        self.el
    }
}

impl From<ContractBuilder> for Element {
    fn from(builder: ContractBuilder) -> Self {
        builder.build()
    }
}

/// Builder for expression elements and their fragment sequences.
#[derive(Clone, Debug)]
pub struct ExpressionBuilder {
    el: Element,
}

impl Default for ExpressionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self {
            el: Element::new("expression"),
        }
    }

    /// Shorthand for a named expression.
    pub fn named(name: &str) -> Self {
        Self::new().name(name)
    }

    /// Shorthand for a bare literal expression, usable as an argument.
    pub fn lit(text: &str) -> Element {
        Self::new().literal(text).build()
    }

    /// Shorthand for a named literal argument.
    pub fn named_lit(name: &str, text: &str) -> Element {
        Self::named(name).literal(text).build()
    }

    /// Shorthand for a bare symbol reference, usable as an argument.
    pub fn sym(name: &str) -> Element {
        Self::new().symbol(name).build()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.el.set_attr("name", name);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.el.set_offset(TextSize::new(offset));
        self
    }

    /// Append a literal value fragment.
    pub fn literal(mut self, text: &str) -> Self {
        let mut fragment = Element::new("value");
        fragment.set_attr("value", text);
        self.el.push_child("fragments", fragment);
        self
    }

    /// Append a symbol fragment without arguments.
    pub fn symbol(self, name: &str) -> Self {
        self.call(name, [])
    }

    /// Append a symbol fragment with arguments.
    pub fn call(mut self, name: &str, args: impl IntoIterator<Item = Element>) -> Self {
        let mut fragment = Element::new("symbol");
        fragment.set_attr("symbol", name);
        for arg in args {
            fragment.push_child("argument", arg);
        }
        self.el.push_child("fragments", fragment);
        self
    }

    /// Append template arguments to the last symbol fragment pushed by
    /// [`Self::symbol`] or [`Self::call`].
    pub fn template(mut self, params: impl IntoIterator<Item = Element>) -> Self {
        if let Some(fragment) = self.el.last_child_mut("fragments") {
            for param in params {
                fragment.push_child("template", param);
            }
        }
        self
    }

    /// Append an operator fragment.
    pub fn operator(mut self, op: &str) -> Self {
        let mut fragment = Element::new("operator");
        fragment.set_attr("operator", op);
        self.el.push_child("fragments", fragment);
        self
    }

    /// Mark the expression read-only.
    pub fn const_(mut self) -> Self {
        self.el.set_attr("const", "");
        self
    }

    /// Declare the interface type the expression is viewed through.
    pub fn interface(mut self, symbol: &str) -> Self {
        self.el.set_attr("interface", symbol);
        self
    }

    pub fn contract(mut self, kind: &str, values: &[&str]) -> Self {
        let contract = ContractBuilder::new(kind).values(values).build();
        self.el.push_child("contract", contract);
        self
    }

    pub fn build(self) -> Element {
        self.el
    }
}

impl From<ExpressionBuilder> for Element {
    fn from(builder: ExpressionBuilder) -> Self {
        builder.build()
    }
}

/// A symbol element for inheritance lists.
pub fn symbol_element(name: &str) -> Element {
    let mut el = Element::new("symbol");
    el.set_attr("symbol", name);
    el
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_fragments_order() {
        let el = ExpressionBuilder::named("x")
            .literal("1")
            .operator("+")
            .literal("2")
            .build();
        let cats: Vec<_> = el
            .children("fragments")
            .iter()
            .map(|f| f.category().to_string())
            .collect();
        assert_eq!(cats, vec!["value", "operator", "value"]);
    }

    #[test]
    fn test_call_with_named_argument() {
        let el = ExpressionBuilder::named("x")
            .call("Integer", [ExpressionBuilder::named_lit("value", "10")])
            .build();
        let fragment = &el.children("fragments")[0];
        assert_eq!(fragment.attr_value("symbol"), Some("Integer"));
        let arg = &fragment.children("argument")[0];
        assert_eq!(arg.attr_value("name"), Some("value"));
    }

    #[test]
    fn test_template_attaches_to_last_symbol() {
        let el = ExpressionBuilder::named("x")
            .symbol("Vector")
            .template([ExpressionBuilder::sym("Integer")])
            .build();
        let fragment = &el.children("fragments")[0];
        assert_eq!(fragment.children("template").len(), 1);
    }

    #[test]
    fn test_contract_values_joined() {
        let el = ContractBuilder::new("min").values(&["10"]).build();
        assert_eq!(el.attr_value("kind"), Some("min"));
        assert_eq!(el.attr_value("values"), Some("10"));
    }
}
