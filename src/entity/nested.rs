//! Structured declarations: nested bodies, methods, aliases, enums.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{Fqn, Loc, SourceId};
use crate::error::{Error, Result};
use crate::tree::Element;

use super::category::Category;
use super::model::{Entity, Lookup};
use super::parameters::Parameters;
use super::symbol::Symbol;

/// A declaration with member bodies: struct, interface, component or
/// composition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Nested {
    pub category: Category,
    pub inheritance: Vec<Symbol>,
    pub config: Vec<Entity>,
    pub interface: Vec<Entity>,
    pub composition: Vec<Entity>,
}

impl Nested {
    pub fn empty(category: Category) -> Self {
        Self {
            category,
            inheritance: Vec::new(),
            config: Vec::new(),
            interface: Vec::new(),
            composition: Vec::new(),
        }
    }

    /// Read a nested declaration, enforcing which member sequences its
    /// category may carry.
    pub fn from_element(el: &Element, category: Category, source: Option<SourceId>) -> Result<Self> {
        let loc = el.loc(source);
        let forbidden: &[&str] = match category {
            Category::Struct => &["interface", "composition"],
            Category::Interface => &["composition"],
            Category::Component => &[],
            Category::Composition => &["config", "interface"],
            _ => &[],
        };
        for group in forbidden {
            if el.has_children(group) {
                return Err(Error::contract_violation(
                    loc,
                    format!("a {category} cannot declare {group} members"),
                ));
            }
        }
        if category == Category::Composition && el.has_children("inheritance") {
            return Err(Error::inheritance(loc, "a composition cannot inherit"));
        }

        let inheritance = el
            .children("inheritance")
            .iter()
            .map(|child| Symbol::from_element(child, source))
            .collect::<Result<Vec<_>>>()?;

        let read_members = |group: &str| -> Result<Vec<Entity>> {
            el.children(group)
                .iter()
                .map(|child| Entity::from_element(child, source))
                .collect()
        };

        Ok(Self {
            category,
            inheritance,
            config: read_members("config")?,
            interface: read_members("interface")?,
            composition: read_members("composition")?,
        })
    }

    /// Resolve the inheritance list and return the flattened transitive
    /// parent set, nearest first.
    pub fn resolve(&mut self, loc: Loc, lookup: &mut dyn Lookup) -> Result<Vec<Fqn>> {
        let category = self.category;
        let mut parents = Vec::new();
        for symbol in &mut self.inheritance {
            symbol.resolve(lookup)?;
            let fqn = match symbol.fqn() {
                Some(fqn) => fqn.clone(),
                None => continue,
            };
            let target = lookup.entity(&fqn, loc)?;
            check_parent_category(category, target.category(), &fqn, loc)?;
            if !parents.contains(&fqn) {
                parents.push(fqn);
            }
            for transitive in &target.parents {
                if !parents.contains(transitive) {
                    parents.push(transitive.clone());
                }
            }
        }
        Ok(parents)
    }

}

fn check_parent_category(own: Category, parent: Category, fqn: &Fqn, loc: Loc) -> Result<()> {
    if !parent.is_inheritable() {
        return Err(Error::inheritance(
            loc,
            format!("'{fqn}' is a {parent} and cannot be inherited from"),
        ));
    }
    let compatible = match own {
        Category::Struct => matches!(parent, Category::Struct | Category::Builtin),
        Category::Interface => matches!(parent, Category::Interface | Category::Builtin),
        Category::Component => matches!(
            parent,
            Category::Interface | Category::Component | Category::Builtin
        ),
        _ => false,
    };
    if !compatible {
        return Err(Error::inheritance(
            loc,
            format!("a {own} cannot inherit from the {parent} '{fqn}'"),
        ));
    }
    Ok(())
}

/// An interface method: argument declarations and an optional return type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub args: Parameters,
    pub return_symbol: Option<Symbol>,
}

impl Method {
    pub fn from_element(el: &Element, source: Option<SourceId>) -> Result<Self> {
        let args = Parameters::from_elements(el.children("argument"), source)?;
        let return_symbol = el
            .attr_value("symbol")
            .map(|name| Symbol::from_name(name.to_string(), el.loc(source)));
        Ok(Self {
            args,
            return_symbol,
        })
    }

    pub fn resolve(&mut self, lookup: &mut dyn Lookup) -> Result<()> {
        self.args.resolve(lookup)?;
        if let Some(symbol) = &mut self.return_symbol {
            symbol.resolve(lookup)?;
        }
        Ok(())
    }
}

/// A type alias. Contracts of the aliased type propagate through the alias.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Using {
    pub symbol: Symbol,
}

impl Using {
    pub fn from_element(el: &Element, source: Option<SourceId>) -> Result<Self> {
        let loc = el.loc(source);
        let name = el.attr_value("symbol").ok_or_else(|| {
            Error::contract_violation(loc, "a using alias requires a target symbol")
        })?;
        let mut symbol = Symbol::from_name(name.to_string(), loc);
        symbol.template = Parameters::from_elements(el.children("template"), source)?;
        Ok(Self { symbol })
    }
}

/// An enumeration; each value also registers as an addressable child entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub values: Vec<SmolStr>,
}

impl EnumDecl {
    pub fn from_element(el: &Element, source: Option<SourceId>) -> Result<Self> {
        let loc = el.loc(source);
        let mut values = Vec::new();
        for child in el.children("values") {
            let value = child.attr_value("name").ok_or_else(|| {
                Error::contract_violation(loc, "an enum value requires a name")
            })?;
            let value = SmolStr::new(value);
            if values.contains(&value) {
                return Err(Error::contract_violation(
                    loc,
                    format!("enum value '{value}' is declared twice"),
                ));
            }
            values.push(value);
        }
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityKind, Expression, ResolveState};
    use crate::tree::ElementBuilder;

    struct CategoryLookup(Category);

    impl Lookup for CategoryLookup {
        fn resolve_name(&mut self, name: &str, _loc: Loc) -> Result<Vec<Fqn>> {
            Ok(vec![Fqn::new(name)])
        }

        fn entity(&mut self, fqn: &Fqn, _loc: Loc) -> Result<Entity> {
            let kind = match self.0 {
                Category::Expression => EntityKind::Expression(Expression::default()),
                category => EntityKind::Nested(Nested::empty(category)),
            };
            let mut entity = Entity::new(kind, Loc::default());
            entity.fqn = Some(fqn.clone());
            entity.state = ResolveState::Resolved;
            Ok(entity)
        }

        fn config_expectations(&mut self, _type_fqn: &Fqn, _loc: Loc) -> Result<Parameters> {
            Ok(Parameters::new())
        }
    }

    fn inherit(own: Category, parent: Category) -> Result<Vec<Fqn>> {
        let mut nested = Nested::empty(own);
        nested
            .inheritance
            .push(Symbol::from_name("Base", Loc::default()));
        nested.resolve(Loc::default(), &mut CategoryLookup(parent))
    }

    #[test]
    fn test_component_inherits_interface() {
        let parents = inherit(Category::Component, Category::Interface).unwrap();
        assert_eq!(parents, vec![Fqn::new("Base")]);
    }

    #[test]
    fn test_component_inherits_component() {
        assert!(inherit(Category::Component, Category::Component).is_ok());
    }

    #[test]
    fn test_interface_cannot_inherit_struct() {
        let err = inherit(Category::Interface, Category::Struct).unwrap_err();
        assert!(err.to_string().contains("cannot inherit from the struct"));
    }

    #[test]
    fn test_struct_cannot_inherit_component() {
        let err = inherit(Category::Struct, Category::Component).unwrap_err();
        assert!(err.to_string().contains("cannot inherit from the component"));
    }

    #[test]
    fn test_component_cannot_inherit_struct() {
        let err = inherit(Category::Component, Category::Struct).unwrap_err();
        assert!(err.to_string().contains("cannot inherit from the struct"));
    }

    #[test]
    fn test_expression_parent_not_inheritable() {
        let err = inherit(Category::Struct, Category::Expression).unwrap_err();
        assert!(err.to_string().contains("cannot be inherited from"));
    }

    #[test]
    fn test_struct_rejects_interface_members() {
        let el = ElementBuilder::new("struct")
            .attr("name", "S")
            .child("interface", ElementBuilder::new("method").attr("name", "m"))
            .build();
        let err = Nested::from_element(&el, Category::Struct, None).unwrap_err();
        assert!(err.to_string().contains("cannot declare interface members"));
    }

    #[test]
    fn test_composition_rejects_inheritance() {
        let el = ElementBuilder::new("composition")
            .attr("name", "C")
            .child("inheritance", crate::tree::symbol_element("Base"))
            .build();
        let err = Nested::from_element(&el, Category::Composition, None).unwrap_err();
        assert!(err.to_string().contains("cannot inherit"));
    }

    #[test]
    fn test_enum_rejects_duplicate_values() {
        let el = ElementBuilder::new("enum")
            .attr("name", "E")
            .child("values", ElementBuilder::new("value").attr("name", "A"))
            .child("values", ElementBuilder::new("value").attr("name", "A"))
            .build();
        assert!(EnumDecl::from_element(&el, None).is_err());
    }
}
