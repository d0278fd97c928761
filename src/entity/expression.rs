//! Expressions: fragment sequences folded into a closed value state.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{Fqn, Loc, SourceId};
use crate::error::{Error, Result};
use crate::tree::Element;

use super::category::Role;
use super::literal::Literal;
use super::model::Lookup;
use super::parameters::{BoundParameters, Parameters};
use super::symbol::Symbol;

/// One piece of an expression as written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Fragment {
    Value {
        literal: Literal,
        loc: Loc,
    },
    Symbol {
        symbol: Symbol,
        args: Parameters,
        /// Arguments were written explicitly (`Type()` vs a bare reference).
        has_call: bool,
    },
    Operator {
        op: SmolStr,
        loc: Loc,
    },
}

/// The closed state of a resolved expression. Exactly one variant holds once
/// resolution succeeds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExprState {
    #[default]
    Unresolved,
    /// A compile-time literal.
    Literal(Literal),
    /// An alias to another value.
    LValue { symbol: Symbol },
    /// An instantiation of a type with bound arguments.
    RValue { symbol: Symbol, args: BoundParameters },
}

/// A value-producing entity: literal, alias, or instantiation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub is_varargs: bool,
    pub is_const: bool,
    pub interface_symbol: Option<Symbol>,
    pub fragments: Vec<Fragment>,
    pub state: ExprState,
}

/// Entity-level facts derived while resolving an expression.
pub struct ExprOutcome {
    pub literal: Option<Literal>,
    pub underlying_type: Option<Fqn>,
    pub underlying_value: Option<Fqn>,
    pub role: Role,
}

impl Expression {
    /// Read an `expression` element and its fragment sequence.
    pub fn from_element(el: &Element, source: Option<SourceId>) -> Result<Self> {
        let mut fragments = Vec::new();
        for fragment in el.children("fragments") {
            let loc = fragment.loc(source);
            match fragment.category() {
                "value" => fragments.push(Fragment::Value {
                    literal: Literal::parse(fragment.attr_value("value").unwrap_or("")),
                    loc,
                }),
                "symbol" => {
                    let symbol = Symbol::from_element(fragment, source)?;
                    let args = Parameters::from_elements(fragment.children("argument"), source)?;
                    let has_call = fragment.has_children("argument");
                    fragments.push(Fragment::Symbol {
                        symbol,
                        args,
                        has_call,
                    });
                }
                "operator" => fragments.push(Fragment::Operator {
                    op: SmolStr::new(fragment.attr_value("operator").unwrap_or("")),
                    loc,
                }),
                other => {
                    return Err(Error::contract_violation(
                        loc,
                        format!("unknown expression fragment '{other}'"),
                    ));
                }
            }
        }
        Ok(Self {
            is_varargs: el.has_attr("varargs"),
            is_const: el.has_attr("const"),
            interface_symbol: el
                .attr_value("interface")
                .map(|name| Symbol::from_name(name.to_string(), el.loc(source))),
            fragments,
            state: ExprState::Unresolved,
        })
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.state, ExprState::Unresolved)
    }

    /// The resolved symbol, for alias and instantiation states.
    pub fn symbol(&self) -> Option<&Symbol> {
        match &self.state {
            ExprState::LValue { symbol } | ExprState::RValue { symbol, .. } => Some(symbol),
            _ => None,
        }
    }

    pub fn bound_args(&self) -> Option<&BoundParameters> {
        match &self.state {
            ExprState::RValue { args, .. } => Some(args),
            _ => None,
        }
    }

    /// Resolve fragments, fold operators, bind arguments, settle the state.
    pub fn resolve(&mut self, loc: Loc, lookup: &mut dyn Lookup) -> Result<ExprOutcome> {
        if let Some(interface) = &mut self.interface_symbol {
            interface.resolve(lookup)?;
        }

        if self.fragments.is_empty() {
            // A declaration without a value; typed through its interface.
            let underlying_type = self
                .interface_symbol
                .as_ref()
                .and_then(|s| s.underlying_type.clone());
            return Ok(ExprOutcome {
                literal: None,
                underlying_type,
                underlying_value: None,
                role: Role::VALUE,
            });
        }

        for fragment in &mut self.fragments {
            if let Fragment::Symbol { symbol, args, .. } = fragment {
                symbol.resolve(lookup)?;
                args.resolve(lookup)?;
            }
        }

        if self.fragments.len() == 1 {
            return self.resolve_single(loc, lookup);
        }
        self.resolve_folded(loc, lookup)
    }

    /// A single fragment settles directly into one of the three states.
    fn resolve_single(&mut self, loc: Loc, lookup: &mut dyn Lookup) -> Result<ExprOutcome> {
        let fragment = self.fragments[0].clone();
        match fragment {
            Fragment::Value { literal, .. } => {
                let underlying_type = Some(literal_type_fqn(&literal));
                self.state = ExprState::Literal(literal.clone());
                Ok(ExprOutcome {
                    literal: Some(literal),
                    underlying_type,
                    underlying_value: None,
                    role: Role::VALUE,
                })
            }
            Fragment::Operator { op, loc } => Err(Error::contract_violation(
                loc,
                format!("dangling operator '{op}'"),
            )),
            Fragment::Symbol {
                symbol,
                args,
                has_call,
            } => {
                if symbol.role.contains(Role::VALUE) {
                    if has_call {
                        return Err(Error::contract_violation(
                            loc,
                            format!("'{}' is a value and cannot take arguments", symbol.name),
                        ));
                    }
                    self.settle_lvalue(symbol, loc, lookup)
                } else if symbol.role.intersects(Role::TYPE | Role::META) {
                    self.settle_rvalue(symbol, args, loc, lookup)
                } else {
                    Err(Error::contract_violation(
                        loc,
                        format!("'{}' cannot be used as a value", symbol.name),
                    ))
                }
            }
        }
    }

    fn settle_lvalue(
        &mut self,
        symbol: Symbol,
        loc: Loc,
        lookup: &mut dyn Lookup,
    ) -> Result<ExprOutcome> {
        let fqn = symbol.fqn().cloned().ok_or_else(|| Error::UnresolvedSymbol {
            name: symbol.name.clone(),
            loc,
            suggestions: Vec::new(),
        })?;
        let target = lookup.entity(&fqn, loc)?;
        let outcome = ExprOutcome {
            literal: target.literal.clone(),
            underlying_type: target.underlying_type.clone(),
            underlying_value: Some(target.underlying_value.clone().unwrap_or(fqn)),
            role: Role::VALUE,
        };
        self.state = ExprState::LValue { symbol };
        Ok(outcome)
    }

    fn settle_rvalue(
        &mut self,
        symbol: Symbol,
        args: Parameters,
        loc: Loc,
        lookup: &mut dyn Lookup,
    ) -> Result<ExprOutcome> {
        let fqn = symbol.fqn().cloned().ok_or_else(|| Error::UnresolvedSymbol {
            name: symbol.name.clone(),
            loc,
            suggestions: Vec::new(),
        })?;
        let target = lookup.entity(&fqn, loc)?;
        let target_category = target.category();
        let expected = lookup.config_expectations(&fqn, loc)?;
        let bound = args.bind(&expected, target_category, loc, lookup)?;

        let literal = target.fold_literal(&bound, loc)?;
        let role = if symbol.role.contains(Role::META) {
            Role::META
        } else {
            Role::VALUE
        };
        let outcome = ExprOutcome {
            literal,
            underlying_type: symbol.underlying_type.clone(),
            underlying_value: None,
            role,
        };
        self.state = ExprState::RValue { symbol, args: bound };
        Ok(outcome)
    }

    /// Multiple fragments must fold into a single literal.
    fn resolve_folded(&mut self, loc: Loc, lookup: &mut dyn Lookup) -> Result<ExprOutcome> {
        let mut tokens: Vec<Token> = Vec::with_capacity(self.fragments.len());
        for fragment in &self.fragments {
            match fragment {
                Fragment::Value { literal, loc } => tokens.push(Token::Lit(literal.clone(), *loc)),
                Fragment::Operator { op, loc } => tokens.push(Token::Op(op.clone(), *loc)),
                Fragment::Symbol { symbol, .. } => {
                    let fqn = symbol.fqn().cloned().ok_or_else(|| Error::UnresolvedSymbol {
                        name: symbol.name.clone(),
                        loc,
                        suggestions: Vec::new(),
                    })?;
                    let target = lookup.entity(&fqn, loc)?;
                    let literal = target.literal.clone().ok_or_else(|| {
                        Error::contract_violation(
                            loc,
                            format!("'{}' has no compile-time value to fold", symbol.name),
                        )
                    })?;
                    tokens.push(Token::Lit(literal, symbol.loc));
                }
            }
        }
        let literal = fold_tokens(tokens, loc)?;
        let underlying_type = Some(literal_type_fqn(&literal));
        self.state = ExprState::Literal(literal.clone());
        Ok(ExprOutcome {
            literal: Some(literal),
            underlying_type,
            underlying_value: None,
            role: Role::VALUE,
        })
    }

    /// Forget resolution results so the expression can resolve again under a
    /// different context (nested composition bodies re-resolve with `this`
    /// bound to each instance).
    pub(crate) fn reset_resolution(&mut self) {
        self.state = ExprState::Unresolved;
        if let Some(interface) = &mut self.interface_symbol {
            interface.reset_resolution();
        }
        for fragment in &mut self.fragments {
            if let Fragment::Symbol { symbol, args, .. } = fragment {
                symbol.reset_resolution();
                for arg in args.iter_mut() {
                    arg.reset_resolution();
                }
            }
        }
    }

    /// FQNs this expression pulls into a dependency set.
    pub fn dependencies(&self) -> Vec<Fqn> {
        let mut deps = Vec::new();
        if let Some(interface) = &self.interface_symbol {
            deps.extend(interface.dependencies());
        }
        match &self.state {
            ExprState::LValue { symbol } => deps.extend(symbol.dependencies()),
            ExprState::RValue { symbol, args } => {
                deps.extend(symbol.dependencies());
                deps.extend(args.dependencies());
            }
            _ => {}
        }
        deps
    }
}

#[derive(Clone, Debug)]
enum Token {
    Lit(Literal, Loc),
    Op(SmolStr, Loc),
}

/// Fold a token sequence: unary `+`/`-` first, then `*`/`/`, then `+`/`-`,
/// each level left to right.
fn fold_tokens(tokens: Vec<Token>, loc: Loc) -> Result<Literal> {
    // Unary pass: an operator at the start or after another operator.
    let mut unary_folded: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut pending_unary: Option<(SmolStr, Loc)> = None;
    for token in tokens {
        match token {
            Token::Op(op, op_loc) => {
                let follows_operand = matches!(unary_folded.last(), Some(Token::Lit(..)));
                if follows_operand {
                    unary_folded.push(Token::Op(op, op_loc));
                } else if pending_unary.is_none() && (op == "-" || op == "+") {
                    pending_unary = Some((op, op_loc));
                } else {
                    return Err(Error::contract_violation(
                        op_loc,
                        format!("misplaced operator '{op}'"),
                    ));
                }
            }
            Token::Lit(lit, lit_loc) => {
                let lit = match pending_unary.take() {
                    Some((op, op_loc)) => Literal::apply_unary(&op, &lit).ok_or_else(|| {
                        Error::contract_violation(
                            op_loc,
                            format!("cannot apply unary '{op}' to {lit}"),
                        )
                    })?,
                    None => lit,
                };
                unary_folded.push(Token::Lit(lit, lit_loc));
            }
        }
    }
    if pending_unary.is_some() {
        return Err(Error::contract_violation(loc, "expression ends in an operator"));
    }

    let reduce = |tokens: Vec<Token>, ops: &[&str]| -> Result<Vec<Token>> {
        let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
        let mut iter = tokens.into_iter();
        while let Some(token) = iter.next() {
            match token {
                Token::Op(op, op_loc) if ops.contains(&op.as_str()) => {
                    let lhs = match out.pop() {
                        Some(Token::Lit(lit, _)) => lit,
                        _ => {
                            return Err(Error::contract_violation(
                                op_loc,
                                format!("operator '{op}' lacks a left operand"),
                            ));
                        }
                    };
                    let rhs = match iter.next() {
                        Some(Token::Lit(lit, _)) => lit,
                        _ => {
                            return Err(Error::contract_violation(
                                op_loc,
                                format!("operator '{op}' lacks a right operand"),
                            ));
                        }
                    };
                    let folded = Literal::apply_binary(&op, &lhs, &rhs).ok_or_else(|| {
                        Error::contract_violation(
                            op_loc,
                            format!("cannot apply '{op}' to {lhs} and {rhs}"),
                        )
                    })?;
                    out.push(Token::Lit(folded, op_loc));
                }
                other => out.push(other),
            }
        }
        Ok(out)
    };

    let tokens = reduce(unary_folded, &["*", "/"])?;
    let mut tokens = reduce(tokens, &["+", "-"])?;
    match (tokens.pop(), tokens.pop()) {
        (Some(Token::Lit(lit, _)), None) => Ok(lit),
        _ => Err(Error::contract_violation(loc, "malformed expression")),
    }
}

/// Builtin type FQN describing a literal.
pub fn literal_type_fqn(literal: &Literal) -> Fqn {
    Fqn::new(match literal {
        Literal::Integer(_) => "Integer",
        Literal::Float(_) => "Float",
        Literal::Boolean(_) => "Boolean",
        Literal::String(_) => "String",
    })
}
