//! Borrowed, uniformly typed references to syntax tree nodes.

use std::mem;

use crate::parser::ast::*;

/// A reference to any node of a parsed program.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Program(&'a ProgramData),
    Statement(&'a StatementType),
    Expression(&'a ExpressionType),
    Pattern(&'a PatternType),
    Function(&'a FunctionData),
    Class(&'a ClassData),
    Block(&'a BlockStatementData),
    SwitchCase(&'a SwitchCaseData),
    CatchClause(&'a CatchClauseData),
    VariableDeclaration(&'a VariableDeclarationData),
    Declarator(&'a VariableDeclaratorData),
}

impl<'a> NodeRef<'a> {
    pub fn meta(&self) -> Meta {
        match self {
            NodeRef::Program(n) => n.meta,
            NodeRef::Statement(n) => *n.get_meta(),
            NodeRef::Expression(n) => *n.get_meta(),
            NodeRef::Pattern(n) => *n.get_meta(),
            NodeRef::Function(n) => n.meta,
            NodeRef::Class(n) => n.meta,
            NodeRef::Block(n) => n.meta,
            NodeRef::SwitchCase(n) => n.meta,
            NodeRef::CatchClause(n) => n.meta,
            NodeRef::VariableDeclaration(n) => n.meta,
            NodeRef::Declarator(n) => n.meta,
        }
    }

    /// The names this node declares locally, if it introduces a scope.
    pub fn locals(&self) -> Option<&'a Locals> {
        match *self {
            NodeRef::Program(n) => Some(&n.locals),
            NodeRef::Statement(StatementType::BlockStatement(b)) | NodeRef::Block(b) => {
                Some(&b.locals)
            }
            NodeRef::Function(f) => Some(&f.locals),
            NodeRef::Class(c) => Some(&c.locals),
            _ => None,
        }
    }

    fn address(&self) -> *const () {
        match *self {
            NodeRef::Program(n) => n as *const ProgramData as *const (),
            NodeRef::Statement(n) => n as *const StatementType as *const (),
            NodeRef::Expression(n) => n as *const ExpressionType as *const (),
            NodeRef::Pattern(n) => n as *const PatternType as *const (),
            NodeRef::Function(n) => n as *const FunctionData as *const (),
            NodeRef::Class(n) => n as *const ClassData as *const (),
            NodeRef::Block(n) => n as *const BlockStatementData as *const (),
            NodeRef::SwitchCase(n) => n as *const SwitchCaseData as *const (),
            NodeRef::CatchClause(n) => n as *const CatchClauseData as *const (),
            NodeRef::VariableDeclaration(n) => n as *const VariableDeclarationData as *const (),
            NodeRef::Declarator(n) => n as *const VariableDeclaratorData as *const (),
        }
    }

    /// Node identity: same kind at the same address.
    pub fn same_node(&self, other: &NodeRef<'_>) -> bool {
        mem::discriminant(self) == mem::discriminant(other) && self.address() == other.address()
    }

    pub fn children(&self) -> Vec<NodeRef<'a>> {
        let mut out = vec![];
        match *self {
            NodeRef::Program(p) => out.extend(p.body.iter().map(NodeRef::Statement)),
            NodeRef::Statement(s) => statement_children(s, &mut out),
            NodeRef::Expression(e) => expression_children(e, &mut out),
            NodeRef::Pattern(p) => pattern_children(p, &mut out),
            NodeRef::Function(f) => {
                out.extend(f.params.iter().map(NodeRef::Pattern));
                match &f.body {
                    FunctionBodyOrExpression::FunctionBody(b) => {
                        out.extend(b.body.iter().map(NodeRef::Statement))
                    }
                    FunctionBodyOrExpression::Expression(e) => out.push(NodeRef::Expression(e)),
                }
            }
            NodeRef::Class(c) => {
                if let Some(s) = &c.super_class {
                    out.push(NodeRef::Expression(s));
                }
                for member in &c.body {
                    match member {
                        ClassMember::Method(m) => {
                            key_children(&m.key, &mut out);
                            out.push(NodeRef::Function(&m.value));
                        }
                        ClassMember::Field(f) => {
                            key_children(&f.key, &mut out);
                            if let Some(v) = &f.value {
                                out.push(NodeRef::Expression(v));
                            }
                        }
                    }
                }
            }
            NodeRef::Block(b) => out.extend(b.body.iter().map(NodeRef::Statement)),
            NodeRef::SwitchCase(c) => {
                if let Some(t) = &c.test {
                    out.push(NodeRef::Expression(t));
                }
                out.extend(c.consequent.iter().map(NodeRef::Statement));
            }
            NodeRef::CatchClause(c) => {
                if let Some(p) = &c.param {
                    out.push(NodeRef::Pattern(p));
                }
                out.push(NodeRef::Block(&c.body));
            }
            NodeRef::VariableDeclaration(v) => {
                out.extend(v.declarations.iter().map(NodeRef::Declarator))
            }
            NodeRef::Declarator(d) => {
                out.push(NodeRef::Pattern(&d.id));
                if let Some(init) = &d.init {
                    out.push(NodeRef::Expression(init));
                }
            }
        }
        out
    }
}

fn key_children<'a>(key: &'a PropertyKey, out: &mut Vec<NodeRef<'a>>) {
    if let PropertyKey::Computed(e) = key {
        out.push(NodeRef::Expression(e));
    }
}

fn statement_children<'a>(s: &'a StatementType, out: &mut Vec<NodeRef<'a>>) {
    match s {
        StatementType::ExpressionStatement { expression, .. } => {
            out.push(NodeRef::Expression(expression))
        }
        StatementType::BlockStatement(b) => out.extend(b.body.iter().map(NodeRef::Statement)),
        StatementType::EmptyStatement { .. }
        | StatementType::DebuggerStatement { .. }
        | StatementType::BreakStatement { .. }
        | StatementType::ContinueStatement { .. } => {}
        StatementType::ReturnStatement { argument, .. } => {
            if let Some(a) = argument {
                out.push(NodeRef::Expression(a));
            }
        }
        StatementType::IfStatement {
            test,
            consequent,
            alternate,
            ..
        } => {
            out.push(NodeRef::Expression(test));
            out.push(NodeRef::Statement(consequent));
            if let Some(a) = alternate {
                out.push(NodeRef::Statement(a));
            }
        }
        StatementType::SwitchStatement {
            discriminant,
            cases,
            ..
        } => {
            out.push(NodeRef::Expression(discriminant));
            out.extend(cases.iter().map(NodeRef::SwitchCase));
        }
        StatementType::ThrowStatement { argument, .. } => out.push(NodeRef::Expression(argument)),
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => {
            out.push(NodeRef::Block(block));
            if let Some(h) = handler {
                out.push(NodeRef::CatchClause(h));
            }
            if let Some(f) = finalizer {
                out.push(NodeRef::Block(f));
            }
        }
        StatementType::WhileStatement { test, body, .. } => {
            out.push(NodeRef::Expression(test));
            out.push(NodeRef::Statement(body));
        }
        StatementType::DoWhileStatement { body, test, .. } => {
            out.push(NodeRef::Statement(body));
            out.push(NodeRef::Expression(test));
        }
        StatementType::ForStatement {
            init,
            test,
            update,
            body,
            ..
        } => {
            match init {
                Some(VariableDeclarationOrExpression::VariableDeclaration(v)) => {
                    out.push(NodeRef::VariableDeclaration(v))
                }
                Some(VariableDeclarationOrExpression::Expression(e)) => {
                    out.push(NodeRef::Expression(e))
                }
                None => {}
            }
            if let Some(t) = test {
                out.push(NodeRef::Expression(t));
            }
            if let Some(u) = update {
                out.push(NodeRef::Expression(u));
            }
            out.push(NodeRef::Statement(body));
        }
        StatementType::ForInStatement(f) | StatementType::ForOfStatement(f) => {
            match &f.left {
                VariableDeclarationOrPattern::VariableDeclaration(v) => {
                    out.push(NodeRef::VariableDeclaration(v))
                }
                VariableDeclarationOrPattern::Pattern(p) => out.push(NodeRef::Pattern(p)),
            }
            out.push(NodeRef::Expression(&f.right));
            out.push(NodeRef::Statement(&f.body));
        }
        StatementType::Declaration(d) => match d {
            DeclarationType::VariableDeclaration(v) => out.push(NodeRef::VariableDeclaration(v)),
            DeclarationType::FunctionDeclaration(f) => out.push(NodeRef::Function(f)),
            DeclarationType::ClassDeclaration(c) => out.push(NodeRef::Class(c)),
            DeclarationType::ImportDeclaration(_) => {}
        },
    }
}

fn expression_children<'a>(e: &'a ExpressionType, out: &mut Vec<NodeRef<'a>>) {
    match e {
        ExpressionType::Identifier(_)
        | ExpressionType::Literal(_)
        | ExpressionType::ThisExpression { .. } => {}
        ExpressionType::TemplateLiteral(t) => {
            out.extend(t.expressions.iter().map(NodeRef::Expression))
        }
        ExpressionType::ArrayExpression { elements, .. } => {
            for element in elements.iter().flatten() {
                out.push(NodeRef::Expression(element.expression()));
            }
        }
        ExpressionType::ObjectExpression { properties, .. } => {
            for p in properties {
                match p {
                    ObjectProperty::Property(d) => {
                        key_children(&d.key, out);
                        out.push(NodeRef::Expression(&d.value));
                    }
                    ObjectProperty::Spread(e) => out.push(NodeRef::Expression(e)),
                }
            }
        }
        ExpressionType::FunctionExpression(f) | ExpressionType::ArrowFunctionExpression(f) => {
            out.push(NodeRef::Function(f))
        }
        ExpressionType::ClassExpression(c) => out.push(NodeRef::Class(c)),
        ExpressionType::UnaryExpression { argument, .. }
        | ExpressionType::UpdateExpression { argument, .. }
        | ExpressionType::AwaitExpression { argument, .. } => {
            out.push(NodeRef::Expression(argument))
        }
        ExpressionType::BinaryExpression { left, right, .. }
        | ExpressionType::LogicalExpression { left, right, .. } => {
            out.push(NodeRef::Expression(left));
            out.push(NodeRef::Expression(right));
        }
        ExpressionType::AssignmentExpression { left, right, .. } => {
            out.push(NodeRef::Pattern(left));
            out.push(NodeRef::Expression(right));
        }
        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
            ..
        } => {
            out.push(NodeRef::Expression(test));
            out.push(NodeRef::Expression(consequent));
            out.push(NodeRef::Expression(alternate));
        }
        ExpressionType::SequenceExpression { expressions, .. } => {
            out.extend(expressions.iter().map(NodeRef::Expression))
        }
        ExpressionType::CallExpression {
            callee, arguments, ..
        } => {
            if let ExpressionOrSuper::Expression(c) = callee {
                out.push(NodeRef::Expression(c));
            }
            out.extend(arguments.iter().map(|a| NodeRef::Expression(a.expression())));
        }
        ExpressionType::NewExpression {
            callee, arguments, ..
        } => {
            out.push(NodeRef::Expression(callee));
            out.extend(arguments.iter().map(|a| NodeRef::Expression(a.expression())));
        }
        ExpressionType::MemberExpression(m) => {
            if let ExpressionOrSuper::Expression(o) = m.object() {
                out.push(NodeRef::Expression(o));
            }
            if let MemberExpressionType::ComputedMemberExpression { property, .. } = m {
                out.push(NodeRef::Expression(property));
            }
        }
    }
}

fn pattern_children<'a>(p: &'a PatternType, out: &mut Vec<NodeRef<'a>>) {
    match p {
        PatternType::PatternWhichCanBeExpression(ExpressionPatternType::Identifier(_)) => {}
        PatternType::PatternWhichCanBeExpression(ExpressionPatternType::MemberExpression(m)) => {
            if let ExpressionOrSuper::Expression(o) = m.object() {
                out.push(NodeRef::Expression(o));
            }
            if let MemberExpressionType::ComputedMemberExpression { property, .. } = m {
                out.push(NodeRef::Expression(property));
            }
        }
        PatternType::ObjectPattern { properties, .. } => {
            for property in properties {
                match property {
                    ObjectPatternProperty::Property { key, value, .. } => {
                        key_children(key, out);
                        out.push(NodeRef::Pattern(value));
                    }
                    ObjectPatternProperty::Rest(r) => out.push(NodeRef::Pattern(r)),
                }
            }
        }
        PatternType::ArrayPattern { elements, .. } => {
            out.extend(elements.iter().flatten().map(|e| NodeRef::Pattern(e)))
        }
        PatternType::RestElement { argument, .. } => out.push(NodeRef::Pattern(argument)),
        PatternType::AssignmentPattern { left, right, .. } => {
            out.push(NodeRef::Pattern(left));
            out.push(NodeRef::Expression(right));
        }
    }
}

/// Path of nodes from `root` down to `target`, both included.
pub fn path_to<'a>(root: NodeRef<'a>, target: &NodeRef<'_>) -> Option<Vec<NodeRef<'a>>> {
    if root.same_node(target) {
        return Some(vec![root]);
    }
    for child in root.children() {
        if let Some(mut path) = path_to(child, target) {
            path.insert(0, root);
            return Some(path);
        }
    }
    None
}
