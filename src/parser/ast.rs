use std::collections::BTreeSet;
use std::rc::Rc;

/// Name given to the identifier the tolerant parser inserts where an operand
/// or name is missing.
pub const PLACEHOLDER_NAME: &str = "✖";

/// Names declared directly in a scope-introducing node.
pub type Locals = BTreeSet<String>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Meta {
    pub start_index: usize,
    pub end_index: usize,
}

impl Meta {
    pub fn new(start_index: usize, end_index: usize) -> Self {
        Meta {
            start_index,
            end_index,
        }
    }
}

pub trait HasMeta {
    fn get_meta(&self) -> &Meta;
}

#[derive(Debug, Clone)]
pub struct IdentifierData {
    pub name: String,
    pub meta: Meta,
}

impl IdentifierData {
    pub fn is_placeholder(&self) -> bool {
        self.name == PLACEHOLDER_NAME
    }
}

impl HasMeta for IdentifierData {
    fn get_meta(&self) -> &Meta {
        &self.meta
    }
}

#[derive(Debug, Clone)]
pub enum ExpressionPatternType {
    Identifier(IdentifierData),
    MemberExpression(MemberExpressionType),
}

impl HasMeta for ExpressionPatternType {
    fn get_meta(&self) -> &Meta {
        match self {
            ExpressionPatternType::Identifier(d) => &d.meta,
            ExpressionPatternType::MemberExpression(m) => m.get_meta(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExpressionType {
    Identifier(IdentifierData),
    Literal(LiteralData),
    TemplateLiteral(TemplateLiteralData),
    ThisExpression {
        meta: Meta,
    },
    ArrayExpression {
        meta: Meta,
        elements: Vec<Option<ExpressionOrSpreadElement>>,
    },
    ObjectExpression {
        meta: Meta,
        properties: Vec<ObjectProperty>,
    },
    FunctionExpression(Rc<FunctionData>),
    ArrowFunctionExpression(Rc<FunctionData>),
    ClassExpression(Rc<ClassData>),
    UnaryExpression {
        meta: Meta,
        operator: UnaryOperator,
        argument: Box<ExpressionType>,
    },
    UpdateExpression {
        meta: Meta,
        operator: UpdateOperator,
        argument: Box<ExpressionType>,
        prefix: bool,
    },
    BinaryExpression {
        meta: Meta,
        operator: BinaryOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    LogicalExpression {
        meta: Meta,
        operator: LogicalOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    AssignmentExpression {
        meta: Meta,
        operator: AssignmentOperator,
        left: Box<PatternType>,
        right: Box<ExpressionType>,
    },
    ConditionalExpression {
        meta: Meta,
        test: Box<ExpressionType>,
        consequent: Box<ExpressionType>,
        alternate: Box<ExpressionType>,
    },
    SequenceExpression {
        meta: Meta,
        expressions: Vec<ExpressionType>,
    },
    CallExpression {
        meta: Meta,
        callee: ExpressionOrSuper,
        arguments: Vec<ExpressionOrSpreadElement>,
        optional: bool,
    },
    NewExpression {
        meta: Meta,
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionOrSpreadElement>,
    },
    MemberExpression(MemberExpressionType),
    AwaitExpression {
        meta: Meta,
        argument: Box<ExpressionType>,
    },
}

impl HasMeta for ExpressionType {
    fn get_meta(&self) -> &Meta {
        match self {
            ExpressionType::Identifier(d) => &d.meta,
            ExpressionType::Literal(d) => &d.meta,
            ExpressionType::TemplateLiteral(d) => &d.meta,
            ExpressionType::FunctionExpression(f) | ExpressionType::ArrowFunctionExpression(f) => {
                &f.meta
            }
            ExpressionType::ClassExpression(c) => &c.meta,
            ExpressionType::MemberExpression(m) => m.get_meta(),
            ExpressionType::ThisExpression { meta }
            | ExpressionType::ArrayExpression { meta, .. }
            | ExpressionType::ObjectExpression { meta, .. }
            | ExpressionType::UnaryExpression { meta, .. }
            | ExpressionType::UpdateExpression { meta, .. }
            | ExpressionType::BinaryExpression { meta, .. }
            | ExpressionType::LogicalExpression { meta, .. }
            | ExpressionType::AssignmentExpression { meta, .. }
            | ExpressionType::ConditionalExpression { meta, .. }
            | ExpressionType::SequenceExpression { meta, .. }
            | ExpressionType::CallExpression { meta, .. }
            | ExpressionType::NewExpression { meta, .. }
            | ExpressionType::AwaitExpression { meta, .. } => meta,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PatternType {
    PatternWhichCanBeExpression(ExpressionPatternType),
    ObjectPattern {
        meta: Meta,
        properties: Vec<ObjectPatternProperty>,
    },
    ArrayPattern {
        meta: Meta,
        elements: Vec<Option<Box<PatternType>>>,
    },
    RestElement {
        meta: Meta,
        argument: Box<PatternType>,
    },
    AssignmentPattern {
        meta: Meta,
        left: Box<PatternType>,
        right: Box<ExpressionType>,
    },
}

impl PatternType {
    pub fn identifier(id: IdentifierData) -> Self {
        PatternType::PatternWhichCanBeExpression(ExpressionPatternType::Identifier(id))
    }
}

impl HasMeta for PatternType {
    fn get_meta(&self) -> &Meta {
        match self {
            PatternType::PatternWhichCanBeExpression(e) => e.get_meta(),
            PatternType::ObjectPattern { meta, .. }
            | PatternType::ArrayPattern { meta, .. }
            | PatternType::RestElement { meta, .. }
            | PatternType::AssignmentPattern { meta, .. } => meta,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ObjectPatternProperty {
    Property {
        meta: Meta,
        key: PropertyKey,
        value: Box<PatternType>,
        shorthand: bool,
    },
    Rest(Box<PatternType>),
}

#[derive(Debug, Clone)]
pub struct TemplateLiteralData {
    pub meta: Meta,
    pub quasis: Vec<TemplateElementData>,
    pub expressions: Vec<ExpressionType>,
}

#[derive(Debug, Clone)]
pub struct TemplateElementData {
    pub meta: Meta,
    pub cooked: String,
}

#[derive(Debug, Clone)]
pub enum ExpressionOrSuper {
    Expression(Box<ExpressionType>),
    Super(Meta),
}

impl HasMeta for ExpressionOrSuper {
    fn get_meta(&self) -> &Meta {
        match self {
            ExpressionOrSuper::Expression(e) => e.get_meta(),
            ExpressionOrSuper::Super(meta) => meta,
        }
    }
}

#[derive(Debug, Clone)]
pub enum MemberExpressionType {
    SimpleMemberExpression {
        meta: Meta,
        object: ExpressionOrSuper,
        property: IdentifierData,
        optional: bool,
    },
    ComputedMemberExpression {
        meta: Meta,
        object: ExpressionOrSuper,
        property: Box<ExpressionType>,
        optional: bool,
    },
}

impl MemberExpressionType {
    pub fn object(&self) -> &ExpressionOrSuper {
        match self {
            MemberExpressionType::SimpleMemberExpression { object, .. }
            | MemberExpressionType::ComputedMemberExpression { object, .. } => object,
        }
    }
}

impl HasMeta for MemberExpressionType {
    fn get_meta(&self) -> &Meta {
        match self {
            MemberExpressionType::SimpleMemberExpression { meta, .. }
            | MemberExpressionType::ComputedMemberExpression { meta, .. } => meta,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExpressionOrSpreadElement {
    Expression(Box<ExpressionType>),
    SpreadElement(Box<ExpressionType>),
}

impl ExpressionOrSpreadElement {
    pub fn expression(&self) -> &ExpressionType {
        match self {
            ExpressionOrSpreadElement::Expression(e)
            | ExpressionOrSpreadElement::SpreadElement(e) => e,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssignmentOperator {
    Equals,
    AddEquals,
    SubtractEquals,
    MultiplyEquals,
    DivideEquals,
    ModuloEquals,
    ExponentEquals,
    BitwiseLeftShiftEquals,
    BitwiseRightShiftEquals,
    BitwiseUnsignedRightShiftEquals,
    BitwiseOrEquals,
    BitwiseAndEquals,
    BitwiseXorEquals,
    LogicalAndEquals,
    LogicalOrEquals,
    NullishEquals,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    LogicalNot,
    BitwiseNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOperator {
    PlusPlus,
    MinusMinus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    LooselyEqual,
    LooselyUnequal,
    StrictlyEqual,
    StrictlyUnequal,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    BitwiseLeftShift,
    BitwiseRightShift,
    BitwiseUnsignedRightShift,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Exponent,
    BitwiseOr,
    BitwiseAnd,
    BitwiseXor,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicalOperator {
    Or,
    And,
    NullishCoalescing,
}

#[derive(Debug, Clone)]
pub struct LiteralData {
    pub meta: Meta,
    pub value: LiteralType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralType {
    NullLiteral,
    BooleanLiteral(bool),
    StringLiteral(String),
    NumberLiteral(NumberLiteralType),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumberLiteralType {
    IntegerLiteral(i64),
    FloatLiteral(f64),
}

impl NumberLiteralType {
    pub fn from_f64(n: f64) -> Self {
        if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
            NumberLiteralType::IntegerLiteral(n as i64)
        } else {
            NumberLiteralType::FloatLiteral(n)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgramData {
    pub meta: Meta,
    pub body: Vec<StatementType>,
    pub locals: Locals,
}

#[derive(Debug, Clone)]
pub struct BlockStatementData {
    pub meta: Meta,
    pub body: Vec<StatementType>,
    pub locals: Locals,
}

#[derive(Debug, Clone)]
pub enum StatementType {
    ExpressionStatement {
        meta: Meta,
        expression: Box<ExpressionType>,
    },
    BlockStatement(BlockStatementData),
    EmptyStatement {
        meta: Meta,
    },
    DebuggerStatement {
        meta: Meta,
    },
    ReturnStatement {
        meta: Meta,
        argument: Option<Box<ExpressionType>>,
    },
    BreakStatement {
        meta: Meta,
    },
    ContinueStatement {
        meta: Meta,
    },
    IfStatement {
        meta: Meta,
        test: Box<ExpressionType>,
        consequent: Box<StatementType>,
        alternate: Option<Box<StatementType>>,
    },
    SwitchStatement {
        meta: Meta,
        discriminant: Box<ExpressionType>,
        cases: Vec<SwitchCaseData>,
    },
    ThrowStatement {
        meta: Meta,
        argument: Box<ExpressionType>,
    },
    TryStatement {
        meta: Meta,
        block: BlockStatementData,
        handler: Option<CatchClauseData>,
        finalizer: Option<BlockStatementData>,
    },
    WhileStatement {
        meta: Meta,
        test: Box<ExpressionType>,
        body: Box<StatementType>,
    },
    DoWhileStatement {
        meta: Meta,
        body: Box<StatementType>,
        test: Box<ExpressionType>,
    },
    ForStatement {
        meta: Meta,
        init: Option<VariableDeclarationOrExpression>,
        test: Option<Box<ExpressionType>>,
        update: Option<Box<ExpressionType>>,
        body: Box<StatementType>,
    },
    ForInStatement(ForIteratorData),
    ForOfStatement(ForIteratorData),
    Declaration(DeclarationType),
}

impl HasMeta for StatementType {
    fn get_meta(&self) -> &Meta {
        match self {
            StatementType::BlockStatement(b) => &b.meta,
            StatementType::ForInStatement(f) | StatementType::ForOfStatement(f) => &f.meta,
            StatementType::Declaration(d) => d.get_meta(),
            StatementType::ExpressionStatement { meta, .. }
            | StatementType::EmptyStatement { meta }
            | StatementType::DebuggerStatement { meta }
            | StatementType::ReturnStatement { meta, .. }
            | StatementType::BreakStatement { meta }
            | StatementType::ContinueStatement { meta }
            | StatementType::IfStatement { meta, .. }
            | StatementType::SwitchStatement { meta, .. }
            | StatementType::ThrowStatement { meta, .. }
            | StatementType::TryStatement { meta, .. }
            | StatementType::WhileStatement { meta, .. }
            | StatementType::DoWhileStatement { meta, .. }
            | StatementType::ForStatement { meta, .. } => meta,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionBodyData {
    pub meta: Meta,
    pub body: Vec<StatementType>,
}

#[derive(Debug, Clone)]
pub enum FunctionBodyOrExpression {
    FunctionBody(FunctionBodyData),
    Expression(Box<ExpressionType>),
}

#[derive(Debug, Clone)]
pub struct ForIteratorData {
    pub meta: Meta,
    pub left: VariableDeclarationOrPattern,
    pub right: Box<ExpressionType>,
    pub body: Box<StatementType>,
}

#[derive(Debug, Clone)]
pub enum VariableDeclarationOrExpression {
    VariableDeclaration(VariableDeclarationData),
    Expression(Box<ExpressionType>),
}

#[derive(Debug, Clone)]
pub enum VariableDeclarationOrPattern {
    VariableDeclaration(VariableDeclarationData),
    Pattern(Box<PatternType>),
}

#[derive(Debug, Clone)]
pub enum DeclarationType {
    VariableDeclaration(VariableDeclarationData),
    FunctionDeclaration(Rc<FunctionData>),
    ClassDeclaration(Rc<ClassData>),
    ImportDeclaration(ImportDeclarationData),
}

impl HasMeta for DeclarationType {
    fn get_meta(&self) -> &Meta {
        match self {
            DeclarationType::VariableDeclaration(v) => &v.meta,
            DeclarationType::FunctionDeclaration(f) => &f.meta,
            DeclarationType::ClassDeclaration(c) => &c.meta,
            DeclarationType::ImportDeclaration(i) => &i.meta,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableDeclarationData {
    pub meta: Meta,
    pub declarations: Vec<VariableDeclaratorData>,
    pub kind: VariableDeclarationKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableDeclarationKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone)]
pub struct VariableDeclaratorData {
    pub meta: Meta,
    pub id: Box<PatternType>,
    pub init: Option<Box<ExpressionType>>,
}

#[derive(Debug, Clone)]
pub struct ImportDeclarationData {
    pub meta: Meta,
    pub specifiers: Vec<ImportSpecifierData>,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct ImportSpecifierData {
    pub meta: Meta,
    pub local: IdentifierData,
    pub kind: ImportSpecifierKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpecifierKind {
    Default,
    Namespace,
    Named { imported: String },
}

#[derive(Debug, Clone)]
pub struct SwitchCaseData {
    pub meta: Meta,
    pub test: Option<Box<ExpressionType>>,
    pub consequent: Vec<StatementType>,
}

#[derive(Debug, Clone)]
pub struct FunctionData {
    pub meta: Meta,
    pub id: Option<IdentifierData>,
    pub params: Vec<PatternType>,
    pub body: FunctionBodyOrExpression,
    pub is_async: bool,
    pub is_arrow: bool,
    pub locals: Locals,
}

#[derive(Debug, Clone)]
pub struct CatchClauseData {
    pub meta: Meta,
    pub param: Option<Box<PatternType>>,
    pub body: BlockStatementData,
}

#[derive(Debug, Clone)]
pub enum PropertyKey {
    /// Identifier, string or numeric key, already normalised to its string form.
    Named { name: String, meta: Meta },
    Computed(Box<ExpressionType>),
}

#[derive(Debug, Clone)]
pub enum ObjectProperty {
    Property(PropertyData),
    Spread(Box<ExpressionType>),
}

#[derive(Debug, Clone)]
pub struct PropertyData {
    pub meta: Meta,
    pub key: PropertyKey,
    pub value: Box<ExpressionType>,
    pub kind: PropertyKind,
    pub shorthand: bool,
    pub method: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyKind {
    Init,
    Get,
    Set,
}

#[derive(Debug, Clone)]
pub struct ClassData {
    pub meta: Meta,
    pub id: Option<IdentifierData>,
    pub super_class: Option<Box<ExpressionType>>,
    pub body: Vec<ClassMember>,
    pub locals: Locals,
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Method(MethodDefinitionData),
    Field(FieldDefinitionData),
}

#[derive(Debug, Clone)]
pub struct MethodDefinitionData {
    pub meta: Meta,
    pub key: PropertyKey,
    pub kind: MethodDefinitionKind,
    pub is_static: bool,
    pub value: Rc<FunctionData>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MethodDefinitionKind {
    Constructor,
    Method,
    Get,
    Set,
}

#[derive(Debug, Clone)]
pub struct FieldDefinitionData {
    pub meta: Meta,
    pub key: PropertyKey,
    pub is_static: bool,
    pub value: Option<Box<ExpressionType>>,
}
