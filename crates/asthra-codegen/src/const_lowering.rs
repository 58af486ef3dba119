//! Const lowering and FFI codegen helpers: translates source-level `const`
//! declarations into target-language macro or typed-initializer form, and
//! registers the symbols later stages resolve relocations against.

use crate::elf::{ElfWriter, SectionType, SymbolBinding, SymbolType};

/// A primitive declared type, as seen by the "simple numeric" decision
/// rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Int,
    Float,
    Bool,
}

/// A source-level const initializer literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstLiteral {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// The declared type of a const: either a primitive (candidate for macro
/// form) or anything else (always typed-initializer form).
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredType {
    Primitive(PrimitiveType),
    Other(String),
}

/// Lowered form of a const declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum LoweredConst {
    /// `#define NAME value` — emitted for literals whose declared type
    /// matches a primitive numeric/bool kind and whose initializer is a
    /// literal of that same kind.
    Macro { name: String, value: String },
    /// A typed read-only initializer — emitted for everything else
    /// (strings, structured types, non-literal initializers).
    TypedInitializer { name: String, type_name: String, initializer: String },
}

fn literal_matches_primitive(literal: &ConstLiteral, primitive: PrimitiveType) -> bool {
    matches!(
        (literal, primitive),
        (ConstLiteral::Int(_), PrimitiveType::Int)
            | (ConstLiteral::Float(_), PrimitiveType::Float)
            | (ConstLiteral::Bool(_), PrimitiveType::Bool)
    )
}

/// C-style escaping for string constants: backslash, double-quote, newline,
/// tab, and carriage return are escaped; everything else passes through.
pub fn escape_c_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn literal_to_text(literal: &ConstLiteral) -> String {
    match literal {
        ConstLiteral::Int(v) => v.to_string(),
        ConstLiteral::Float(v) => format!("{v}"),
        ConstLiteral::Bool(v) => v.to_string(),
        ConstLiteral::Str(s) => format!("\"{}\"", escape_c_string(s)),
    }
}

fn type_name(declared: &DeclaredType) -> String {
    match declared {
        DeclaredType::Primitive(PrimitiveType::Int) => "int64_t".to_string(),
        DeclaredType::Primitive(PrimitiveType::Float) => "double".to_string(),
        DeclaredType::Primitive(PrimitiveType::Bool) => "bool".to_string(),
        DeclaredType::Other(name) => name.clone(),
    }
}

/// Lowers one `const` declaration and registers its symbol into `writer`'s
/// symbol table (section `data_section`) so C6/C7 can later resolve
/// references to it.
pub fn lower_const_decl(
    writer: &mut ElfWriter,
    data_section: u16,
    name: &str,
    declared: &DeclaredType,
    initializer: &ConstLiteral,
) -> LoweredConst {
    writer.add_symbol(name, 0, 0, SymbolBinding::Global, SymbolType::Object, data_section);

    let is_simple_numeric = match declared {
        DeclaredType::Primitive(p) => literal_matches_primitive(initializer, *p),
        DeclaredType::Other(_) => false,
    };

    if is_simple_numeric {
        LoweredConst::Macro {
            name: name.to_string(),
            value: literal_to_text(initializer),
        }
    } else {
        LoweredConst::TypedInitializer {
            name: name.to_string(),
            type_name: type_name(declared),
            initializer: literal_to_text(initializer),
        }
    }
}

/// A binary operator in a const-expression initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstBinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ConstBinOp {
    fn as_text(self) -> &'static str {
        match self {
            ConstBinOp::Add => "+",
            ConstBinOp::Sub => "-",
            ConstBinOp::Mul => "*",
            ConstBinOp::Div => "/",
        }
    }
}

/// Lowers a binary-expression initializer to its textual form, e.g.
/// `(a + b)`.
pub fn lower_binary_expr_initializer(op: ConstBinOp, lhs: &str, rhs: &str) -> String {
    format!("({lhs} {} {rhs})", op.as_text())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstUnaryOp {
    Neg,
    Not,
}

impl ConstUnaryOp {
    fn as_text(self) -> &'static str {
        match self {
            ConstUnaryOp::Neg => "-",
            ConstUnaryOp::Not => "!",
        }
    }
}

/// Lowers a unary-expression initializer, e.g. `(-a)`.
pub fn lower_unary_expr_initializer(op: ConstUnaryOp, operand: &str) -> String {
    format!("({}{operand})", op.as_text())
}

/// Lowers a `sizeof(type_name)` expression.
pub fn lower_sizeof_expr(type_name: &str) -> String {
    format!("sizeof({type_name})")
}

/// Lowers a reference to another previously-registered identifier.
pub fn lower_identifier_reference(name: &str) -> String {
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_numeric_int_lowers_to_macro() {
        let mut writer = ElfWriter::new();
        let data = writer.add_section(".data", SectionType::ProgBits, 0x3, 8);
        let lowered = lower_const_decl(
            &mut writer,
            data,
            "MAX_RETRIES",
            &DeclaredType::Primitive(PrimitiveType::Int),
            &ConstLiteral::Int(3),
        );
        assert_eq!(lowered, LoweredConst::Macro { name: "MAX_RETRIES".into(), value: "3".into() });
        assert!(writer.find_symbol_by_name("MAX_RETRIES").is_some());
    }

    #[test]
    fn string_constant_lowers_to_typed_initializer_with_escaping() {
        let mut writer = ElfWriter::new();
        let data = writer.add_section(".data", SectionType::ProgBits, 0x3, 8);
        let lowered = lower_const_decl(
            &mut writer,
            data,
            "GREETING",
            &DeclaredType::Other("str".into()),
            &ConstLiteral::Str("hi\n\"there\"".into()),
        );
        match lowered {
            LoweredConst::TypedInitializer { initializer, .. } => {
                assert_eq!(initializer, "\"hi\\n\\\"there\\\"\"");
            }
            other => panic!("expected typed initializer, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_literal_type_falls_back_to_typed_initializer() {
        let mut writer = ElfWriter::new();
        let data = writer.add_section(".data", SectionType::ProgBits, 0x3, 8);
        let lowered = lower_const_decl(
            &mut writer,
            data,
            "FLAG",
            &DeclaredType::Primitive(PrimitiveType::Bool),
            &ConstLiteral::Int(1),
        );
        assert!(matches!(lowered, LoweredConst::TypedInitializer { .. }));
    }

    #[test]
    fn binary_and_unary_expr_lowering() {
        assert_eq!(lower_binary_expr_initializer(ConstBinOp::Add, "a", "b"), "(a + b)");
        assert_eq!(lower_unary_expr_initializer(ConstUnaryOp::Neg, "a"), "(-a)");
    }

    #[test]
    fn sizeof_lowering() {
        assert_eq!(lower_sizeof_expr("int64_t"), "sizeof(int64_t)");
    }
}
