//! Best-effort reader for C `struct` declarations.
//!
//! This is not a C front end. The text goes through a few independent stages
//! (comment stripping, whitespace normalization, struct extraction, member
//! splitting) and every member that does not look like `type name[...]`,
//! `type name : bits` or a function pointer is dropped instead of reported.
//! A parsed struct can therefore have fewer members than its source text.

use crate::ast::{Field, FieldType, StructTable};
use crate::tokenizer::{
    is_identifier_rest_char, is_identifier_start_char, Token, TokenKind, Tokenizer,
};
use std::num::NonZeroU64;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedSource {
    /// Comment-free source, re-indented for people to read.
    pub display: String,
    pub structs: StructTable,
}

/// One matched declaration. `body` is the text between the braces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructDecl<'a> {
    pub name: &'a str,
    /// The `Tag` of `typedef struct Tag { ... } Name;`.
    pub tag: Option<&'a str>,
    pub body: &'a str,
}

/// Parses every struct declared in `source` into a fresh table.
pub fn parse(source: &str) -> ParsedSource {
    let stripped = strip_comments(source);
    let display = format_for_display(&stripped);
    let normalized = normalize_whitespace(&stripped);

    let mut structs = StructTable::new();
    for decl in extract_structs(&normalized) {
        let fields = parse_fields(decl.body);
        debug!(name = decl.name, fields = fields.len(), "parsed struct");

        if let Some(tag) = decl.tag.filter(|tag| *tag != decl.name) {
            structs.insert(decl.name, fields.clone());
            structs.insert(tag, fields);
        } else {
            structs.insert(decl.name, fields);
        }
    }

    ParsedSource { display, structs }
}

/// Removes `//` and `/* */` comments. Block comments do not nest and an
/// unterminated `/*` is left alone.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut copied_up_to = 0;

    for tok in Tokenizer::new(source, false) {
        if tok.kind.is_comment() {
            out.push_str(&source[copied_up_to..tok.span.start]);
            copied_up_to = tok.span.end;
        }
    }

    out.push_str(&source[copied_up_to..]);
    out
}

/// Drops blank lines, trims the rest and indents struct members one level.
/// Only meant for showing the source back to the user.
pub fn format_for_display(source: &str) -> String {
    let mut lines = Vec::new();
    let mut in_struct = false;

    for line in source.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }

        if opens_struct(stripped) {
            lines.push(stripped.to_string());
            in_struct = !stripped.contains('}');
        } else if stripped.starts_with('}') {
            lines.push(stripped.to_string());
            in_struct = false;
        } else if stripped == "{" || !in_struct {
            lines.push(stripped.to_string());
        } else {
            lines.push(format!("  {stripped}"));
        }
    }

    lines.join("\n")
}

fn opens_struct(line: &str) -> bool {
    let mut tokens = Tokenizer::new(line, true).map(|tok| tok.kind);
    match tokens.next() {
        Some(TokenKind::Identifier("struct")) => true,
        Some(TokenKind::Identifier("typedef")) => {
            matches!(tokens.next(), Some(TokenKind::Identifier("struct")))
        }
        _ => false,
    }
}

/// Collapses every whitespace run into one space.
pub fn normalize_whitespace(source: &str) -> String {
    source.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Finds every `typedef struct [Tag] { body } Name;` and `struct Name { body };`
/// in declaration order. Bodies containing braces are not matched.
pub fn extract_structs(source: &str) -> Vec<StructDecl<'_>> {
    let tokens = Tokenizer::new(source, true).collect::<Vec<_>>();

    let mut decls = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let matched =
            match_typedef(source, &tokens, i).or_else(|| match_struct(source, &tokens, i));

        match matched {
            Some((decl, next)) => {
                decls.push(decl);
                i = next;
            }
            None => i += 1,
        }
    }

    decls
}

fn ident_at<'a>(tokens: &[Token<'a>], i: usize) -> Option<&'a str> {
    match tokens.get(i)?.kind {
        TokenKind::Identifier(ident) => Some(ident),
        _ => None,
    }
}

fn is_at(tokens: &[Token], i: usize, kind: TokenKind) -> bool {
    tokens.get(i).map_or(false, |tok| tok.kind == kind)
}

// Index of the `}` closing the `{` at `open`.
fn closing_brace(tokens: &[Token], open: usize) -> Option<usize> {
    if !is_at(tokens, open, TokenKind::BraceOpen) {
        return None;
    }

    for (i, tok) in tokens.iter().enumerate().skip(open + 1) {
        match tok.kind {
            TokenKind::BraceClose => return Some(i),
            TokenKind::BraceOpen => return None,
            _ => (),
        }
    }

    None
}

fn body<'a>(source: &'a str, tokens: &[Token], open: usize, close: usize) -> &'a str {
    &source[tokens[open].span.end..tokens[close].span.start]
}

fn match_typedef<'a>(
    source: &'a str,
    tokens: &[Token<'a>],
    i: usize,
) -> Option<(StructDecl<'a>, usize)> {
    if ident_at(tokens, i)? != "typedef" || ident_at(tokens, i + 1)? != "struct" {
        return None;
    }

    let mut open = i + 2;
    let tag = ident_at(tokens, open);
    if tag.is_some() {
        open += 1;
    }

    let close = closing_brace(tokens, open)?;
    let name = ident_at(tokens, close + 1)?;
    if !is_at(tokens, close + 2, TokenKind::Semicolon) {
        return None;
    }

    let decl = StructDecl {
        name,
        tag,
        body: body(source, tokens, open, close),
    };

    Some((decl, close + 3))
}

fn match_struct<'a>(
    source: &'a str,
    tokens: &[Token<'a>],
    i: usize,
) -> Option<(StructDecl<'a>, usize)> {
    if ident_at(tokens, i)? != "struct" {
        return None;
    }

    let name = ident_at(tokens, i + 1)?;
    let open = i + 2;
    let close = closing_brace(tokens, open)?;
    if !is_at(tokens, close + 1, TokenKind::Semicolon) {
        return None;
    }

    let decl = StructDecl {
        name,
        tag: None,
        body: body(source, tokens, open, close),
    };

    Some((decl, close + 2))
}

/// Splits a struct body on `;` and parses each member, dropping the ones
/// that do not parse.
pub fn parse_fields(body: &str) -> Vec<Field> {
    body.split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter_map(|decl| {
            let field = parse_field(decl);
            if field.is_none() {
                debug!(decl, "dropped malformed member");
            }
            field
        })
        .collect()
}

/// Parses a single member declaration (without its `;`).
pub fn parse_field(decl: &str) -> Option<Field> {
    let decl = normalize_whitespace(decl);

    if let Some(start) = decl.find("(*") {
        return parse_function_pointer(&decl[start + 2..]);
    }

    let (core, bit_size) = match split_bit_width(&decl) {
        Some((core, bits)) => (core, Some(bits)),
        None => (decl.as_str(), None),
    };

    let array_size = array_size(core);

    let declarator = &core[..core.find('[').unwrap_or(core.len())];
    let spaced = declarator.replace('*', " * ");
    let mut parts = spaced.split_whitespace().collect::<Vec<_>>();

    let name = parts.pop()?;
    if !is_identifier(name) {
        return None;
    }

    let ty = parts
        .into_iter()
        .filter(|part| *part != "*")
        .collect::<Vec<_>>();
    if ty.is_empty() {
        return None;
    }

    Some(Field {
        name: name.to_string(),
        ty: FieldType::Named(ty.join(" ")),
        is_pointer: decl.contains('*'),
        array_size,
        bit_size,
    })
}

fn is_identifier(s: &str) -> bool {
    s.starts_with(is_identifier_start_char) && s.chars().all(is_identifier_rest_char)
}

// `rest` starts right after the `(*`.
fn parse_function_pointer(rest: &str) -> Option<Field> {
    let close = rest.find(')')?;
    let inner = rest[..close].trim();
    let end = inner
        .find(|c: char| !is_identifier_rest_char(c))
        .unwrap_or(inner.len());
    let name = &inner[..end];

    if !name.starts_with(is_identifier_start_char) {
        return None;
    }

    Some(Field::function_ptr(name))
}

// Splits `int flags : 3` into (`int flags`, 3).
fn split_bit_width(decl: &str) -> Option<(&str, u64)> {
    let trimmed = decl.trim_end();
    let digits_start = trimmed
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .len();
    if digits_start == trimmed.len() {
        return None;
    }

    let core = trimmed[..digits_start].trim_end().strip_suffix(':')?;
    let bits = trimmed[digits_start..].parse().ok()?;

    Some((core.trim(), bits))
}

// Product of every numeric `[N]`. Anything else between brackets, including
// a zero length, counts as 1.
fn array_size(decl: &str) -> u64 {
    let mut size = 1u64;
    let mut rest = decl;

    while let Some(open) = rest.find('[') {
        let Some(len) = rest[open..].find(']') else {
            break;
        };

        let dim = rest[open + 1..open + len].trim();
        if !dim.is_empty() && dim.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = dim.parse::<u64>() {
                if n > 0 {
                    size = size.saturating_mul(n);
                }
            }
        }

        rest = &rest[open + len + 1..];
    }

    size
}

/// The value of the first `#pragma pack(N)` outside comments. `pack(0)` and
/// the `push`/`pop` forms do not count.
pub fn parse_pragma_pack(source: &str) -> Option<NonZeroU64> {
    use TokenKind::*;

    let tokens = Tokenizer::new(source, true)
        .map(|tok| tok.kind)
        .collect::<Vec<_>>();

    let value = tokens.windows(6).find_map(|window| match window {
        [Hash, Identifier("pragma"), Identifier("pack"), ParenOpen, Number(n), ParenClose] => {
            Some(*n)
        }
        _ => None,
    })?;

    value.parse::<u64>().ok().and_then(NonZeroU64::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: &str) -> Field {
        Field {
            name: name.to_string(),
            ty: FieldType::Named(ty.to_string()),
            is_pointer: false,
            array_size: 1,
            bit_size: None,
        }
    }

    fn pointer(name: &str, ty: &str) -> Field {
        Field {
            is_pointer: true,
            ..field(name, ty)
        }
    }

    fn bits(name: &str, ty: &str, bits: u64) -> Field {
        Field {
            bit_size: Some(bits),
            ..field(name, ty)
        }
    }

    fn array(name: &str, ty: &str, count: u64) -> Field {
        Field {
            array_size: count,
            ..field(name, ty)
        }
    }

    #[test]
    fn strips_line_and_block_comments() {
        let source = "struct A { // first\n int x; /* second\n line */ char y;\n};";

        assert_eq!(
            strip_comments(source),
            "struct A { \n int x;  char y;\n};"
        );
    }

    #[test]
    fn block_comment_ends_at_first_terminator() {
        assert_eq!(strip_comments("a /* b /* c */ d */ e"), "a  d */ e");
    }

    #[test]
    fn normalizes_whitespace_runs() {
        assert_eq!(
            normalize_whitespace("  struct\tA {\n\n  int   x;\r\n};  "),
            "struct A { int x; };"
        );
    }

    #[test]
    fn display_indents_struct_members() {
        let source = "\n#pragma pack(1)\n  typedef struct\n{\n int a;\n\n   char b;\n} T;\nint after;\n";

        assert_eq!(
            format_for_display(source),
            "#pragma pack(1)\ntypedef struct\n{\n  int a;\n  char b;\n} T;\nint after;"
        );
    }

    #[test]
    fn display_of_single_line_struct_does_not_indent_what_follows() {
        assert_eq!(
            format_for_display("struct A { int x; };\nint y;"),
            "struct A { int x; };\nint y;"
        );
    }

    #[test]
    fn extracts_both_declaration_forms_in_order() {
        let source = "struct A { int x; }; typedef struct { char c; } B; typedef struct Tag { short s; } C;";
        let decls = extract_structs(source);

        assert_eq!(
            decls,
            vec![
                StructDecl { name: "A", tag: None, body: " int x; " },
                StructDecl { name: "B", tag: None, body: " char c; " },
                StructDecl { name: "C", tag: Some("Tag"), body: " short s; " },
            ]
        );
    }

    #[test]
    fn nested_braces_and_variable_declarations_do_not_match() {
        assert!(extract_structs("struct A { struct B { int x; } b; };").is_empty());
        assert!(extract_structs("struct A { int x; } a;").is_empty());
        assert!(extract_structs("typedef struct A B;").is_empty());
    }

    #[test]
    fn parses_scalar_pointer_and_array_members() {
        assert_eq!(parse_field("int x"), Some(field("x", "int")));
        assert_eq!(parse_field("unsigned  long long total"), Some(field("total", "unsigned long long")));
        assert_eq!(parse_field("char *c"), Some(pointer("c", "char")));
        assert_eq!(parse_field("char* c"), Some(pointer("c", "char")));
        assert_eq!(parse_field("char*c"), Some(pointer("c", "char")));
        assert_eq!(parse_field("const char * const * names"), Some(pointer("names", "const char const")));
        assert_eq!(parse_field("char name[16]"), Some(array("name", "char", 16)));
        assert_eq!(parse_field("int grid[3][4]"), Some(array("grid", "int", 12)));
        assert_eq!(
            parse_field("char *argv[8]"),
            Some(Field { array_size: 8, ..pointer("argv", "char") })
        );
    }

    #[test]
    fn non_numeric_or_zero_dimensions_count_as_one() {
        assert_eq!(parse_field("int data[N][2]"), Some(array("data", "int", 2)));
        assert_eq!(parse_field("char tail[]"), Some(field("tail", "char")));
        assert_eq!(parse_field("char tail[0]"), Some(field("tail", "char")));
    }

    #[test]
    fn parses_bit_fields() {
        assert_eq!(parse_field("int x:3"), Some(bits("x", "int", 3)));
        assert_eq!(parse_field("unsigned int ready : 1  "), Some(bits("ready", "unsigned int", 1)));
    }

    #[test]
    fn parses_function_pointers() {
        assert_eq!(parse_field("void (*on_event)(int, void *)"), Some(Field::function_ptr("on_event")));
        assert_eq!(parse_field("int (* cmp )(const void *a, const void *b)"), Some(Field::function_ptr("cmp")));
        assert_eq!(parse_field("void (*handlers[4])(void)"), Some(Field::function_ptr("handlers")));
        assert_eq!(parse_field("void (*)(void)"), None);
        assert_eq!(parse_field("void (*broken"), None);
    }

    #[test]
    fn malformed_members_are_dropped() {
        assert_eq!(parse_field("int"), None);
        assert_eq!(parse_field("int 3x"), None);
        assert_eq!(parse_field("int *"), None);

        assert_eq!(
            parse_fields(" int a; int; 42; char b; ; "),
            vec![field("a", "int"), field("b", "char")]
        );
    }

    #[test]
    fn comma_separated_members_keep_the_last_name() {
        // `int a,` is never a known type, so the layout reports it.
        assert_eq!(parse_field("int a, b"), Some(field("b", "int a,")));
        assert_eq!(
            parse_fields("int a, b; char c;"),
            vec![field("b", "int a,"), field("c", "char")]
        );
    }

    #[test]
    fn empty_body_has_no_fields() {
        assert!(parse_fields("").is_empty());
        assert!(parse_fields(" ; ; ").is_empty());
    }

    #[test]
    fn parse_builds_the_struct_table() {
        let parsed = parse(
            "/* sensor */\nstruct P {\n  char a; // tag\n  int b;\n  char *c;\n};\n\ntypedef struct Node {\n  int value;\n  struct Node *next;\n} Node_t;\n",
        );

        assert_eq!(parsed.structs.names().collect::<Vec<_>>(), vec!["P", "Node_t", "Node"]);
        assert_eq!(
            parsed.structs.get("P").unwrap(),
            &[field("a", "char"), field("b", "int"), pointer("c", "char")][..]
        );
        assert_eq!(parsed.structs.get("Node_t"), parsed.structs.get("Node"));
        assert_eq!(
            parsed.structs.get("Node").unwrap()[1],
            pointer("next", "struct Node")
        );
        assert_eq!(
            parsed.display,
            "struct P {\n  char a;\n  int b;\n  char *c;\n};\ntypedef struct Node {\n  int value;\n  struct Node *next;\n} Node_t;"
        );
    }

    #[test]
    fn later_declaration_of_a_name_wins() {
        let parsed = parse("struct A { int x; }; struct B { char y; }; struct A { char z; };");

        assert_eq!(parsed.structs.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(parsed.structs.get("A").unwrap(), &[field("z", "char")][..]);
    }

    #[test]
    fn parsing_is_idempotent() {
        let source = "struct A { int x : 3; int y : 5; char z[2]; void (*f)(void); };";

        assert_eq!(parse(source), parse(source));
    }

    #[test]
    fn text_without_structs_gives_an_empty_table() {
        assert!(parse("int main(void) { return 0; }").structs.is_empty());
        assert!(parse("").structs.is_empty());
    }

    #[test]
    fn finds_the_pack_pragma() {
        assert_eq!(parse_pragma_pack("#pragma pack(2)\nstruct A { int x; };"), NonZeroU64::new(2));
        assert_eq!(parse_pragma_pack("#  pragma   pack ( 8 )"), NonZeroU64::new(8));
        assert_eq!(parse_pragma_pack("#pragma pack(push, 1)"), None);
        assert_eq!(parse_pragma_pack("#pragma pack(0)"), None);
        assert_eq!(parse_pragma_pack("// #pragma pack(1)"), None);
        assert_eq!(parse_pragma_pack("struct A { int x; };"), None);
    }

    #[test]
    fn pack_pragma_after_many_comments() {
        let source = "// c\n".repeat(200_000) + "#pragma pack(4)\nstruct A { int x; };";

        assert_eq!(parse_pragma_pack(&source), NonZeroU64::new(4));
    }
}
