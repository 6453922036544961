//! Text-level decomposition of C type spellings.
//!
//! A spelling such as `const struct Foo *const [4]` is reduced to its base
//! name (`struct Foo`), the number of pointer levels and the list of array
//! dimensions. The steps run in a fixed order, each on the output of the
//! previous one: qualifiers, pointers, arrays.
//!
//! Parenthesized groups are copied verbatim. libclang spells anonymous
//! records as `struct (unnamed at file.h:3:9)` and the file path inside the
//! group must survive decomposition untouched.

use crate::error::{Error, Result};

const QUALIFIERS: &[&str] = &["const", "volatile", "restrict", "__restrict", "__restrict__"];

/// Result of [`decompose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecomposedType {
    pub base_name: String,
    /// Includes the level folded from a leading unsized dimension.
    pub pointer_depth: usize,
    /// Sized dimensions, left to right as written.
    pub array_dims: Vec<usize>,
    /// A leading `[]` was folded into `pointer_depth`. That level is the
    /// outermost one: `T[][4]` is a pointer to `T[4]`.
    pub leading_unsized: bool,
}

/// Split a spelling into base name, pointer depth and array dimensions.
///
/// A leading unsized dimension (`T[]`, `T[][4]`) is folded into one extra
/// pointer level. Any other unsized dimension is ambiguous and rejected.
pub fn decompose(spelling: &str) -> Result<DecomposedType> {
    let unqualified = strip_qualifiers(spelling)?;
    let (unpointered, stars) = strip_pointers(&unqualified);
    let (base, array_dims, folded) = strip_arrays(spelling, &unpointered)?;

    let base_name = collapse_whitespace(&base);
    if base_name.is_empty() {
        return Err(Error::malformed(spelling, "missing base type"));
    }

    Ok(DecomposedType {
        base_name,
        pointer_depth: stars + usize::from(folded),
        array_dims,
        leading_unsized: folded,
    })
}

/// Remove qualifier keywords that appear as whole words outside of
/// parentheses. Identifiers merely containing a qualifier (`constant`,
/// `my_const`) are kept.
pub fn strip_qualifiers(spelling: &str) -> Result<String> {
    let mut out = String::with_capacity(spelling.len());
    let mut depth = 0usize;
    let mut chars = spelling.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            '(' => {
                depth += 1;
                out.push(c);
            }
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::malformed(spelling, "unbalanced `)`"))?;
                out.push(c);
            }
            c if is_ident_char(c) => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !is_ident_char(next) {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                let word = &spelling[start..end];
                if depth == 0 && QUALIFIERS.contains(&word) {
                    out.push(' ');
                } else {
                    out.push_str(word);
                }
            }
            _ => out.push(c),
        }
    }

    if depth != 0 {
        return Err(Error::malformed(spelling, "unbalanced `(`"));
    }
    Ok(out)
}

/// Count and remove `*` outside of parentheses.
pub fn strip_pointers(spelling: &str) -> (String, usize) {
    let mut out = String::with_capacity(spelling.len());
    let mut depth = 0usize;
    let mut stars = 0;
    for c in spelling.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '*' if depth == 0 => {
                stars += 1;
                out.push(' ');
                continue;
            }
            _ => {}
        }
        out.push(c);
    }
    (out, stars)
}

/// Remove bracket pairs outside of parentheses. Returns the remaining text,
/// the sized dimensions and whether a leading unsized pair was folded.
fn strip_arrays(full: &str, spelling: &str) -> Result<(String, Vec<usize>, bool)> {
    let mut out = String::with_capacity(spelling.len());
    let mut dims = Vec::new();
    let mut folded = false;
    let mut depth = 0usize;
    let mut rest = spelling;

    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '[' if depth == 0 => {
                let close = rest
                    .find(']')
                    .ok_or_else(|| Error::malformed(full, "unterminated `[`"))?;
                let inner = rest[..close].trim();
                rest = &rest[close + 1..];
                if inner.is_empty() {
                    if folded || !dims.is_empty() {
                        return Err(Error::malformed(
                            full,
                            "only a leading array dimension may be unsized",
                        ));
                    }
                    folded = true;
                } else {
                    let size = inner.parse::<usize>().map_err(|_| {
                        Error::malformed(full, format!("array size `{inner}` is not an integer"))
                    })?;
                    dims.push(size);
                }
                out.push(' ');
                continue;
            }
            ']' if depth == 0 => return Err(Error::malformed(full, "unmatched `]`")),
            _ => {}
        }
        out.push(c);
    }

    Ok((out, dims, folded))
}

/// The pieces of a function-pointer (`int (*)(int, char *)`) or function
/// prototype (`int (int)`) spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub return_type: String,
    /// Number of `*` inside the declarator group; 0 for a bare prototype.
    pub pointer_depth: usize,
    /// Parameter spellings in declaration order. `(void)` yields none and a
    /// variadic `...` is dropped.
    pub params: Vec<String>,
}

/// Recognize a function-pointer or function-prototype spelling.
///
/// Returns `None` for everything else, including anonymous record spellings
/// like `struct (unnamed at a.h:1:9)` that also end in a parenthesis.
pub fn split_function_pointer(spelling: &str) -> Option<FunctionSignature> {
    let s = spelling.trim();
    if !s.ends_with(')') {
        return None;
    }
    let params_open = matching_open(s, s.len() - 1)?;
    let params_text = &s[params_open + 1..s.len() - 1];
    if is_unnamed_marker(params_text) {
        return None;
    }

    let head = s[..params_open].trim_end();
    let (return_type, pointer_depth) = if head.ends_with(')') {
        let group_open = matching_open(head, head.len() - 1)?;
        let group = strip_qualifiers(&head[group_open + 1..head.len() - 1]).ok()?;
        let group: String = group.chars().filter(|c| !c.is_whitespace()).collect();
        if group.is_empty() || !group.chars().all(|c| c == '*') {
            return None;
        }
        (head[..group_open].trim(), group.len())
    } else {
        (head, 0)
    };
    if return_type.is_empty() {
        return None;
    }

    let mut params: Vec<String> = split_top_level(params_text)
        .into_iter()
        .filter(|p| !p.is_empty() && p != "...")
        .collect();
    if params.len() == 1 && params[0] == "void" {
        params.clear();
    }

    Some(FunctionSignature {
        return_type: return_type.to_string(),
        pointer_depth,
        params,
    })
}

/// True for the parenthesized part libclang uses when spelling anonymous
/// declarations.
pub fn is_unnamed_marker(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with("unnamed") || text.starts_with("anonymous")
}

/// True for a whole spelling naming an anonymous declaration, such as
/// `struct (unnamed at a.h:1:9)`.
pub fn is_unnamed_spelling(spelling: &str) -> bool {
    spelling
        .find('(')
        .is_some_and(|open| is_unnamed_marker(&spelling[open + 1..]))
}

/// Byte index of the `(` matching the `)` at `close`.
fn matching_open(s: &str, close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s[..=close].char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current.trim().to_string());
    parts
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
