//! Argument-expression reduction.
//!
//! Call arguments are emitted as `{raw, root_var}`: the original text plus
//! the root identifier after stripping prefix keywords, outer parentheses,
//! and post-call chains. `await service.getById(id).then(r => r.data)`
//! reduces to `service`. Literals and irreducible expressions reduce to
//! nothing — they never masquerade as variables.

const PREFIX_KEYWORDS: &[&str] = &["await", "new", "yield", "typeof", "void", "delete"];

/// Root identifier of an argument expression, if it has one.
pub fn root_identifier(raw: &str) -> Option<String> {
    let mut expr = raw.trim();

    loop {
        // Outer parens.
        if expr.starts_with('(') && expr.ends_with(')') {
            let inner = &expr[1..expr.len() - 1];
            if balanced(inner) {
                expr = inner.trim();
                continue;
            }
        }
        // Prefix keywords.
        let mut stripped = false;
        for kw in PREFIX_KEYWORDS {
            if let Some(rest) = expr.strip_prefix(kw) {
                if rest.starts_with(|c: char| c.is_whitespace()) {
                    expr = rest.trim_start();
                    stripped = true;
                    break;
                }
            }
        }
        if !stripped {
            break;
        }
    }

    let mut chars = expr.chars();
    let first = chars.next()?;
    if !(first.is_alphabetic() || first == '_' || first == '$') {
        return None;
    }

    let mut ident = String::new();
    ident.push(first);
    for c in chars {
        if c.is_alphanumeric() || c == '_' || c == '$' {
            ident.push(c);
        } else {
            break;
        }
    }

    // Keywords that start expressions but are not identifiers.
    if matches!(
        ident.as_str(),
        "function" | "async" | "true" | "false" | "null" | "undefined" | "None" | "True"
            | "False" | "lambda" | "not"
    ) {
        return None;
    }

    Some(ident)
}

/// The dotted access chain rooted at an identifier, truncated at `k`
/// fields: `req.body.user.id` → `("req", ["body", "user", "id"])`. A
/// segment followed by `(` ends the chain *before* it — a method call is
/// no longer a plain field path.
pub fn access_chain(raw: &str, k: usize) -> Option<(String, Vec<String>)> {
    let expr = raw.trim();
    let base = root_identifier(expr)?;
    let start = expr.find(base.as_str())?;
    let fields = parse_fields(&expr[start + base.len()..], k);
    Some((base, fields))
}

/// The field chain attached to a specific variable *anywhere* inside an
/// expression: `await schema.parseAsync(req.body)` with `req` → `[body]`.
/// Returns the first occurrence with a non-empty chain; empty otherwise.
pub fn chain_for_var(expr: &str, var: &str, k: usize) -> Vec<String> {
    let mut search_from = 0usize;
    while let Some(pos) = expr[search_from..].find(var) {
        let abs = search_from + pos;
        let boundary_before = abs == 0
            || !expr[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$');
        let after = abs + var.len();
        if boundary_before {
            let fields = parse_fields(&expr[after..], k);
            if !fields.is_empty() {
                return fields;
            }
        }
        search_from = after.max(abs + 1);
        if search_from >= expr.len() {
            break;
        }
    }
    Vec::new()
}

/// Walk `.field` segments, stopping before calls and subscripts.
fn parse_fields(mut rest: &str, k: usize) -> Vec<String> {
    let mut fields = Vec::new();
    while let Some(r) = rest.strip_prefix('.') {
        let end = r
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(r.len());
        if end == 0 {
            break;
        }
        let after = &r[end..];
        if after.starts_with('(') {
            break;
        }
        if fields.len() < k {
            fields.push(r[..end].to_string());
        } else {
            break;
        }
        rest = after;
        if rest.starts_with('[') {
            break;
        }
    }
    fields
}

fn balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_await_and_chains() {
        assert_eq!(
            root_identifier("await service.getById(id).then(r => r.data)").as_deref(),
            Some("service")
        );
        assert_eq!(root_identifier("new User(data)").as_deref(), Some("User"));
        assert_eq!(root_identifier("(req.body)").as_deref(), Some("req"));
        assert_eq!(root_identifier("typeof window").as_deref(), Some("window"));
    }

    #[test]
    fn literals_reduce_to_nothing() {
        assert_eq!(root_identifier("\"SELECT * FROM users\""), None);
        assert_eq!(root_identifier("42"), None);
        assert_eq!(root_identifier("{ a: 1 }"), None);
        assert_eq!(root_identifier("[1, 2]"), None);
        assert_eq!(root_identifier("true"), None);
    }

    #[test]
    fn chain_extraction_with_k_limit() {
        let (base, fields) = access_chain("req.body.user.id", 5).unwrap();
        assert_eq!(base, "req");
        assert_eq!(fields, vec!["body", "user", "id"]);

        let (base, fields) = access_chain("a.b.c.d.e.f.g", 5).unwrap();
        assert_eq!(base, "a");
        assert_eq!(fields.len(), 5);

        // Method calls end the chain before the called segment.
        let (base, fields) = access_chain("service.get(x).data", 5).unwrap();
        assert_eq!(base, "service");
        assert!(fields.is_empty());
    }

    #[test]
    fn chain_for_var_finds_embedded_chains() {
        assert_eq!(
            chain_for_var("await schema.parseAsync(req.body)", "req", 5),
            vec!["body"]
        );
        assert_eq!(chain_for_var("req.body", "req", 5), vec!["body"]);
        // Identifier boundary: `request` does not match `req`.
        assert!(chain_for_var("request.body", "req", 5).is_empty());
        assert!(chain_for_var("schema.parse(x)", "req", 5).is_empty());
    }
}
