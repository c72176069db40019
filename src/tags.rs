//! Tag engine: per-client tag storage and the tagset expression language,
//! built on a per-client tag set plus a small stack of named tagsets and a
//! full expression grammar over `|` `\` `&` `~`.
use std::collections::BTreeSet;
use std::fmt;

use crate::client::ClientTable;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::xid::Xid;

/// `*`: present on any tagset (sticky), `.`: the current visible set at
/// evaluation time, `0`: the empty set. None of these are stored on a
/// client's tag list except `*`.
pub const WILDCARD: &str = "*";
pub const CURRENT: &str = ".";
pub const EMPTY: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Or,
    Diff,
    And,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                tokens.push(Token::Or);
                chars.next();
            }
            '\\' => {
                tokens.push(Token::Diff);
                chars.next();
            }
            '&' => {
                tokens.push(Token::And);
                chars.next();
            }
            '~' => {
                tokens.push(Token::Not);
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            _ => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || "|\\&~()".contains(c) {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                if ident.is_empty() {
                    return Err(Error::TagsetParse(format!("unexpected character '{c}'")));
                }
                tokens.push(Token::Ident(ident));
            }
        }
    }
    Ok(tokens)
}

/// A parsed tagset expression, precedence lowest-to-highest `|` `\` `&` `~`
/// (prefix), binary operators left-associative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Atom(String),
    Or(Box<Expr>, Box<Expr>),
    Diff(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl fmt::Display for Expr {
    /// Canonical-form unparsing, used to verify `unparse(parse(s)) ==
    /// parse(s)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Atom(s) => write!(f, "{s}"),
            Expr::Or(a, b) => write!(f, "({a} | {b})"),
            Expr::Diff(a, b) => write!(f, "({a} \\ {b})"),
            Expr::And(a, b) => write!(f, "({a} & {b})"),
            Expr::Not(a) => write!(f, "~{a}"),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    // expr := or
    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_diff()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.bump();
            let rhs = self.parse_diff()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_diff(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Diff)) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Diff(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.bump();
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.bump();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.bump() {
            Some(Token::Ident(s)) => Ok(Expr::Atom(s)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(Error::TagsetParse("expected closing ')'".into())),
                }
            }
            other => Err(Error::TagsetParse(format!("unexpected token: {other:?}"))),
        }
    }
}

/// Parse a tagset expression.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(Error::TagsetParse("empty expression".into()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::TagsetParse("trailing input after expression".into()));
    }
    Ok(expr)
}

/// Evaluate `expr` against `clients`, given `tag_of` resolving an identifier
/// to its interned atom and `current` the presently visible set. A client tagged `*` is implicitly added to any non-complement
/// atom's result, making it sticky; complement is taken over the universe
/// of all managed clients including untagged ones.
pub fn eval(
    expr: &Expr,
    clients: &ClientTable,
    resolve: &dyn Fn(&str) -> Option<Xid>,
    current: &BTreeSet<Xid>,
) -> BTreeSet<Xid> {
    let universe = || -> BTreeSet<Xid> { clients.iter().map(|c| c.id).collect() };

    match expr {
        Expr::Atom(s) if s == EMPTY => BTreeSet::new(),
        Expr::Atom(s) if s == CURRENT => current.clone(),
        Expr::Atom(s) if s == WILDCARD => {
            let Some(wildcard) = resolve(WILDCARD) else {
                return BTreeSet::new();
            };
            clients.iter().filter(|c| c.is_sticky(wildcard)).map(|c| c.id).collect()
        }
        Expr::Atom(s) => {
            let wildcard = resolve(WILDCARD);
            let Some(tag) = resolve(s) else {
                return BTreeSet::new();
            };
            clients
                .iter()
                .filter(|c| {
                    c.tags.contains(&tag) || wildcard.is_some_and(|w| c.is_sticky(w))
                })
                .map(|c| c.id)
                .collect()
        }
        Expr::Or(a, b) => {
            let mut s = eval(a, clients, resolve, current);
            s.extend(eval(b, clients, resolve, current));
            s
        }
        Expr::Diff(a, b) => {
            let sa = eval(a, clients, resolve, current);
            let sb = eval(b, clients, resolve, current);
            sa.difference(&sb).copied().collect()
        }
        Expr::And(a, b) => {
            let sa = eval(a, clients, resolve, current);
            let sb = eval(b, clients, resolve, current);
            sa.intersection(&sb).copied().collect()
        }
        Expr::Not(a) => {
            let sa = eval(a, clients, resolve, current);
            universe().difference(&sa).copied().collect()
        }
    }
}

/// A non-empty stack of previously-visible sets, topped by whichever one is
/// currently displayed. The core never pops it
/// implicitly: popping is left to future
/// features, so the bottom element (the initial all-untagged set) is always
/// reachable.
pub struct TagsetStack {
    stack: Vec<String>,
}

impl TagsetStack {
    pub fn new() -> Self {
        TagsetStack { stack: vec![EMPTY.to_string()] }
    }

    pub fn current_expr(&self) -> &str {
        self.stack.last().expect("stack is never empty")
    }

    /// Replace the top of the stack with `expr_src`, retaining the rest of
    /// the stack for future pop semantics. No-ops if `expr_src` equals the
    /// current top.
    pub fn replace_top(&mut self, expr_src: String) {
        *self.stack.last_mut().expect("stack is never empty") = expr_src;
    }

    pub fn push(&mut self, expr_src: String) {
        self.stack.push(expr_src);
    }
}

impl Default for TagsetStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate the tagset currently named at the top of `stack`, map/unmap every
/// managed client's frame to match, then `ensure_focus`. Returns the newly visible set.
pub fn switch_tagset(
    conn: &dyn Connection,
    clients: &ClientTable,
    resolve: &dyn Fn(&str) -> Option<Xid>,
    stack: &TagsetStack,
    previous_visible: &BTreeSet<Xid>,
) -> Result<BTreeSet<Xid>> {
    let expr = parse(stack.current_expr())?;
    let visible = eval(&expr, clients, resolve, previous_visible);

    for client in clients.iter() {
        if client.state != crate::property::WmState::Normal {
            continue;
        }
        if visible.contains(&client.id) {
            if !client.mapped {
                conn.map_window(client.frame)?;
            }
        } else if client.mapped {
            conn.unmap_window(client.frame)?;
        }
    }
    Ok(visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockConnection;

    fn resolver(s: &str) -> Option<Xid> {
        match s {
            "*" => Some(Xid(1)),
            "work" => Some(Xid(2)),
            "docs" => Some(Xid(3)),
            "mail" => Some(Xid(4)),
            _ => None,
        }
    }

    fn tagged(table: &mut ClientTable, conn: &MockConnection, id: u32, tags: &[&str]) {
        table.adopt(conn, Xid(id), crate::geometry::Rect::new(0, 0, 10, 10), 0, 0).unwrap();
        let client = table.get_mut(Xid(id)).unwrap();
        for t in tags {
            client.tags.push(resolver(t).unwrap());
        }
    }

    #[test]
    fn diff_and_union_combine_tag_groups() {
        let conn = MockConnection::new();
        let mut table = ClientTable::new();
        tagged(&mut table, &conn, 1, &["work"]); // A
        tagged(&mut table, &conn, 2, &["work", "docs"]); // B
        tagged(&mut table, &conn, 3, &["mail"]); // C

        let expr = parse("work \\ docs | mail").unwrap();
        let visible = eval(&expr, &table, &resolver, &BTreeSet::new());
        assert_eq!(visible, BTreeSet::from([Xid(1), Xid(3)]));
    }

    #[test]
    fn sticky_client_always_visible() {
        let conn = MockConnection::new();
        let mut table = ClientTable::new();
        tagged(&mut table, &conn, 1, &["*"]); // sticky, untagged otherwise

        let expr = parse("mail").unwrap();
        let visible = eval(&expr, &table, &resolver, &BTreeSet::new());
        assert_eq!(visible, BTreeSet::from([Xid(1)]));
    }

    #[test]
    fn wildcard_excluded_from_empty() {
        let conn = MockConnection::new();
        let mut table = ClientTable::new();
        tagged(&mut table, &conn, 1, &["*"]);

        let zero = eval(&parse("0").unwrap(), &table, &resolver, &BTreeSet::new());
        assert!(!zero.contains(&Xid(1)));
    }

    #[test]
    fn not_zero_is_universe_but_wildcard_is_subset() {
        let conn = MockConnection::new();
        let mut table = ClientTable::new();
        tagged(&mut table, &conn, 1, &["*"]);
        tagged(&mut table, &conn, 2, &[]); // untagged, not sticky

        let not_zero = eval(&parse("~0").unwrap(), &table, &resolver, &BTreeSet::new());
        let star = eval(&parse("*").unwrap(), &table, &resolver, &BTreeSet::new());

        assert_eq!(not_zero, BTreeSet::from([Xid(1), Xid(2)]));
        assert_eq!(star, BTreeSet::from([Xid(1)]));
        assert!(star.is_subset(&not_zero));
        assert_ne!(star, not_zero);
    }

    #[test]
    fn dot_refers_to_currently_visible_set_at_eval_time() {
        let table = ClientTable::new();
        let current = BTreeSet::from([Xid(7)]);
        let visible = eval(&parse(".").unwrap(), &table, &resolver, &current);
        assert_eq!(visible, current);
    }

    #[test]
    fn unparse_parse_round_trips() {
        let expr = parse("work \\ docs | mail & ~0").unwrap();
        let reparsed = parse(&expr.to_string()).unwrap();
        assert_eq!(expr, reparsed);
    }

    #[test]
    fn switching_to_same_expression_twice_changes_nothing() {
        let mut stack = TagsetStack::new();
        stack.replace_top("work".to_string());
        let first = stack.current_expr().to_string();
        stack.replace_top("work".to_string());
        assert_eq!(first, stack.current_expr());
    }

    #[test]
    fn malformed_expression_is_rejected() {
        assert!(parse("work &").is_err());
        assert!(parse("(work").is_err());
        assert!(parse("").is_err());
    }

    /// A small expression tree built only from the identifiers `eval` and
    /// `parse` already know how to handle, so generated cases never trip
    /// the "unknown atom" path rather than the round-trip property itself.
    #[derive(Clone, Debug)]
    struct ArbExpr(Expr);

    fn gen_expr(g: &mut quickcheck::Gen, depth: u32) -> Expr {
        const ATOMS: &[&str] = &["work", "docs", "mail", "*", "0", "."];
        if depth == 0 || bool::arbitrary(g) {
            let idx = usize::arbitrary(g) % ATOMS.len();
            Expr::Atom(ATOMS[idx].to_string())
        } else {
            match u8::arbitrary(g) % 4 {
                0 => Expr::Or(Box::new(gen_expr(g, depth - 1)), Box::new(gen_expr(g, depth - 1))),
                1 => Expr::Diff(Box::new(gen_expr(g, depth - 1)), Box::new(gen_expr(g, depth - 1))),
                2 => Expr::And(Box::new(gen_expr(g, depth - 1)), Box::new(gen_expr(g, depth - 1))),
                _ => Expr::Not(Box::new(gen_expr(g, depth - 1))),
            }
        }
    }

    impl quickcheck::Arbitrary for ArbExpr {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            ArbExpr(gen_expr(g, 3))
        }
    }

    #[quickcheck_macros::quickcheck]
    fn unparse_then_reparse_is_idempotent(expr: ArbExpr) -> bool {
        let canonical = expr.0.to_string();
        let reparsed = parse(&canonical).expect("canonical form always re-parses");
        reparsed.to_string() == canonical
    }
}
