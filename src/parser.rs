//! Recursive-descent parser building the AST from a token stream.
//!
//! No evaluation happens here: variables are not expanded, conditions are
//! not interpreted, `if`/`foreach`/`while` bodies are just collected as
//! nested statement lists. Block keywords (`if/elseif/else/endif`,
//! `foreach/endforeach`, `while/endwhile`, `function/endfunction`,
//! `macro/endmacro`) are matched by name; trailing arguments on the `end*`
//! form are accepted and ignored, matching real CMake's leniency there.

use crate::ast::types::{
    Arg, ArgKind, CommandNode, ForeachNode, FunctionDefNode, IfClause, IfNode, MacroDefNode, Node,
    Script, Token, TokenKind, WhileNode,
};
use crate::errors::ParseError;
use crate::lexer;

pub fn parse(source: &str) -> Result<Script, ParseError> {
    let tokens = lexer::tokenize(source)?;
    Parser::new(tokens).parse_script()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_end(&self) -> bool {
        self.current().kind == TokenKind::End
    }

    fn is_command(&self, name: &str) -> bool {
        self.current().kind == TokenKind::Command
            && self.current().text.eq_ignore_ascii_case(name)
    }

    fn is_any_command(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.is_command(n))
    }

    fn parse_script(&mut self) -> Result<Script, ParseError> {
        const BLOCK_ENDERS: &[&str] = &[
            "elseif",
            "else",
            "endif",
            "endforeach",
            "endwhile",
            "endfunction",
            "endmacro",
        ];

        let mut statements = Vec::new();
        while !self.at_end() {
            if self.is_any_command(BLOCK_ENDERS) {
                let tok = self.current().clone();
                return Err(ParseError::UnmatchedBlockKeyword {
                    keyword: tok.text,
                    line: tok.line,
                });
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Script { statements })
    }

    /// Parses statements until a command whose name is in `enders` is seen
    /// (not consumed) or EOF is reached (an error, tagged with `opener`).
    fn parse_block_body(
        &mut self,
        opener: &str,
        open_line: usize,
        enders: &[&str],
    ) -> Result<Vec<Node>, ParseError> {
        let mut statements = Vec::new();
        loop {
            if self.at_end() {
                return Err(ParseError::UnterminatedBlock {
                    opener: opener.to_string(),
                    line: open_line,
                });
            }
            if self.is_any_command(enders) {
                return Ok(statements);
            }
            statements.push(self.parse_statement()?);
        }
    }

    fn parse_statement(&mut self) -> Result<Node, ParseError> {
        if self.is_command("if") {
            return Ok(Node::If(self.parse_if()?));
        }
        if self.is_command("foreach") {
            return Ok(Node::Foreach(self.parse_foreach()?));
        }
        if self.is_command("while") {
            return Ok(Node::While(self.parse_while()?));
        }
        if self.is_command("function") {
            return Ok(Node::FunctionDef(self.parse_function()?));
        }
        if self.is_command("macro") {
            return Ok(Node::MacroDef(self.parse_macro()?));
        }
        Ok(Node::Command(self.parse_command_call()?))
    }

    /// Consumes `name(args...)`, returning the raw (unexpanded) argument
    /// list. A bare `(`/`)` encountered inside the list (used by `if()`
    /// grouping) is preserved as a literal one-character unquoted argument
    /// rather than terminating the call early.
    fn parse_command_call(&mut self) -> Result<CommandNode, ParseError> {
        let name_tok = self.advance();
        debug_assert_eq!(name_tok.kind, TokenKind::Command);

        if self.current().kind != TokenKind::ParenOpen {
            return Err(ParseError::ExpectedParenAfterCommand {
                name: name_tok.text,
                line: name_tok.line,
            });
        }
        self.advance(); // '('

        let mut args = Vec::new();
        let mut depth: i32 = 1;
        loop {
            match self.current().kind {
                TokenKind::End => {
                    return Err(ParseError::UnterminatedArgList {
                        name: name_tok.text,
                        line: name_tok.line,
                    })
                }
                TokenKind::ParenOpen => {
                    let tok = self.advance();
                    depth += 1;
                    args.push(Arg {
                        kind: ArgKind::Unquoted,
                        text: "(".to_string(),
                        line: tok.line,
                        col: tok.col,
                    });
                }
                TokenKind::ParenClose => {
                    let tok = self.advance();
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    args.push(Arg {
                        kind: ArgKind::Unquoted,
                        text: ")".to_string(),
                        line: tok.line,
                        col: tok.col,
                    });
                }
                TokenKind::ArgUnquoted | TokenKind::Command | TokenKind::Ident => {
                    let tok = self.advance();
                    args.push(Arg {
                        kind: ArgKind::Unquoted,
                        text: tok.text,
                        line: tok.line,
                        col: tok.col,
                    });
                }
                TokenKind::ArgQuoted => {
                    let tok = self.advance();
                    args.push(Arg {
                        kind: ArgKind::Quoted,
                        text: tok.text,
                        line: tok.line,
                        col: tok.col,
                    });
                }
                TokenKind::ArgBracket => {
                    let tok = self.advance();
                    args.push(Arg {
                        kind: ArgKind::Bracket,
                        text: tok.text,
                        line: tok.line,
                        col: tok.col,
                    });
                }
                TokenKind::Invalid => {
                    let tok = self.advance();
                    return Err(ParseError::Unexpected {
                        found: tok.text,
                        expected: "argument or ')'".to_string(),
                        line: tok.line,
                    });
                }
            }
        }

        Ok(CommandNode {
            name: name_tok.text,
            args,
            line: name_tok.line,
            col: name_tok.col,
        })
    }

    /// Consumes an `end*` command call and discards its (ignored) argument
    /// list.
    fn consume_end_command(&mut self, _expected: &str) -> Result<(), ParseError> {
        self.parse_command_call()?;
        Ok(())
    }

    fn parse_if(&mut self) -> Result<IfNode, ParseError> {
        let if_call = self.parse_command_call()?;
        let line = if_call.line;
        let body = self.parse_block_body("if", line, &["elseif", "else", "endif"])?;

        let mut clause = IfClause {
            condition: if_call.args,
            body,
            line,
        };
        let mut elseif_clauses = Vec::new();
        let mut else_block = None;

        loop {
            if self.is_command("elseif") {
                let call = self.parse_command_call()?;
                let elseif_line = call.line;
                let elseif_body =
                    self.parse_block_body("elseif", elseif_line, &["elseif", "else", "endif"])?;
                elseif_clauses.push(IfClause {
                    condition: call.args,
                    body: elseif_body,
                    line: elseif_line,
                });
                continue;
            }
            if self.is_command("else") {
                let call = self.parse_command_call()?;
                let else_line = call.line;
                let else_body = self.parse_block_body("else", else_line, &["endif"])?;
                else_block = Some(else_body);
                continue;
            }
            break;
        }

        self.consume_end_command("endif")?;

        // Stash the first clause's args back (they were moved into `clause`
        // above before we knew whether there'd be elseif/else branches).
        let _ = &mut clause;
        Ok(IfNode {
            clause,
            elseif_clauses,
            else_block,
        })
    }

    fn parse_foreach(&mut self) -> Result<ForeachNode, ParseError> {
        let call = self.parse_command_call()?;
        let line = call.line;
        let body = self.parse_block_body("foreach", line, &["endforeach"])?;
        self.consume_end_command("endforeach")?;
        Ok(ForeachNode {
            args: call.args,
            body,
            line,
        })
    }

    fn parse_while(&mut self) -> Result<WhileNode, ParseError> {
        let call = self.parse_command_call()?;
        let line = call.line;
        let body = self.parse_block_body("while", line, &["endwhile"])?;
        self.consume_end_command("endwhile")?;
        Ok(WhileNode {
            condition: call.args,
            body,
            line,
        })
    }

    fn parse_function(&mut self) -> Result<FunctionDefNode, ParseError> {
        let call = self.parse_command_call()?;
        let line = call.line;
        let mut args_iter = call.args.into_iter();
        let name = args_iter
            .next()
            .map(|a| arg_literal(&a))
            .unwrap_or_default();
        let params = args_iter.map(|a| arg_literal(&a)).collect();
        let body = self.parse_block_body("function", line, &["endfunction"])?;
        self.consume_end_command("endfunction")?;
        Ok(FunctionDefNode {
            name,
            params,
            body,
            line,
        })
    }

    fn parse_macro(&mut self) -> Result<MacroDefNode, ParseError> {
        let call = self.parse_command_call()?;
        let line = call.line;
        let mut args_iter = call.args.into_iter();
        let name = args_iter
            .next()
            .map(|a| arg_literal(&a))
            .unwrap_or_default();
        let params = args_iter.map(|a| arg_literal(&a)).collect();
        let body = self.parse_block_body("macro", line, &["endmacro"])?;
        self.consume_end_command("endmacro")?;
        Ok(MacroDefNode {
            name,
            params,
            body,
            line,
        })
    }
}

/// Strips quote/bracket framing from an argument's raw text, without
/// performing variable expansion, for contexts (function/macro signatures)
/// that need a bare literal at parse time.
fn arg_literal(arg: &Arg) -> String {
    match arg.kind {
        ArgKind::Quoted => arg
            .text
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(&arg.text)
            .to_string(),
        ArgKind::Bracket => arg.text.clone(),
        ArgKind::Unquoted => arg.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_command() {
        let script = parse("message(STATUS \"hi\")").unwrap();
        assert_eq!(script.statements.len(), 1);
        match &script.statements[0] {
            Node::Command(c) => {
                assert_eq!(c.name, "message");
                assert_eq!(c.args.len(), 2);
            }
            _ => panic!("expected command"),
        }
    }

    #[test]
    fn parses_if_elseif_else() {
        let script = parse(
            r#"
            if(A)
              message("a")
            elseif(B)
              message("b")
            else()
              message("c")
            endif()
            "#,
        )
        .unwrap();
        match &script.statements[0] {
            Node::If(ifnode) => {
                assert_eq!(ifnode.clause.body.len(), 1);
                assert_eq!(ifnode.elseif_clauses.len(), 1);
                assert!(ifnode.else_block.is_some());
            }
            _ => panic!("expected if"),
        }
    }

    #[test]
    fn parses_nested_parens_in_condition() {
        let script = parse("if((A))\nendif()").unwrap();
        match &script.statements[0] {
            Node::If(ifnode) => {
                let texts: Vec<&str> =
                    ifnode.clause.condition.iter().map(|a| a.text.as_str()).collect();
                assert_eq!(texts, vec!["(", "A", ")"]);
            }
            _ => panic!("expected if"),
        }
    }

    #[test]
    fn parses_foreach_while_function_macro() {
        let script = parse(
            r#"
            foreach(x IN LISTS Y)
            endforeach()
            while(TRUE)
            endwhile()
            function(f a b)
            endfunction()
            macro(m a b)
            endmacro()
            "#,
        )
        .unwrap();
        assert_eq!(script.statements.len(), 4);
        match &script.statements[2] {
            Node::FunctionDef(f) => {
                assert_eq!(f.name, "f");
                assert_eq!(f.params, vec!["a", "b"]);
            }
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn unmatched_endif_is_an_error() {
        let err = parse("endif()").unwrap_err();
        assert!(matches!(err, ParseError::UnmatchedBlockKeyword { .. }));
    }

    #[test]
    fn unterminated_if_block_is_an_error() {
        let err = parse("if(A)\nmessage(\"x\")").unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedBlock { .. }));
    }

    #[test]
    fn missing_paren_after_command_is_an_error() {
        let err = parse("message \"hi\"").unwrap_err();
        assert!(matches!(err, ParseError::ExpectedParenAfterCommand { .. }));
    }

    #[test]
    fn end_command_trailing_args_are_ignored() {
        let script = parse("function(f)\nendfunction(f)").unwrap();
        assert_eq!(script.statements.len(), 1);
    }
}
