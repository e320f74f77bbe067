//! Declaration grammar: objects, types, subprograms, packages, tasks,
//! generics, and the clauses that are parsed only to be discarded.

use super::expr::ExprParsing;
use super::stmt::StmtParsing;
use super::{PResult, Parser};
use crate::ast::{
    Assoc, Body, Component, Constraint, Decl, DeclKind, Expr, ExprKind, Param, ParamMode,
    SubpKind, SubpSpec, SubtypeInd, TypeDef,
};
use crate::intern::Symbol;
use crate::token::TokenKind;

pub trait DeclParsing<'a> {
    /// Parse one declaration. Returns `None` for representation clauses,
    /// which are recognized and dropped.
    fn parse_declaration(&mut self) -> PResult<Option<&'a Decl<'a>>>;
    fn parse_declarative_part(&mut self) -> PResult<Vec<&'a Decl<'a>>>;
    fn parse_formal_part(&mut self) -> PResult<Vec<Param<'a>>>;
    fn parse_subtype_indication(&mut self) -> PResult<&'a SubtypeInd<'a>>;
    fn parse_type_mark(&mut self) -> PResult<&'a Expr<'a>>;
}

fn starts_declaration(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Type
            | TokenKind::Subtype
            | TokenKind::Ident
            | TokenKind::Procedure
            | TokenKind::Function
            | TokenKind::Package
            | TokenKind::Task
            | TokenKind::For
            | TokenKind::Use
            | TokenKind::Pragma
            | TokenKind::Generic
    )
}

impl<'a, 'i> DeclParsing<'a> for Parser<'a, 'i> {
    fn parse_declaration(&mut self) -> PResult<Option<&'a Decl<'a>>> {
        match self.cur().kind {
            TokenKind::Type => self.parse_type_decl().map(Some),
            TokenKind::Subtype => self.parse_subtype_decl().map(Some),
            TokenKind::Ident => self.parse_object_decl().map(Some),
            TokenKind::Procedure | TokenKind::Function => self.parse_subprogram().map(Some),
            TokenKind::Package => self.parse_package().map(Some),
            TokenKind::Task => self.parse_task().map(Some),
            TokenKind::Use => self.parse_use_clause().map(Some),
            TokenKind::Pragma => self.parse_pragma().map(Some),
            TokenKind::Generic => self.parse_generic().map(Some),
            TokenKind::For => {
                self.skip_representation_clause()?;
                Ok(None)
            }
            found => Err(self.fatal(format!(
                "declaration expected, found {}",
                found.describe()
            ))),
        }
    }

    fn parse_declarative_part(&mut self) -> PResult<Vec<&'a Decl<'a>>> {
        let mut decls = Vec::new();
        while starts_declaration(self.cur().kind) {
            if let Some(decl) = self.parse_declaration()? {
                decls.push(decl);
            }
            decls.append(&mut self.pending_decls);
        }
        Ok(decls)
    }

    /// formal-part ::= ( param {; param} )
    /// param ::= id {, id} : [in] [out] type-mark [:= default]
    fn parse_formal_part(&mut self) -> PResult<Vec<Param<'a>>> {
        let mut params = Vec::new();
        self.expect(TokenKind::LParen)?;
        loop {
            let mut names = vec![self.expect_ident()?];
            while self.match_(TokenKind::Comma)? {
                names.push(self.expect_ident()?);
            }
            self.expect(TokenKind::Colon)?;
            let mode = self.parse_mode()?;
            let mark = self.parse_type_mark()?;
            let default = if self.match_(TokenKind::Assign)? {
                Some(self.parse_expression()?)
            } else {
                None
            };
            for (name, loc) in names {
                params.push(Param {
                    loc,
                    name,
                    mode,
                    mark,
                    default,
                    sym: std::cell::Cell::new(None),
                });
            }
            if !self.match_(TokenKind::Semi)? {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    /// subtype-indication ::= type-mark [constraint]
    fn parse_subtype_indication(&mut self) -> PResult<&'a SubtypeInd<'a>> {
        let loc = self.loc();
        let mark = self.parse_type_mark()?;
        let constraint = match self.cur().kind {
            TokenKind::Range => {
                self.advance()?;
                Some(Constraint::Range(self.parse_discrete_range()?))
            }
            TokenKind::Digits => {
                self.advance()?;
                let digits = self.parse_simple_expression()?;
                let range = if self.match_(TokenKind::Range)? {
                    Some(self.parse_discrete_range()?)
                } else {
                    None
                };
                Some(Constraint::Digits(digits, range))
            }
            TokenKind::Delta => {
                self.advance()?;
                let delta = self.parse_simple_expression()?;
                let range = if self.match_(TokenKind::Range)? {
                    Some(self.parse_discrete_range()?)
                } else {
                    None
                };
                Some(Constraint::Delta(delta, range))
            }
            TokenKind::LParen => {
                self.advance()?;
                let items = self.parse_assoc_list()?;
                self.expect(TokenKind::RParen)?;
                if items.iter().all(|a| a.choices.is_empty()) {
                    let exprs: Vec<&'a Expr<'a>> = items.iter().map(|a| a.value).collect();
                    Some(Constraint::Index(self.ctx.exprs(exprs)))
                } else {
                    Some(Constraint::Discriminant(self.ctx.assocs(items)))
                }
            }
            _ => None,
        };
        Ok(self.ctx.subtype_ind(SubtypeInd { loc, mark, constraint }))
    }

    /// A type mark is a name without call or constraint suffixes: only
    /// selection and attributes chain onto it.
    fn parse_type_mark(&mut self) -> PResult<&'a Expr<'a>> {
        let (ident, loc) = self.expect_ident()?;
        let mut e = self.ctx.expr(loc, ExprKind::Ident(ident));
        loop {
            match self.cur().kind {
                TokenKind::Dot => {
                    self.advance()?;
                    let (selector, _) = self.expect_ident()?;
                    e = self.ctx.expr(loc, ExprKind::Selected { prefix: e, selector });
                }
                TokenKind::Tick => {
                    self.advance()?;
                    let designator = match self.cur().kind {
                        TokenKind::Ident | TokenKind::Range => self.cur().text,
                        found => {
                            return Err(self.fatal(format!(
                                "attribute designator expected, found {}",
                                found.describe()
                            )))
                        }
                    };
                    self.advance()?;
                    e = self.ctx.expr(
                        loc,
                        ExprKind::Attribute {
                            prefix: e,
                            designator,
                            args: self.ctx.exprs(Vec::new()),
                        },
                    );
                }
                _ => break,
            }
        }
        Ok(e)
    }
}

impl<'a, 'i> Parser<'a, 'i> {
    fn parse_mode(&mut self) -> PResult<ParamMode> {
        let saw_in = self.match_(TokenKind::In)?;
        let saw_out = self.match_(TokenKind::Out)?;
        Ok(match (saw_in, saw_out) {
            (true, true) => ParamMode::InOut,
            (false, true) => ParamMode::Out,
            _ => ParamMode::In,
        })
    }

    /// object-declaration, number declaration, exception declaration, and
    /// object renaming all start `id {, id} :` and are told apart after
    /// the colon. Identifier lists expand to one node per name.
    fn parse_object_decl(&mut self) -> PResult<&'a Decl<'a>> {
        let mut names = vec![self.expect_ident()?];
        while self.match_(TokenKind::Comma)? {
            names.push(self.expect_ident()?);
        }
        self.expect(TokenKind::Colon)?;

        if self.match_(TokenKind::Exception)? {
            self.expect(TokenKind::Semi)?;
            return Ok(self.expand(names, |name| DeclKind::ExceptionDecl { name }));
        }

        let constant = self.match_(TokenKind::Constant)?;
        if constant && self.check(TokenKind::Assign) {
            // Named number: no subtype mark at all.
            self.advance()?;
            let value = self.parse_expression()?;
            self.expect(TokenKind::Semi)?;
            return Ok(self.expand(names, |name| DeclKind::Number { name, value }));
        }

        if self.check(TokenKind::Array) {
            return Err(self.fatal("anonymous array types are not supported; declare a named type"));
        }

        // Generic formal objects may spell a mode before the mark.
        let _ = self.parse_mode()?;
        let ind = self.parse_subtype_indication()?;
        if self.match_(TokenKind::Renames)? {
            let target = self.parse_name()?;
            self.expect(TokenKind::Semi)?;
            return Ok(self.expand(names, |name| DeclKind::ObjectRename {
                name,
                mark: ind.mark,
                target,
            }));
        }
        let init = if self.match_(TokenKind::Assign)? {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semi)?;
        Ok(self.expand(names, |name| DeclKind::Object {
            name,
            constant,
            ind,
            init,
        }))
    }

    /// Allocate one declaration per listed identifier. The first is
    /// returned; the rest land in `pending_decls`, which the declarative
    /// part drains right after.
    fn expand(
        &mut self,
        names: Vec<(Symbol, crate::diag::SourceLoc)>,
        build: impl Fn(Symbol) -> DeclKind<'a>,
    ) -> &'a Decl<'a> {
        debug_assert!(!names.is_empty());
        let mut first = None;
        for (name, loc) in names {
            let decl = self.ctx.decl(loc, build(name));
            if first.is_none() {
                first = Some(decl);
            } else {
                self.pending_decls.push(decl);
            }
        }
        first.unwrap()
    }

    fn parse_type_decl(&mut self) -> PResult<&'a Decl<'a>> {
        self.expect(TokenKind::Type)?;
        let (name, loc) = self.expect_ident()?;

        let discriminants = if self.check(TokenKind::LParen) {
            self.parse_discriminant_part()?
        } else {
            Vec::new()
        };

        if self.match_(TokenKind::Semi)? {
            return Ok(self.ctx.decl(
                loc,
                DeclKind::Type {
                    name,
                    discriminants: self.ctx.components(discriminants),
                    def: TypeDef::Incomplete,
                },
            ));
        }

        self.expect(TokenKind::Is)?;
        let def = self.parse_type_def()?;
        self.expect(TokenKind::Semi)?;
        Ok(self.ctx.decl(
            loc,
            DeclKind::Type {
                name,
                discriminants: self.ctx.components(discriminants),
                def,
            },
        ))
    }

    fn parse_type_def(&mut self) -> PResult<TypeDef<'a>> {
        match self.cur().kind {
            TokenKind::LParen => {
                self.advance()?;
                let mut literals = Vec::new();
                loop {
                    match self.cur().kind {
                        TokenKind::Ident | TokenKind::CharLit => {
                            literals.push((self.cur().text, self.cur().loc));
                            self.advance()?;
                        }
                        found => {
                            return Err(self.fatal(format!(
                                "enumeration literal expected, found {}",
                                found.describe()
                            )))
                        }
                    }
                    if !self.match_(TokenKind::Comma)? {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                Ok(TypeDef::Enumeration {
                    literals: self.ctx.literals(literals),
                })
            }
            TokenKind::Range => {
                self.advance()?;
                let range = self.parse_discrete_range()?;
                Ok(TypeDef::Integer { range: Some(range) })
            }
            TokenKind::Digits => {
                self.advance()?;
                let digits = self.parse_simple_expression()?;
                let range = if self.match_(TokenKind::Range)? {
                    Some(self.parse_discrete_range()?)
                } else {
                    None
                };
                Ok(TypeDef::Float { digits, range })
            }
            TokenKind::Delta => {
                self.advance()?;
                let delta = self.parse_simple_expression()?;
                let range = if self.match_(TokenKind::Range)? {
                    Some(self.parse_discrete_range()?)
                } else {
                    None
                };
                Ok(TypeDef::Fixed { delta, range })
            }
            TokenKind::Array => self.parse_array_def(),
            TokenKind::Record => self.parse_record_def(),
            TokenKind::Access => {
                self.advance()?;
                let designated = self.parse_subtype_indication()?;
                Ok(TypeDef::Access { designated })
            }
            TokenKind::Private => {
                self.advance()?;
                Ok(TypeDef::Private { limited: false })
            }
            TokenKind::Limited => {
                self.advance()?;
                self.expect(TokenKind::Private)?;
                Ok(TypeDef::Private { limited: true })
            }
            TokenKind::New => {
                self.advance()?;
                let parent = self.parse_subtype_indication()?;
                Ok(TypeDef::Derived { parent })
            }
            found => Err(self.fatal(format!(
                "type definition expected, found {}",
                found.describe()
            ))),
        }
    }

    /// array (index {, index}) of component-subtype
    ///
    /// An index is a discrete range, a type mark, a constrained mark
    /// (`C range 'a' .. 'z'`), or the unconstrained box (`mark range <>`).
    fn parse_array_def(&mut self) -> PResult<TypeDef<'a>> {
        self.expect(TokenKind::Array)?;
        self.expect(TokenKind::LParen)?;
        let mut indexes = Vec::new();
        let mut unconstrained = false;
        loop {
            let loc = self.loc();
            let low = self.parse_simple_expression()?;
            if self.match_(TokenKind::DotDot)? {
                let high = self.parse_simple_expression()?;
                indexes.push(self.ctx.expr(loc, ExprKind::Range { low, high }));
            } else if self.match_(TokenKind::Range)? {
                if self.match_(TokenKind::Box)? {
                    unconstrained = true;
                    indexes.push(low);
                } else {
                    let range = self.parse_discrete_range()?;
                    indexes.push(range);
                }
            } else {
                indexes.push(low);
            }
            if !self.match_(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Of)?;
        let elem = self.parse_subtype_indication()?;
        Ok(TypeDef::Array {
            indexes: self.ctx.exprs(indexes),
            unconstrained,
            elem,
        })
    }

    fn parse_record_def(&mut self) -> PResult<TypeDef<'a>> {
        self.expect(TokenKind::Record)?;
        let mut components = Vec::new();
        loop {
            match self.cur().kind {
                TokenKind::End => break,
                TokenKind::Null => {
                    self.advance()?;
                    self.expect(TokenKind::Semi)?;
                }
                TokenKind::Case => {
                    return Err(self.fatal("variant parts are not supported"));
                }
                _ => {
                    let mut names = vec![self.expect_ident()?];
                    while self.match_(TokenKind::Comma)? {
                        names.push(self.expect_ident()?);
                    }
                    self.expect(TokenKind::Colon)?;
                    let ind = self.parse_subtype_indication()?;
                    let init = if self.match_(TokenKind::Assign)? {
                        Some(self.parse_expression()?)
                    } else {
                        None
                    };
                    self.expect(TokenKind::Semi)?;
                    for (name, loc) in names {
                        components.push(Component { loc, name, ind, init });
                    }
                }
            }
        }
        self.expect(TokenKind::End)?;
        self.expect(TokenKind::Record)?;
        Ok(TypeDef::Record {
            components: self.ctx.components(components),
        })
    }

    fn parse_discriminant_part(&mut self) -> PResult<Vec<Component<'a>>> {
        self.expect(TokenKind::LParen)?;
        let mut discriminants = Vec::new();
        loop {
            let mut names = vec![self.expect_ident()?];
            while self.match_(TokenKind::Comma)? {
                names.push(self.expect_ident()?);
            }
            self.expect(TokenKind::Colon)?;
            let ind = self.parse_subtype_indication()?;
            let init = if self.match_(TokenKind::Assign)? {
                Some(self.parse_expression()?)
            } else {
                None
            };
            for (name, loc) in names {
                discriminants.push(Component { loc, name, ind, init });
            }
            if !self.match_(TokenKind::Semi)? {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(discriminants)
    }

    fn parse_subtype_decl(&mut self) -> PResult<&'a Decl<'a>> {
        self.expect(TokenKind::Subtype)?;
        let (name, loc) = self.expect_ident()?;
        self.expect(TokenKind::Is)?;
        let ind = self.parse_subtype_indication()?;
        self.expect(TokenKind::Semi)?;
        Ok(self.ctx.decl(loc, DeclKind::Subtype { name, ind }))
    }

    /// subprogram-declaration, body, renaming, stub, or instantiation.
    pub(super) fn parse_subprogram(&mut self) -> PResult<&'a Decl<'a>> {
        let spec = self.parse_subp_spec()?;
        let loc = spec.loc;
        let name = spec.name;

        if self.match_(TokenKind::Semi)? {
            return Ok(self.ctx.decl(
                loc,
                DeclKind::Subprogram {
                    spec,
                    body: None,
                    renames: None,
                    separate: false,
                    instance_of: None,
                },
            ));
        }

        if self.match_(TokenKind::Renames)? {
            let target = self.parse_name()?;
            self.expect(TokenKind::Semi)?;
            return Ok(self.ctx.decl(
                loc,
                DeclKind::Subprogram {
                    spec,
                    body: None,
                    renames: Some(target),
                    separate: false,
                    instance_of: None,
                },
            ));
        }

        self.expect(TokenKind::Is)?;

        if self.match_(TokenKind::New)? {
            let (generic, actuals) = self.parse_instantiation_target()?;
            self.expect(TokenKind::Semi)?;
            return Ok(self.ctx.decl(
                loc,
                DeclKind::Subprogram {
                    spec,
                    body: None,
                    renames: None,
                    separate: false,
                    instance_of: Some((generic, actuals)),
                },
            ));
        }

        if self.match_(TokenKind::Separate)? {
            self.expect(TokenKind::Semi)?;
            return Ok(self.ctx.decl(
                loc,
                DeclKind::Subprogram {
                    spec,
                    body: None,
                    renames: None,
                    separate: true,
                    instance_of: None,
                },
            ));
        }

        let body = self.parse_body_tail(name)?;
        Ok(self.ctx.decl(
            loc,
            DeclKind::Subprogram {
                spec,
                body: Some(body),
                renames: None,
                separate: false,
                instance_of: None,
            },
        ))
    }

    fn parse_subp_spec(&mut self) -> PResult<SubpSpec<'a>> {
        let kind = if self.match_(TokenKind::Procedure)? {
            SubpKind::Procedure
        } else {
            self.expect(TokenKind::Function)?;
            SubpKind::Function
        };
        let loc = self.loc();
        let name = match self.cur().kind {
            TokenKind::Ident => {
                let name = self.cur().text;
                self.advance()?;
                name
            }
            // Operator designator: function "+" (L, R : T) return T.
            TokenKind::StrLit => {
                let name = self.cur().sval;
                self.advance()?;
                name
            }
            found => {
                return Err(self.fatal(format!(
                    "subprogram designator expected, found {}",
                    found.describe()
                )))
            }
        };
        let params = if self.check(TokenKind::LParen) {
            self.parse_formal_part()?
        } else {
            Vec::new()
        };
        // Instantiations (`function F is new G (...)`) carry no profile,
        // so the return part is optional even for functions.
        let ret = if kind == SubpKind::Function && self.match_(TokenKind::Return)? {
            Some(self.parse_type_mark()?)
        } else {
            None
        };
        Ok(SubpSpec {
            loc,
            name,
            kind,
            params: self.ctx.params(params),
            ret,
        })
    }

    /// declarative part, `begin`, statements, optional handlers, `end`.
    pub(super) fn parse_body_tail(&mut self, name: Symbol) -> PResult<&'a Body<'a>> {
        let decls = self.parse_declarative_part()?;
        self.expect(TokenKind::Begin)?;
        let stmts = self.parse_sequence()?;
        let handlers = if self.match_(TokenKind::Exception)? {
            self.parse_handlers()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::End)?;
        self.end_designator(name)?;
        self.expect(TokenKind::Semi)?;
        Ok(self.ctx.body(Body {
            decls: self.ctx.decls(decls),
            stmts: self.ctx.stmts(stmts),
            handlers: self.ctx.handlers(handlers),
        }))
    }

    fn parse_package(&mut self) -> PResult<&'a Decl<'a>> {
        self.expect(TokenKind::Package)?;

        if self.match_(TokenKind::Body)? {
            let (name, loc) = self.expect_ident()?;
            self.expect(TokenKind::Is)?;
            let decls = self.parse_declarative_part()?;
            let (stmts, handlers) = if self.match_(TokenKind::Begin)? {
                let stmts = self.parse_sequence()?;
                let handlers = if self.match_(TokenKind::Exception)? {
                    self.parse_handlers()?
                } else {
                    Vec::new()
                };
                (stmts, handlers)
            } else {
                (Vec::new(), Vec::new())
            };
            self.expect(TokenKind::End)?;
            self.end_designator(name)?;
            self.expect(TokenKind::Semi)?;
            let body = self.ctx.body(Body {
                decls: self.ctx.decls(decls),
                stmts: self.ctx.stmts(stmts),
                handlers: self.ctx.handlers(handlers),
            });
            return Ok(self.ctx.decl(
                loc,
                DeclKind::Package {
                    name,
                    is_body: true,
                    visible: self.ctx.decls(Vec::new()),
                    private_part: self.ctx.decls(Vec::new()),
                    body: Some(body),
                    renames: None,
                    instance_of: None,
                },
            ));
        }

        let (name, loc) = self.expect_ident()?;

        if self.match_(TokenKind::Renames)? {
            let target = self.parse_name()?;
            self.expect(TokenKind::Semi)?;
            return Ok(self.ctx.decl(
                loc,
                DeclKind::Package {
                    name,
                    is_body: false,
                    visible: self.ctx.decls(Vec::new()),
                    private_part: self.ctx.decls(Vec::new()),
                    body: None,
                    renames: Some(target),
                    instance_of: None,
                },
            ));
        }

        self.expect(TokenKind::Is)?;

        if self.match_(TokenKind::New)? {
            let (generic, actuals) = self.parse_instantiation_target()?;
            self.expect(TokenKind::Semi)?;
            return Ok(self.ctx.decl(
                loc,
                DeclKind::Package {
                    name,
                    is_body: false,
                    visible: self.ctx.decls(Vec::new()),
                    private_part: self.ctx.decls(Vec::new()),
                    body: None,
                    renames: None,
                    instance_of: Some((generic, actuals)),
                },
            ));
        }

        let visible = self.parse_declarative_part()?;
        let private_part = if self.match_(TokenKind::Private)? {
            self.parse_declarative_part()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::End)?;
        self.end_designator(name)?;
        self.expect(TokenKind::Semi)?;
        Ok(self.ctx.decl(
            loc,
            DeclKind::Package {
                name,
                is_body: false,
                visible: self.ctx.decls(visible),
                private_part: self.ctx.decls(private_part),
                body: None,
                renames: None,
                instance_of: None,
            },
        ))
    }

    fn parse_task(&mut self) -> PResult<&'a Decl<'a>> {
        self.expect(TokenKind::Task)?;

        if self.match_(TokenKind::Body)? {
            let (name, loc) = self.expect_ident()?;
            self.expect(TokenKind::Is)?;
            let body = self.parse_body_tail(name)?;
            return Ok(self.ctx.decl(
                loc,
                DeclKind::Task {
                    name,
                    is_type: false,
                    entries: self.ctx.decls(Vec::new()),
                    body: Some(body),
                },
            ));
        }

        let is_type = self.match_(TokenKind::Type)?;
        let (name, loc) = self.expect_ident()?;

        if self.match_(TokenKind::Semi)? {
            return Ok(self.ctx.decl(
                loc,
                DeclKind::Task {
                    name,
                    is_type,
                    entries: self.ctx.decls(Vec::new()),
                    body: None,
                },
            ));
        }

        self.expect(TokenKind::Is)?;
        let mut entries = Vec::new();
        while self.check(TokenKind::Entry) {
            let entry_loc = self.loc();
            self.advance()?;
            let (entry_name, _) = self.expect_ident()?;
            let params = if self.check(TokenKind::LParen) {
                self.parse_formal_part()?
            } else {
                Vec::new()
            };
            self.expect(TokenKind::Semi)?;
            entries.push(self.ctx.decl(
                entry_loc,
                DeclKind::Entry {
                    name: entry_name,
                    params: self.ctx.params(params),
                },
            ));
        }
        self.expect(TokenKind::End)?;
        self.end_designator(name)?;
        self.expect(TokenKind::Semi)?;
        Ok(self.ctx.decl(
            loc,
            DeclKind::Task {
                name,
                is_type,
                entries: self.ctx.decls(entries),
                body: None,
            },
        ))
    }

    fn parse_use_clause(&mut self) -> PResult<&'a Decl<'a>> {
        let loc = self.loc();
        self.expect(TokenKind::Use)?;
        let mut names = vec![self.parse_name()?];
        while self.match_(TokenKind::Comma)? {
            names.push(self.parse_name()?);
        }
        self.expect(TokenKind::Semi)?;
        Ok(self.ctx.decl(
            loc,
            DeclKind::UseClause {
                names: self.ctx.exprs(names),
            },
        ))
    }

    fn parse_pragma(&mut self) -> PResult<&'a Decl<'a>> {
        let loc = self.loc();
        self.expect(TokenKind::Pragma)?;
        let (name, _) = self.expect_ident()?;
        let args = if self.check(TokenKind::LParen) {
            self.advance()?;
            let items = self.parse_assoc_list()?;
            self.expect(TokenKind::RParen)?;
            items
        } else {
            Vec::new()
        };
        self.expect(TokenKind::Semi)?;
        Ok(self.ctx.decl(
            loc,
            DeclKind::Pragma {
                name,
                args: self.ctx.assocs(args),
            },
        ))
    }

    fn parse_generic(&mut self) -> PResult<&'a Decl<'a>> {
        let loc = self.loc();
        self.expect(TokenKind::Generic)?;
        let mut formals = Vec::new();
        loop {
            match self.cur().kind {
                TokenKind::Ident => {
                    formals.push(self.parse_object_decl()?);
                    formals.append(&mut self.pending_decls);
                }
                TokenKind::Type => {
                    formals.push(self.parse_generic_type_formal()?);
                }
                TokenKind::With => {
                    self.advance()?;
                    let spec = self.parse_subp_spec()?;
                    let formal_loc = spec.loc;
                    self.expect(TokenKind::Semi)?;
                    formals.push(self.ctx.decl(
                        formal_loc,
                        DeclKind::Subprogram {
                            spec,
                            body: None,
                            renames: None,
                            separate: false,
                            instance_of: None,
                        },
                    ));
                }
                _ => break,
            }
        }
        let inner = match self.cur().kind {
            TokenKind::Procedure | TokenKind::Function => self.parse_subprogram()?,
            TokenKind::Package => self.parse_package()?,
            found => {
                return Err(self.fatal(format!(
                    "generic subprogram or package expected, found {}",
                    found.describe()
                )))
            }
        };
        Ok(self.ctx.decl(
            loc,
            DeclKind::Generic {
                formals: self.ctx.decls(formals),
                inner,
            },
        ))
    }

    /// Generic formal types: the box forms all parse to an incomplete
    /// definition, since generics are never elaborated.
    fn parse_generic_type_formal(&mut self) -> PResult<&'a Decl<'a>> {
        self.expect(TokenKind::Type)?;
        let (name, loc) = self.expect_ident()?;
        self.expect(TokenKind::Is)?;
        match self.cur().kind {
            TokenKind::LParen => {
                // (<>) discrete formal
                self.advance()?;
                self.expect(TokenKind::Box)?;
                self.expect(TokenKind::RParen)?;
            }
            TokenKind::Range => {
                self.advance()?;
                self.expect(TokenKind::Box)?;
            }
            TokenKind::Digits => {
                self.advance()?;
                self.expect(TokenKind::Box)?;
            }
            TokenKind::Delta => {
                self.advance()?;
                self.expect(TokenKind::Box)?;
            }
            TokenKind::Private => {
                self.advance()?;
            }
            TokenKind::Limited => {
                self.advance()?;
                self.expect(TokenKind::Private)?;
            }
            TokenKind::Array => {
                let _ = self.parse_array_def()?;
            }
            TokenKind::Access => {
                self.advance()?;
                let _ = self.parse_subtype_indication()?;
            }
            found => {
                return Err(self.fatal(format!(
                    "generic type definition expected, found {}",
                    found.describe()
                )))
            }
        }
        self.expect(TokenKind::Semi)?;
        Ok(self.ctx.decl(
            loc,
            DeclKind::Type {
                name,
                discriminants: self.ctx.components(Vec::new()),
                def: TypeDef::Incomplete,
            },
        ))
    }

    /// `new generic-name [(actuals)]` — the name parser folds the actuals
    /// into a call node, which is split back apart here.
    fn parse_instantiation_target(&mut self) -> PResult<(&'a Expr<'a>, &'a [Assoc<'a>])> {
        let name = self.parse_name()?;
        match name.kind {
            ExprKind::Call { callee, args, .. } => Ok((callee, args)),
            _ => Ok((name, self.ctx.assocs(Vec::new()))),
        }
    }

    /// `for name use ...;` — representation clauses parse and vanish.
    fn skip_representation_clause(&mut self) -> PResult<()> {
        self.expect(TokenKind::For)?;
        let _ = self.parse_name()?;
        self.expect(TokenKind::Use)?;
        if self.check(TokenKind::Record) {
            self.advance()?;
            // Skim component clauses without interpreting them.
            let mut depth = 1;
            while depth > 0 {
                match self.cur().kind {
                    TokenKind::Record => depth += 1,
                    TokenKind::End => {
                        self.advance()?;
                        self.expect(TokenKind::Record)?;
                        depth -= 1;
                        continue;
                    }
                    TokenKind::Eof => return Err(self.fatal("unterminated record clause")),
                    _ => {}
                }
                self.advance()?;
            }
        } else {
            let _ = self.match_(TokenKind::At)?;
            let _ = self.parse_expression()?;
        }
        self.expect(TokenKind::Semi)?;
        Ok(())
    }
}
