//! Generic CFG lifting.
//!
//! Extractors lower a function body to a list of `Stmt` values; the lifter
//! turns that into blocks and edges with exactly one entry and one exit
//! per function. Language walkers stay thin; the shape logic lives here
//! once.

use super::payload::{BlockKind, CfgBlockRecord, CfgEdgeKind, CfgEdgeRecord, CfgRecord};

/// Simplified statement view for CFG purposes.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: i64,
    pub end_line: i64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Simple,
    Return,
    If {
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    Loop {
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<Vec<Stmt>>,
        finally: Vec<Stmt>,
    },
}

struct Lifter {
    function: String,
    blocks: Vec<CfgBlockRecord>,
    edges: Vec<CfgEdgeRecord>,
    exit_id: i64,
}

/// A fall-through point: the block control reaches next, plus the edge
/// type its outgoing edge must carry (loop/condition exits carry `false`).
#[derive(Clone, Copy)]
struct Pred {
    block: i64,
    edge: CfgEdgeKind,
}

impl Lifter {
    fn block(&mut self, kind: BlockKind, start: i64, end: i64) -> i64 {
        let id = self.blocks.len() as i64;
        self.blocks.push(CfgBlockRecord {
            local_id: id,
            function: self.function.clone(),
            kind,
            start_line: start,
            end_line: end,
            statements: Vec::new(),
        });
        id
    }

    fn edge(&mut self, source: i64, target: i64, kind: CfgEdgeKind) {
        self.edges.push(CfgEdgeRecord {
            source,
            target,
            kind,
        });
    }

    fn connect(&mut self, pred: Pred, target: i64) {
        self.edge(pred.block, target, pred.edge);
    }

    /// Lower a statement list. Returns the fall-through point, or None when
    /// every path returned.
    fn lower(&mut self, stmts: &[Stmt], entry: Pred) -> Option<Pred> {
        let mut pred = Some(entry);
        let mut current_basic: Option<i64> = None;

        for stmt in stmts {
            let Some(p) = pred else {
                // Unreachable code after a return; stop lowering.
                break;
            };
            match &stmt.kind {
                StmtKind::Simple => {
                    let block = match current_basic {
                        Some(b) => {
                            self.blocks[b as usize].end_line = stmt.end_line;
                            b
                        }
                        None => {
                            let b = self.block(BlockKind::Basic, stmt.line, stmt.end_line);
                            self.connect(p, b);
                            current_basic = Some(b);
                            pred = Some(Pred {
                                block: b,
                                edge: CfgEdgeKind::Normal,
                            });
                            b
                        }
                    };
                    self.blocks[block as usize].statements.push(stmt.text.clone());
                }
                StmtKind::Return => {
                    current_basic = None;
                    let b = self.block(BlockKind::Return, stmt.line, stmt.end_line);
                    self.blocks[b as usize].statements.push(stmt.text.clone());
                    self.connect(p, b);
                    self.edge(b, self.exit_id, CfgEdgeKind::Normal);
                    pred = None;
                }
                StmtKind::If {
                    then_branch,
                    else_branch,
                } => {
                    current_basic = None;
                    let cond = self.block(BlockKind::Condition, stmt.line, stmt.line);
                    self.connect(p, cond);

                    let then_exit = self.lower(
                        then_branch,
                        Pred {
                            block: cond,
                            edge: CfgEdgeKind::True,
                        },
                    );
                    let else_exit = if else_branch.is_empty() {
                        Some(Pred {
                            block: cond,
                            edge: CfgEdgeKind::False,
                        })
                    } else {
                        self.lower(
                            else_branch,
                            Pred {
                                block: cond,
                                edge: CfgEdgeKind::False,
                            },
                        )
                    };

                    pred = match (then_exit, else_exit) {
                        (None, None) => None,
                        (a, b) => {
                            let merge = self.block(BlockKind::Merge, stmt.end_line, stmt.end_line);
                            if let Some(x) = a {
                                self.connect(x, merge);
                            }
                            if let Some(x) = b {
                                self.connect(x, merge);
                            }
                            Some(Pred {
                                block: merge,
                                edge: CfgEdgeKind::Normal,
                            })
                        }
                    };
                }
                StmtKind::Loop { body } => {
                    current_basic = None;
                    let cond = self.block(BlockKind::LoopCondition, stmt.line, stmt.line);
                    self.connect(p, cond);
                    let body_entry = self.block(BlockKind::LoopBody, stmt.line, stmt.end_line);
                    self.edge(cond, body_entry, CfgEdgeKind::True);
                    let body_exit = self.lower(
                        body,
                        Pred {
                            block: body_entry,
                            edge: CfgEdgeKind::Normal,
                        },
                    );
                    if let Some(x) = body_exit {
                        self.edge(x.block, cond, CfgEdgeKind::BackEdge);
                    }
                    pred = Some(Pred {
                        block: cond,
                        edge: CfgEdgeKind::False,
                    });
                }
                StmtKind::Try {
                    body,
                    handlers,
                    finally,
                } => {
                    current_basic = None;
                    let try_block = self.block(BlockKind::Try, stmt.line, stmt.line);
                    self.connect(p, try_block);
                    let body_exit = self.lower(
                        body,
                        Pred {
                            block: try_block,
                            edge: CfgEdgeKind::Normal,
                        },
                    );

                    let mut exits: Vec<Pred> = body_exit.into_iter().collect();
                    for handler in handlers {
                        let except = self.block(BlockKind::Except, stmt.line, stmt.end_line);
                        self.edge(try_block, except, CfgEdgeKind::Exception);
                        let handler_exit = self.lower(
                            handler,
                            Pred {
                                block: except,
                                edge: CfgEdgeKind::Normal,
                            },
                        );
                        exits.extend(handler_exit);
                    }

                    if !finally.is_empty() {
                        let fin = self.block(BlockKind::Finally, stmt.end_line, stmt.end_line);
                        for x in &exits {
                            self.connect(*x, fin);
                        }
                        let fin_exit = self.lower(
                            finally,
                            Pred {
                                block: fin,
                                edge: CfgEdgeKind::Normal,
                            },
                        );
                        pred = fin_exit;
                    } else {
                        pred = match exits.len() {
                            0 => None,
                            1 => Some(exits[0]),
                            _ => {
                                let merge =
                                    self.block(BlockKind::Merge, stmt.end_line, stmt.end_line);
                                for x in &exits {
                                    self.connect(*x, merge);
                                }
                                Some(Pred {
                                    block: merge,
                                    edge: CfgEdgeKind::Normal,
                                })
                            }
                        };
                    }
                }
            }
            if !matches!(stmt.kind, StmtKind::Simple) {
                current_basic = None;
            }
        }
        pred
    }
}

/// Lift a function body into a CFG with exactly one entry and one exit.
pub fn lift(function: &str, start_line: i64, end_line: i64, body: &[Stmt]) -> CfgRecord {
    let mut lifter = Lifter {
        function: function.to_string(),
        blocks: Vec::new(),
        edges: Vec::new(),
        exit_id: 0,
    };
    let entry = lifter.block(BlockKind::Entry, start_line, start_line);
    let exit = lifter.block(BlockKind::Exit, end_line, end_line);
    lifter.exit_id = exit;

    let fall_through = lifter.lower(
        body,
        Pred {
            block: entry,
            edge: CfgEdgeKind::Normal,
        },
    );
    if let Some(p) = fall_through {
        lifter.connect(p, exit);
    }
    if body.is_empty() {
        lifter.edge(entry, exit, CfgEdgeKind::Normal);
    }

    CfgRecord {
        blocks: lifter.blocks,
        edges: lifter.edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(line: i64, text: &str) -> Stmt {
        Stmt {
            kind: StmtKind::Simple,
            line,
            end_line: line,
            text: text.to_string(),
        }
    }

    fn count_kind(cfg: &CfgRecord, kind: BlockKind) -> usize {
        cfg.blocks.iter().filter(|b| b.kind == kind).count()
    }

    #[test]
    fn one_entry_one_exit_always() {
        let cfg = lift("f", 1, 10, &[simple(2, "a = 1"), simple(3, "b = a")]);
        assert_eq!(count_kind(&cfg, BlockKind::Entry), 1);
        assert_eq!(count_kind(&cfg, BlockKind::Exit), 1);

        let empty = lift("g", 1, 2, &[]);
        assert_eq!(count_kind(&empty, BlockKind::Entry), 1);
        assert_eq!(count_kind(&empty, BlockKind::Exit), 1);
        assert_eq!(empty.edges.len(), 1);
    }

    #[test]
    fn if_produces_condition_and_merge() {
        let body = vec![Stmt {
            kind: StmtKind::If {
                then_branch: vec![simple(3, "x = 1")],
                else_branch: vec![simple(5, "x = 2")],
            },
            line: 2,
            end_line: 6,
            text: "if c:".to_string(),
        }];
        let cfg = lift("f", 1, 7, &body);
        assert_eq!(count_kind(&cfg, BlockKind::Condition), 1);
        assert_eq!(count_kind(&cfg, BlockKind::Merge), 1);
        assert!(cfg
            .edges
            .iter()
            .any(|e| matches!(e.kind, CfgEdgeKind::True)));
        assert!(cfg
            .edges
            .iter()
            .any(|e| matches!(e.kind, CfgEdgeKind::False)));
    }

    #[test]
    fn loop_produces_back_edge() {
        let body = vec![Stmt {
            kind: StmtKind::Loop {
                body: vec![simple(3, "total += i")],
            },
            line: 2,
            end_line: 4,
            text: "for i in xs:".to_string(),
        }];
        let cfg = lift("f", 1, 5, &body);
        assert_eq!(count_kind(&cfg, BlockKind::LoopCondition), 1);
        assert_eq!(count_kind(&cfg, BlockKind::LoopBody), 1);
        assert!(cfg
            .edges
            .iter()
            .any(|e| matches!(e.kind, CfgEdgeKind::BackEdge)));
    }

    #[test]
    fn return_routes_to_exit() {
        let body = vec![
            simple(2, "x = 1"),
            Stmt {
                kind: StmtKind::Return,
                line: 3,
                end_line: 3,
                text: "return x".to_string(),
            },
        ];
        let cfg = lift("f", 1, 4, &body);
        let exit = cfg
            .blocks
            .iter()
            .find(|b| b.kind == BlockKind::Exit)
            .unwrap();
        let ret = cfg
            .blocks
            .iter()
            .find(|b| b.kind == BlockKind::Return)
            .unwrap();
        assert!(cfg
            .edges
            .iter()
            .any(|e| e.source == ret.local_id && e.target == exit.local_id));
    }

    #[test]
    fn try_produces_exception_edge() {
        let body = vec![Stmt {
            kind: StmtKind::Try {
                body: vec![simple(3, "risky()")],
                handlers: vec![vec![simple(5, "log(e)")]],
                finally: vec![],
            },
            line: 2,
            end_line: 6,
            text: "try:".to_string(),
        }];
        let cfg = lift("f", 1, 7, &body);
        assert_eq!(count_kind(&cfg, BlockKind::Try), 1);
        assert_eq!(count_kind(&cfg, BlockKind::Except), 1);
        assert!(cfg
            .edges
            .iter()
            .any(|e| matches!(e.kind, CfgEdgeKind::Exception)));
    }
}
